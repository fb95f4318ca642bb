//! Client Layer
//!
//! - [`OptimisticView`] - authoritative base plus pending local predictions
//! - [`DiagramSession`] - stage/commit workflow for one diagram

pub mod prediction;
pub mod session;

pub use prediction::{OptimisticView, PendingId};
pub use session::{DiagramSession, SessionError};
