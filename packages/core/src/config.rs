//! Session Configuration
//!
//! A session works on exactly one diagram. [`SessionConfig`] names it, and is
//! passed explicitly into everything that needs it. Processes that want a
//! single process-wide session may [`SessionConfig::install`] it once; it is
//! immutable afterwards.
//!
//! # Environment
//!
//! - `FLOWSYNC_DIAGRAM_ID` - diagram to open; a fresh `diagram-<uuid>` when unset
//! - `FLOWSYNC_EVENT_CAPACITY` - store event channel capacity (default 128)

use crate::db::DEFAULT_EVENT_CHANNEL_CAPACITY;
use crate::models::DiagramId;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

pub const DIAGRAM_ID_ENV: &str = "FLOWSYNC_DIAGRAM_ID";
pub const EVENT_CAPACITY_ENV: &str = "FLOWSYNC_EVENT_CAPACITY";

static INSTALLED: OnceLock<SessionConfig> = OnceLock::new();

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid diagram id: '{value}'")]
    InvalidDiagramId { value: String },

    #[error("Invalid event channel capacity: '{value}'")]
    InvalidEventCapacity { value: String },

    #[error("Session already installed for diagram {diagram_id}")]
    AlreadyInstalled { diagram_id: DiagramId },
}

/// Per-session settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub diagram_id: DiagramId,
    pub event_channel_capacity: usize,
}

impl SessionConfig {
    pub fn new(diagram_id: impl Into<DiagramId>) -> Result<Self, ConfigError> {
        let diagram_id = diagram_id.into();
        if !diagram_id.is_valid() {
            return Err(ConfigError::InvalidDiagramId {
                value: diagram_id.to_string(),
            });
        }
        Ok(Self {
            diagram_id,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        })
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::InvalidEventCapacity {
                value: capacity.to_string(),
            });
        }
        self.event_channel_capacity = capacity;
        Ok(self)
    }

    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let diagram_id = match lookup(DIAGRAM_ID_ENV) {
            Some(value) => DiagramId::from(value.trim()),
            None => DiagramId::generate(),
        };
        let config = Self::new(diagram_id)?;

        match lookup(EVENT_CAPACITY_ENV) {
            Some(value) => {
                let capacity = value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| ConfigError::InvalidEventCapacity { value: value.clone() })?;
                config.with_event_capacity(capacity)
            }
            None => Ok(config),
        }
    }

    /// Make this the process-wide session; fails if one is already installed
    pub fn install(self) -> Result<&'static SessionConfig, ConfigError> {
        let mut fresh = false;
        let installed = INSTALLED.get_or_init(|| {
            fresh = true;
            self
        });
        if fresh {
            Ok(installed)
        } else {
            Err(ConfigError::AlreadyInstalled {
                diagram_id: installed.diagram_id.clone(),
            })
        }
    }

    pub fn installed() -> Option<&'static SessionConfig> {
        INSTALLED.get()
    }
}
