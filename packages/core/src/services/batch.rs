//! Per-entity results of a change batch

use crate::services::error::DiagramServiceError;
use serde::{Serialize, Serializer};

/// An entity whose write failed; the store keeps its previous state
///
/// Serializes the error as its message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedEntity {
    pub id: String,
    #[serde(serialize_with = "serialize_error")]
    pub error: DiagramServiceError,
}

fn serialize_error<S: Serializer>(error: &DiagramServiceError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// What a batch did to each referenced entity, by domain id
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub inserted: Vec<String>,
    pub patched: Vec<String>,
    pub deleted: Vec<String>,
    pub unchanged: Vec<String>,
    pub rejected: Vec<RejectedEntity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteKind {
    Insert,
    Patch,
    Delete,
}

impl BatchOutcome {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    /// Number of store writes that succeeded
    pub fn written(&self) -> usize {
        self.inserted.len() + self.patched.len() + self.deleted.len()
    }

    pub(crate) fn reject(&mut self, id: impl Into<String>, error: DiagramServiceError) {
        self.rejected.push(RejectedEntity {
            id: id.into(),
            error,
        });
    }

    pub(crate) fn record(&mut self, kind: WriteKind, id: String, result: Result<(), DiagramServiceError>) {
        match (result, kind) {
            (Ok(()), WriteKind::Insert) => self.inserted.push(id),
            (Ok(()), WriteKind::Patch) => self.patched.push(id),
            (Ok(()), WriteKind::Delete) => self.deleted.push(id),
            (Err(error), _) => self.reject(id, error),
        }
    }

    /// The outcome, or the first rejection as an error
    pub fn into_result(self) -> Result<Self, DiagramServiceError> {
        match self.rejected.first() {
            Some(rejected) => Err(rejected.error.clone()),
            None => Ok(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_result_surfaces_first_rejection() {
        let mut outcome = BatchOutcome::default();
        outcome.record(WriteKind::Insert, "n1".to_string(), Ok(()));
        outcome.record(
            WriteKind::Insert,
            "e1".to_string(),
            Err(DiagramServiceError::referential_integrity("e1", "ghost")),
        );
        outcome.reject("e2", DiagramServiceError::duplicate_id("e2"));

        assert_eq!(outcome.written(), 1);
        assert!(!outcome.is_clean());
        assert_eq!(
            outcome.into_result(),
            Err(DiagramServiceError::referential_integrity("e1", "ghost"))
        );
    }

    #[test]
    fn test_clean_outcome_passes_through() {
        let mut outcome = BatchOutcome::default();
        outcome.record(WriteKind::Delete, "n1".to_string(), Ok(()));
        let outcome = outcome.into_result().unwrap();
        assert_eq!(outcome.deleted, vec!["n1".to_string()]);
    }

    #[test]
    fn test_serialized_outcome_reports_rejections() {
        let mut outcome = BatchOutcome::default();
        outcome.record(WriteKind::Patch, "e1".to_string(), Ok(()));
        outcome.reject("e2", DiagramServiceError::duplicate_connection("e2"));

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["patched"], serde_json::json!(["e1"]));
        assert_eq!(
            json["rejected"],
            serde_json::json!([{
                "id": "e2",
                "error": "Edge e2 duplicates an existing connection"
            }])
        );
    }
}
