//! Thin session controller combining the store and the analysis engine.
//!
//! Every operation takes a fresh snapshot through the store; nothing here
//! holds state of its own, so the controller is freely shareable across
//! the server's handlers.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::{self, Finding, RelatedThought, Summary};
use crate::error::StoreResult;
use crate::model::ThoughtRecord;
use crate::store::SessionStore;

/// How many related thoughts to attach to a processed-thought result.
const RELATED_LIMIT: usize = 3;

/// Result of recording one thought: the stored record plus its analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedThought {
    /// The record as stored, with the store-assigned timestamp.
    pub thought: ThoughtRecord,
    /// Progress against the declared sequence length.
    pub progress: Progress,
    /// The most similar previously recorded thoughts.
    pub related: Vec<RelatedThought>,
    /// Sequence anomalies visible after this record.
    pub findings: Vec<Finding>,
}

/// Position of the newest thought within the declared sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// The recorded thought's number.
    pub number: u32,
    /// The latest declared sequence length.
    pub total_expected: u32,
}

/// Record/query/clear operations over one session.
#[derive(Debug, Clone)]
pub struct SessionController {
    store: SessionStore,
}

impl SessionController {
    /// Create a controller over an opened store
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }

    /// The underlying store
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Record a thought and analyze it against the updated sequence
    pub fn record(&self, record: ThoughtRecord) -> StoreResult<ProcessedThought> {
        let stored = self.store.append(record)?;
        let snapshot = self.store.list()?;

        let related = analysis::related_to(&stored, &snapshot, RELATED_LIMIT);
        let findings = analysis::detect_patterns(&snapshot);

        info!(
            number = stored.number,
            stage = %stored.stage,
            related = related.len(),
            findings = findings.len(),
            "Thought processed"
        );

        Ok(ProcessedThought {
            progress: Progress {
                number: stored.number,
                total_expected: stored.total_expected,
            },
            thought: stored,
            related,
            findings,
        })
    }

    /// Summarize the whole sequence recorded so far
    pub fn summary(&self) -> StoreResult<Summary> {
        Ok(analysis::summarize(&self.store.snapshot()?))
    }

    /// Scan the sequence for anomalies
    pub fn patterns(&self) -> StoreResult<Vec<Finding>> {
        Ok(analysis::detect_patterns(&self.store.list()?))
    }

    /// Thoughts related to the record with the given number, or `None`
    /// when no such record exists
    pub fn related(&self, number: u32, limit: usize) -> StoreResult<Option<Vec<RelatedThought>>> {
        let snapshot = self.store.list()?;
        let Some(target) = snapshot.iter().find(|t| t.number == number).cloned() else {
            return Ok(None);
        };
        Ok(Some(analysis::related_to(&target, &snapshot, limit)))
    }

    /// Drop the whole history
    pub fn clear(&self) -> StoreResult<()> {
        self.store.clear()
    }

    /// Export the session dataset to an external file
    pub fn export_to(&self, path: &Path) -> StoreResult<()> {
        self.store.export_to(path)
    }

    /// Import a session dataset, replacing the current one on success
    pub fn import_from(&self, path: &Path) -> StoreResult<usize> {
        Ok(self.store.import_from(path)?.thoughts.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::model::ThoughtStage;
    use tempfile::TempDir;

    fn test_controller(dir: &TempDir) -> SessionController {
        let store = SessionStore::open(&StorageConfig {
            dir: dir.path().to_path_buf(),
            ..StorageConfig::default()
        })
        .unwrap();
        SessionController::new(store)
    }

    #[test]
    fn test_record_reports_progress_and_related() {
        let dir = TempDir::new().unwrap();
        let controller = test_controller(&dir);

        let first = ThoughtRecord::new(
            1,
            "Survey the existing schema",
            ThoughtStage::ProblemDefinition,
            4,
        )
        .unwrap()
        .with_tags(vec!["schema".to_string()]);
        let processed = controller.record(first).unwrap();
        assert_eq!(processed.progress, Progress { number: 1, total_expected: 4 });
        assert!(processed.related.is_empty());

        let second = ThoughtRecord::new(2, "Survey the existing schema again", ThoughtStage::Research, 4)
            .unwrap()
            .with_tags(vec!["schema".to_string()]);
        let processed = controller.record(second).unwrap();
        assert_eq!(processed.related.len(), 1);
        assert_eq!(processed.related[0].thought.number, 1);
    }

    #[test]
    fn test_related_for_unknown_number_is_none() {
        let dir = TempDir::new().unwrap();
        let controller = test_controller(&dir);
        assert!(controller.related(42, 3).unwrap().is_none());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let controller = test_controller(&dir);

        controller
            .record(ThoughtRecord::new(1, "x", ThoughtStage::Research, 2).unwrap())
            .unwrap();

        controller.clear().unwrap();
        assert_eq!(controller.summary().unwrap().total_thoughts, 0);

        // Second clear succeeds on the already-empty dataset
        controller.clear().unwrap();
        assert_eq!(controller.summary().unwrap().total_thoughts, 0);
    }
}
