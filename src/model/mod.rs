//! Data model for sequential thinking sessions.
//!
//! A [`ThoughtRecord`] is the validated, immutable unit of the sequence.
//! Records are grouped into a [`Dataset`], the document the store persists
//! after every mutation. Validation happens at construction so nothing
//! malformed ever reaches disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// The five canonical cognitive stages, in their intended order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ThoughtStage {
    /// Framing the problem to be solved.
    #[serde(rename = "Problem Definition")]
    ProblemDefinition,
    /// Gathering information.
    Research,
    /// Examining the gathered material.
    Analysis,
    /// Combining insights into a coherent view.
    Synthesis,
    /// Arriving at an answer.
    Conclusion,
}

impl ThoughtStage {
    /// All stages in canonical progression order.
    pub const ALL: [ThoughtStage; 5] = [
        ThoughtStage::ProblemDefinition,
        ThoughtStage::Research,
        ThoughtStage::Analysis,
        ThoughtStage::Synthesis,
        ThoughtStage::Conclusion,
    ];

    /// Position of this stage in the canonical order (0-based).
    pub fn position(self) -> usize {
        match self {
            ThoughtStage::ProblemDefinition => 0,
            ThoughtStage::Research => 1,
            ThoughtStage::Analysis => 2,
            ThoughtStage::Synthesis => 3,
            ThoughtStage::Conclusion => 4,
        }
    }
}

impl std::fmt::Display for ThoughtStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThoughtStage::ProblemDefinition => write!(f, "Problem Definition"),
            ThoughtStage::Research => write!(f, "Research"),
            ThoughtStage::Analysis => write!(f, "Analysis"),
            ThoughtStage::Synthesis => write!(f, "Synthesis"),
            ThoughtStage::Conclusion => write!(f, "Conclusion"),
        }
    }
}

impl std::str::FromStr for ThoughtStage {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "problem definition" => Ok(ThoughtStage::ProblemDefinition),
            "research" => Ok(ThoughtStage::Research),
            "analysis" => Ok(ThoughtStage::Analysis),
            "synthesis" => Ok(ThoughtStage::Synthesis),
            "conclusion" => Ok(ThoughtStage::Conclusion),
            _ => Err(ValidationError::UnknownStage {
                value: s.to_string(),
            }),
        }
    }
}

/// One validated entry in the thinking sequence.
///
/// Immutable after creation: corrections are modeled as new records,
/// never in-place edits. The `timestamp` is assigned by the store when
/// the record is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtRecord {
    /// Position in the declared sequence, unique within a session.
    pub number: u32,
    /// The thought text.
    pub content: String,
    /// Cognitive stage this thought belongs to.
    pub stage: ThoughtStage,
    /// The caller's declared sequence length at recording time.
    pub total_expected: u32,
    /// Keywords for the thought, insertion order preserved, duplicates collapsed.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Principles or axioms applied in this thought.
    #[serde(default)]
    pub axioms_used: Vec<String>,
    /// Assumptions this thought challenges.
    #[serde(default)]
    pub assumptions_challenged: Vec<String>,
    /// Creation time, assigned by the store at append.
    pub timestamp: DateTime<Utc>,
}

impl ThoughtRecord {
    /// Create a validated thought record.
    ///
    /// Rejects non-positive or out-of-range numbers, empty content, and a
    /// declared total below the thought's own number. The stage is already
    /// a closed enum, so anything outside the five canonical values never
    /// gets this far.
    pub fn new(
        number: i64,
        content: impl Into<String>,
        stage: ThoughtStage,
        total_expected: i64,
    ) -> Result<Self, ValidationError> {
        if number <= 0 {
            return Err(ValidationError::NonPositiveNumber { number });
        }
        let content = content.into();
        if content.trim().is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        if total_expected <= 0 || total_expected < number {
            return Err(ValidationError::TotalBelowNumber {
                number,
                total: total_expected,
            });
        }
        let number_u32 =
            u32::try_from(number).map_err(|_| ValidationError::NumberTooLarge { number })?;
        let total_u32 = u32::try_from(total_expected).map_err(|_| ValidationError::TotalTooLarge {
            total: total_expected,
        })?;

        Ok(Self {
            number: number_u32,
            content,
            stage,
            total_expected: total_u32,
            tags: Vec::new(),
            axioms_used: Vec::new(),
            assumptions_challenged: Vec::new(),
            timestamp: Utc::now(),
        })
    }

    /// Set tags, collapsing duplicates while preserving insertion order
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        let mut seen = Vec::with_capacity(tags.len());
        for tag in tags {
            if !seen.contains(&tag) {
                seen.push(tag);
            }
        }
        self.tags = seen;
        self
    }

    /// Set the axioms used
    pub fn with_axioms(mut self, axioms: Vec<String>) -> Self {
        self.axioms_used = axioms;
        self
    }

    /// Set the assumptions challenged
    pub fn with_assumptions(mut self, assumptions: Vec<String>) -> Self {
        self.assumptions_challenged = assumptions;
        self
    }

    /// Re-check the invariants on a record that came from disk.
    ///
    /// Serde enforces the stage enum; this covers the numeric and
    /// content invariants a hand-edited file could violate.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.number == 0 {
            return Err(ValidationError::NonPositiveNumber { number: 0 });
        }
        if self.content.trim().is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        if self.total_expected == 0 || self.total_expected < self.number {
            return Err(ValidationError::TotalBelowNumber {
                number: self.number as i64,
                total: self.total_expected as i64,
            });
        }
        Ok(())
    }
}

/// The full persisted document for one thinking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Identifier minted when the dataset is first created, carried
    /// through export/import so a file names its session.
    pub session_id: String,
    /// The most recently declared sequence length.
    pub last_total_expected: u32,
    /// All recorded thoughts, ordered by number.
    pub thoughts: Vec<ThoughtRecord>,
}

impl Dataset {
    /// Create an empty dataset with a fresh session id
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            last_total_expected: 0,
            thoughts: Vec::new(),
        }
    }

    /// Whether a thought with this number is already recorded
    pub fn contains_number(&self, number: u32) -> bool {
        self.thoughts.iter().any(|t| t.number == number)
    }

    /// Insert a record keeping the collection ordered by number.
    ///
    /// The caller must have checked for duplicates first.
    pub fn insert(&mut self, record: ThoughtRecord) {
        self.last_total_expected = record.total_expected;
        let at = self
            .thoughts
            .partition_point(|t| t.number < record.number);
        self.thoughts.insert(at, record);
    }

    /// Check every record and the cross-record invariants.
    ///
    /// Used when loading from disk and when importing an external file:
    /// a dataset that fails this check never replaces live state.
    pub fn check_integrity(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for record in &self.thoughts {
            record
                .validate()
                .map_err(|e| format!("thought {}: {}", record.number, e))?;
            if !seen.insert(record.number) {
                return Err(format!("duplicate thought number {}", record.number));
            }
        }
        Ok(())
    }

    /// Return the records sorted by number, regardless of file order
    pub fn sorted_thoughts(&self) -> Vec<ThoughtRecord> {
        let mut thoughts = self.thoughts.clone();
        thoughts.sort_by_key(|t| t.number);
        thoughts
    }
}

impl Default for Dataset {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_stage_from_str_canonical() {
        assert_eq!(
            ThoughtStage::from_str("Problem Definition").unwrap(),
            ThoughtStage::ProblemDefinition
        );
        assert_eq!(
            ThoughtStage::from_str("research").unwrap(),
            ThoughtStage::Research
        );
        assert_eq!(
            ThoughtStage::from_str(" Conclusion ").unwrap(),
            ThoughtStage::Conclusion
        );
    }

    #[test]
    fn test_stage_from_str_rejects_free_text() {
        let err = ThoughtStage::from_str("Brainstorming").unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownStage {
                value: "Brainstorming".to_string()
            }
        );
    }

    #[test]
    fn test_stage_display_round_trip() {
        for stage in ThoughtStage::ALL {
            let parsed = ThoughtStage::from_str(&stage.to_string()).unwrap();
            assert_eq!(parsed, stage);
        }
    }

    #[test]
    fn test_stage_serde_uses_display_names() {
        let json = serde_json::to_string(&ThoughtStage::ProblemDefinition).unwrap();
        assert_eq!(json, "\"Problem Definition\"");
        let parsed: ThoughtStage = serde_json::from_str("\"Synthesis\"").unwrap();
        assert_eq!(parsed, ThoughtStage::Synthesis);
    }

    #[test]
    fn test_stage_positions_are_canonical_order() {
        let positions: Vec<usize> = ThoughtStage::ALL.iter().map(|s| s.position()).collect();
        assert_eq!(positions, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_record_new_valid() {
        let record = ThoughtRecord::new(1, "Define the problem", ThoughtStage::ProblemDefinition, 5)
            .unwrap();
        assert_eq!(record.number, 1);
        assert_eq!(record.total_expected, 5);
        assert!(record.tags.is_empty());
    }

    #[test]
    fn test_record_rejects_non_positive_number() {
        let err = ThoughtRecord::new(0, "x", ThoughtStage::Research, 3).unwrap_err();
        assert_eq!(err, ValidationError::NonPositiveNumber { number: 0 });

        let err = ThoughtRecord::new(-2, "x", ThoughtStage::Research, 3).unwrap_err();
        assert_eq!(err, ValidationError::NonPositiveNumber { number: -2 });
    }

    #[test]
    fn test_record_rejects_number_beyond_u32_range() {
        let too_big = (1i64 << 32) + 1;
        let err = ThoughtRecord::new(too_big, "x", ThoughtStage::Research, too_big).unwrap_err();
        assert_eq!(err, ValidationError::NumberTooLarge { number: too_big });

        let err = ThoughtRecord::new(1, "x", ThoughtStage::Research, too_big).unwrap_err();
        assert_eq!(err, ValidationError::TotalTooLarge { total: too_big });
    }

    #[test]
    fn test_record_rejects_empty_content() {
        let err = ThoughtRecord::new(1, "   ", ThoughtStage::Research, 3).unwrap_err();
        assert_eq!(err, ValidationError::EmptyContent);
    }

    #[test]
    fn test_record_rejects_total_below_number() {
        let err = ThoughtRecord::new(4, "x", ThoughtStage::Research, 3).unwrap_err();
        assert_eq!(err, ValidationError::TotalBelowNumber { number: 4, total: 3 });

        let err = ThoughtRecord::new(1, "x", ThoughtStage::Research, 0).unwrap_err();
        assert_eq!(err, ValidationError::TotalBelowNumber { number: 1, total: 0 });
    }

    #[test]
    fn test_with_tags_collapses_duplicates_in_order() {
        let record = ThoughtRecord::new(1, "x", ThoughtStage::Research, 3)
            .unwrap()
            .with_tags(vec![
                "db".to_string(),
                "perf".to_string(),
                "db".to_string(),
                "io".to_string(),
            ]);
        assert_eq!(record.tags, vec!["db", "perf", "io"]);
    }

    #[test]
    fn test_dataset_insert_keeps_order() {
        let mut dataset = Dataset::new();
        dataset.insert(ThoughtRecord::new(3, "c", ThoughtStage::Analysis, 5).unwrap());
        dataset.insert(ThoughtRecord::new(1, "a", ThoughtStage::ProblemDefinition, 5).unwrap());
        dataset.insert(ThoughtRecord::new(2, "b", ThoughtStage::Research, 5).unwrap());

        let numbers: Vec<u32> = dataset.thoughts.iter().map(|t| t.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_dataset_tracks_latest_declared_total() {
        let mut dataset = Dataset::new();
        dataset.insert(ThoughtRecord::new(1, "a", ThoughtStage::ProblemDefinition, 3).unwrap());
        assert_eq!(dataset.last_total_expected, 3);
        dataset.insert(ThoughtRecord::new(2, "b", ThoughtStage::Research, 6).unwrap());
        assert_eq!(dataset.last_total_expected, 6);
    }

    #[test]
    fn test_check_integrity_catches_duplicates() {
        let record = ThoughtRecord::new(1, "a", ThoughtStage::Research, 2).unwrap();
        let dataset = Dataset {
            session_id: "s".to_string(),
            last_total_expected: 2,
            thoughts: vec![record.clone(), record],
        };
        let err = dataset.check_integrity().unwrap_err();
        assert!(err.contains("duplicate thought number 1"));
    }

    #[test]
    fn test_check_integrity_catches_invalid_record() {
        let mut record = ThoughtRecord::new(1, "a", ThoughtStage::Research, 2).unwrap();
        record.content = String::new();
        let dataset = Dataset {
            session_id: "s".to_string(),
            last_total_expected: 2,
            thoughts: vec![record],
        };
        let err = dataset.check_integrity().unwrap_err();
        assert!(err.contains("thought 1"));
    }

    #[test]
    fn test_record_serde_round_trip() {
        let record = ThoughtRecord::new(2, "Gather background", ThoughtStage::Research, 5)
            .unwrap()
            .with_tags(vec!["background".to_string()])
            .with_axioms(vec!["parsimony".to_string()]);

        let json = serde_json::to_string(&record).unwrap();
        let parsed: ThoughtRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
