//! Stateless analysis over a store snapshot.
//!
//! Every function here is a pure function of its input: same snapshot,
//! same output, including ordering. Similarity scoring combines shared-tag
//! overlap with lexical overlap of the content fields; the exact weights
//! are an implementation choice, the determinism and ordering are the
//! contract.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::{Dataset, ThoughtRecord, ThoughtStage};

/// Weight of shared-tag overlap in the combined similarity score.
const TAG_WEIGHT: f64 = 0.6;
/// Weight of content token overlap in the combined similarity score.
const CONTENT_WEIGHT: f64 = 0.4;

/// Content overlap at or above which two thoughts count as near-duplicates.
pub const NEAR_DUPLICATE_THRESHOLD: f64 = 0.8;

/// Consecutive same-stage records at or above which a sequence counts as stalled.
const STALL_RUN_LENGTH: usize = 3;

/// A thought scored against a target record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedThought {
    /// The related record.
    pub thought: ThoughtRecord,
    /// Combined similarity score in [0, 1].
    pub score: f64,
}

/// Summary of a whole thinking sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Total recorded thoughts.
    pub total_thoughts: usize,
    /// Latest declared sequence length.
    pub last_total_expected: u32,
    /// Occurrence count per stage; stages with zero occurrences included.
    pub stage_counts: BTreeMap<ThoughtStage, usize>,
    /// `(number, stage)` pairs sorted by number.
    pub timeline: Vec<TimelineEntry>,
}

/// One step of the summary timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// The thought's sequence number.
    pub number: u32,
    /// The stage it was recorded under.
    pub stage: ThoughtStage,
}

/// What kind of anomaly a finding describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// A stage transition moving backward against the canonical order.
    StageRegression,
    /// A forward transition skipping more than one stage.
    StageSkip,
    /// A gap in the thought numbering.
    NumberingGap,
    /// Near-duplicate content between non-adjacent records.
    NearDuplicate,
    /// A record following a Conclusion.
    AfterConclusion,
    /// The same stage repeated enough times to look stalled.
    StalledStage,
}

/// A structured pattern-detection result; rendering is the caller's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// The anomaly kind.
    pub kind: FindingKind,
    /// The implicated thought number(s).
    pub numbers: Vec<u32>,
    /// Human-readable description of the anomaly.
    pub description: String,
}

/// Score every other record against `target`, highest first.
///
/// The target itself is excluded. Ties break toward the lower thought
/// number, so two identical inputs always produce the identical ordered
/// result. At most `limit` entries are returned.
pub fn related_to(
    target: &ThoughtRecord,
    all: &[ThoughtRecord],
    limit: usize,
) -> Vec<RelatedThought> {
    let mut scored: Vec<RelatedThought> = all
        .iter()
        .filter(|t| t.number != target.number)
        .map(|t| RelatedThought {
            score: similarity(target, t),
            thought: t.clone(),
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.thought.number.cmp(&b.thought.number))
    });
    scored.truncate(limit);
    scored
}

/// Combined similarity of two records in [0, 1].
pub fn similarity(a: &ThoughtRecord, b: &ThoughtRecord) -> f64 {
    let tag_overlap = jaccard(
        &normalized_set(a.tags.iter()),
        &normalized_set(b.tags.iter()),
    );
    TAG_WEIGHT * tag_overlap + CONTENT_WEIGHT * content_similarity(a, b)
}

/// Lexical overlap between two content fields in [0, 1].
pub fn content_similarity(a: &ThoughtRecord, b: &ThoughtRecord) -> f64 {
    jaccard(&content_tokens(&a.content), &content_tokens(&b.content))
}

/// Summarize a dataset snapshot: counts, per-stage distribution, timeline.
pub fn summarize(dataset: &Dataset) -> Summary {
    let thoughts = dataset.sorted_thoughts();

    let mut stage_counts: BTreeMap<ThoughtStage, usize> =
        ThoughtStage::ALL.iter().map(|s| (*s, 0)).collect();
    for thought in &thoughts {
        *stage_counts.entry(thought.stage).or_insert(0) += 1;
    }

    let timeline = thoughts
        .iter()
        .map(|t| TimelineEntry {
            number: t.number,
            stage: t.stage,
        })
        .collect();

    Summary {
        total_thoughts: thoughts.len(),
        last_total_expected: dataset.last_total_expected,
        stage_counts,
        timeline,
    }
}

/// Scan a snapshot for sequence anomalies.
///
/// The stage progression is treated as a forward-only machine over the
/// five canonical stages: repeating a stage or advancing one step is
/// legal, moving backward or skipping more than one step is flagged.
/// Records after a Conclusion are flagged as their own pattern rather
/// than as regressions. Findings come out in a stable order.
pub fn detect_patterns(all: &[ThoughtRecord]) -> Vec<Finding> {
    let mut thoughts = all.to_vec();
    thoughts.sort_by_key(|t| t.number);

    let mut findings = Vec::new();

    for pair in thoughts.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);

        if cur.number != prev.number + 1 {
            findings.push(Finding {
                kind: FindingKind::NumberingGap,
                numbers: vec![prev.number, cur.number],
                description: format!(
                    "Numbering jumps from {} to {}, leaving a gap",
                    prev.number, cur.number
                ),
            });
        }

        if prev.stage == ThoughtStage::Conclusion {
            findings.push(Finding {
                kind: FindingKind::AfterConclusion,
                numbers: vec![cur.number],
                description: format!(
                    "Thought {} continues after a Conclusion at thought {}",
                    cur.number, prev.number
                ),
            });
            continue;
        }

        let from = prev.stage.position();
        let to = cur.stage.position();
        if to < from {
            findings.push(Finding {
                kind: FindingKind::StageRegression,
                numbers: vec![prev.number, cur.number],
                description: format!(
                    "Stage moves backward from {} (thought {}) to {} (thought {})",
                    prev.stage, prev.number, cur.stage, cur.number
                ),
            });
        } else if to > from + 1 {
            findings.push(Finding {
                kind: FindingKind::StageSkip,
                numbers: vec![prev.number, cur.number],
                description: format!(
                    "Stage skips from {} (thought {}) to {} (thought {})",
                    prev.stage, prev.number, cur.stage, cur.number
                ),
            });
        }
    }

    findings.extend(stalled_runs(&thoughts));
    findings.extend(near_duplicates(&thoughts));

    findings
}

/// Flag runs of the same stage long enough to look stalled.
fn stalled_runs(thoughts: &[ThoughtRecord]) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut start = 0;

    for i in 1..=thoughts.len() {
        let run_ended = i == thoughts.len() || thoughts[i].stage != thoughts[start].stage;
        if !run_ended {
            continue;
        }
        let run = &thoughts[start..i];
        if run.len() >= STALL_RUN_LENGTH {
            findings.push(Finding {
                kind: FindingKind::StalledStage,
                numbers: run.iter().map(|t| t.number).collect(),
                description: format!(
                    "{} consecutive thoughts stay in {} without advancing",
                    run.len(),
                    run[0].stage
                ),
            });
        }
        start = i;
    }

    findings
}

/// Flag near-duplicate content between non-adjacent records.
///
/// Scored on content overlap alone; tags never gate duplication, they
/// only feed the combined ranking metric used by [`related_to`].
fn near_duplicates(thoughts: &[ThoughtRecord]) -> Vec<Finding> {
    let mut findings = Vec::new();

    for i in 0..thoughts.len() {
        for j in (i + 2)..thoughts.len() {
            let score = content_similarity(&thoughts[i], &thoughts[j]);
            if score >= NEAR_DUPLICATE_THRESHOLD {
                findings.push(Finding {
                    kind: FindingKind::NearDuplicate,
                    numbers: vec![thoughts[i].number, thoughts[j].number],
                    description: format!(
                        "Thoughts {} and {} are near-duplicates (content similarity {:.2})",
                        thoughts[i].number, thoughts[j].number, score
                    ),
                });
            }
        }
    }

    findings
}

/// Jaccard overlap of two sets; empty-vs-empty scores zero.
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn normalized_set<'a>(items: impl Iterator<Item = &'a String>) -> HashSet<String> {
    items.map(|s| s.trim().to_lowercase()).collect()
}

/// Lowercased alphanumeric tokens of a content field.
fn content_tokens(content: &str) -> HashSet<String> {
    content
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ThoughtRecord;

    fn record(number: i64, stage: ThoughtStage, content: &str, tags: &[&str]) -> ThoughtRecord {
        ThoughtRecord::new(number, content, stage, 20)
            .unwrap()
            .with_tags(tags.iter().map(|t| t.to_string()).collect())
    }

    #[test]
    fn test_similarity_identical_records_is_one() {
        let a = record(1, ThoughtStage::Research, "cache invalidation is hard", &["cache"]);
        let b = record(2, ThoughtStage::Research, "cache invalidation is hard", &["cache"]);
        let score = similarity(&a, &b);
        assert!((score - 1.0).abs() < 1e-9, "got {}", score);
    }

    #[test]
    fn test_similarity_disjoint_records_is_zero() {
        let a = record(1, ThoughtStage::Research, "alpha beta", &["x"]);
        let b = record(2, ThoughtStage::Research, "gamma delta", &["y"]);
        assert_eq!(similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let a = record(1, ThoughtStage::Research, "shared words here", &["one", "two"]);
        let b = record(2, ThoughtStage::Analysis, "shared words elsewhere", &["two", "three"]);
        assert_eq!(similarity(&a, &b), similarity(&b, &a));
    }

    #[test]
    fn test_related_to_excludes_target_and_orders_by_score() {
        let target = record(1, ThoughtStage::Research, "database indexing strategy", &["db"]);
        let close = record(2, ThoughtStage::Analysis, "database indexing strategy", &["db"]);
        let far = record(3, ThoughtStage::Analysis, "unrelated musing", &["other"]);
        let all = vec![target.clone(), far.clone(), close.clone()];

        let related = related_to(&target, &all, 10);
        assert_eq!(related.len(), 2);
        assert_eq!(related[0].thought.number, 2);
        assert!(related[0].score > related[1].score);
    }

    #[test]
    fn test_related_to_tie_breaks_by_lower_number() {
        let target = record(5, ThoughtStage::Research, "alpha beta", &[]);
        let tie_high = record(9, ThoughtStage::Research, "alpha beta", &[]);
        let tie_low = record(3, ThoughtStage::Research, "alpha beta", &[]);
        let all = vec![tie_high.clone(), target.clone(), tie_low.clone()];

        let related = related_to(&target, &all, 10);
        assert_eq!(related[0].thought.number, 3);
        assert_eq!(related[1].thought.number, 9);
        assert_eq!(related[0].score, related[1].score);
    }

    #[test]
    fn test_related_to_is_deterministic() {
        let target = record(1, ThoughtStage::Research, "one two three", &["a"]);
        let all: Vec<ThoughtRecord> = (2..10)
            .map(|i| record(i, ThoughtStage::Analysis, "one two four", &["a", "b"]))
            .collect();

        let first = related_to(&target, &all, 5);
        let second = related_to(&target, &all, 5);
        let numbers = |v: &[RelatedThought]| v.iter().map(|r| r.thought.number).collect::<Vec<_>>();
        assert_eq!(numbers(&first), numbers(&second));
    }

    #[test]
    fn test_related_to_respects_limit() {
        let target = record(1, ThoughtStage::Research, "alpha", &[]);
        let all: Vec<ThoughtRecord> = (1..8)
            .map(|i| record(i, ThoughtStage::Research, "alpha", &[]))
            .collect();
        assert_eq!(related_to(&target, &all, 3).len(), 3);
    }

    #[test]
    fn test_summarize_empty_dataset_has_zero_counts() {
        let summary = summarize(&Dataset::new());
        assert_eq!(summary.total_thoughts, 0);
        assert_eq!(summary.stage_counts.len(), 5);
        assert!(summary.stage_counts.values().all(|&c| c == 0));
        assert!(summary.timeline.is_empty());
    }

    #[test]
    fn test_detect_patterns_flags_numbering_gap() {
        let thoughts = vec![
            record(1, ThoughtStage::ProblemDefinition, "a", &[]),
            record(4, ThoughtStage::Research, "b", &[]),
        ];
        let findings = detect_patterns(&thoughts);
        assert!(findings
            .iter()
            .any(|f| f.kind == FindingKind::NumberingGap && f.numbers == vec![1, 4]));
    }

    #[test]
    fn test_detect_patterns_flags_regression() {
        let thoughts = vec![
            record(1, ThoughtStage::Synthesis, "a", &[]),
            record(2, ThoughtStage::Research, "b", &[]),
        ];
        let findings = detect_patterns(&thoughts);
        assert!(findings.iter().any(|f| f.kind == FindingKind::StageRegression));
    }

    #[test]
    fn test_detect_patterns_flags_skip_of_more_than_one_stage() {
        let thoughts = vec![
            record(1, ThoughtStage::ProblemDefinition, "a", &[]),
            record(2, ThoughtStage::Synthesis, "b", &[]),
        ];
        let findings = detect_patterns(&thoughts);
        assert!(findings.iter().any(|f| f.kind == FindingKind::StageSkip));
    }

    #[test]
    fn test_detect_patterns_allows_single_step_and_repeat() {
        let thoughts = vec![
            record(1, ThoughtStage::ProblemDefinition, "a", &[]),
            record(2, ThoughtStage::Research, "b", &[]),
            record(3, ThoughtStage::Research, "c", &[]),
            record(4, ThoughtStage::Analysis, "d", &[]),
        ];
        let findings = detect_patterns(&thoughts);
        assert!(findings.is_empty(), "unexpected findings: {:?}", findings);
    }

    #[test]
    fn test_detect_patterns_flags_thoughts_after_conclusion() {
        let thoughts = vec![
            record(1, ThoughtStage::Conclusion, "done", &[]),
            record(2, ThoughtStage::Research, "more digging", &[]),
        ];
        let findings = detect_patterns(&thoughts);
        assert!(findings
            .iter()
            .any(|f| f.kind == FindingKind::AfterConclusion && f.numbers == vec![2]));
        // Continuing after a Conclusion is its own pattern, not a regression
        assert!(!findings.iter().any(|f| f.kind == FindingKind::StageRegression));
    }

    #[test]
    fn test_detect_patterns_flags_stalled_stage() {
        let thoughts = vec![
            record(1, ThoughtStage::Analysis, "a", &[]),
            record(2, ThoughtStage::Analysis, "b", &[]),
            record(3, ThoughtStage::Analysis, "c", &[]),
        ];
        let findings = detect_patterns(&thoughts);
        let stall = findings
            .iter()
            .find(|f| f.kind == FindingKind::StalledStage)
            .expect("stall finding");
        assert_eq!(stall.numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_detect_patterns_flags_non_adjacent_near_duplicates() {
        let thoughts = vec![
            record(1, ThoughtStage::Research, "the cache layer is too slow", &["cache", "perf"]),
            record(2, ThoughtStage::Analysis, "something entirely different", &["other"]),
            record(3, ThoughtStage::Analysis, "the cache layer is too slow", &["cache", "perf"]),
        ];
        let findings = detect_patterns(&thoughts);
        assert!(findings
            .iter()
            .any(|f| f.kind == FindingKind::NearDuplicate && f.numbers == vec![1, 3]));
    }

    #[test]
    fn test_detect_patterns_flags_untagged_identical_content() {
        let thoughts = vec![
            record(1, ThoughtStage::Research, "the cache layer is too slow", &[]),
            record(2, ThoughtStage::Analysis, "something entirely different", &[]),
            record(3, ThoughtStage::Analysis, "the cache layer is too slow", &[]),
        ];
        let findings = detect_patterns(&thoughts);
        assert!(findings
            .iter()
            .any(|f| f.kind == FindingKind::NearDuplicate && f.numbers == vec![1, 3]));
    }

    #[test]
    fn test_detect_patterns_ignores_adjacent_duplicates() {
        let thoughts = vec![
            record(1, ThoughtStage::Research, "same thing twice", &["t"]),
            record(2, ThoughtStage::Research, "same thing twice", &["t"]),
        ];
        let findings = detect_patterns(&thoughts);
        assert!(!findings.iter().any(|f| f.kind == FindingKind::NearDuplicate));
    }
}
