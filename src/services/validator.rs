//! Result validator.
//!
//! Scores a result against weighted criteria and derives recommendations
//! from whatever fails. Also performs pairwise cross-validation of two
//! results for the same task. Everything here is pure.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::error::{OrchestratorError, OrchestratorResult};
use crate::domain::models::{AdapterId, Task, TaskKind, TaskResult};

use super::text;

/// Overall pass threshold.
const PASS_THRESHOLD: f64 = 0.7;

/// Per-criterion pass threshold.
const CRITERION_THRESHOLD: f64 = 0.6;

/// Output length gap considered "large" during cross-validation.
const LENGTH_GAP_CHARS: usize = 100;

/// Execution time gap considered "large" during cross-validation.
const TIME_GAP_MS: u64 = 5_000;

/// A validation criterion: name, weight, and a scoring function in [0, 1].
pub trait ValidationCriterion: Send + Sync {
    fn name(&self) -> &'static str;

    fn weight(&self) -> f64;

    fn score(&self, result: &TaskResult, task: &Task) -> f64;

    /// Advice surfaced when this criterion fails.
    fn recommendation(&self) -> &'static str;
}

/// Output length relative to prompt length, in bands.
struct Completeness;

impl ValidationCriterion for Completeness {
    fn name(&self) -> &'static str {
        "completeness"
    }

    fn weight(&self) -> f64 {
        0.25
    }

    fn score(&self, result: &TaskResult, task: &Task) -> f64 {
        if result.output.is_empty() {
            return 0.0;
        }
        let ratio = result.output.chars().count() as f64 / task.prompt.chars().count().max(1) as f64;
        if ratio < 0.2 {
            0.3
        } else if ratio < 0.5 {
            0.6
        } else if ratio <= 20.0 {
            1.0
        } else {
            // Suspiciously verbose relative to the ask.
            0.7
        }
    }

    fn recommendation(&self) -> &'static str {
        "output looks truncated or disproportionate to the prompt"
    }
}

/// Fraction of substantial prompt words echoed in the output, capped.
struct Relevance;

impl ValidationCriterion for Relevance {
    fn name(&self) -> &'static str {
        "relevance"
    }

    fn weight(&self) -> f64 {
        0.3
    }

    fn score(&self, result: &TaskResult, task: &Task) -> f64 {
        let output = result.output.to_lowercase();
        let significant: Vec<String> = text::word_set(&task.prompt)
            .into_iter()
            .filter(|w| w.len() > 3)
            .collect();
        if significant.is_empty() {
            return 1.0;
        }
        let hits = significant.iter().filter(|w| output.contains(w.as_str())).count();
        let fraction = hits as f64 / significant.len() as f64;
        (fraction / 0.8).min(1.0)
    }

    fn recommendation(&self) -> &'static str {
        "output shares little vocabulary with the prompt; check it addresses the request"
    }
}

/// Code-kind tasks need fenced code or consistent indentation.
struct Format;

impl ValidationCriterion for Format {
    fn name(&self) -> &'static str {
        "format"
    }

    fn weight(&self) -> f64 {
        0.2
    }

    fn score(&self, result: &TaskResult, task: &Task) -> f64 {
        if !task.kind.is_code_kind() {
            return 1.0;
        }
        if result.output.contains("```") {
            return 1.0;
        }
        let indented = result
            .output
            .lines()
            .filter(|l| l.starts_with("    ") || l.starts_with('\t'))
            .count();
        if indented >= 2 {
            0.8
        } else {
            0.3
        }
    }

    fn recommendation(&self) -> &'static str {
        "code output should use fenced code blocks"
    }
}

/// Banded score from execution time.
struct Performance;

impl ValidationCriterion for Performance {
    fn name(&self) -> &'static str {
        "performance"
    }

    fn weight(&self) -> f64 {
        0.15
    }

    fn score(&self, result: &TaskResult, _task: &Task) -> f64 {
        match result.metadata.execution_time_ms {
            0..=1_000 => 1.0,
            1_001..=5_000 => 0.8,
            5_001..=10_000 => 0.6,
            10_001..=30_000 => 0.4,
            _ => 0.2,
        }
    }

    fn recommendation(&self) -> &'static str {
        "execution was slow; consider a faster adapter or a tighter prompt"
    }
}

/// Zero when the result is an error, one otherwise.
struct ErrorFree;

impl ValidationCriterion for ErrorFree {
    fn name(&self) -> &'static str {
        "error_free"
    }

    fn weight(&self) -> f64 {
        0.1
    }

    fn score(&self, result: &TaskResult, _task: &Task) -> f64 {
        if result.is_success() {
            1.0
        } else {
            0.0
        }
    }

    fn recommendation(&self) -> &'static str {
        "the adapter reported an error"
    }
}

/// Outcome of validating a result.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    /// Weighted score in [0, 1].
    pub score: f64,
    pub criterion_scores: BTreeMap<String, f64>,
    pub recommendations: Vec<String>,
}

/// Outcome of cross-validating two results.
#[derive(Debug, Clone, Serialize)]
pub struct CrossValidation {
    /// Jaccard similarity over lowercased word sets.
    pub similarity: f64,
    /// Textual annotations for notable divergences.
    pub differences: Vec<String>,
    /// similarity > 0.8 and fewer than 3 differences.
    pub consensus: bool,
}

/// Weighted-criteria validator.
pub struct ResultValidator {
    criteria: Vec<Box<dyn ValidationCriterion>>,
}

impl ResultValidator {
    /// Validator with the default criterion set.
    pub fn new() -> Self {
        Self {
            criteria: vec![
                Box::new(Completeness),
                Box::new(Relevance),
                Box::new(Format),
                Box::new(Performance),
                Box::new(ErrorFree),
            ],
        }
    }

    /// Validator with a custom criterion set. At least one is required.
    pub fn with_criteria(criteria: Vec<Box<dyn ValidationCriterion>>) -> OrchestratorResult<Self> {
        if criteria.is_empty() {
            return Err(OrchestratorError::Validation(
                "validator needs at least one criterion".into(),
            ));
        }
        Ok(Self { criteria })
    }

    /// Score a result against the task it answered.
    pub fn validate(&self, result: &TaskResult, task: &Task) -> ValidationOutcome {
        let mut criterion_scores = BTreeMap::new();
        let mut recommendations = Vec::new();
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;

        for criterion in &self.criteria {
            let score = criterion.score(result, task).clamp(0.0, 1.0);
            weighted_sum += score * criterion.weight();
            weight_total += criterion.weight();
            if score < CRITERION_THRESHOLD {
                recommendations.push(criterion.recommendation().to_string());
            }
            criterion_scores.insert(criterion.name().to_string(), score);
        }

        if let Some(hint) = mismatch_hint(task.kind, result.adapter) {
            recommendations.push(hint.to_string());
        }

        let score = if weight_total > 0.0 {
            weighted_sum / weight_total
        } else {
            0.0
        };

        ValidationOutcome {
            is_valid: score >= PASS_THRESHOLD,
            score,
            criterion_scores,
            recommendations,
        }
    }

    /// Compare two results for the same task from different adapters.
    pub fn cross_validate(
        &self,
        first: &TaskResult,
        second: &TaskResult,
        _task: &Task,
    ) -> OrchestratorResult<CrossValidation> {
        if first.adapter == second.adapter {
            return Err(OrchestratorError::Validation(
                "cross-validation requires results from distinct adapters".into(),
            ));
        }

        let similarity = text::text_jaccard(&first.output, &second.output);
        let mut differences = Vec::new();

        let len_a = first.output.chars().count();
        let len_b = second.output.chars().count();
        let length_gap = len_a.abs_diff(len_b);
        if length_gap > LENGTH_GAP_CHARS {
            differences.push(format!("output length differs by {length_gap} characters"));
        }

        let time_gap = first
            .metadata
            .execution_time_ms
            .abs_diff(second.metadata.execution_time_ms);
        if time_gap > TIME_GAP_MS {
            differences.push(format!("execution time differs by {time_gap} ms"));
        }

        let unique_a = text::unique_lines(&first.output, &second.output).len();
        let unique_b = text::unique_lines(&second.output, &first.output).len();
        if unique_a + unique_b >= 5 {
            differences.push(format!(
                "{} lines appear in only one of the outputs",
                unique_a + unique_b
            ));
        }

        let consensus = similarity > 0.8 && differences.len() < 3;
        Ok(CrossValidation {
            similarity,
            differences,
            consensus,
        })
    }
}

impl Default for ResultValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Static advice for a (kind, adapter) pairing with a known better fit.
fn mismatch_hint(kind: TaskKind, adapter: AdapterId) -> Option<&'static str> {
    match (kind, adapter) {
        (TaskKind::Multimodal | TaskKind::Search, AdapterId::Claude) => {
            Some("multimodal/search tasks usually fare better on gemini")
        }
        (kind, AdapterId::Gemini) if kind.is_code_kind() => {
            Some("code-centric tasks usually fare better on claude")
        }
        _ => None,
    }
}
