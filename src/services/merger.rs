//! Result merger.
//!
//! Combines N results for one task into a single merged output under one of
//! four strategies. Contribution percentages always sum to 100 when any
//! elements survive, and confidence stays in [0, 1].

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::domain::error::{OrchestratorError, OrchestratorResult};
use crate::domain::models::{AdapterId, Task, TaskResult};

use super::text;

/// Word-overlap threshold above which two elements count as "similar".
const ELEMENT_SIMILARITY: f64 = 0.7;

/// Merge strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Keep only elements every output agrees on; fall back to best-of.
    Consensus,
    /// Pick the single highest-quality result.
    BestOf,
    /// Deduplicate and concatenate the structural elements of all outputs.
    Combine,
    /// Treat the second result as a review of the first (exactly 2).
    Validate,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consensus => "consensus",
            Self::BestOf => "best_of",
            Self::Combine => "combine",
            Self::Validate => "validate",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "consensus" => Some(Self::Consensus),
            "best_of" | "best-of" | "bestof" => Some(Self::BestOf),
            "combine" => Some(Self::Combine),
            "validate" => Some(Self::Validate),
            _ => None,
        }
    }
}

/// Options for a merge call.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub strategy: MergeStrategy,
    /// Bonus adapter for best-of selection.
    pub preferred_adapter: Option<AdapterId>,
    /// Emit section headers in the merged output.
    pub format_output: bool,
}

impl MergeOptions {
    pub fn new(strategy: MergeStrategy) -> Self {
        Self {
            strategy,
            preferred_adapter: None,
            format_output: true,
        }
    }

    pub fn with_preferred(mut self, adapter: AdapterId) -> Self {
        self.preferred_adapter = Some(adapter);
        self
    }
}

/// A merged output with per-adapter attribution.
#[derive(Debug, Clone, Serialize)]
pub struct MergedResult {
    pub output: String,
    pub strategy: MergeStrategy,
    /// Percentage contribution per adapter; sums to 100 when any elements
    /// survive.
    pub contributions: BTreeMap<AdapterId, f64>,
    pub confidence: f64,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Stateless merger service.
pub struct ResultMerger;

impl ResultMerger {
    pub fn new() -> Self {
        Self
    }

    /// Merge results for one task. All inputs must be successes.
    pub fn merge(
        &self,
        results: &[TaskResult],
        task: &Task,
        options: &MergeOptions,
    ) -> OrchestratorResult<MergedResult> {
        if results.is_empty() {
            return Err(OrchestratorError::Validation(
                "merge requires at least one result".into(),
            ));
        }
        if let Some(bad) = results.iter().find(|r| !r.is_success()) {
            return Err(OrchestratorError::Validation(format!(
                "merge received an error result from {}",
                bad.adapter
            )));
        }

        // A single result shortcuts to a merged record pointing at it.
        if results.len() == 1 {
            let only = &results[0];
            let mut contributions = BTreeMap::new();
            contributions.insert(only.adapter, 100.0);
            return Ok(MergedResult {
                output: only.output.clone(),
                strategy: options.strategy,
                contributions,
                confidence: only.quality_score(),
                metadata: single_metadata(only),
            });
        }

        match options.strategy {
            MergeStrategy::Consensus => self.merge_consensus(results, task, options),
            MergeStrategy::BestOf => Ok(self.merge_best_of(results, options)),
            MergeStrategy::Combine => Ok(self.merge_combine(results, task)),
            MergeStrategy::Validate => self.merge_validate(results),
        }
    }

    fn merge_consensus(
        &self,
        results: &[TaskResult],
        task: &Task,
        options: &MergeOptions,
    ) -> OrchestratorResult<MergedResult> {
        let elements: Vec<Vec<String>> =
            results.iter().map(|r| text::key_elements(&r.output)).collect();

        // An element is common when every other output contains something
        // similar to it.
        let mut common: Vec<String> = Vec::new();
        for element in &elements[0] {
            let everywhere = elements[1..].iter().all(|other| {
                other
                    .iter()
                    .any(|candidate| text::similar(element, candidate, ELEMENT_SIMILARITY))
            });
            if everywhere {
                common.push(element.clone());
            }
        }

        if common.is_empty() {
            // No agreement at all: fall back to the best single result.
            let mut merged = self.merge_best_of(results, options);
            merged
                .metadata
                .insert("fallback".into(), serde_json::json!("best_of"));
            return Ok(merged);
        }

        let mut output = String::from("Consensus across adapters:\n");
        for element in &common {
            output.push_str("- ");
            output.push_str(element);
            output.push('\n');
        }
        output.push('\n');
        for result in results {
            output.push_str(&format!("[{}]\n{}\n\n", result.adapter, excerpt(&result.output)));
        }

        let share = 100.0 / results.len() as f64;
        let contributions = results.iter().map(|r| (r.adapter, share)).collect();
        let confidence = mean_pairwise_jaccard(results);

        let mut metadata = HashMap::new();
        metadata.insert("common_elements".into(), serde_json::json!(common.len()));
        metadata.insert("task_kind".into(), serde_json::json!(task.kind.as_str()));

        Ok(MergedResult {
            output,
            strategy: MergeStrategy::Consensus,
            contributions,
            confidence: confidence.clamp(0.0, 1.0),
            metadata,
        })
    }

    fn merge_best_of(&self, results: &[TaskResult], options: &MergeOptions) -> MergedResult {
        let mut best_idx = 0;
        let mut best_score = f64::MIN;
        for (idx, result) in results.iter().enumerate() {
            let mut score = result.quality_score();
            if options.preferred_adapter == Some(result.adapter) {
                score += 0.1;
            }
            if score > best_score {
                best_score = score;
                best_idx = idx;
            }
        }

        let winner = &results[best_idx];
        let contributions = results
            .iter()
            .map(|r| (r.adapter, if r.id == winner.id { 100.0 } else { 0.0 }))
            .collect();

        let mut metadata = HashMap::new();
        metadata.insert("winner".into(), serde_json::json!(winner.adapter.as_str()));

        MergedResult {
            output: winner.output.clone(),
            strategy: MergeStrategy::BestOf,
            contributions,
            confidence: winner.quality_score().clamp(0.0, 1.0),
            metadata,
        }
    }

    fn merge_combine(&self, results: &[TaskResult], task: &Task) -> MergedResult {
        // Extract structural elements per output, tracking provenance.
        let mut code: Vec<(AdapterId, String)> = Vec::new();
        let mut prose: Vec<(AdapterId, String)> = Vec::new();
        let mut extracted_counts: BTreeMap<AdapterId, usize> = BTreeMap::new();

        for result in results {
            let blocks = text::extract_code_blocks(&result.output);
            let body = text::without_code_blocks(&result.output);
            let mut paragraphs = text::split_paragraphs(&body);
            let items = text::list_items(&body);
            // List items already appear inside their paragraphs; keep
            // standalone items only when no paragraph carries them.
            if paragraphs.is_empty() {
                paragraphs = items;
            }

            let count = blocks.len() + paragraphs.len();
            *extracted_counts.entry(result.adapter).or_default() += count;
            code.extend(blocks.into_iter().map(|b| (result.adapter, b)));
            prose.extend(paragraphs.into_iter().map(|p| (result.adapter, p)));
        }

        // Deduplicate by similarity, first occurrence wins.
        let code = dedupe(code);
        let prose = dedupe(prose);

        let mut retained_counts: BTreeMap<AdapterId, usize> = BTreeMap::new();
        for (adapter, _) in code.iter().chain(prose.iter()) {
            *retained_counts.entry(*adapter).or_default() += 1;
        }

        let mut output = String::new();
        let render_code = |out: &mut String| {
            for (_, block) in &code {
                out.push_str("```\n");
                out.push_str(block);
                out.push_str("\n```\n\n");
            }
        };
        let render_prose = |out: &mut String| {
            for (_, paragraph) in &prose {
                out.push_str(paragraph);
                out.push_str("\n\n");
            }
        };
        if task.kind.is_code_kind() {
            render_code(&mut output);
            render_prose(&mut output);
        } else {
            render_prose(&mut output);
            render_code(&mut output);
        }

        let total_retained: usize = retained_counts.values().sum();
        let contributions: BTreeMap<AdapterId, f64> = results
            .iter()
            .map(|r| {
                let retained = retained_counts.get(&r.adapter).copied().unwrap_or(0);
                let share = if total_retained == 0 {
                    0.0
                } else {
                    100.0 * retained as f64 / total_retained as f64
                };
                (r.adapter, share)
            })
            .collect();

        let mean_quality =
            results.iter().map(TaskResult::quality_score).sum::<f64>() / results.len() as f64;
        let consensus_confidence = mean_pairwise_jaccard(results);
        let confidence = (mean_quality + 0.2 * consensus_confidence).min(1.0);

        let mut metadata = HashMap::new();
        metadata.insert("code_blocks".into(), serde_json::json!(code.len()));
        metadata.insert("sections".into(), serde_json::json!(prose.len()));
        metadata.insert(
            "extracted_total".into(),
            serde_json::json!(extracted_counts.values().sum::<usize>()),
        );

        MergedResult {
            output: output.trim_end().to_string(),
            strategy: MergeStrategy::Combine,
            contributions,
            confidence: confidence.clamp(0.0, 1.0),
            metadata,
        }
    }

    fn merge_validate(&self, results: &[TaskResult]) -> OrchestratorResult<MergedResult> {
        if results.len() != 2 {
            return Err(OrchestratorError::Validation(format!(
                "validate merge requires exactly 2 results, got {}",
                results.len()
            )));
        }
        // Convention: results[0] is the primary, results[1] the reviewer.
        let primary = &results[0];
        let review = &results[1];

        let primary_elements = text::key_elements(&primary.output);
        let confirmed = primary_elements
            .iter()
            .filter(|el| text::similar(el, &review.output, ELEMENT_SIMILARITY))
            .count();
        let confidence = if primary_elements.is_empty() {
            0.0
        } else {
            confirmed as f64 / primary_elements.len() as f64
        };

        let output = format!(
            "## Primary ({})\n{}\n\n## Review ({})\n{}",
            primary.adapter, primary.output, review.adapter, review.output
        );

        // Attribution by share of merged text.
        let primary_len = primary.output.chars().count() as f64;
        let review_len = review.output.chars().count() as f64;
        let total = (primary_len + review_len).max(1.0);
        let mut contributions = BTreeMap::new();
        contributions.insert(primary.adapter, 100.0 * primary_len / total);
        contributions.insert(review.adapter, 100.0 * review_len / total);

        let mut metadata = HashMap::new();
        metadata.insert("confirmed_elements".into(), serde_json::json!(confirmed));
        metadata.insert(
            "primary_elements".into(),
            serde_json::json!(primary_elements.len()),
        );

        Ok(MergedResult {
            output,
            strategy: MergeStrategy::Validate,
            contributions,
            confidence: confidence.clamp(0.0, 1.0),
            metadata,
        })
    }
}

impl Default for ResultMerger {
    fn default() -> Self {
        Self::new()
    }
}

/// Mean pairwise word-set Jaccard across all outputs.
fn mean_pairwise_jaccard(results: &[TaskResult]) -> f64 {
    let sets: Vec<_> = results.iter().map(|r| text::word_set(&r.output)).collect();
    let mut total = 0.0;
    let mut pairs = 0u32;
    for i in 0..sets.len() {
        for j in (i + 1)..sets.len() {
            total += text::jaccard(&sets[i], &sets[j]);
            pairs += 1;
        }
    }
    if pairs == 0 {
        1.0
    } else {
        total / f64::from(pairs)
    }
}

/// Keep the first of every cluster of similar elements.
fn dedupe(elements: Vec<(AdapterId, String)>) -> Vec<(AdapterId, String)> {
    let mut kept: Vec<(AdapterId, String)> = Vec::new();
    for (adapter, element) in elements {
        if !kept
            .iter()
            .any(|(_, existing)| text::similar(existing, &element, ELEMENT_SIMILARITY))
        {
            kept.push((adapter, element));
        }
    }
    kept
}

/// First few lines of an output for consensus excerpts.
fn excerpt(output: &str) -> String {
    output.lines().take(4).collect::<Vec<_>>().join("\n")
}

fn single_metadata(result: &TaskResult) -> HashMap<String, serde_json::Value> {
    let mut metadata = HashMap::new();
    metadata.insert("single_result".into(), serde_json::json!(true));
    metadata.insert("result_id".into(), serde_json::json!(result.id));
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ResultMetadata, TaskKind};

    fn task() -> Task {
        Task::new(TaskKind::CodeGeneration, "sum of array").unwrap()
    }

    fn success(task: &Task, adapter: AdapterId, output: &str) -> TaskResult {
        TaskResult::success(task.id, adapter, output)
    }

    fn assert_contributions_sum(merged: &MergedResult) {
        let sum: f64 = merged.contributions.values().sum();
        assert!((sum - 100.0).abs() < 1e-6, "contributions sum to {sum}");
    }

    #[test]
    fn test_single_result_shortcut() {
        let task = task();
        let only = success(&task, AdapterId::Claude, "the answer");
        let merged = ResultMerger::new()
            .merge(&[only.clone()], &task, &MergeOptions::new(MergeStrategy::Consensus))
            .unwrap();
        assert_eq!(merged.output, "the answer");
        assert_eq!(merged.contributions[&AdapterId::Claude], 100.0);
        assert_contributions_sum(&merged);
    }

    #[test]
    fn test_best_of_picks_highest_quality() {
        let task = task();
        let clean = success(&task, AdapterId::Claude, "clean answer");
        let retried = success(&task, AdapterId::Gemini, "retried answer").with_metadata(
            ResultMetadata {
                retry_count: 3,
                ..Default::default()
            },
        );
        let merged = ResultMerger::new()
            .merge(&[retried, clean.clone()], &task, &MergeOptions::new(MergeStrategy::BestOf))
            .unwrap();
        assert_eq!(merged.output, "clean answer");
        assert_eq!(merged.contributions[&AdapterId::Claude], 100.0);
        assert_eq!(merged.contributions[&AdapterId::Gemini], 0.0);
        assert_contributions_sum(&merged);
        assert!((0.0..=1.0).contains(&merged.confidence));
    }

    #[test]
    fn test_best_of_preferred_adapter_bonus() {
        let task = task();
        let a = success(&task, AdapterId::Claude, "answer a");
        let b = success(&task, AdapterId::Gemini, "answer b");
        let options =
            MergeOptions::new(MergeStrategy::BestOf).with_preferred(AdapterId::Gemini);
        let merged = ResultMerger::new().merge(&[a, b], &task, &options).unwrap();
        assert_eq!(merged.contributions[&AdapterId::Gemini], 100.0);
    }

    #[test]
    fn test_combine_dedupes_and_orders_code_first() {
        // E2: both outputs carry a fenced block; merged output keeps both,
        // deduplicated, code before prose for a code-kind task.
        let task = task();
        let a = success(
            &task,
            AdapterId::Claude,
            "Use a fold to aggregate the numbers.\n\n```\nreturn arr.reduce((a, b) => a + b, 0);\n```",
        );
        let b = success(
            &task,
            AdapterId::Gemini,
            "Iterate the list and accumulate each value.\n\n```\nlet mut s = 0; for v in arr { s += v; }\n```",
        );
        let merged = ResultMerger::new()
            .merge(&[a, b], &task, &MergeOptions::new(MergeStrategy::Combine))
            .unwrap();
        assert!(merged.output.contains("reduce"));
        assert!(merged.output.contains("for v in arr"));
        let first_code = merged.output.find("```").unwrap();
        let first_prose = merged.output.find("Use a fold").unwrap();
        assert!(first_code < first_prose, "code should come first");
        assert_contributions_sum(&merged);
        assert!(merged.confidence > 0.0);
    }

    #[test]
    fn test_combine_contribution_reflects_retained_share() {
        let task = task();
        let rich = success(
            &task,
            AdapterId::Claude,
            "First distinct explanation paragraph about summing arrays.\n\nSecond distinct paragraph covering the edge cases carefully.",
        );
        let thin = success(&task, AdapterId::Gemini, "One single unrelated remark entirely.");
        let merged = ResultMerger::new()
            .merge(&[rich, thin], &task, &MergeOptions::new(MergeStrategy::Combine))
            .unwrap();
        assert!(merged.contributions[&AdapterId::Claude] > merged.contributions[&AdapterId::Gemini]);
        assert_contributions_sum(&merged);
    }

    #[test]
    fn test_consensus_keeps_common_elements() {
        let task = task();
        let shared = "The total is computed by adding every element of the array together.";
        let a = success(&task, AdapterId::Claude, &format!("{shared} Extra detail from claude.")[..]);
        let b = success(&task, AdapterId::Gemini, &format!("{shared} A gemini-only aside.")[..]);
        let merged = ResultMerger::new()
            .merge(&[a, b], &task, &MergeOptions::new(MergeStrategy::Consensus))
            .unwrap();
        assert_eq!(merged.strategy, MergeStrategy::Consensus);
        assert!(merged.output.contains("Consensus"));
        assert_contributions_sum(&merged);
        assert!((0.0..=1.0).contains(&merged.confidence));
    }

    #[test]
    fn test_consensus_falls_back_to_best_of() {
        // E3: nothing in common ⇒ best-of wins with the higher quality score.
        let task = task();
        let strong = success(&task, AdapterId::Claude, "fold the array with addition");
        let weak = success(&task, AdapterId::Gemini, "completely unrelated musings here")
            .with_metadata(ResultMetadata {
                retry_count: 4,
                ..Default::default()
            });
        let merged = ResultMerger::new()
            .merge(&[strong, weak], &task, &MergeOptions::new(MergeStrategy::Consensus))
            .unwrap();
        assert_eq!(merged.strategy, MergeStrategy::BestOf);
        assert_eq!(merged.contributions[&AdapterId::Claude], 100.0);
        assert_eq!(merged.metadata["fallback"], serde_json::json!("best_of"));
    }

    #[test]
    fn test_validate_merge_confidence() {
        let task = task();
        let primary = success(
            &task,
            AdapterId::Claude,
            "The function folds the array with addition to compute the sum.",
        );
        let review = success(
            &task,
            AdapterId::Gemini,
            "Confirmed: the function folds the array with addition to compute the sum correctly.",
        );
        let merged = ResultMerger::new()
            .merge(&[primary, review], &task, &MergeOptions::new(MergeStrategy::Validate))
            .unwrap();
        assert!(merged.confidence > 0.9);
        assert!(merged.output.contains("## Primary"));
        assert!(merged.output.contains("## Review"));
        assert_contributions_sum(&merged);
    }

    #[test]
    fn test_validate_requires_exactly_two() {
        let task = task();
        let results = vec![
            success(&task, AdapterId::Claude, "a"),
            success(&task, AdapterId::Gemini, "b"),
            success(&task, AdapterId::Mock, "c"),
        ];
        let err = ResultMerger::new()
            .merge(&results, &task, &MergeOptions::new(MergeStrategy::Validate))
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_error_results_rejected() {
        let task = task();
        let ok = success(&task, AdapterId::Claude, "fine");
        let bad = TaskResult::failure(task.id, AdapterId::Gemini, "boom");
        assert!(ResultMerger::new()
            .merge(&[ok, bad], &task, &MergeOptions::new(MergeStrategy::Combine))
            .is_err());
    }

    #[test]
    fn test_empty_input_rejected() {
        let task = task();
        assert!(ResultMerger::new()
            .merge(&[], &task, &MergeOptions::new(MergeStrategy::Combine))
            .is_err());
    }
}
