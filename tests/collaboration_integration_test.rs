//! Collaboration flows end to end: parallel merge (E2) and
//! cross-validation disagreement with best-of fallback (E3).

mod common;

use common::test_stack;
use ensemble::adapters::assistants::MockResponse;
use ensemble::domain::models::{AdapterId, ResultMetadata, Task, TaskKind, TaskResult};
use ensemble::domain::ports::TaskRepository;
use ensemble::services::{
    CollaborationMode, CollaborationOptions, EventFilter, MergeOptions, MergeStrategy,
    ResultMerger, ResultValidator,
};

#[tokio::test]
async fn e2_parallel_combine_merges_both_code_blocks() {
    let stack = test_stack().await;
    stack
        .claude
        .set_response(MockResponse::text(
            "Fold the array with addition.\n\n```\nconst sum = arr.reduce((a, b) => a + b, 0);\n```",
        ))
        .await;
    stack
        .gemini
        .set_response(MockResponse::text(
            "Accumulate in a loop.\n\n```\nlet total = 0; for (const v of arr) total += v;\n```",
        ))
        .await;

    let task = Task::new(TaskKind::CodeGeneration, "sum of array").unwrap();
    let id = task.id;
    stack.repo.insert(&task).await.unwrap();

    let outcome = stack
        .collaboration
        .collaborate(
            id,
            CollaborationOptions::new(
                CollaborationMode::Parallel,
                vec![AdapterId::Claude, AdapterId::Gemini],
            )
            .with_merge_strategy(MergeStrategy::Combine),
        )
        .await
        .unwrap();

    let merged = outcome.merged.unwrap();
    // Both snippets survive, deduplicated.
    assert!(merged.output.contains("reduce"));
    assert!(merged.output.contains("total += v"));
    let sum: f64 = merged.contributions.values().sum();
    assert!((sum - 100.0).abs() < 1e-6, "contributions sum to {sum}");
    assert!(merged.confidence > 0.0);
}

#[tokio::test]
async fn e3_disagreement_breaks_consensus_and_falls_back() {
    // Two results with low word overlap and a large length gap.
    let task = Task::new(TaskKind::CodeGeneration, "sum of array").unwrap();
    let strong = TaskResult::success(task.id, AdapterId::Claude, "fold the array with addition");
    let padding = "entirely unrelated commentary ".repeat(10);
    let weak = TaskResult::success(task.id, AdapterId::Gemini, format!("something else {padding}"))
        .with_metadata(ResultMetadata {
            retry_count: 3,
            ..Default::default()
        });

    // Cross-validation: no consensus, length gap annotated.
    let validator = ResultValidator::new();
    let cross = validator.cross_validate(&strong, &weak, &task).unwrap();
    assert!(cross.similarity < 0.5);
    assert!(!cross.consensus);
    assert!(cross.differences.iter().any(|d| d.contains("length differs")));

    // Consensus merge falls back to best-of and picks the higher quality
    // result.
    let merged = ResultMerger::new()
        .merge(
            &[strong.clone(), weak],
            &task,
            &MergeOptions::new(MergeStrategy::Consensus),
        )
        .unwrap();
    assert_eq!(merged.strategy, MergeStrategy::BestOf);
    assert_eq!(merged.output, strong.output);
    assert_eq!(merged.contributions[&AdapterId::Claude], 100.0);
}

#[tokio::test]
async fn review_flow_emits_collaboration_events() {
    let stack = test_stack().await;
    let mut events = stack
        .bus
        .subscribe_filtered(EventFilter::regex("^collaboration:.*$").unwrap());
    tokio::task::yield_now().await;

    stack
        .claude
        .set_response(MockResponse::text("The sum function folds the array."))
        .await;
    stack
        .gemini
        .set_response(MockResponse::text("Review: correct, concise, complete."))
        .await;

    let task = Task::new(TaskKind::CodeGeneration, "sum of array").unwrap();
    let id = task.id;
    stack.repo.insert(&task).await.unwrap();

    let outcome = stack
        .collaboration
        .collaborate(
            id,
            CollaborationOptions::new(
                CollaborationMode::Review,
                vec![AdapterId::Claude, AdapterId::Gemini],
            ),
        )
        .await
        .unwrap();

    assert!(outcome.final_output.contains("## Primary (claude)"));
    assert!(outcome.final_output.contains("## Review (gemini)"));

    let started = events.recv().await.unwrap();
    assert_eq!(started.name(), "collaboration:started");
    let completed = events.recv().await.unwrap();
    assert_eq!(completed.name(), "collaboration:completed");
}

#[tokio::test]
async fn sequential_chains_prompts_through_adapters() {
    let stack = test_stack().await;
    stack
        .claude
        .set_response(MockResponse::text("Step one: identify the fold."))
        .await;
    stack
        .gemini
        .set_response(MockResponse::text("Step two: implement and test it."))
        .await;

    let task = Task::new(TaskKind::Architecture, "design the aggregation layer").unwrap();
    let id = task.id;
    stack.repo.insert(&task).await.unwrap();

    let outcome = stack
        .collaboration
        .collaborate(
            id,
            CollaborationOptions::new(
                CollaborationMode::Sequential,
                vec![AdapterId::Claude, AdapterId::Gemini],
            ),
        )
        .await
        .unwrap();

    assert_eq!(outcome.final_output, "Step two: implement and test it.");
    // The second derived task embeds the first output.
    let second = stack
        .repo
        .get(outcome.steps[1].task_id)
        .await
        .unwrap()
        .unwrap();
    assert!(second.prompt.contains("Based on the previous analysis"));
    assert!(second.prompt.contains("identify the fold"));
    assert!(second.prompt.contains("design the aggregation layer"));
}
