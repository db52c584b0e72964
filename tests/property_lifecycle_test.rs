//! Property tests for the task state machine, retry backoff bounds, and
//! queue scoring.

use proptest::prelude::*;

use ensemble::domain::models::{
    score_for, RetryConfig, Task, TaskKind, TaskPriority, TaskStatus,
};
use ensemble::services::RetryPolicy;

fn any_status() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Pending),
        Just(TaskStatus::InProgress),
        Just(TaskStatus::Completed),
        Just(TaskStatus::Failed),
        Just(TaskStatus::Cancelled),
        Just(TaskStatus::Validated),
    ]
}

fn any_priority() -> impl Strategy<Value = TaskPriority> {
    prop_oneof![
        Just(TaskPriority::Low),
        Just(TaskPriority::Medium),
        Just(TaskPriority::High),
        Just(TaskPriority::Urgent),
    ]
}

proptest! {
    /// Every observed status sequence is a valid path: applying random
    /// transition requests never leaves the legal graph, and rejected
    /// transitions never mutate the task.
    #[test]
    fn status_sequences_stay_legal(requests in proptest::collection::vec(any_status(), 1..20)) {
        let mut task = Task::new(TaskKind::CodeGeneration, "property task").unwrap();
        for requested in requests {
            let before = task.status;
            match task.transition_to(requested) {
                Ok(()) => {
                    prop_assert!(before.valid_transitions().contains(&requested));
                    prop_assert_eq!(task.status, requested);
                }
                Err(_) => prop_assert_eq!(task.status, before),
            }
            // Terminal states never move again.
            if before.is_terminal() {
                prop_assert_eq!(task.status, before);
            }
        }
    }

    /// Jittered delays stay within ±20 % of the exponential schedule and
    /// under the cap.
    #[test]
    fn backoff_delays_respect_bounds(
        attempt in 1u32..10,
        initial in 1u64..5_000,
        max in 5_000u64..60_000,
    ) {
        let policy = RetryPolicy::new(RetryConfig {
            attempts: 3,
            initial_delay_ms: initial,
            multiplier: 2.0,
            max_delay_ms: max,
            jitter: 0.2,
        });
        let (low, high) = policy.delay_bounds(attempt);
        for _ in 0..10 {
            let delay = policy.jittered_delay(attempt);
            prop_assert!(delay >= low);
            prop_assert!(delay <= high);
        }
        // The un-jittered base never exceeds the cap.
        prop_assert!(policy.base_delay(attempt).as_millis() as u64 <= max);
    }

    /// A heavier priority always scores below (claims before) a lighter one
    /// submitted at the same instant, and scoring is monotone in time
    /// within one priority.
    #[test]
    fn queue_scores_order_correctly(
        a in any_priority(),
        b in any_priority(),
        delta_ms in 0i64..100_000,
    ) {
        let now = chrono::Utc::now();
        if a > b {
            prop_assert!(score_for(now, a) < score_for(now, b));
        }
        let later = now + chrono::Duration::milliseconds(delta_ms);
        prop_assert!(score_for(now, a) <= score_for(later, a));
    }

    /// Prompt validation accepts exactly the 1..=10_000 char range.
    #[test]
    fn prompt_length_invariant(len in 0usize..12_000) {
        let prompt = "x".repeat(len);
        let result = Task::new(TaskKind::Documentation, prompt);
        if len == 0 || len > 10_000 {
            prop_assert!(result.is_err());
        } else {
            prop_assert!(result.is_ok());
        }
    }
}
