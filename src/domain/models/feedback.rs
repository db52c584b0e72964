//! Execution feedback and routing aggregates for the learning loop.

use serde::{Deserialize, Serialize};

use crate::domain::error::{OrchestratorError, OrchestratorResult};

use super::adapter::AdapterId;
use super::task::TaskKind;

/// One post-execution observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub kind: TaskKind,
    pub adapter: AdapterId,
    pub success: bool,
    pub execution_time_ms: u64,
    /// Optional user satisfaction in 1..=5.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satisfaction: Option<u8>,
}

impl FeedbackRecord {
    pub fn new(kind: TaskKind, adapter: AdapterId, success: bool, execution_time_ms: u64) -> Self {
        Self {
            kind,
            adapter,
            success,
            execution_time_ms,
            satisfaction: None,
        }
    }

    /// Attach a satisfaction rating (builder). Must be in 1..=5.
    pub fn with_satisfaction(mut self, rating: u8) -> OrchestratorResult<Self> {
        if !(1..=5).contains(&rating) {
            return Err(OrchestratorError::Validation(format!(
                "satisfaction must be in 1..=5, got {rating}"
            )));
        }
        self.satisfaction = Some(rating);
        Ok(self)
    }
}

/// Rolling aggregate for one (task kind, adapter) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingAggregate {
    pub count: u64,
    pub success_count: u64,
    pub total_execution_time_ms: u64,
    satisfaction_sum: u64,
    satisfaction_count: u64,
}

impl RoutingAggregate {
    pub fn absorb(&mut self, record: &FeedbackRecord) {
        self.count += 1;
        if record.success {
            self.success_count += 1;
        }
        self.total_execution_time_ms += record.execution_time_ms;
        if let Some(rating) = record.satisfaction {
            self.satisfaction_sum += u64::from(rating);
            self.satisfaction_count += 1;
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.count as f64
    }

    pub fn mean_execution_time_ms(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.total_execution_time_ms as f64 / self.count as f64
    }

    pub fn mean_satisfaction(&self) -> Option<f64> {
        if self.satisfaction_count == 0 {
            return None;
        }
        Some(self.satisfaction_sum as f64 / self.satisfaction_count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_satisfaction_range() {
        let rec = FeedbackRecord::new(TaskKind::CodeGeneration, AdapterId::Claude, true, 900);
        assert!(rec.clone().with_satisfaction(0).is_err());
        assert!(rec.clone().with_satisfaction(6).is_err());
        assert!(rec.with_satisfaction(5).is_ok());
    }

    #[test]
    fn test_aggregate_absorb() {
        let mut agg = RoutingAggregate::default();
        agg.absorb(&FeedbackRecord::new(
            TaskKind::CodeGeneration,
            AdapterId::Claude,
            true,
            1_000,
        ));
        agg.absorb(&FeedbackRecord::new(
            TaskKind::CodeGeneration,
            AdapterId::Claude,
            false,
            3_000,
        ));
        assert_eq!(agg.count, 2);
        assert!((agg.success_rate() - 0.5).abs() < 1e-9);
        assert!((agg.mean_execution_time_ms() - 2_000.0).abs() < 1e-9);
        assert!(agg.mean_satisfaction().is_none());
    }

    #[test]
    fn test_mean_satisfaction() {
        let mut agg = RoutingAggregate::default();
        let rec = FeedbackRecord::new(TaskKind::Search, AdapterId::Gemini, true, 500)
            .with_satisfaction(4)
            .unwrap();
        agg.absorb(&rec);
        let rec = FeedbackRecord::new(TaskKind::Search, AdapterId::Gemini, true, 500)
            .with_satisfaction(2)
            .unwrap();
        agg.absorb(&rec);
        assert!((agg.mean_satisfaction().unwrap() - 3.0).abs() < 1e-9);
    }
}
