use chrono::Utc;
use optimizer_common::{
    ModelStatistics, ValidationConfig, ValidationIssue, ValidationIssueKind, ValidationResult,
};

/// Checks a model's reported statistics against configured thresholds and
/// produces a health verdict plus a list of specific issues. An `Error`
/// severity issue always makes the model unhealthy; `Warning` issues lower
/// the score without failing it outright.
pub struct ValidationFramework {
    config: ValidationConfig,
}

impl ValidationFramework {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self, stats: &ModelStatistics) -> ValidationResult {
        let mut issues = Vec::new();

        if stats.accuracy < self.config.min_accuracy_error_threshold {
            issues.push(ValidationIssue {
                kind: ValidationIssueKind::LowAccuracy,
                severity: optimizer_common::IssueSeverity::Error,
                description: format!(
                    "accuracy {:.2} is below the minimum acceptable {:.2}",
                    stats.accuracy, self.config.min_accuracy_error_threshold
                ),
            });
        } else if stats.accuracy < self.config.min_accuracy_warning_threshold {
            issues.push(ValidationIssue {
                kind: ValidationIssueKind::LowAccuracy,
                severity: optimizer_common::IssueSeverity::Warning,
                description: format!(
                    "accuracy {:.2} is below the recommended {:.2}",
                    stats.accuracy, self.config.min_accuracy_warning_threshold
                ),
            });
        }

        if stats.f1_score < self.config.min_f1_error_threshold {
            issues.push(ValidationIssue {
                kind: ValidationIssueKind::InconsistentPredictions,
                severity: optimizer_common::IssueSeverity::Warning,
                description: format!("f1 score {:.2} suggests inconsistent predictions", stats.f1_score),
            });
        }

        if stats.training_data_points < self.config.min_training_data_points {
            issues.push(ValidationIssue {
                kind: ValidationIssueKind::InsufficientData,
                severity: optimizer_common::IssueSeverity::Warning,
                description: format!(
                    "only {} training points recorded, recommended minimum is {}",
                    stats.training_data_points, self.config.min_training_data_points
                ),
            });
        }

        let age_hours = (Utc::now() - stats.last_retrained).num_hours();
        if age_hours > self.config.max_model_age_hours {
            issues.push(ValidationIssue {
                kind: ValidationIssueKind::StaleModel,
                severity: optimizer_common::IssueSeverity::Warning,
                description: format!(
                    "model last retrained {age_hours}h ago, exceeding the {}h budget",
                    self.config.max_model_age_hours
                ),
            });
        }

        if stats.average_prediction_time_ms > self.config.max_prediction_time_ms {
            issues.push(ValidationIssue {
                kind: ValidationIssueKind::SlowPredictions,
                severity: optimizer_common::IssueSeverity::Warning,
                description: format!(
                    "average prediction time {:.1}ms exceeds the {:.1}ms budget",
                    stats.average_prediction_time_ms, self.config.max_prediction_time_ms
                ),
            });
        }

        let is_healthy = !issues
            .iter()
            .any(|i| i.severity == optimizer_common::IssueSeverity::Error);

        let penalty: f64 = issues
            .iter()
            .map(|i| match i.severity {
                optimizer_common::IssueSeverity::Error => 0.4,
                optimizer_common::IssueSeverity::Warning => 0.1,
            })
            .sum();

        ValidationResult {
            is_healthy,
            overall_score: (1.0 - penalty).clamp(0.0, 1.0),
            issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn healthy_stats() -> ModelStatistics {
        ModelStatistics {
            accuracy: 0.95,
            f1_score: 0.93,
            training_data_points: 500,
            last_retrained: Utc::now(),
            average_prediction_time_ms: 5.0,
        }
    }

    #[test]
    fn healthy_model_has_no_issues() {
        let framework = ValidationFramework::new(ValidationConfig::default());
        let result = framework.validate(&healthy_stats());
        assert!(result.is_healthy);
        assert!(result.issues.is_empty());
        assert_eq!(result.overall_score, 1.0);
    }

    #[test]
    fn low_accuracy_is_unhealthy() {
        let framework = ValidationFramework::new(ValidationConfig::default());
        let mut stats = healthy_stats();
        stats.accuracy = 0.3;
        let result = framework.validate(&stats);
        assert!(!result.is_healthy);
    }

    #[test]
    fn stale_model_flagged_as_warning_not_fatal() {
        let framework = ValidationFramework::new(ValidationConfig::default());
        let mut stats = healthy_stats();
        stats.last_retrained = Utc::now() - Duration::hours(500);
        let result = framework.validate(&stats);
        assert!(result.is_healthy);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].kind, ValidationIssueKind::StaleModel);
    }

    #[test]
    fn insufficient_training_data_is_flagged() {
        let framework = ValidationFramework::new(ValidationConfig::default());
        let mut stats = healthy_stats();
        stats.training_data_points = 1;
        let result = framework.validate(&stats);
        assert!(result
            .issues
            .iter()
            .any(|i| i.kind == ValidationIssueKind::InsufficientData));
    }
}
