//! Optional pre-pass that drops low-signal files before splitting.

use std::collections::HashSet;

use serde::Deserialize;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::SmartFilterConfig;
use crate::domain::change::Change;
use crate::domain::filter::{FilterSkipReason, FilterStats};
use crate::error::AppResult;
use crate::services::{LanguageModelService, TokenEstimator};
use crate::workflow::prompts;

#[derive(Debug)]
pub struct FilterOutcome {
    pub changes: Vec<Change>,
    pub stats: FilterStats,
}

impl FilterOutcome {
    fn unfiltered(changes: Vec<Change>, reason: FilterSkipReason) -> Self {
        let stats = FilterStats::skipped(changes.len(), reason);
        Self { changes, stats }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Classification {
    #[serde(default)]
    core: Vec<String>,
    #[serde(default)]
    ignorable: Vec<String>,
}

pub struct SmartDiffFilter<'a> {
    language_model: &'a dyn LanguageModelService,
    estimator: &'a dyn TokenEstimator,
    config: &'a SmartFilterConfig,
    model: &'a str,
}

impl<'a> SmartDiffFilter<'a> {
    pub fn new(
        language_model: &'a dyn LanguageModelService,
        estimator: &'a dyn TokenEstimator,
        config: &'a SmartFilterConfig,
        model: &'a str,
    ) -> Self {
        Self {
            language_model,
            estimator,
            config,
            model,
        }
    }

    /// Fails open: anything short of a usable classification keeps every
    /// file and records why. Only configuration errors and cancellation
    /// propagate.
    pub async fn filter(&self, changes: Vec<Change>) -> AppResult<FilterOutcome> {
        let total = changes.len();

        if !self.config.enabled {
            return Ok(FilterOutcome::unfiltered(changes, FilterSkipReason::Disabled));
        }
        if total < self.config.min_files {
            debug!(files = total, min = self.config.min_files, "skipping smart filter");
            return Ok(FilterOutcome::unfiltered(
                changes,
                FilterSkipReason::TooFewFiles {
                    count: total,
                    min: self.config.min_files,
                },
            ));
        }
        if total > self.config.max_files {
            info!(files = total, max = self.config.max_files, "skipping smart filter");
            return Ok(FilterOutcome::unfiltered(
                changes,
                FilterSkipReason::TooManyFiles {
                    count: total,
                    max: self.config.max_files,
                },
            ));
        }

        let paths: Vec<&str> = changes.iter().map(|c| c.path.as_str()).collect();
        let prompt = prompts::filter_prompt(&paths);
        let tokens = self.estimator.estimate(&prompt);
        let limit = self.estimator.effective_limit();
        if tokens > limit {
            info!(tokens, limit, "file list too large for smart filter");
            return Ok(FilterOutcome::unfiltered(
                changes,
                FilterSkipReason::PromptTooLarge { tokens, limit },
            ));
        }

        let reply = match timeout(
            self.config.timeout,
            self.language_model.generate_summary(self.model, &prompt),
        )
        .await
        {
            Err(_) => {
                warn!(timeout_secs = self.config.timeout.as_secs(), "smart filter timed out");
                return Ok(FilterOutcome::unfiltered(
                    changes,
                    FilterSkipReason::TimedOut(self.config.timeout),
                ));
            }
            Ok(Err(err)) if err.is_fatal_for_pipeline() => return Err(err),
            Ok(Err(err)) => {
                warn!(error = %err, "smart filter call failed, keeping all files");
                return Ok(FilterOutcome::unfiltered(
                    changes,
                    FilterSkipReason::ClassificationFailed(err.to_string()),
                ));
            }
            Ok(Ok(reply)) => reply,
        };

        let ignorable = match parse_classification(&reply) {
            Ok(ignorable) => ignorable,
            Err(reason) => {
                warn!(%reason, "unusable smart filter reply, keeping all files");
                return Ok(FilterOutcome::unfiltered(
                    changes,
                    FilterSkipReason::ClassificationFailed(reason),
                ));
            }
        };

        let (ignored, kept): (Vec<Change>, Vec<Change>) = changes
            .into_iter()
            .partition(|change| ignorable.contains(change.path.as_str()));

        if kept.is_empty() {
            warn!("smart filter marked every file ignorable, keeping all files");
            return Ok(FilterOutcome::unfiltered(ignored, FilterSkipReason::NothingLeft));
        }

        for change in &ignored {
            if self.config.log_decisions {
                info!(path = %change.path, "smart filter ignored file");
            } else {
                debug!(path = %change.path, "smart filter ignored file");
            }
        }

        let stats = FilterStats::applied(total, kept.len());
        debug!(
            total = stats.total_files,
            core = stats.core_files,
            ignored = stats.ignored_files,
            "smart filter applied"
        );
        Ok(FilterOutcome {
            changes: kept,
            stats,
        })
    }
}

/// Extracts the ignorable set from a reply that may wrap the JSON in prose or
/// code fences. A path listed as both core and ignorable stays core.
fn parse_classification(reply: &str) -> Result<HashSet<String>, String> {
    let start = reply
        .find('{')
        .ok_or_else(|| "reply contains no JSON object".to_string())?;
    let end = reply
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| "reply contains no JSON object".to_string())?;

    let parsed: Classification = serde_json::from_str(&reply[start..=end])
        .map_err(|err| format!("invalid classification JSON: {err}"))?;

    let core: HashSet<&str> = parsed.core.iter().map(String::as_str).collect();
    Ok(parsed
        .ignorable
        .iter()
        .filter(|path| !core.contains(path.as_str()))
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::change::ChangeStatus;
    use crate::error::AppError;
    use crate::workflow::test_support::{CharEstimator, ScriptedModel};

    fn changes(paths: &[&str]) -> Vec<Change> {
        paths
            .iter()
            .map(|p| Change::new(*p, ChangeStatus::Modified, "+secret diff body\n"))
            .collect()
    }

    fn many_changes() -> Vec<Change> {
        let mut paths: Vec<String> = (0..10).map(|i| format!("src/mod{i}.rs")).collect();
        paths.push("Cargo.lock".to_string());
        paths.push("dist/app.min.js".to_string());
        paths
            .iter()
            .map(|p| Change::new(p.as_str(), ChangeStatus::Modified, "+x\n"))
            .collect()
    }

    fn config() -> SmartFilterConfig {
        SmartFilterConfig {
            min_files: 3,
            max_files: 50,
            timeout: Duration::from_secs(5),
            ..SmartFilterConfig::default()
        }
    }

    fn assert_invariant(stats: &FilterStats) {
        assert!(stats.core_files + stats.ignored_files <= stats.total_files);
    }

    #[tokio::test]
    async fn skips_below_minimum_without_calling_model() {
        let model = ScriptedModel::replying("{}");
        let estimator = CharEstimator::new(100_000);
        let cfg = config();
        let filter = SmartDiffFilter::new(&model, &estimator, &cfg, "m");

        let outcome = filter.filter(changes(&["a.rs", "b.rs"])).await.unwrap();
        assert_eq!(outcome.changes.len(), 2);
        assert!(!outcome.stats.filtered);
        assert_eq!(
            outcome.stats.skip_reason,
            Some(FilterSkipReason::TooFewFiles { count: 2, min: 3 })
        );
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn skips_above_maximum_without_calling_model() {
        let model = ScriptedModel::replying("{}");
        let estimator = CharEstimator::new(100_000);
        let cfg = SmartFilterConfig {
            max_files: 5,
            ..config()
        };
        let filter = SmartDiffFilter::new(&model, &estimator, &cfg, "m");

        let outcome = filter.filter(many_changes()).await.unwrap();
        assert_eq!(outcome.changes.len(), 12);
        assert!(matches!(
            outcome.stats.skip_reason,
            Some(FilterSkipReason::TooManyFiles { count: 12, max: 5 })
        ));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn disabled_filter_is_a_no_op() {
        let model = ScriptedModel::replying("{}");
        let estimator = CharEstimator::new(100_000);
        let cfg = SmartFilterConfig {
            enabled: false,
            ..config()
        };
        let filter = SmartDiffFilter::new(&model, &estimator, &cfg, "m");
        let outcome = filter.filter(many_changes()).await.unwrap();
        assert_eq!(outcome.stats.skip_reason, Some(FilterSkipReason::Disabled));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn drops_files_classified_as_ignorable() {
        let model = ScriptedModel::replying(
            "Sure:\n```json\n{\"core\": [\"src/mod0.rs\"], \"ignorable\": [\"Cargo.lock\", \"dist/app.min.js\", \"not/in/input.txt\"]}\n```",
        );
        let estimator = CharEstimator::new(100_000);
        let cfg = config();
        let filter = SmartDiffFilter::new(&model, &estimator, &cfg, "map-model");

        let outcome = filter.filter(many_changes()).await.unwrap();
        assert!(outcome.stats.filtered);
        assert_eq!(outcome.stats.total_files, 12);
        assert_eq!(outcome.stats.core_files, 10);
        assert_eq!(outcome.stats.ignored_files, 2);
        assert_invariant(&outcome.stats);
        assert!(outcome.changes.iter().all(|c| c.path.starts_with("src/")));

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "map-model");
        assert!(calls[0].prompt.contains("Cargo.lock"));
        assert!(!calls[0].prompt.contains("+x"));
    }

    #[tokio::test]
    async fn core_listing_overrides_ignorable() {
        let model = ScriptedModel::replying(
            "{\"core\": [\"Cargo.lock\"], \"ignorable\": [\"Cargo.lock\"]}",
        );
        let estimator = CharEstimator::new(100_000);
        let cfg = config();
        let filter = SmartDiffFilter::new(&model, &estimator, &cfg, "m");
        let outcome = filter.filter(many_changes()).await.unwrap();
        assert_eq!(outcome.changes.len(), 12);
        assert_eq!(outcome.stats.ignored_files, 0);
    }

    #[tokio::test]
    async fn fails_open_on_timeout() {
        let model = ScriptedModel::replying("{\"ignorable\": [\"Cargo.lock\"]}")
            .with_delay(Duration::from_millis(500));
        let estimator = CharEstimator::new(100_000);
        let cfg = SmartFilterConfig {
            timeout: Duration::from_millis(20),
            ..config()
        };
        let filter = SmartDiffFilter::new(&model, &estimator, &cfg, "m");

        let outcome = filter.filter(many_changes()).await.unwrap();
        assert_eq!(outcome.changes.len(), 12);
        assert!(!outcome.stats.filtered);
        assert!(matches!(
            outcome.stats.skip_reason,
            Some(FilterSkipReason::TimedOut(_))
        ));
    }

    #[tokio::test]
    async fn fails_open_on_service_error() {
        let model =
            ScriptedModel::new(|_, _| Err(AppError::TransientApi("HTTP 503".to_string())));
        let estimator = CharEstimator::new(100_000);
        let cfg = config();
        let filter = SmartDiffFilter::new(&model, &estimator, &cfg, "m");

        let outcome = filter.filter(many_changes()).await.unwrap();
        assert_eq!(outcome.changes.len(), 12);
        let reason = outcome.stats.skip_reason.unwrap().to_string();
        assert!(reason.contains("HTTP 503"));
    }

    #[tokio::test]
    async fn fails_open_on_garbage_reply() {
        let model = ScriptedModel::replying("I think they all matter.");
        let estimator = CharEstimator::new(100_000);
        let cfg = config();
        let filter = SmartDiffFilter::new(&model, &estimator, &cfg, "m");

        let outcome = filter.filter(many_changes()).await.unwrap();
        assert_eq!(outcome.changes.len(), 12);
        assert!(matches!(
            outcome.stats.skip_reason,
            Some(FilterSkipReason::ClassificationFailed(_))
        ));
    }

    #[tokio::test]
    async fn configuration_errors_propagate() {
        let model =
            ScriptedModel::new(|_, _| Err(AppError::Configuration("missing key".to_string())));
        let estimator = CharEstimator::new(100_000);
        let cfg = config();
        let filter = SmartDiffFilter::new(&model, &estimator, &cfg, "m");
        assert!(matches!(
            filter.filter(many_changes()).await,
            Err(AppError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn never_drops_everything() {
        let model = ScriptedModel::replying(
            "{\"ignorable\": [\"a.lock\", \"b.lock\", \"c.lock\"]}",
        );
        let estimator = CharEstimator::new(100_000);
        let cfg = config();
        let filter = SmartDiffFilter::new(&model, &estimator, &cfg, "m");

        let outcome = filter
            .filter(changes(&["a.lock", "b.lock", "c.lock"]))
            .await
            .unwrap();
        assert_eq!(outcome.changes.len(), 3);
        assert_eq!(outcome.stats.skip_reason, Some(FilterSkipReason::NothingLeft));
        assert_invariant(&outcome.stats);
    }

    #[tokio::test]
    async fn skips_when_file_list_exceeds_budget() {
        let model = ScriptedModel::replying("{}");
        let estimator = CharEstimator::new(50);
        let cfg = config();
        let filter = SmartDiffFilter::new(&model, &estimator, &cfg, "m");

        let outcome = filter.filter(many_changes()).await.unwrap();
        assert!(matches!(
            outcome.stats.skip_reason,
            Some(FilterSkipReason::PromptTooLarge { limit: 50, .. })
        ));
        assert_eq!(model.call_count(), 0);
    }
}
