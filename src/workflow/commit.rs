use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::context::AppContext;
use crate::domain::change::{Change, render_changes};
use crate::domain::commit::format_commit_message;
use crate::error::{AppError, AppResult};
use crate::services::ChangeScope;
use crate::workflow::chunk_processor::ChunkProcessor;
use crate::workflow::merger::SummaryMerger;
use crate::workflow::model_selector::select_and_validate_map_model;
use crate::workflow::prompts;
use crate::workflow::smart_filter::SmartDiffFilter;
use crate::workflow::splitter::DiffSplitter;

pub struct CommitWorkflowOutcome {
    pub message: String,
    pub files: usize,
    pub committed: bool,
}

/// Collects changes, generates the message and optionally commits it.
pub async fn commit_from_changes(
    ctx: &AppContext,
    scope: ChangeScope,
    apply: bool,
    cancel: &CancellationToken,
) -> AppResult<CommitWorkflowOutcome> {
    let changes = ctx.version_control.collect_changes(scope).await?;
    if changes.is_empty() {
        return Err(AppError::VersionControl(format!(
            "no {} found",
            scope.describe()
        )));
    }
    let files = changes.len();

    let message = generate_commit_message(ctx, changes, cancel).await?;

    if apply {
        ensure_active(cancel)?;
        ctx.version_control.commit(scope, &message).await?;
    }

    Ok(CommitWorkflowOutcome {
        message,
        files,
        committed: apply,
    })
}

/// Single entry point of the pipeline. Small change sets go out in one call;
/// anything over budget is split, summarized per chunk and merged back.
pub async fn generate_commit_message(
    ctx: &AppContext,
    changes: Vec<Change>,
    cancel: &CancellationToken,
) -> AppResult<String> {
    if changes.is_empty() {
        return Err(AppError::VersionControl(
            "no changes to summarize".to_string(),
        ));
    }
    ensure_active(cancel)?;

    let config = &ctx.config;
    let language_model = ctx.language_model.as_ref();
    let estimator = ctx.token_estimator.as_ref();
    let map_estimator = ctx.map_token_estimator.as_ref();
    let feedback = ctx.feedback.as_ref();
    let map_model = select_and_validate_map_model(config);

    let outcome = SmartDiffFilter::new(
        language_model,
        map_estimator,
        &config.smart_filter,
        &map_model,
    )
    .filter(changes)
    .await?;
    feedback.filter_applied(&outcome.stats);
    ensure_active(cancel)?;

    let changes = outcome.changes;
    let prompt = prompts::direct_prompt(&render_changes(&changes), &config.commit_style);
    if !estimator.needs_split(&prompt) {
        debug!(
            tokens = estimator.estimate(&prompt),
            limit = estimator.effective_limit(),
            "change set fits a single request"
        );
        let reply = language_model.generate_summary(&config.model, &prompt).await?;
        let message = format_commit_message(&reply, &config.commit_style);
        if message.is_empty() {
            return Err(AppError::FatalApi(
                "language model returned an empty commit message".to_string(),
            ));
        }
        return Ok(message);
    }

    // Chunks go to the map model, so the smaller of the two budgets applies.
    let chunk_estimator = if map_estimator.effective_limit() < estimator.effective_limit() {
        map_estimator
    } else {
        estimator
    };
    let chunks =
        DiffSplitter::new(chunk_estimator, chunk_estimator.effective_limit()).split(&changes);
    info!(
        files = changes.len(),
        chunks = chunks.len(),
        map_model = %map_model,
        "change set over budget, summarizing in chunks"
    );
    ensure_active(cancel)?;

    let summaries = ChunkProcessor::new(
        language_model,
        feedback,
        &config.commit_style,
        &map_model,
        config.concurrency,
        cancel,
    )
    .process(&chunks)
    .await?;
    ensure_active(cancel)?;

    SummaryMerger::new(
        language_model,
        estimator,
        feedback,
        &config.commit_style,
        &config.model,
        config.concurrency,
        cancel,
    )
    .merge(&summaries)
    .await
}

fn ensure_active(cancel: &CancellationToken) -> AppResult<()> {
    if cancel.is_cancelled() {
        Err(AppError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use super::*;
    use crate::config::{AppConfig, StoredConfig};
    use crate::domain::change::ChangeStatus;
    use crate::workflow::test_support::{
        CharEstimator, RecordingFeedback, ScriptedModel, StaticVersionControl,
    };

    struct Fixture {
        ctx: AppContext,
        model: Arc<ScriptedModel>,
        feedback: Arc<RecordingFeedback>,
        vcs: Arc<StaticVersionControl>,
    }

    fn fixture(model: ScriptedModel, limit: usize, changes: Vec<Change>) -> Fixture {
        fixture_with_map_limit(model, limit, limit, changes)
    }

    fn fixture_with_map_limit(
        model: ScriptedModel,
        limit: usize,
        map_limit: usize,
        changes: Vec<Change>,
    ) -> Fixture {
        let stored = StoredConfig {
            llm_provider: Some("openai".to_string()),
            model: Some("gpt-4-turbo".to_string()),
            smart_filter_min_files: Some(50),
            ..StoredConfig::default()
        };
        let config = AppConfig::resolve(stored, |_| None, Path::new(".")).unwrap();
        let model = Arc::new(model);
        let feedback = Arc::new(RecordingFeedback::default());
        let vcs = Arc::new(StaticVersionControl {
            changes,
            ..StaticVersionControl::default()
        });
        let ctx = AppContext::new(
            config,
            vcs.clone(),
            model.clone(),
            Arc::new(CharEstimator::new(limit)),
            Arc::new(CharEstimator::new(map_limit)),
            feedback.clone(),
        );
        Fixture {
            ctx,
            model,
            feedback,
            vcs,
        }
    }

    fn files(n: usize, diff_len: usize) -> Vec<Change> {
        (0..n)
            .map(|i| {
                Change::new(
                    format!("src/file{i}.rs"),
                    ChangeStatus::Modified,
                    format!("+{}\n", "x".repeat(diff_len)),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn small_change_set_uses_one_direct_call() {
        let fx = fixture(
            ScriptedModel::replying("Add config loader"),
            100_000,
            files(3, 20),
        );
        let cancel = CancellationToken::new();

        let message = generate_commit_message(&fx.ctx, files(3, 20), &cancel)
            .await
            .unwrap();
        assert_eq!(message, "feat: Add config loader");

        let calls = fx.model.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "gpt-4-turbo");
        assert!(calls[0].prompt.contains("src/file2.rs"));

        let filters = fx.feedback.filters.lock().unwrap().clone();
        assert_eq!(filters.len(), 1);
        assert!(!filters[0].filtered);
    }

    #[tokio::test]
    async fn large_change_set_goes_through_map_reduce() {
        let model = ScriptedModel::new(|model, prompt| {
            if prompt.contains("Summarize the following code changes") {
                Ok(format!("summary from {model}"))
            } else {
                Ok("feat: rework storage layer".to_string())
            }
        });
        let fx = fixture(model, 2_000, files(12, 400));
        let cancel = CancellationToken::new();

        let message = generate_commit_message(&fx.ctx, files(12, 400), &cancel)
            .await
            .unwrap();
        assert_eq!(message, "feat: rework storage layer");

        let calls = fx.model.calls();
        let (map_calls, reduce_calls): (Vec<_>, Vec<_>) = calls
            .iter()
            .partition(|c| c.prompt.contains("Summarize the following code changes"));
        assert!(map_calls.len() > 1);
        assert!(map_calls.iter().all(|c| c.model == "gpt-4o-mini"));
        assert!(!reduce_calls.is_empty());
        assert!(reduce_calls.iter().all(|c| c.model == "gpt-4-turbo"));
        assert_eq!(
            fx.feedback.chunks.load(std::sync::atomic::Ordering::SeqCst),
            map_calls.len()
        );
    }

    #[tokio::test]
    async fn chunks_fit_a_map_model_with_a_smaller_window() {
        let model = ScriptedModel::new(|model, prompt| {
            if prompt.contains("Summarize the following code changes") {
                Ok(format!("summary from {model}"))
            } else {
                Ok("feat: rework storage layer".to_string())
            }
        });
        // Each rendered file is ~440 chars: 13 fit the primary budget, only 2 the map budget.
        let fx = fixture_with_map_limit(model, 6_000, 1_000, files(20, 400));
        let cancel = CancellationToken::new();

        let message = generate_commit_message(&fx.ctx, files(20, 400), &cancel)
            .await
            .unwrap();
        assert_eq!(message, "feat: rework storage layer");

        let map_calls = fx
            .model
            .calls()
            .into_iter()
            .filter(|c| c.prompt.contains("Summarize the following code changes"))
            .count();
        assert!(map_calls >= 10, "only {map_calls} chunks for a 1000 token map budget");
    }

    #[tokio::test]
    async fn outage_during_map_phase_returns_explanation() {
        let model =
            ScriptedModel::new(|_, _| Err(AppError::TransientApi("HTTP 503".to_string())));
        let fx = fixture(model, 2_000, files(12, 400));
        let cancel = CancellationToken::new();

        let message = generate_commit_message(&fx.ctx, files(12, 400), &cancel)
            .await
            .unwrap();
        assert!(message.starts_with("Failed to generate commit message"));
        assert!(message.contains("HTTP 503"));
    }

    #[tokio::test]
    async fn direct_call_failure_propagates() {
        let model = ScriptedModel::new(|_, _| Err(AppError::FatalApi("HTTP 401".to_string())));
        let fx = fixture(model, 100_000, files(2, 10));
        let cancel = CancellationToken::new();

        let result = generate_commit_message(&fx.ctx, files(2, 10), &cancel).await;
        assert!(matches!(result, Err(AppError::FatalApi(_))));
    }

    #[tokio::test]
    async fn empty_reply_is_an_error_not_an_empty_message() {
        let fx = fixture(ScriptedModel::replying("  "), 100_000, files(2, 10));
        let cancel = CancellationToken::new();
        let result = generate_commit_message(&fx.ctx, files(2, 10), &cancel).await;
        assert!(matches!(result, Err(AppError::FatalApi(_))));
    }

    #[tokio::test]
    async fn rejects_empty_change_set() {
        let fx = fixture(ScriptedModel::replying("x"), 100_000, Vec::new());
        let cancel = CancellationToken::new();
        assert!(matches!(
            generate_commit_message(&fx.ctx, Vec::new(), &cancel).await,
            Err(AppError::VersionControl(_))
        ));
        assert!(matches!(
            commit_from_changes(&fx.ctx, ChangeScope::Staged, false, &cancel).await,
            Err(AppError::VersionControl(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_run_makes_no_calls() {
        let fx = fixture(ScriptedModel::replying("x"), 100_000, files(2, 10));
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            generate_commit_message(&fx.ctx, files(2, 10), &cancel).await,
            Err(AppError::Cancelled)
        ));
        assert_eq!(fx.model.call_count(), 0);
    }

    #[tokio::test]
    async fn apply_commits_generated_message() {
        let fx = fixture(
            ScriptedModel::replying("fix: handle empty input"),
            100_000,
            files(2, 10),
        );
        let cancel = CancellationToken::new();

        let outcome = commit_from_changes(&fx.ctx, ChangeScope::Staged, true, &cancel)
            .await
            .unwrap();
        assert!(outcome.committed);
        assert_eq!(outcome.files, 2);
        assert_eq!(
            fx.vcs.commits.lock().unwrap().clone(),
            vec!["fix: handle empty input".to_string()]
        );
    }
}
