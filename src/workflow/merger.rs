//! Reduce phase: folds chunk summaries into one commit message.
//!
//! When the combined merge prompt is too large, summaries are merged in
//! groups and the group results are merged again, one level at a time. The
//! depth is capped at [`MAX_MERGE_DEPTH`]; at the cap the remaining summaries
//! are concatenated without another model call.

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::chunk::ChunkSummary;
use crate::domain::commit::{CommitStyle, format_commit_message};
use crate::error::{AppError, AppResult};
use crate::services::{FeedbackSink, LanguageModelService, MergeProgress, TokenEstimator};
use crate::workflow::prompts;

pub const MAX_MERGE_DEPTH: usize = 5;

/// Token allowance for the fixed part of a merge prompt when sizing groups.
pub const MERGE_PROMPT_OVERHEAD: usize = 200;

pub struct SummaryMerger<'a> {
    language_model: &'a dyn LanguageModelService,
    estimator: &'a dyn TokenEstimator,
    feedback: &'a dyn FeedbackSink,
    style: &'a CommitStyle,
    model: &'a str,
    concurrency: usize,
    cancel: &'a CancellationToken,
}

impl<'a> SummaryMerger<'a> {
    pub fn new(
        language_model: &'a dyn LanguageModelService,
        estimator: &'a dyn TokenEstimator,
        feedback: &'a dyn FeedbackSink,
        style: &'a CommitStyle,
        model: &'a str,
        concurrency: usize,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            language_model,
            estimator,
            feedback,
            style,
            model,
            concurrency: concurrency.max(1),
            cancel,
        }
    }

    /// Never returns an empty string. Errors are limited to configuration
    /// problems and cancellation; everything else degrades into the text.
    pub async fn merge(&self, summaries: &[ChunkSummary]) -> AppResult<String> {
        self.ensure_active()?;

        let successes: Vec<ChunkSummary> =
            summaries.iter().filter(|s| s.success).cloned().collect();

        match successes.len() {
            0 => {
                warn!(chunks = summaries.len(), "every chunk summary failed");
                Ok(total_failure_message(summaries))
            }
            1 => Ok(self.format(&successes[0].summary)),
            _ => {
                let prompt = prompts::final_merge_prompt(&successes, self.style);
                if self.estimator.needs_split(&prompt) {
                    debug!(
                        summaries = successes.len(),
                        tokens = self.estimator.estimate(&prompt),
                        limit = self.estimator.effective_limit(),
                        "merge prompt over budget, merging in groups"
                    );
                    self.recursive_merge(successes, 0).await
                } else {
                    self.final_merge(&successes, &prompt).await
                }
            }
        }
    }

    pub fn recursive_merge(
        &self,
        summaries: Vec<ChunkSummary>,
        depth: usize,
    ) -> BoxFuture<'_, AppResult<String>> {
        async move {
            self.ensure_active()?;

            if depth >= MAX_MERGE_DEPTH {
                warn!(
                    depth,
                    summaries = summaries.len(),
                    "merge depth limit reached, concatenating summaries"
                );
                return Ok(concatenate(&summaries));
            }
            if summaries.len() <= 1 {
                return Ok(summaries
                    .first()
                    .map(|s| self.format(&s.summary))
                    .unwrap_or_else(|| total_failure_message(&summaries)));
            }

            let group_size = self.group_size(&summaries);
            debug!(depth, summaries = summaries.len(), group_size, "recursive merge level");
            if group_size >= summaries.len() {
                return self.final_merge_all(&summaries).await;
            }

            let groups: Vec<&[ChunkSummary]> = summaries.chunks(group_size).collect();
            if groups.len() == 1 {
                return self.final_merge_all(&summaries).await;
            }

            self.feedback.merge_progress(MergeProgress {
                depth,
                groups: groups.len(),
                summaries: summaries.len(),
            });

            let merged = self.merge_groups(&groups).await?;
            let survivors: Vec<ChunkSummary> =
                merged.iter().filter(|s| s.success).cloned().collect();
            if survivors.is_empty() {
                warn!(depth, groups = merged.len(), "every merge group failed");
                return Ok(total_failure_message(&merged));
            }

            self.recursive_merge(survivors, depth + 1).await
        }
        .boxed()
    }

    /// Group size such that one group's merge prompt is expected to fit the
    /// budget, based on the average summary size. Never below two so every
    /// level shrinks the input.
    fn group_size(&self, summaries: &[ChunkSummary]) -> usize {
        let total: usize = summaries
            .iter()
            .map(|s| self.estimator.estimate(&s.summary))
            .sum();
        let average = total.div_ceil(summaries.len().max(1)).max(1);
        let available = self
            .estimator
            .effective_limit()
            .saturating_sub(MERGE_PROMPT_OVERHEAD);
        (available / average).max(2)
    }

    async fn merge_groups(&self, groups: &[&[ChunkSummary]]) -> AppResult<Vec<ChunkSummary>> {
        let semaphore = Semaphore::new(self.concurrency);

        let tasks = groups.iter().enumerate().map(|(index, group)| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore.acquire().await.map_err(|_| AppError::Cancelled)?;
                self.ensure_active()?;

                let label = format!("group {}", index + 1);
                let prompt = prompts::group_merge_prompt(group, &self.style.language);
                match self.language_model.generate_summary(self.model, &prompt).await {
                    Ok(text) if !text.trim().is_empty() => {
                        Ok(ChunkSummary::succeeded(label, index, text.trim()))
                    }
                    Ok(_) => Ok(ChunkSummary::failed(
                        label,
                        index,
                        "model returned an empty summary",
                    )),
                    Err(err) if err.is_fatal_for_pipeline() => Err(err),
                    Err(err) => {
                        warn!(group = index, error = %err, "merge group failed");
                        Ok(ChunkSummary::failed(label, index, err.to_string()))
                    }
                }
            }
        });

        join_all(tasks).await.into_iter().collect()
    }

    async fn final_merge_all(&self, summaries: &[ChunkSummary]) -> AppResult<String> {
        let prompt = prompts::final_merge_prompt(summaries, self.style);
        self.final_merge(summaries, &prompt).await
    }

    /// One synthesis call. On a non-fatal failure the inputs are joined
    /// instead, so the caller still gets every summary.
    async fn final_merge(&self, summaries: &[ChunkSummary], prompt: &str) -> AppResult<String> {
        self.ensure_active()?;

        match self.language_model.generate_summary(self.model, prompt).await {
            Ok(text) if !text.trim().is_empty() => Ok(self.format(&text)),
            Ok(_) => {
                warn!("final merge returned nothing, joining summaries");
                Ok(self.format(&concatenate(summaries)))
            }
            Err(err) if err.is_fatal_for_pipeline() => Err(err),
            Err(err) => {
                warn!(error = %err, "final merge failed, joining summaries");
                Ok(self.format(&concatenate(summaries)))
            }
        }
    }

    fn format(&self, message: &str) -> String {
        let formatted = format_commit_message(message, self.style);
        if formatted.is_empty() {
            message.trim().to_string()
        } else {
            formatted
        }
    }

    fn ensure_active(&self) -> AppResult<()> {
        if self.cancel.is_cancelled() {
            Err(AppError::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn concatenate(summaries: &[ChunkSummary]) -> String {
    summaries
        .iter()
        .map(|s| s.summary.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn total_failure_message(summaries: &[ChunkSummary]) -> String {
    if summaries.is_empty() {
        return "Failed to generate commit message: no chunk summaries were produced".to_string();
    }
    let mut message = format!(
        "Failed to generate commit message: all {} chunk(s) failed",
        summaries.len()
    );
    for summary in summaries {
        let error = summary.error.as_deref().unwrap_or("unknown error");
        message.push_str(&format!("\n- {}: {}", summary.label, error));
    }
    message
}
