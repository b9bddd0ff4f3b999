//! Map phase: summarizes every chunk independently.

use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::chunk::{Chunk, ChunkSummary};
use crate::domain::commit::CommitStyle;
use crate::error::{AppError, AppResult};
use crate::services::{FeedbackSink, LanguageModelService};
use crate::workflow::prompts;

pub struct ChunkProcessor<'a> {
    language_model: &'a dyn LanguageModelService,
    feedback: &'a dyn FeedbackSink,
    style: &'a CommitStyle,
    model: &'a str,
    concurrency: usize,
    cancel: &'a CancellationToken,
}

impl<'a> ChunkProcessor<'a> {
    pub fn new(
        language_model: &'a dyn LanguageModelService,
        feedback: &'a dyn FeedbackSink,
        style: &'a CommitStyle,
        model: &'a str,
        concurrency: usize,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            language_model,
            feedback,
            style,
            model,
            concurrency: concurrency.max(1),
            cancel,
        }
    }

    /// Output order matches `chunks`. A failing call becomes a failed
    /// summary; only configuration errors and cancellation abort the phase.
    pub async fn process(&self, chunks: &[Chunk]) -> AppResult<Vec<ChunkSummary>> {
        let total = chunks.len();
        let semaphore = Semaphore::new(self.concurrency);
        let done = AtomicUsize::new(0);
        debug!(chunks = total, concurrency = self.concurrency, model = self.model, "map phase");

        let tasks = chunks.iter().map(|chunk| {
            let semaphore = &semaphore;
            let done = &done;
            async move {
                let _permit = semaphore.acquire().await.map_err(|_| AppError::Cancelled)?;
                if self.cancel.is_cancelled() {
                    return Err(AppError::Cancelled);
                }

                let summary = self.summarize(chunk, total).await?;
                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                self.feedback.chunk_completed(finished, total);
                Ok(summary)
            }
        });

        join_all(tasks).await.into_iter().collect()
    }

    async fn summarize(&self, chunk: &Chunk, total: usize) -> AppResult<ChunkSummary> {
        let label = chunk.label();
        let prompt = prompts::chunk_prompt(chunk, total, self.style);

        match self.language_model.generate_summary(self.model, &prompt).await {
            Ok(text) if !text.trim().is_empty() => {
                Ok(ChunkSummary::succeeded(label, chunk.index, text.trim()))
            }
            Ok(_) => {
                warn!(chunk = chunk.index, "model returned an empty chunk summary");
                Ok(ChunkSummary::failed(
                    label,
                    chunk.index,
                    "model returned an empty summary",
                ))
            }
            Err(err) if err.is_fatal_for_pipeline() => Err(err),
            Err(err) => {
                warn!(chunk = chunk.index, error = %err, "chunk summary failed");
                Ok(ChunkSummary::failed(label, chunk.index, err.to_string()))
            }
        }
    }
}
