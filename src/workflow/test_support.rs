//! Deterministic doubles shared by the pipeline tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::change::Change;
use crate::domain::filter::FilterStats;
use crate::error::AppResult;
use crate::services::{
    ChangeScope, FeedbackSink, LanguageModelService, MergeProgress, TokenEstimator,
    VersionControlService,
};

/// One token per char, with a fixed limit.
pub struct CharEstimator {
    limit: usize,
}

impl CharEstimator {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl TokenEstimator for CharEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count()
    }

    fn effective_limit(&self) -> usize {
        self.limit
    }
}

type Responder = Box<dyn Fn(&str, &str) -> AppResult<String> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub prompt: String,
}

pub struct ScriptedModel {
    responder: Responder,
    delay: Duration,
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedModel {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &str) -> AppResult<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_, _| Ok(text.clone()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModelService for ScriptedModel {
    async fn generate_summary(&self, model: &str, prompt: &str) -> AppResult<String> {
        self.calls.lock().unwrap().push(RecordedCall {
            model: model.to_string(),
            prompt: prompt.to_string(),
        });
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.responder)(model, prompt)
    }
}

#[derive(Default)]
pub struct RecordingFeedback {
    pub filters: Mutex<Vec<FilterStats>>,
    pub merges: Mutex<Vec<MergeProgress>>,
    pub chunks: AtomicUsize,
}

impl FeedbackSink for RecordingFeedback {
    fn filter_applied(&self, stats: &FilterStats) {
        self.filters.lock().unwrap().push(stats.clone());
    }

    fn chunk_completed(&self, _done: usize, _total: usize) {
        self.chunks.fetch_add(1, Ordering::SeqCst);
    }

    fn merge_progress(&self, progress: MergeProgress) {
        self.merges.lock().unwrap().push(progress);
    }
}

/// Version control double that hands out a fixed change set.
#[derive(Default)]
pub struct StaticVersionControl {
    pub changes: Vec<Change>,
    pub commits: Mutex<Vec<String>>,
}

#[async_trait]
impl VersionControlService for StaticVersionControl {
    async fn collect_changes(&self, _scope: ChangeScope) -> AppResult<Vec<Change>> {
        Ok(self.changes.clone())
    }

    async fn commit(&self, _scope: ChangeScope, message: &str) -> AppResult<()> {
        self.commits.lock().unwrap().push(message.to_string());
        Ok(())
    }
}
