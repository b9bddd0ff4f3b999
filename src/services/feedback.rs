use crate::domain::filter::FilterStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeProgress {
    pub depth: usize,
    pub groups: usize,
    pub summaries: usize,
}

/// Observer for user-facing progress. Nothing reported here feeds back into
/// the pipeline.
pub trait FeedbackSink: Send + Sync {
    fn filter_applied(&self, stats: &FilterStats);
    fn chunk_completed(&self, done: usize, total: usize);
    fn merge_progress(&self, progress: MergeProgress);
}
