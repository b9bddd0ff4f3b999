use crate::domain::filter::{FilterSkipReason, FilterStats};
use crate::services::{FeedbackSink, MergeProgress};

/// Progress lines on stderr so stdout carries only the commit message.
pub struct ConsoleFeedback {
    verbose: bool,
}

impl ConsoleFeedback {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    fn describe_filter(&self, stats: &FilterStats) -> Option<String> {
        if stats.filtered {
            return Some(format!(
                "Smart filter: kept {} of {} files ({} ignored)",
                stats.core_files, stats.total_files, stats.ignored_files
            ));
        }
        match &stats.skip_reason {
            Some(FilterSkipReason::Disabled | FilterSkipReason::TooFewFiles { .. })
                if !self.verbose =>
            {
                None
            }
            Some(reason) => Some(format!("Smart filter skipped: {reason}")),
            None => None,
        }
    }
}

impl FeedbackSink for ConsoleFeedback {
    fn filter_applied(&self, stats: &FilterStats) {
        if let Some(line) = self.describe_filter(stats) {
            eprintln!("{line}");
        }
    }

    fn chunk_completed(&self, done: usize, total: usize) {
        if total > 1 {
            eprintln!("Summarized chunk {done}/{total}");
        }
    }

    fn merge_progress(&self, progress: MergeProgress) {
        eprintln!(
            "Merging {} summaries in {} groups (level {})",
            progress.summaries,
            progress.groups,
            progress.depth + 1
        );
    }
}
