use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSkipReason {
    Disabled,
    TooFewFiles { count: usize, min: usize },
    TooManyFiles { count: usize, max: usize },
    PromptTooLarge { tokens: usize, limit: usize },
    TimedOut(Duration),
    ClassificationFailed(String),
    NothingLeft,
}

impl fmt::Display for FilterSkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterSkipReason::Disabled => write!(f, "smart filter disabled"),
            FilterSkipReason::TooFewFiles { count, min } => {
                write!(f, "only {count} files changed (minimum {min})")
            }
            FilterSkipReason::TooManyFiles { count, max } => {
                write!(f, "{count} files changed (maximum {max})")
            }
            FilterSkipReason::PromptTooLarge { tokens, limit } => {
                write!(f, "file list needs ~{tokens} tokens (limit {limit})")
            }
            FilterSkipReason::TimedOut(after) => {
                write!(f, "classification timed out after {}s", after.as_secs())
            }
            FilterSkipReason::ClassificationFailed(reason) => {
                write!(f, "classification failed: {reason}")
            }
            FilterSkipReason::NothingLeft => {
                write!(f, "classifier marked every file ignorable")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterStats {
    pub total_files: usize,
    pub core_files: usize,
    pub ignored_files: usize,
    pub filtered: bool,
    pub skip_reason: Option<FilterSkipReason>,
}

impl FilterStats {
    pub fn skipped(total_files: usize, reason: FilterSkipReason) -> Self {
        Self {
            total_files,
            core_files: total_files,
            ignored_files: 0,
            filtered: false,
            skip_reason: Some(reason),
        }
    }

    /// Stats for an applied filter. Counts are clamped so that
    /// `core + ignored <= total` holds whatever the caller passes.
    pub fn applied(total_files: usize, core_files: usize) -> Self {
        let core_files = core_files.min(total_files);
        Self {
            total_files,
            core_files,
            ignored_files: total_files - core_files,
            filtered: true,
            skip_reason: None,
        }
    }
}
