use async_trait::async_trait;

use crate::domain::change::Change;
use crate::error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeScope {
    Staged,
    /// Staged and unstaged changes relative to `HEAD`.
    WorkingTree,
}

impl ChangeScope {
    pub fn diff_args(&self) -> &'static [&'static str] {
        match self {
            ChangeScope::Staged => &["--cached"],
            ChangeScope::WorkingTree => &["HEAD"],
        }
    }

    pub fn commit_args(&self) -> &'static [&'static str] {
        match self {
            ChangeScope::Staged => &[],
            ChangeScope::WorkingTree => &["--all"],
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ChangeScope::Staged => "staged changes",
            ChangeScope::WorkingTree => "working tree changes",
        }
    }
}

#[async_trait]
pub trait VersionControlService: Send + Sync {
    async fn collect_changes(&self, scope: ChangeScope) -> AppResult<Vec<Change>>;
    async fn commit(&self, scope: ChangeScope, message: &str) -> AppResult<()>;
}
