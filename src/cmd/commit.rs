use tokio_util::sync::CancellationToken;

use crate::context::AppContext;
use crate::error::AppResult;
use crate::services::ChangeScope;
use crate::workflow::commit::{CommitWorkflowOutcome, commit_from_changes};

#[derive(Debug, Clone)]
pub struct CommitCommandArgs {
    pub all: bool,
    pub apply: bool,
}

impl CommitCommandArgs {
    fn scope(&self) -> ChangeScope {
        if self.all {
            ChangeScope::WorkingTree
        } else {
            ChangeScope::Staged
        }
    }
}

pub async fn run(
    ctx: &AppContext,
    args: CommitCommandArgs,
    cancel: &CancellationToken,
) -> AppResult<CommitWorkflowOutcome> {
    commit_from_changes(ctx, args.scope(), args.apply, cancel).await
}
