use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::domain::change::{Change, ChangeStatus};
use crate::error::{AppError, AppResult};
use crate::services::{ChangeScope, VersionControlService};

const FILE_HEADER: &str = "diff --git ";

pub struct GitCli {
    workspace_root: PathBuf,
}

impl GitCli {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }

    fn command(&self) -> Command {
        let mut command = Command::new("git");
        command.current_dir(&self.workspace_root);
        command
    }
}

#[async_trait]
impl VersionControlService for GitCli {
    async fn collect_changes(&self, scope: ChangeScope) -> AppResult<Vec<Change>> {
        let output = self
            .command()
            .arg("diff")
            .args(scope.diff_args())
            .args(["-M", "-C", "--no-color", "--no-ext-diff"])
            .output()
            .await
            .map_err(|err| AppError::VersionControl(format!("failed to run git diff: {err}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::VersionControl(format!(
                "git diff failed: {}",
                stderr.trim()
            )));
        }

        let diff = String::from_utf8_lossy(&output.stdout);
        let changes = parse_unified_diff(&diff);
        debug!(files = changes.len(), scope = scope.describe(), "collected changes");
        Ok(changes)
    }

    async fn commit(&self, scope: ChangeScope, message: &str) -> AppResult<()> {
        let mut child = self
            .command()
            .arg("commit")
            .args(scope.commit_args())
            .args(["-F", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| AppError::VersionControl(format!("failed to run git commit: {err}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(message.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::VersionControl(format!(
                "git commit failed: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Splits `git diff` output into one [`Change`] per file section.
pub fn parse_unified_diff(diff: &str) -> Vec<Change> {
    let mut changes = Vec::new();
    let mut section = String::new();

    for line in diff.split_inclusive('\n') {
        if line.starts_with(FILE_HEADER) && !section.is_empty() {
            changes.extend(parse_section(&section));
            section.clear();
        }
        section.push_str(line);
    }
    if !section.is_empty() {
        changes.extend(parse_section(&section));
    }
    changes
}

fn parse_section(section: &str) -> Option<Change> {
    let header = section.lines().next()?.strip_prefix(FILE_HEADER)?;

    let mut status = ChangeStatus::Modified;
    let mut old_path = None;
    let mut new_path = None;
    let mut minus_path = None;
    let mut plus_path = None;

    for line in section.lines().skip(1) {
        if line.starts_with("@@") {
            break;
        }
        if line.starts_with("new file mode") {
            status = ChangeStatus::Added;
        } else if line.starts_with("deleted file mode") {
            status = ChangeStatus::Deleted;
        } else if let Some(path) = line.strip_prefix("rename from ") {
            status = ChangeStatus::Renamed;
            old_path = Some(path.to_string());
        } else if let Some(path) = line.strip_prefix("rename to ") {
            new_path = Some(path.to_string());
        } else if let Some(path) = line.strip_prefix("copy from ") {
            status = ChangeStatus::Copied;
            old_path = Some(path.to_string());
        } else if let Some(path) = line.strip_prefix("copy to ") {
            new_path = Some(path.to_string());
        } else if let Some(path) = line.strip_prefix("--- ") {
            minus_path = strip_side(path, "a/");
        } else if let Some(path) = line.strip_prefix("+++ ") {
            plus_path = strip_side(path, "b/");
        }
    }

    let path = new_path
        .or(plus_path)
        .or(minus_path)
        .or_else(|| header_path(header))?;

    let change = Change::new(path, status, section);
    Some(match old_path {
        Some(old) => change.with_old_path(old),
        None => change,
    })
}

fn strip_side(path: &str, prefix: &str) -> Option<String> {
    let path = path.trim_end();
    if path == "/dev/null" {
        return None;
    }
    Some(path.strip_prefix(prefix).unwrap_or(path).to_string())
}

// Used when a section has no ---/+++ lines, e.g. binary or mode-only changes.
fn header_path(header: &str) -> Option<String> {
    let (_, new) = header.rsplit_once(" b/")?;
    Some(new.trim_end().to_string())
}
