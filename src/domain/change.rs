use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
}

impl ChangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::Added => "added",
            ChangeStatus::Modified => "modified",
            ChangeStatus::Deleted => "deleted",
            ChangeStatus::Renamed => "renamed",
            ChangeStatus::Copied => "copied",
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One modified file as reported by version control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub path: String,
    pub old_path: Option<String>,
    pub status: ChangeStatus,
    pub diff: String,
    pub additions: usize,
    pub deletions: usize,
}

impl Change {
    pub fn new(path: impl Into<String>, status: ChangeStatus, diff: impl Into<String>) -> Self {
        let diff = diff.into();
        let (additions, deletions) = count_lines(&diff);
        Self {
            path: path.into(),
            old_path: None,
            status,
            diff,
            additions,
            deletions,
        }
    }

    pub fn with_old_path(mut self, old_path: impl Into<String>) -> Self {
        self.old_path = Some(old_path.into());
        self
    }

    /// Canonical text block for this file. Always ends with a newline so that
    /// blocks can be concatenated without ambiguity.
    pub fn render(&self) -> String {
        let mut block = match &self.old_path {
            Some(old) => format!(
                "=== {} {} (from {}) [+{} -{}]\n",
                self.status, self.path, old, self.additions, self.deletions
            ),
            None => format!(
                "=== {} {} [+{} -{}]\n",
                self.status, self.path, self.additions, self.deletions
            ),
        };
        block.push_str(&self.diff);
        if !block.ends_with('\n') {
            block.push('\n');
        }
        block
    }
}

pub fn render_changes(changes: &[Change]) -> String {
    changes.iter().map(Change::render).collect()
}

/// Counts added and removed lines of a unified diff. `---`/`+++` lines are
/// file headers only before the first hunk.
pub fn count_lines(diff: &str) -> (usize, usize) {
    let mut additions = 0;
    let mut deletions = 0;
    let mut in_hunk = false;
    for line in diff.lines() {
        if line.starts_with("@@") {
            in_hunk = true;
            continue;
        }
        if !in_hunk && (line.starts_with("+++") || line.starts_with("---")) {
            continue;
        }
        if line.starts_with('+') {
            additions += 1;
        } else if line.starts_with('-') {
            deletions += 1;
        }
    }
    (additions, deletions)
}
