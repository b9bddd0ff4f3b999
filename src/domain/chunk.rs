/// Marks a chunk that holds only a slice of one oversized file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPart {
    pub path: String,
    pub part: usize,
    pub total: usize,
}

/// A budget-compliant slice of the rendered change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub content: String,
    pub paths: Vec<String>,
    pub part: Option<ChunkPart>,
}

impl Chunk {
    pub fn label(&self) -> String {
        match &self.part {
            Some(part) => format!("{} (part {}/{})", part.path, part.part, part.total),
            None if self.paths.len() == 1 => self.paths[0].clone(),
            None => format!("chunk {} ({} files)", self.index + 1, self.paths.len()),
        }
    }
}

/// Result of summarizing one chunk or one merge group. Failures are kept as
/// data so a single bad call never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSummary {
    pub label: String,
    pub summary: String,
    pub index: usize,
    pub success: bool,
    pub error: Option<String>,
}

impl ChunkSummary {
    pub fn succeeded(label: impl Into<String>, index: usize, summary: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            summary: summary.into(),
            index,
            success: true,
            error: None,
        }
    }

    pub fn failed(label: impl Into<String>, index: usize, error: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            summary: String::new(),
            index,
            success: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_describe_chunk_contents() {
        let single = Chunk {
            index: 0,
            content: String::new(),
            paths: vec!["a.rs".to_string()],
            part: None,
        };
        assert_eq!(single.label(), "a.rs");

        let many = Chunk {
            index: 2,
            content: String::new(),
            paths: vec!["a.rs".to_string(), "b.rs".to_string()],
            part: None,
        };
        assert_eq!(many.label(), "chunk 3 (2 files)");

        let sliced = Chunk {
            index: 4,
            content: String::new(),
            paths: vec!["big.rs".to_string()],
            part: Some(ChunkPart {
                path: "big.rs".to_string(),
                part: 2,
                total: 3,
            }),
        };
        assert_eq!(sliced.label(), "big.rs (part 2/3)");
    }

    #[test]
    fn failed_summary_carries_error() {
        let failed = ChunkSummary::failed("a.rs", 1, "HTTP 503");
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("HTTP 503"));
        assert!(failed.summary.is_empty());
    }
}
