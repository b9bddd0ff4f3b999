//! Partitions a change set into chunks that fit the token budget.

use crate::domain::change::Change;
use crate::domain::chunk::{Chunk, ChunkPart};
use crate::services::TokenEstimator;

pub struct DiffSplitter<'a> {
    estimator: &'a dyn TokenEstimator,
    budget: usize,
}

impl<'a> DiffSplitter<'a> {
    pub fn new(estimator: &'a dyn TokenEstimator, budget: usize) -> Self {
        Self {
            estimator,
            budget: budget.max(1),
        }
    }

    /// Greedy, order-preserving split. Whole files stay together unless a
    /// single file exceeds the budget on its own, in which case that file is
    /// cut at line boundaries into numbered parts.
    ///
    /// Fit is tracked as the running sum of per-block estimates, which never
    /// undercounts for subadditive estimators.
    pub fn split(&self, changes: &[Change]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut content = String::new();
        let mut paths: Vec<String> = Vec::new();
        let mut tokens = 0usize;

        for change in changes {
            let block = change.render();
            let block_tokens = self.estimator.estimate(&block);

            if block_tokens > self.budget {
                flush(&mut chunks, &mut content, &mut paths, &mut tokens);
                let pieces = self.split_oversized(&block);
                let total = pieces.len();
                for (offset, piece) in pieces.into_iter().enumerate() {
                    let index = chunks.len();
                    chunks.push(Chunk {
                        index,
                        content: piece,
                        paths: vec![change.path.clone()],
                        part: Some(ChunkPart {
                            path: change.path.clone(),
                            part: offset + 1,
                            total,
                        }),
                    });
                }
                continue;
            }

            if !content.is_empty() && tokens + block_tokens > self.budget {
                flush(&mut chunks, &mut content, &mut paths, &mut tokens);
            }
            content.push_str(&block);
            paths.push(change.path.clone());
            tokens += block_tokens;
        }

        flush(&mut chunks, &mut content, &mut paths, &mut tokens);
        chunks
    }

    fn split_oversized(&self, block: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut current = String::new();
        let mut tokens = 0usize;

        for line in block.split_inclusive('\n') {
            let line_tokens = self.estimator.estimate(line);

            if line_tokens > self.budget {
                if !current.is_empty() {
                    pieces.push(std::mem::take(&mut current));
                    tokens = 0;
                }
                pieces.extend(self.split_line(line));
                continue;
            }

            if !current.is_empty() && tokens + line_tokens > self.budget {
                pieces.push(std::mem::take(&mut current));
                tokens = 0;
            }
            current.push_str(line);
            tokens += line_tokens;
        }

        if !current.is_empty() {
            pieces.push(current);
        }
        pieces
    }

    /// Cuts one over-long line (minified bundles and the like) at char
    /// boundaries. Every piece holds at least one char.
    fn split_line(&self, line: &str) -> Vec<String> {
        let chars: Vec<char> = line.chars().collect();
        let mut pieces = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            // estimate is monotonic in length, so the longest fitting prefix
            // can be found by bisection
            let mut low = start + 1;
            let mut high = chars.len();
            while low < high {
                let mid = (low + high).div_ceil(2);
                let candidate: String = chars[start..mid].iter().collect();
                if self.estimator.estimate(&candidate) <= self.budget {
                    low = mid;
                } else {
                    high = mid - 1;
                }
            }
            pieces.push(chars[start..low].iter().collect());
            start = low;
        }
        pieces
    }
}

fn flush(chunks: &mut Vec<Chunk>, content: &mut String, paths: &mut Vec<String>, tokens: &mut usize) {
    if content.is_empty() {
        return;
    }
    let index = chunks.len();
    chunks.push(Chunk {
        index,
        content: std::mem::take(content),
        paths: std::mem::take(paths),
        part: None,
    });
    *tokens = 0;
}
