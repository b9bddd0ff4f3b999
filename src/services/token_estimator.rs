pub trait TokenEstimator: Send + Sync {
    /// Approximate token count. Must be deterministic and non-decreasing in
    /// the length of `text`.
    fn estimate(&self, text: &str) -> usize;

    /// Usable input budget after the safety margin and prompt overhead.
    fn effective_limit(&self) -> usize;

    fn needs_split(&self, text: &str) -> bool {
        self.estimate(text) > self.effective_limit()
    }
}
