use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

/// One cancellation token per thread.
///
/// A thread keeps its token until it is cancelled or released; asking for a
/// token after cancellation hands out a fresh one for the next turn.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    tokens: DashMap<String, CancellationToken>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token_for(&self, thread_id: &str) -> CancellationToken {
        let mut entry = self
            .tokens
            .entry(thread_id.to_string())
            .or_insert_with(CancellationToken::new);
        if entry.is_cancelled() {
            *entry = CancellationToken::new();
        }
        entry.clone()
    }

    /// Cancel the running turn of `thread_id`, if any
    pub fn cancel(&self, thread_id: &str) -> bool {
        match self.tokens.get(thread_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn release(&self, thread_id: &str) {
        self.tokens.remove(thread_id);
    }

    pub fn cancel_all(&self) {
        for entry in self.tokens.iter() {
            entry.value().cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_reaches_issued_token() {
        let registry = CancellationRegistry::new();
        let token = registry.token_for("t1");
        assert!(registry.cancel("t1"));
        assert!(token.is_cancelled());
        assert!(!registry.cancel("unknown"));
    }

    #[test]
    fn test_fresh_token_after_cancel() {
        let registry = CancellationRegistry::new();
        registry.token_for("t1");
        registry.cancel("t1");
        assert!(!registry.token_for("t1").is_cancelled());
    }

    #[test]
    fn test_threads_are_independent() {
        let registry = CancellationRegistry::new();
        let a = registry.token_for("a");
        let b = registry.token_for("b");
        registry.cancel("a");
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
    }
}
