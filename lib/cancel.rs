//! Cooperative cancellation for long-running loops.
//!
//! Tokens are checked only at step and iteration boundaries; a cancelled run
//! still hands back whatever it completed.

use std::sync::{
    Arc,
    atomic::{ AtomicBool, Ordering },
};

/// Shared flag that long-running loops poll between checkpoints.
///
/// Clones share the same underlying flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a new, un-cancelled token.
    pub fn new() -> Self { Self::default() }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst); }

    /// Return `true` if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::SeqCst) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
