//! Cooperative cancellation.

use crate::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag checked by long-running traversals.
///
/// Clones observe the same flag, so a caller can keep one clone and hand
/// another to a service.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that has not fired.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns [`Error::Cancelled`] if the token has fired.
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` naming `operation` once cancelled.
    pub fn check(&self, operation: &'static str) -> Result<()> {
        if self.is_cancelled() {
            metrics::counter!("kinship_cancellations_total", "operation" => operation).increment(1);
            return Err(Error::Cancelled { operation });
        }
        Ok(())
    }
}

/// Checks an optional token.
pub(crate) fn checkpoint(token: Option<&CancellationToken>, operation: &'static str) -> Result<()> {
    token.map_or(Ok(()), |t| t.check(operation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(observer.check("walk").is_ok());

        token.cancel();
        assert!(observer.is_cancelled());
        assert!(matches!(
            observer.check("walk"),
            Err(Error::Cancelled { operation: "walk" })
        ));
    }

    #[test]
    fn test_checkpoint_without_token() {
        assert!(checkpoint(None, "walk").is_ok());
    }
}
