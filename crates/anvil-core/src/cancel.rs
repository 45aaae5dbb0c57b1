//! Cooperative cancellation.
//!
//! A [`CancelToken`] is a read-only view onto a boolean `tokio::sync::watch`
//! channel. It is hand-rolled rather than pulled from `tokio-util`: a
//! single watch channel covers what the engine needs — a token that
//! starts "not cancelled", flips exactly once, and can be cheaply cloned
//! and awaited from many tasks at once.
//! There is no hierarchy of parent/child tokens beyond what
//! [`CancelSource::child`] builds by hand — good enough for the depth the
//! pipeline actually has (shutdown drain, and optionally a timeout layer
//! nested under it).

use tokio::sync::watch;

/// The write half. Held by whatever owns the lifetime being bounded (the
/// Shutdown Controller's drain signal, a timeout middleware's deadline).
#[derive(Debug, Clone)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

/// The read half, carried on the request and consulted by handlers and
/// downstream middleware. Cloning a token does not create a new signal; all
/// clones observe the same underlying flip.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelSource {
    pub fn new() -> (Self, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancelToken { rx })
    }

    /// Flip the token. Idempotent: a second call is a no-op.
    pub fn cancel(&self) {
        let _ = self.tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        });
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl CancelToken {
    /// A token that is never cancelled, for call sites without a real
    /// cancellation source (tests, synthetic requests).
    pub fn never() -> Self {
        CancelSource::new().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the token is cancelled. Safe to await from multiple
    /// clones concurrently; each gets its own resolution.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let (source, token) = CancelSource::new();
        assert!(!token.is_cancelled());

        let waiter = tokio::spawn({
            let token = token.clone();
            async move {
                token.cancelled().await;
            }
        });

        source.cancel();
        waiter.await.unwrap();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let (source, token) = CancelSource::new();
        source.cancel();
        source.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn never_is_never_cancelled() {
        assert!(!CancelToken::never().is_cancelled());
    }
}
