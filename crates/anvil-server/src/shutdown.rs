//! The graceful shutdown controller: `running -> draining -> closed`,
//! racing a naturally-completing drain against a `grace_period` soft
//! nudge and a `force_after` hard deadline.
//!
//! Built on `anvil-core::cancel`'s watch-channel token, the same
//! primitive `anvil-middleware::timeout` already uses for request-scoped
//! deadlines.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anvil_core::cancel::{CancelSource, CancelToken};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    Closed,
}

#[derive(Debug, Clone, Copy)]
pub struct ShutdownOutcome {
    /// `true` if `force_after` elapsed (or `on_drain` errored) before the
    /// drain completed naturally.
    pub forced: bool,
}

/// Which signals the controller subscribes to (a subset of
/// SIGINT/SIGTERM/SIGHUP/SIGUSR1/SIGUSR2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutdownSignal {
    Sigint,
    Sigterm,
    Sighup,
    Sigusr1,
    Sigusr2,
}

pub struct ShutdownController {
    state: Mutex<ShutdownState>,
    triggered: AtomicBool,
    forced: AtomicBool,
    readiness: AtomicBool,
    grace_period: Duration,
    force_after: Duration,
    /// Flipped at `grace_period` (a soft nudge for in-flight work to wrap
    /// up) and again, if not already, at `force_after`. Middleware and
    /// long-running handlers observe this the same way they observe a
    /// request timeout's token.
    drain_source: CancelSource,
    drain_token: CancelToken,
    /// Flipped only at `force_after` (or on an `on_drain` failure):
    /// connections still open at that point are aborted rather than asked
    /// to wrap up.
    force_source: CancelSource,
    force_token: CancelToken,
}

impl ShutdownController {
    pub fn new(grace_period: Duration, force_after: Duration, notify_readiness: bool) -> Self {
        let (drain_source, drain_token) = CancelSource::new();
        let (force_source, force_token) = CancelSource::new();
        Self {
            state: Mutex::new(ShutdownState::Running),
            triggered: AtomicBool::new(false),
            forced: AtomicBool::new(false),
            readiness: AtomicBool::new(notify_readiness),
            grace_period,
            force_after,
            drain_source,
            drain_token,
            force_source,
            force_token,
        }
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.lock()
    }

    /// Consulted by health endpoints; flips to `false` the moment
    /// `trigger` runs so load balancers stop routing new traffic during
    /// drain.
    pub fn is_ready(&self) -> bool {
        self.readiness.load(Ordering::SeqCst)
    }

    /// The soft-nudge token: cancelled at `grace_period`, or immediately
    /// at `force_after` if it hasn't fired yet.
    pub fn drain_token(&self) -> CancelToken {
        self.drain_token.clone()
    }

    /// The hard-abort token: cancelled only at `force_after`, or
    /// immediately if `on_drain` fails.
    pub fn force_token(&self) -> CancelToken {
        self.force_token.clone()
    }

    /// Transitions `running -> draining -> closed`. Idempotent: a second
    /// call while already triggered is a no-op and returns the outcome of
    /// the first.
    ///
    /// `on_shutdown` stops accepting new connections; `on_drain` resolves
    /// once in-flight work has finished naturally (or errors, which is
    /// treated the same as `force_after` elapsing).
    pub async fn trigger<S, D>(&self, on_shutdown: S, on_drain: D) -> ShutdownOutcome
    where
        S: FnOnce(),
        D: Future<Output = anvil_core::Result<()>>,
    {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return ShutdownOutcome { forced: self.forced.load(Ordering::SeqCst) };
        }

        *self.state.lock() = ShutdownState::Draining;
        self.readiness.store(false, Ordering::SeqCst);
        on_shutdown();

        tokio::pin!(on_drain);
        let grace_sleep = tokio::time::sleep(self.grace_period);
        tokio::pin!(grace_sleep);
        let force_sleep = tokio::time::sleep(self.force_after);
        tokio::pin!(force_sleep);
        let mut grace_fired = false;

        let forced = loop {
            tokio::select! {
                biased;
                drained = &mut on_drain => {
                    break drained.is_err();
                }
                _ = &mut force_sleep => {
                    break true;
                }
                _ = &mut grace_sleep, if !grace_fired => {
                    grace_fired = true;
                    self.drain_source.cancel();
                }
            }
        };

        self.drain_source.cancel();
        if forced {
            self.force_source.cancel();
        }
        self.forced.store(forced, Ordering::SeqCst);
        *self.state.lock() = ShutdownState::Closed;
        ShutdownOutcome { forced }
    }
}

#[cfg(unix)]
pub mod signals {
    use std::sync::Arc;

    use tokio::signal::unix::{signal, SignalKind};

    use super::{ShutdownController, ShutdownSignal};

    fn kind_of(signal: ShutdownSignal) -> SignalKind {
        match signal {
            ShutdownSignal::Sigint => SignalKind::interrupt(),
            ShutdownSignal::Sigterm => SignalKind::terminate(),
            ShutdownSignal::Sighup => SignalKind::hangup(),
            ShutdownSignal::Sigusr1 => SignalKind::user_defined1(),
            ShutdownSignal::Sigusr2 => SignalKind::user_defined2(),
        }
    }

    /// Spawns one task per configured signal; the first to fire triggers
    /// shutdown via `trigger_fn` (so the caller controls `on_shutdown`/
    /// `on_drain` without this module needing to know about the listener).
    /// A signal this platform doesn't support is silently skipped
    /// rather than panicking at startup.
    pub fn watch<F, Fut>(_controller: &Arc<ShutdownController>, signals: &[ShutdownSignal], trigger_fn: F)
    where
        F: Fn() -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        for &configured in signals {
            let Ok(mut stream) = signal(kind_of(configured)) else {
                tracing::warn!(?configured, "signal unsupported on this platform, skipping");
                continue;
            };
            let trigger_fn = trigger_fn.clone();
            tokio::spawn(async move {
                stream.recv().await;
                trigger_fn().await;
            });
        }
    }
}

#[cfg(not(unix))]
pub mod signals {
    use std::sync::Arc;

    use super::{ShutdownController, ShutdownSignal};

    /// No OS signal handling outside Unix; every configured signal is
    /// silently skipped.
    pub fn watch<F, Fut>(_controller: &Arc<ShutdownController>, _signals: &[ShutdownSignal], _trigger_fn: F)
    where
        F: Fn() -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        tracing::warn!("signal watching is unsupported on this platform");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn natural_drain_before_force_after_is_not_forced() {
        let controller =
            ShutdownController::new(Duration::from_secs(5), Duration::from_secs(20), true);
        let outcome = controller
            .trigger(|| {}, async { Ok(()) })
            .await;
        assert!(!outcome.forced);
        assert_eq!(controller.state(), ShutdownState::Closed);
        assert!(!controller.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn force_after_elapsing_before_drain_is_forced() {
        let controller =
            ShutdownController::new(Duration::from_millis(10), Duration::from_millis(20), true);
        let never_drains = std::future::pending::<anvil_core::Result<()>>();
        let outcome = controller.trigger(|| {}, never_drains).await;
        assert!(outcome.forced);
    }

    #[tokio::test(start_paused = true)]
    async fn second_trigger_is_a_no_op() {
        let controller =
            ShutdownController::new(Duration::from_secs(5), Duration::from_secs(20), true);
        let first = controller.trigger(|| {}, async { Ok(()) }).await;
        let second = controller.trigger(|| panic!("on_shutdown must not run twice"), async { Ok(()) }).await;
        assert_eq!(first.forced, second.forced);
    }

    #[tokio::test(start_paused = true)]
    async fn on_drain_error_is_treated_as_forced() {
        let controller =
            ShutdownController::new(Duration::from_secs(5), Duration::from_secs(20), true);
        let failing_drain = async { Err(anvil_core::Error::Internal(anyhow::anyhow!("drain failed"))) };
        let outcome = controller.trigger(|| {}, failing_drain).await;
        assert!(outcome.forced);
    }
}
