//! Named signal streams: a single event type with sender scoping and
//! subscription de-duplication, used for the engine's lifecycle signals
//! (`started`, `routeMatched`, `afterRouting`, `finished`, `routingError`).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::bus::{EventHandler, HandlerResult};
use crate::error::UnhandledSignalError;
use crate::{Event, EventBus};

struct FnHandler<F>(F);

#[async_trait]
impl<E, F, Fut> EventHandler<E> for FnHandler<F>
where
    E: Event,
    F: Fn(&E) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = HandlerResult> + Send,
{
    async fn handle(&self, event: &E) -> HandlerResult {
        (self.0)(event).await
    }
}

struct Subscription<E: Event> {
    id: u64,
    sender: Option<String>,
    key: Option<String>,
    handler: Arc<dyn EventHandler<E>>,
}

/// A handle returned by [`Signal::subscribe`]. Call [`SubscriptionHandle::cancel`]
/// (or just drop the owning `Signal` reference) to stop receiving the signal;
/// the handle does not auto-cancel on drop, matching a named, explicit
/// unsubscribe rather than RAII-scoped subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// A named stream of a single event variant `E`.
///
/// Dispatch (`Signal::fire`) is sequential and preserves registration order
/// for that signal. Subscribers may be scoped to a specific `sender`
/// identity (e.g. a route name or context id) — a dispatch with a given
/// sender only reaches handlers whose scope is `None` (any sender) or an
/// exact match.
pub struct Signal<E: Event> {
    name: &'static str,
    subscribers: RwLock<Vec<Subscription<E>>>,
    next_id: AtomicU64,
}

impl<E: Event> Signal<E> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Subscribe a handler, optionally scoped to a `sender` identity and
    /// tagged with a de-duplication `key`. Re-subscribing with the same key
    /// replaces the prior subscription in place (same position), rather
    /// than appending a second one.
    pub fn subscribe(
        &self,
        handler: Arc<dyn EventHandler<E>>,
        sender: Option<String>,
        key: Option<String>,
    ) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subs = self.subscribers.write();
        if let Some(key) = &key {
            if let Some(existing) = subs.iter_mut().find(|s| s.key.as_deref() == Some(key.as_str())) {
                existing.id = id;
                existing.sender = sender;
                existing.handler = handler;
                return SubscriptionHandle(id);
            }
        }
        subs.push(Subscription { id, sender, key, handler });
        SubscriptionHandle(id)
    }

    /// Convenience over [`Signal::subscribe`] for a plain async closure.
    pub fn subscribe_fn<F, Fut>(
        &self,
        handler: F,
        sender: Option<String>,
        key: Option<String>,
    ) -> SubscriptionHandle
    where
        F: Fn(&E) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = HandlerResult> + Send + 'static,
    {
        self.subscribe(Arc::new(FnHandler(handler)), sender, key)
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.subscribers.write().retain(|s| s.id != handle.id());
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fire the signal for an optional `sender` identity. Handlers scoped to
    /// a different sender are skipped. Errors are caught and republished
    /// onto `errors` as an [`UnhandledSignalError`] rather than propagating.
    pub async fn fire(&self, sender: Option<&str>, event: &E, errors: &EventBus) {
        let matching: Vec<(Option<String>, Arc<dyn EventHandler<E>>)> = {
            let subs = self.subscribers.read();
            subs.iter()
                .filter(|s| match (&s.sender, sender) {
                    (None, _) => true,
                    (Some(scoped), Some(actual)) => scoped == actual,
                    (Some(_), None) => false,
                })
                .map(|s| (s.key.clone(), s.handler.clone()))
                .collect()
        };
        for (key, handler) in matching {
            if let Err(err) = handler.handle(event).await {
                let unhandled = UnhandledSignalError {
                    name: self.name.to_string(),
                    event_type: std::any::type_name::<E>(),
                    key,
                    sender: sender.map(|s| s.to_string()),
                    error: err.to_string(),
                };
                tracing::error!(signal = self.name, error = %unhandled, "signal handler failed");
                errors.publish(unhandled).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Started {
        path: String,
    }

    #[tokio::test]
    async fn sender_scoping_filters_dispatch() {
        let signal: Signal<Started> = Signal::new("started");
        let errors = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = hits.clone();
        signal.subscribe_fn(
            move |_| {
                let h = h.clone();
                async move {
                    h.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            Some("route-a".to_string()),
            None,
        );

        signal
            .fire(Some("route-b"), &Started { path: "/x".into() }, &errors)
            .await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        signal
            .fire(Some("route-a"), &Started { path: "/x".into() }, &errors)
            .await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dedup_key_replaces_subscription() {
        let signal: Signal<Started> = Signal::new("started");
        assert_eq!(signal.len(), 0);

        signal.subscribe_fn(|_| async { Ok(()) }, None, Some("k".into()));
        assert_eq!(signal.len(), 1);
        signal.subscribe_fn(|_| async { Ok(()) }, None, Some("k".into()));
        assert_eq!(signal.len(), 1);
    }

    #[tokio::test]
    async fn handler_error_republishes_unhandled() {
        let signal: Signal<Started> = Signal::new("started");
        let errors = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        errors.subscribe_fn::<UnhandledSignalError, _, _>(move |_| {
            let s = s.clone();
            async move {
                s.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        signal.subscribe_fn(|_| async { Err("boom".into()) }, None, None);
        signal
            .fire(None, &Started { path: "/x".into() }, &errors)
            .await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
