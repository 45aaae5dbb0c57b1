//! The process-wide typed event bus.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::Event;

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A subscriber to events of type `E`.
///
/// Implement this directly for stateful subscribers, or use
/// [`EventBus::subscribe_fn`] to register a plain async closure.
#[async_trait]
pub trait EventHandler<E: Event>: Send + Sync {
    async fn handle(&self, event: &E) -> HandlerResult;
}

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

struct Registration<E: Event> {
    id: u64,
    handler: Arc<dyn EventHandler<E>>,
}

/// Type-erased storage for one event type's subscriber list. Downcast back
/// to `RwLock<Vec<Registration<E>>>` at the one call site that knows `E`.
type Slot = Box<dyn Any + Send + Sync>;

/// A process-wide bus: subscribe by type, publish an instance, every
/// subscriber for that type runs in registration order.
///
/// Write-once in spirit: the bus itself stays mutable for the process
/// lifetime (subscriptions can come and go), but nothing here assumes a
/// request-scoped lifetime — it is meant to be built once at boot and
/// shared via `Arc`.
#[derive(Default)]
pub struct EventBus {
    slots: RwLock<HashMap<TypeId, Slot>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for every event of type `E`. Returns a
    /// subscription id usable with [`EventBus::unsubscribe`].
    pub fn subscribe<E: Event>(&self, handler: Arc<dyn EventHandler<E>>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut slots = self.slots.write();
        let slot = slots
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(RwLock::new(Vec::<Registration<E>>::new())));
        let list = slot
            .downcast_mut::<RwLock<Vec<Registration<E>>>>()
            .expect("event bus slot type mismatch");
        list.write().push(Registration { id, handler });
        id
    }

    /// Register a plain async closure as a handler for `E`.
    pub fn subscribe_fn<E, F, Fut>(&self, handler: F) -> u64
    where
        E: Event,
        F: Fn(&E) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = HandlerResult> + Send + 'static,
    {
        self.subscribe::<E>(Arc::new(FnHandler(handler)))
    }

    /// Remove a previously-registered subscription for event type `E`.
    pub fn unsubscribe<E: Event>(&self, id: u64) {
        let slots = self.slots.read();
        if let Some(slot) = slots.get(&TypeId::of::<E>()) {
            if let Some(list) = slot.downcast_ref::<RwLock<Vec<Registration<E>>>>() {
                list.write().retain(|r| r.id != id);
            }
        }
    }

    /// Deliver `event` to every subscriber of `E`, sequentially, in
    /// registration order. Handler errors are logged and do not stop
    /// delivery to remaining subscribers.
    pub async fn publish<E: Event>(&self, event: E) {
        let handlers: Vec<Arc<dyn EventHandler<E>>> = {
            let slots = self.slots.read();
            match slots.get(&TypeId::of::<E>()) {
                Some(slot) => match slot.downcast_ref::<RwLock<Vec<Registration<E>>>>() {
                    Some(list) => list.read().iter().map(|r| r.handler.clone()).collect(),
                    None => return,
                },
                None => return,
            }
        };
        for handler in handlers {
            if let Err(err) = handler.handle(&event).await {
                tracing::error!(error = %err, "event handler failed");
            }
        }
    }

    pub fn subscriber_count<E: Event>(&self) -> usize {
        let slots = self.slots.read();
        slots
            .get(&TypeId::of::<E>())
            .and_then(|slot| slot.downcast_ref::<RwLock<Vec<Registration<E>>>>())
            .map(|list| list.read().len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone)]
    struct Ping(u32);

    #[tokio::test]
    async fn delivers_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let o1 = order.clone();
        bus.subscribe_fn::<Ping, _, _>(move |p| {
            let o1 = o1.clone();
            let v = p.0;
            async move {
                o1.lock().push(("a", v));
                Ok(())
            }
        });
        let o2 = order.clone();
        bus.subscribe_fn::<Ping, _, _>(move |p| {
            let o2 = o2.clone();
            let v = p.0;
            async move {
                o2.lock().push(("b", v));
                Ok(())
            }
        });

        bus.publish(Ping(1)).await;
        assert_eq!(*order.lock(), vec![("a", 1), ("b", 1)]);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let id = bus.subscribe_fn::<Ping, _, _>(move |_| {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        bus.publish(Ping(1)).await;
        bus.unsubscribe::<Ping>(id);
        bus.publish(Ping(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handler_error_does_not_stop_delivery() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        bus.subscribe_fn::<Ping, _, _>(|_| async move { Err("boom".into()) });
        let h = hits.clone();
        bus.subscribe_fn::<Ping, _, _>(move |_| {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        bus.publish(Ping(1)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
