//! The five named lifecycle signals every request dispatch fires, and the
//! event payloads that ride along with them.
//!
//! Firing order per request: `started` before routing begins, then either
//! `routeMatched` or `routingError` depending on what the router returned,
//! then (once the matched route's own pipeline has run) `afterRouting`, and
//! finally `finished` once the engine's global middleware has unwound back
//! to the dispatch loop. Subscribers scoped to a route name via
//! `Signal::subscribe`'s `sender` argument only see `routeMatched` /
//! `afterRouting` / `finished` for that route; `started` and `routingError`
//! fire with no route name yet resolved, so sender-scoped subscriptions to
//! those two never match and must subscribe unscoped.

use anvil_signals::Signal;

/// Fired once per request, before the router has been consulted.
#[derive(Debug, Clone)]
pub struct Started {
    pub request_id: String,
    pub method: String,
    pub path: String,
}

/// Fired when the router resolves a route, before its middleware/handler
/// pipeline runs. `sender` for this signal is the matched route's name.
#[derive(Debug, Clone)]
pub struct RouteMatched {
    pub request_id: String,
    pub route_name: Option<String>,
    pub pattern: String,
}

/// Fired after the matched route's pipeline has produced a response (or
/// propagated an error past it), before the engine's global middleware
/// unwinds.
#[derive(Debug, Clone)]
pub struct AfterRouting {
    pub request_id: String,
    pub status: u16,
}

/// Fired once the whole request has finished, success or failure.
#[derive(Debug, Clone)]
pub struct Finished {
    pub request_id: String,
    pub status: Option<u16>,
    pub error: Option<String>,
}

/// Fired instead of `routeMatched` when routing itself fails (no route,
/// method not allowed, or a routing-time error).
#[derive(Debug, Clone)]
pub struct RoutingError {
    pub request_id: String,
    pub error: String,
}

/// The five lifecycle signals, bundled so `Runtime` holds one field rather
/// than five.
pub struct LifecycleSignals {
    pub started: Signal<Started>,
    pub route_matched: Signal<RouteMatched>,
    pub after_routing: Signal<AfterRouting>,
    pub finished: Signal<Finished>,
    pub routing_error: Signal<RoutingError>,
}

impl LifecycleSignals {
    pub fn new() -> Self {
        Self {
            started: Signal::new("started"),
            route_matched: Signal::new("routeMatched"),
            after_routing: Signal::new("afterRouting"),
            finished: Signal::new("finished"),
            routing_error: Signal::new("routingError"),
        }
    }
}
