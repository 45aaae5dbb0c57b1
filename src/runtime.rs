//! The shared, request-independent state every [`crate::Context`] is built
//! against.
//!
//! `Engine` and `Runtime` are deliberately two different types. `Engine`
//! owns the router, the provider registry, and the shutdown controller —
//! things only the top-level dispatch loop touches. `Runtime` owns exactly
//! what a per-request `Context` needs (the root container, the event bus,
//! the name registry, config, session store). Splitting them this way
//! avoids a reference cycle: routes are built from `Runtime` before the
//! `Router` that holds them is itself wrapped into the `Engine`, so a
//! route's terminal handler can hold an `Arc<Runtime>` without needing to
//! know about the `Engine` that will eventually own its `Router`.

use std::sync::Arc;

use anvil_di::Container;
use anvil_http::EtagStrategy;
use anvil_router::NameRegistry;
use anvil_signals::EventBus;
use parking_lot::RwLock;

use crate::lifecycle::LifecycleSignals;
use crate::render::Renderer;

#[cfg(feature = "conf")]
use anvil_conf::Config;

#[cfg(feature = "auth")]
use anvil_auth::{AuthOrchestrator, Store};

/// Request-independent collaborators shared by every [`crate::Context`].
pub struct Runtime {
    /// The root service container. Every `Context` resolves its own DI
    /// scope from `container.create_scope()`.
    pub container: Container,
    pub events: EventBus,
    pub signals: LifecycleSignals,
    /// Built once at `Engine::build` and read-only afterward; reverse
    /// routing (`Context::url`, `Engine::url`) consults it directly rather
    /// than going through the `Router`, since the trie has no reverse
    /// index of its own.
    pub names: RwLock<NameRegistry>,
    pub etag_strategy: EtagStrategy,
    /// The view-engine seam `Context::template` calls through. `None`
    /// unless the application wired one up via `EngineBuilder::renderer`;
    /// `template` fails with `Error::State` if called without one.
    pub renderer: Option<Arc<dyn Renderer>>,
    #[cfg(feature = "conf")]
    pub config: Arc<Config>,
    #[cfg(feature = "auth")]
    pub session_store: Option<Arc<dyn Store>>,
    #[cfg(feature = "auth")]
    pub auth: AuthOrchestrator,
}
