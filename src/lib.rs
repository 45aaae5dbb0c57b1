//! The Anvil request engine: a router trie, a layered middleware pipeline,
//! a per-request `Context`, a service container, provider lifecycle, and a
//! graceful shutdown controller, tied together behind `Engine`/
//! `EngineBuilder`.
//!
//! Everything this crate exposes is either re-exported from the lower
//! `anvil-*` crates (routing, DI, auth, config, ...) or defined here as the
//! glue between them — `Context`, `Engine`, and the `ContextHandler`/
//! `Renderer` seams applications implement against.

pub mod context;
pub(crate) mod dispatch;
pub mod engine;
pub(crate) mod ids;
pub mod lifecycle;
pub mod render;
pub mod runtime;

pub use context::Context;
pub use dispatch::ContextHandler;
pub use engine::{Engine, EngineBuilder, Group, RouteSpec, ShutdownSettings};
pub use lifecycle::{AfterRouting, Finished, RouteMatched, RoutingError, Started};
pub use render::Renderer;
pub use runtime::Runtime;

pub use anvil_core::error::{Error, Result};
pub use anvil_core::{CancelSource, CancelToken, Handler, Middleware};
pub use anvil_http::{ConditionalOutcome, Cookie, CookieJar, ETag, EtagStrategy, Request, Response};
pub use anvil_router::{NameRegistry, RouteManifestEntry, TrailingSlashPolicy};

#[cfg(feature = "conf")]
pub use anvil_conf::{Config, ConfigResolver};

#[cfg(feature = "auth")]
pub use anvil_auth::{AuthOrchestrator, Principal, Session, Store};

#[cfg(feature = "providers")]
pub use anvil_providers::{Provider, ProviderRegistry};

#[cfg(feature = "throttle")]
pub use anvil_throttle::RateLimiter;

#[cfg(feature = "middleware")]
pub use anvil_middleware as middleware;
