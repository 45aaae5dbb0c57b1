//! `Engine`: the top-level façade tying the router, middleware pipeline,
//! service container, provider lifecycle, and shutdown controller into the
//! `use`/`group`/`build`/`serve`/`close` surface applications program
//! against.
//!
//! `EngineBuilder` stages routes and middleware without building anything;
//! `EngineBuilder::build` is the one place the router trie, the name
//! registry, and (if the `providers` feature is enabled) the provider
//! dependency graph are actually constructed — matching the
//! "router table and provider graph are built once and then read-only"
//! invariant.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anvil_core::error::Result;
use anvil_core::{CancelSource, Error, Handler, Middleware, Pipeline};
use anvil_di::Container;
use anvil_http::{EtagStrategy, Request, Response};
use anvil_router::{NameRegistry, RouteBuilder, RouteManifestEntry, Router, TrailingSlashPolicy};
use anvil_server::{Listener, ListenerConfig, ShutdownController, ShutdownOutcome, ShutdownSignal};
use anvil_signals::EventBus;
use async_trait::async_trait;
use http::Method;
use parking_lot::Mutex;

use crate::dispatch::{ContextHandler, RouteDispatch, RouteHandlerAdapter};
use crate::lifecycle::LifecycleSignals;
use crate::render::Renderer;
use crate::runtime::Runtime;

#[cfg(feature = "conf")]
use anvil_conf::Config;

#[cfg(feature = "auth")]
use anvil_auth::{AuthOrchestrator, AuthStrategy, Store};

#[cfg(feature = "providers")]
use anvil_providers::{Provider, ProviderRegistry};

#[cfg(feature = "middleware")]
use anvil_middleware::ErrorHandlerMiddleware;

/// A route staged for insertion, carried independently of any group it's
/// nested in (`RouteSpec::get`/`post`/... build one directly; `Group::route`
/// and `EngineBuilder::route` take it from there).
pub struct RouteSpec {
    method: Method,
    pattern: String,
    name: Option<String>,
    middleware: Vec<Arc<dyn Middleware>>,
    schema: Option<serde_json::Value>,
    handler: Arc<dyn ContextHandler>,
}

impl RouteSpec {
    pub fn new(method: Method, pattern: impl Into<String>, handler: impl ContextHandler + 'static) -> Self {
        Self {
            method,
            pattern: pattern.into(),
            name: None,
            middleware: Vec::new(),
            schema: None,
            handler: Arc::new(handler),
        }
    }

    pub fn get(pattern: impl Into<String>, handler: impl ContextHandler + 'static) -> Self {
        Self::new(Method::GET, pattern, handler)
    }

    pub fn post(pattern: impl Into<String>, handler: impl ContextHandler + 'static) -> Self {
        Self::new(Method::POST, pattern, handler)
    }

    pub fn put(pattern: impl Into<String>, handler: impl ContextHandler + 'static) -> Self {
        Self::new(Method::PUT, pattern, handler)
    }

    pub fn patch(pattern: impl Into<String>, handler: impl ContextHandler + 'static) -> Self {
        Self::new(Method::PATCH, pattern, handler)
    }

    pub fn delete(pattern: impl Into<String>, handler: impl ContextHandler + 'static) -> Self {
        Self::new(Method::DELETE, pattern, handler)
    }

    pub fn head(pattern: impl Into<String>, handler: impl ContextHandler + 'static) -> Self {
        Self::new(Method::HEAD, pattern, handler)
    }

    /// Sets the route's local name; folded together with its owning
    /// group's name prefix (dot-joined) at `build` time.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// A [`RouteSpec`] after any owning [`Group`]'s prefix, name prefix, and
/// middleware have been folded in. What `EngineBuilder::build` actually
/// inserts into the `Router`.
struct PendingRoute {
    method: Method,
    pattern: String,
    name: Option<String>,
    middleware: Vec<Arc<dyn Middleware>>,
    schema: Option<serde_json::Value>,
    handler: Arc<dyn ContextHandler>,
}

impl From<RouteSpec> for PendingRoute {
    fn from(spec: RouteSpec) -> Self {
        Self {
            method: spec.method,
            pattern: spec.pattern,
            name: spec.name,
            middleware: spec.middleware,
            schema: spec.schema,
            handler: spec.handler,
        }
    }
}

fn join_pattern(prefix: &str, pattern: &str) -> String {
    if prefix.is_empty() {
        return pattern.to_string();
    }
    let suffix = pattern.trim_start_matches('/');
    if suffix.is_empty() { prefix.to_string() } else { format!("{prefix}/{suffix}") }
}

fn join_name(name_prefix: &str, name: Option<String>) -> Option<String> {
    let name = name?;
    if name_prefix.is_empty() { Some(name) } else { Some(format!("{name_prefix}.{name}")) }
}

/// A sub-pattern with its own name prefix and middleware, composed
/// outer-to-inner with whatever group it's nested inside — matching
/// composition order global middleware -> group middleware (outer to
/// inner) -> route middleware -> handler.
pub struct Group {
    prefix: String,
    name_prefix: String,
    middleware: Vec<Arc<dyn Middleware>>,
    pending: Vec<PendingRoute>,
}

impl Group {
    fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
            name_prefix: String::new(),
            middleware: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn name(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn route(mut self, spec: RouteSpec) -> Self {
        self.pending.push(spec.into());
        self
    }

    /// Nests a sub-group. `build` runs against a fresh `Group` scoped to
    /// `sub_prefix`; its fully-resolved routes (already carrying its own
    /// prefix/name/middleware) are folded into `self` and get `self`'s own
    /// prefix/name/middleware applied on top in `into_pending`.
    pub fn group(mut self, sub_prefix: &str, build: impl FnOnce(Group) -> Group) -> Self {
        let nested = build(Group::new(sub_prefix));
        self.pending.extend(nested.into_pending());
        self
    }

    fn into_pending(self) -> Vec<PendingRoute> {
        let Group { prefix, name_prefix, middleware, pending } = self;
        pending
            .into_iter()
            .map(|mut route| {
                route.pattern = join_pattern(&prefix, &route.pattern);
                route.name = join_name(&name_prefix, route.name);
                route.middleware = middleware.iter().cloned().chain(route.middleware).collect();
                route
            })
            .collect()
    }
}

/// Grace period, force deadline, and signal set the Shutdown Controller is
/// built from.
pub struct ShutdownSettings {
    pub grace_period: Duration,
    pub force_after: Duration,
    pub notify_readiness: bool,
    pub signals: Vec<ShutdownSignal>,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(10),
            force_after: Duration::from_secs(30),
            notify_readiness: true,
            signals: vec![ShutdownSignal::Sigint, ShutdownSignal::Sigterm],
        }
    }
}

impl ShutdownSettings {
    /// Reads `runtime.shutdown.{grace_period,force_after,notify_readiness}`
    /// and `runtime.shutdown.signals` (a list of `sigint`/`sigterm`/`sighup`/
    /// `sigusr1`/`sigusr2`, case-insensitive); falls back to `Default` for
    /// anything absent.
    #[cfg(feature = "conf")]
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        let signal_names: Vec<String> = config
            .get_or("runtime.shutdown.signals", Vec::new());
        let signals = if signal_names.is_empty() {
            defaults.signals
        } else {
            signal_names.iter().filter_map(|name| parse_signal(name)).collect()
        };
        Self {
            grace_period: config.get_or("runtime.shutdown.grace_period", defaults.grace_period),
            force_after: config.get_or("runtime.shutdown.force_after", defaults.force_after),
            notify_readiness: config.get_or("runtime.shutdown.notify_readiness", defaults.notify_readiness),
            signals,
        }
    }
}

#[cfg(feature = "conf")]
fn parse_signal(name: &str) -> Option<ShutdownSignal> {
    match name.to_ascii_lowercase().as_str() {
        "sigint" => Some(ShutdownSignal::Sigint),
        "sigterm" => Some(ShutdownSignal::Sigterm),
        "sighup" => Some(ShutdownSignal::Sighup),
        "sigusr1" => Some(ShutdownSignal::Sigusr1),
        "sigusr2" => Some(ShutdownSignal::Sigusr2),
        other => {
            tracing::warn!(signal = other, "unknown shutdown signal name in config, ignoring");
            None
        }
    }
}

/// Wraps a [`Pipeline`] as an `anvil_core::Handler`. `Pipeline` exposes its
/// own `run` method rather than implementing `Handler` directly, so the
/// engine's fully-composed global pipeline needs this one-line adapter to
/// be handed to `Listener::serve`, which only knows about `Arc<dyn Handler>`.
struct PipelineHandler(Pipeline);

#[async_trait]
impl Handler for PipelineHandler {
    async fn handle(&self, request: Request) -> Result<Response> {
        self.0.run(request).await
    }
}

/// Rejects new requests once the Shutdown Controller has left `Running`,
/// and attaches the controller's drain token as the request's baseline
/// cancellation signal — installed as the innermost global middleware, so
/// it wraps every route but still runs inside the error-handler layer.
struct ShutdownGuardMiddleware {
    shutdown: Arc<ShutdownController>,
}

#[async_trait]
impl Middleware for ShutdownGuardMiddleware {
    async fn process(&self, mut request: Request, next: Arc<dyn Handler>) -> Result<Response> {
        if self.shutdown.state() != anvil_server::ShutdownState::Running {
            return Err(Error::ShutdownInProgress);
        }
        request.extensions.insert(self.shutdown.drain_token());
        next.handle(request).await
    }
}

/// Lifecycle state `Engine` walks through: built routes are read-only from
/// `Built` onward; `serve` moves `Built -> Serving`, a triggered shutdown
/// moves `Serving -> Draining -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Built,
    Serving,
    Draining,
    Closed,
}

/// Stages collaborators, middleware, and routes before `build` freezes them
/// into an [`Engine`].
pub struct EngineBuilder {
    container: Container,
    events: EventBus,
    signals: LifecycleSignals,
    names: NameRegistry,
    etag_strategy: EtagStrategy,
    renderer: Option<Arc<dyn Renderer>>,
    #[cfg(feature = "conf")]
    config: Option<Arc<Config>>,
    #[cfg(feature = "auth")]
    session_store: Option<Arc<dyn Store>>,
    #[cfg(feature = "auth")]
    auth: AuthOrchestrator,
    global_middleware: Vec<Arc<dyn Middleware>>,
    pending_routes: Vec<PendingRoute>,
    trailing_slash_policy: TrailingSlashPolicy,
    #[cfg(feature = "providers")]
    providers: ProviderRegistry,
    listener: ListenerConfig,
    shutdown: ShutdownSettings,
    #[cfg(feature = "middleware")]
    install_error_handler: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            container: Container::new(),
            events: EventBus::new(),
            signals: LifecycleSignals::new(),
            names: NameRegistry::new(),
            etag_strategy: EtagStrategy::default(),
            renderer: None,
            #[cfg(feature = "conf")]
            config: None,
            #[cfg(feature = "auth")]
            session_store: None,
            #[cfg(feature = "auth")]
            auth: AuthOrchestrator::new(),
            global_middleware: Vec::new(),
            pending_routes: Vec::new(),
            trailing_slash_policy: TrailingSlashPolicy::default(),
            #[cfg(feature = "providers")]
            providers: ProviderRegistry::new(),
            listener: ListenerConfig::default(),
            shutdown: ShutdownSettings::default(),
            #[cfg(feature = "middleware")]
            install_error_handler: true,
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen(mut self, addr: SocketAddr) -> Self {
        self.listener.addr = addr;
        self
    }

    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.listener.max_body_size = bytes;
        self
    }

    pub fn trailing_slash_policy(mut self, policy: TrailingSlashPolicy) -> Self {
        self.trailing_slash_policy = policy;
        self
    }

    pub fn etag_strategy(mut self, strategy: EtagStrategy) -> Self {
        self.etag_strategy = strategy;
        self
    }

    pub fn renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    pub fn shutdown(mut self, settings: ShutdownSettings) -> Self {
        self.shutdown = settings;
        self
    }

    #[cfg(feature = "conf")]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(Arc::new(config));
        self
    }

    #[cfg(feature = "auth")]
    pub fn session_store(mut self, store: impl Store + 'static) -> Self {
        self.session_store = Some(Arc::new(store));
        self
    }

    #[cfg(feature = "auth")]
    pub fn auth_strategy(mut self, strategy: impl AuthStrategy + 'static) -> Self {
        self.auth = self.auth.with_strategy(strategy);
        self
    }

    #[cfg(feature = "providers")]
    pub fn provider(mut self, provider: impl Provider + 'static) -> Self {
        self.providers.add(Arc::new(provider));
        self
    }

    /// Installs an instance shared by the root container and every scope
    /// derived from it.
    pub fn instance<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.container.instance(value);
        self
    }

    /// Mounts global middleware, applied to every request ahead of any
    /// group or route middleware (spec's "use" operation).
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.global_middleware.push(Arc::new(middleware));
        self
    }

    pub fn route(mut self, spec: RouteSpec) -> Self {
        self.pending_routes.push(spec.into());
        self
    }

    pub fn group(mut self, prefix: &str, build: impl FnOnce(Group) -> Group) -> Self {
        let group = build(Group::new(prefix));
        self.pending_routes.extend(group.into_pending());
        self
    }

    /// Finalizes the route table, provider graph, and shutdown controller.
    /// After this call the router and name registry are read-only; only
    /// `Engine::serve`/`close` remain.
    pub async fn build(self) -> Result<Engine> {
        let EngineBuilder {
            container,
            events,
            signals,
            mut names,
            etag_strategy,
            renderer,
            #[cfg(feature = "conf")]
            config,
            #[cfg(feature = "auth")]
            session_store,
            #[cfg(feature = "auth")]
            auth,
            global_middleware,
            pending_routes,
            trailing_slash_policy,
            #[cfg(feature = "providers")]
            mut providers,
            listener,
            shutdown: shutdown_settings,
            #[cfg(feature = "middleware")]
            install_error_handler,
        } = self;

        #[cfg(feature = "conf")]
        let config = config.unwrap_or_else(|| {
            Arc::new(
                anvil_conf::ConfigResolver::new()
                    .resolve()
                    .expect("default config resolution never fails with no sources"),
            )
        });

        let runtime = Arc::new(Runtime {
            container,
            events,
            signals,
            names: parking_lot::RwLock::new(NameRegistry::new()),
            etag_strategy,
            renderer,
            #[cfg(feature = "conf")]
            config,
            #[cfg(feature = "auth")]
            session_store,
            #[cfg(feature = "auth")]
            auth,
        });

        let mut router = Router::new().with_trailing_slash_policy(trailing_slash_policy);
        for pending in pending_routes {
            let adapter = Arc::new(RouteHandlerAdapter::new(runtime.clone(), pending.name.clone(), pending.handler));
            let mut builder = RouteBuilder::new(pending.method, pending.pattern, adapter);
            if let Some(name) = pending.name {
                builder = builder.name(name);
            }
            for mw in pending.middleware {
                builder = builder.middleware(mw);
            }
            if let Some(schema) = pending.schema {
                builder = builder.schema(schema);
            }
            let route = Arc::new(builder.build()?);
            names.register(route.clone())?;
            router.insert_arc(route)?;
        }
        *runtime.names.write() = names;
        let router = Arc::new(router);

        #[cfg(feature = "providers")]
        {
            providers.register_all(&runtime.container, &runtime.events).await?;
            providers.boot_all(&runtime.container, &runtime.events).await?;
        }

        let shutdown = Arc::new(ShutdownController::new(
            shutdown_settings.grace_period,
            shutdown_settings.force_after,
            shutdown_settings.notify_readiness,
        ));

        let terminal = Arc::new(RouteDispatch { router: router.clone(), runtime: runtime.clone() });
        let mut layers: Vec<Arc<dyn Middleware>> = Vec::new();
        #[cfg(feature = "middleware")]
        if install_error_handler {
            layers.push(Arc::new(ErrorHandlerMiddleware::new()));
        }
        layers.extend(global_middleware);
        layers.push(Arc::new(ShutdownGuardMiddleware { shutdown: shutdown.clone() }));
        let pipeline = Pipeline::new(layers, terminal);
        let handler: Arc<dyn Handler> = Arc::new(PipelineHandler(pipeline));

        Ok(Engine {
            router,
            runtime,
            handler,
            #[cfg(feature = "providers")]
            providers: tokio::sync::Mutex::new(providers),
            shutdown,
            shutdown_signals: shutdown_settings.signals,
            listener,
            state: Mutex::new(EngineState::Built),
            accept: Mutex::new(None),
            shutdown_done: tokio::sync::Notify::new(),
        })
    }
}

/// Bookkeeping `Engine::serve` needs to hand off to `Engine::close`: the
/// listener's own accept-loop cancel source (flipped the moment shutdown
/// starts draining, independent of the controller's own grace-period
/// token) and the listener task's abort handle (used only if shutdown is
/// ultimately forced).
struct AcceptState {
    accept_source: CancelSource,
    listener_task: tokio::task::JoinHandle<anvil_server::Result<()>>,
}

/// The built, ready-to-serve request engine.
pub struct Engine {
    router: Arc<Router>,
    runtime: Arc<Runtime>,
    handler: Arc<dyn Handler>,
    #[cfg(feature = "providers")]
    providers: tokio::sync::Mutex<ProviderRegistry>,
    shutdown: Arc<ShutdownController>,
    shutdown_signals: Vec<ShutdownSignal>,
    listener: ListenerConfig,
    state: Mutex<EngineState>,
    accept: Mutex<Option<AcceptState>>,
    /// Flipped once by whichever caller actually runs `trigger_shutdown`
    /// (an OS signal watcher or an explicit `close()`); `serve` waits on
    /// this rather than triggering shutdown itself the moment it starts.
    shutdown_done: tokio::sync::Notify,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Reconstructs a path for a named route; see `anvil_router::NameRegistry::url`.
    pub fn url(&self, name: &str, params: &std::collections::HashMap<String, String>) -> Result<String> {
        self.runtime.names.read().url(name, params)
    }

    /// The shape `routes:dump`-style CLI collaborators consume.
    pub fn route_manifest(&self) -> Vec<RouteManifestEntry> {
        self.router.build_route_manifest()
    }

    pub fn is_ready(&self) -> bool {
        self.shutdown.is_ready()
    }

    /// Binds the listener and serves until shutdown completes (OS signal or
    /// an explicit [`Engine::close`] call from another task). Returns once
    /// the Shutdown Controller reaches `Closed`.
    ///
    /// Takes `self` behind the caller's own `Arc` (rather than spawning
    /// signal-watcher tasks against a borrowed `&self`) so those tasks can
    /// hold a clone of it for however long they outlive this call, with no
    /// unsafe lifetime extension involved.
    pub async fn serve(self: &Arc<Self>) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != EngineState::Built {
                return Err(Error::State("Engine::serve called more than once".into()));
            }
            *state = EngineState::Serving;
        }

        let listener = Listener::bind(ListenerConfig {
            addr: self.listener.addr,
            transport: self.listener.transport,
            max_body_size: self.listener.max_body_size,
        })
        .await
        .map_err(anvil_core::Error::from)?;

        let (accept_source, accept_token) = CancelSource::new();
        let handler = self.handler.clone();
        let listener_task = tokio::spawn(async move { listener.serve(handler, accept_token).await });

        *self.accept.lock() = Some(AcceptState { accept_source, listener_task });

        if !self.shutdown_signals.is_empty() {
            let shutdown = self.shutdown.clone();
            let signals = self.shutdown_signals.clone();
            let this = self.clone();
            anvil_server::shutdown::signals::watch(&shutdown, &signals, move || {
                let this = this.clone();
                async move {
                    this.trigger_shutdown().await;
                }
            });
        }

        // Wait for a drain trigger rather than running one ourselves: an
        // OS signal watcher spawned above, or an external `close()` call
        // from another task, is what actually runs `trigger_shutdown` and
        // notifies us once it's done. Until one of those happens, this
        // future simply serves.
        self.shutdown_done.notified().await;

        *self.state.lock() = EngineState::Closed;
        Ok(())
    }

    /// Races the natural drain (the listener task finishing after it stops
    /// accepting) against the controller's grace/force timers, then aborts
    /// the listener task outright if the close was forced — `trigger`'s own
    /// race just stops *waiting* on `on_drain`, it doesn't kill anything,
    /// so a forced close would otherwise leave the accept/connection task
    /// running forever in the background.
    async fn trigger_shutdown(&self) {
        *self.state.lock() = EngineState::Draining;

        let shutdown = self.shutdown.clone();
        let accept = self.accept.lock().take();
        let Some(AcceptState { accept_source, listener_task }) = accept else {
            // Shutdown already ran (concurrent trigger), or `serve` never
            // actually bound a listener; nothing left to drain.
            return;
        };

        let abort_handle = listener_task.abort_handle();
        let outcome: ShutdownOutcome = shutdown
            .trigger(
                || accept_source.cancel(),
                async move {
                    match listener_task.await {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(err)) => Err(anvil_core::Error::from(err)),
                        Err(join_err) => Err(Error::Internal(anyhow::anyhow!(join_err))),
                    }
                },
            )
            .await;

        if outcome.forced {
            abort_handle.abort();
            tracing::warn!("shutdown forced: in-flight connections did not drain before force_after");
        }

        #[cfg(feature = "providers")]
        {
            let providers = self.providers.lock().await;
            providers.shutdown_all(&self.runtime.container, &self.runtime.events).await;
        }

        self.shutdown_done.notify_one();
    }

    /// Triggers shutdown from outside the `serve` task (e.g. an admin
    /// endpoint). Idempotent with OS-signal-triggered and `serve`-internal
    /// shutdown: the first caller to observe `self.accept` still populated
    /// runs the real drain and the rest return immediately once it's been
    /// taken, matching `ShutdownController::trigger`'s own idempotency.
    pub async fn close(&self) {
        self.trigger_shutdown().await;
    }
}
