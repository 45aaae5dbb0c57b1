//! The bridge between the wire-level `Handler`/`Middleware`/`Pipeline`
//! primitives `anvil-core` defines and the `Context`-level handlers
//! applications actually write.
//!
//! A route's handler, as stored in `anvil_router::Route`, is an
//! `Arc<dyn anvil_core::Handler>` — it only knows `Request`/`Response`. A
//! [`RouteHandlerAdapter`] is that value: it builds a `Context` for the
//! request, runs the application's [`ContextHandler`], and flattens any
//! `Err` it can't otherwise represent back into a `Response` via the
//! propagated `Result`. The route's own name is captured once at
//! registration time (`EngineBuilder::route`/`Group::route`), not
//! re-derived from the request, since by the time a request reaches this
//! adapter the router has already made that decision once.

use std::sync::Arc;

use anvil_core::error::Result;
use anvil_core::{Handler, Middleware, Pipeline};
use anvil_http::{Request, Response};
use async_trait::async_trait;

use crate::context::Context;
use crate::lifecycle::{AfterRouting, RouteMatched, RoutingError, Started};
use crate::runtime::Runtime;

/// A request id assigned once per request, before routing, and threaded
/// through `request.extensions` so every later stage (the adapter, the
/// lifecycle signals) shares the same value without recomputing it.
#[derive(Debug, Clone)]
pub(crate) struct RequestId(pub String);

/// The application-facing counterpart to `anvil_core::Handler`: consumes an
/// owned `Context` instead of a bare `Request`.
#[async_trait]
pub trait ContextHandler: Send + Sync {
    async fn handle(&self, ctx: Context) -> Result<Response>;
}

#[async_trait]
impl<F, Fut> ContextHandler for F
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Response>> + Send,
{
    async fn handle(&self, ctx: Context) -> Result<Response> {
        self(ctx).await
    }
}

/// Wraps a [`ContextHandler`] into an `anvil_core::Handler`, letting it sit
/// as a route's terminal handler in an ordinary `Pipeline`.
pub(crate) struct RouteHandlerAdapter {
    runtime: Arc<Runtime>,
    route_name: Option<String>,
    inner: Arc<dyn ContextHandler>,
}

impl RouteHandlerAdapter {
    pub(crate) fn new(
        runtime: Arc<Runtime>,
        route_name: Option<String>,
        inner: Arc<dyn ContextHandler>,
    ) -> Self {
        Self { runtime, route_name, inner }
    }
}

#[async_trait]
impl Handler for RouteHandlerAdapter {
    async fn handle(&self, request: Request) -> Result<Response> {
        let request_id = request
            .extensions
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_else(crate::ids::generate);
        let ctx = Context::new(
            self.runtime.clone(),
            request,
            self.route_name.clone(),
            request_id,
        )
        .await;
        self.inner.handle(ctx).await
    }
}

/// The engine's top-level terminal handler: resolves the route, fires the
/// routing lifecycle signals, and runs the matched route's own middleware
/// pipeline. Wrapped in the engine's *global* middleware (see
/// `Engine::handle`), so a global error-handler layer also sees
/// `NotFound`/`MethodNotAllowed` from this step.
pub(crate) struct RouteDispatch {
    pub(crate) router: Arc<anvil_router::Router>,
    pub(crate) runtime: Arc<Runtime>,
}

#[async_trait]
impl Handler for RouteDispatch {
    async fn handle(&self, mut request: Request) -> Result<Response> {
        let request_id = crate::ids::generate();
        request.extensions.insert(RequestId(request_id.clone()));

        self.runtime
            .signals
            .started
            .fire(
                None,
                &Started {
                    request_id: request_id.clone(),
                    method: request.method.to_string(),
                    path: request.path().to_string(),
                },
                &self.runtime.events,
            )
            .await;

        match self.router.resolve(&request.method, request.path()) {
            anvil_router::Resolution::Matched { route, params } => {
                request.set_params(params);
                self.runtime
                    .signals
                    .route_matched
                    .fire(
                        route.name.as_deref(),
                        &RouteMatched {
                            request_id: request_id.clone(),
                            route_name: route.name.clone(),
                            pattern: route.pattern.clone(),
                        },
                        &self.runtime.events,
                    )
                    .await;

                let pipeline = Pipeline::new(route.middleware.clone(), route.handler.clone());
                let result = pipeline.run(request).await;

                let status = result.as_ref().map(|r| r.status.as_u16()).ok();
                self.runtime
                    .signals
                    .after_routing
                    .fire(
                        route.name.as_deref(),
                        &AfterRouting {
                            request_id: request_id.clone(),
                            status: status.unwrap_or(0),
                        },
                        &self.runtime.events,
                    )
                    .await;

                self.fire_finished(route.name.as_deref(), &request_id, &result).await;
                result
            }
            anvil_router::Resolution::Redirect { location } => {
                let response = Response::redirect(&location, http::StatusCode::PERMANENT_REDIRECT);
                self.fire_finished(None, &request_id, &Ok(response.clone())).await;
                Ok(response)
            }
            anvil_router::Resolution::NotFound => {
                let err = anvil_core::Error::NotFound;
                self.fire_routing_error(&request_id, &err).await;
                Err(err)
            }
            anvil_router::Resolution::MethodNotAllowed { allowed } => {
                let err = anvil_core::Error::MethodNotAllowed { allowed };
                self.fire_routing_error(&request_id, &err).await;
                Err(err)
            }
        }
    }
}

impl RouteDispatch {
    async fn fire_routing_error(&self, request_id: &str, err: &anvil_core::Error) {
        self.runtime
            .signals
            .routing_error
            .fire(
                None,
                &RoutingError {
                    request_id: request_id.to_string(),
                    error: err.to_string(),
                },
                &self.runtime.events,
            )
            .await;
        self.fire_finished_raw(None, request_id, None, Some(err.to_string())).await;
    }

    async fn fire_finished(&self, sender: Option<&str>, request_id: &str, result: &Result<Response>) {
        let (status, error) = match result {
            Ok(resp) => (Some(resp.status.as_u16()), None),
            Err(err) => (None, Some(err.to_string())),
        };
        self.fire_finished_raw(sender, request_id, status, error).await;
    }

    async fn fire_finished_raw(
        &self,
        sender: Option<&str>,
        request_id: &str,
        status: Option<u16>,
        error: Option<String>,
    ) {
        self.runtime
            .signals
            .finished
            .fire(
                sender,
                &crate::lifecycle::Finished {
                    request_id: request_id.to_string(),
                    status,
                    error,
                },
                &self.runtime.events,
            )
            .await;
    }
}
