//! `Route`: a `(method, pattern, handler)` triple plus middleware and an
//! optional OpenAPI schema descriptor.

use std::sync::Arc;

use anvil_core::Handler;
use http::Method;

use crate::segment::PatternSegment;

/// A registered route.
pub struct Route {
    pub method: Method,
    pub pattern: String,
    pub segments: Vec<PatternSegment>,
    /// Whether the pattern, as written, ends in `/` (ignoring the root
    /// pattern `/` itself, which always counts as trailing-slash-terminated).
    pub trailing_slash: bool,
    pub name: Option<String>,
    pub middleware: Vec<Arc<dyn anvil_core::Middleware>>,
    pub handler: Arc<dyn Handler>,
    /// Opaque OpenAPI schema descriptor; the engine core never interprets
    /// this, it just carries it through to whatever collaborator generates
    /// documentation.
    pub schema: Option<serde_json::Value>,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("name", &self.name)
            .field("middleware_count", &self.middleware.len())
            .finish()
    }
}

/// Builds a [`Route`] before it's handed to [`crate::Router::insert`].
pub struct RouteBuilder {
    method: Method,
    pattern: String,
    name: Option<String>,
    middleware: Vec<Arc<dyn anvil_core::Middleware>>,
    handler: Arc<dyn Handler>,
    schema: Option<serde_json::Value>,
}

impl RouteBuilder {
    pub fn new(method: Method, pattern: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        Self {
            method,
            pattern: pattern.into(),
            name: None,
            middleware: Vec::new(),
            handler,
            schema: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn middleware(mut self, middleware: Arc<dyn anvil_core::Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn build(self) -> anvil_core::error::Result<Route> {
        let segments = crate::segment::parse_pattern(&self.pattern)?;
        let trailing_slash = self.pattern == "/" || self.pattern.ends_with('/');
        Ok(Route {
            method: self.method,
            pattern: self.pattern,
            segments,
            trailing_slash,
            name: self.name,
            middleware: self.middleware,
            handler: self.handler,
            schema: self.schema,
        })
    }
}

/// One entry in [`crate::Router::build_route_manifest`]'s output — the
/// shape a `routes:dump`-style CLI collaborator would consume.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RouteManifestEntry {
    pub method: String,
    pub pattern: String,
    pub name: Option<String>,
    pub middleware: Vec<String>,
}
