//! The per-method radix-like route trie.

use std::collections::HashMap;
use std::sync::Arc;

use anvil_core::error::{Error, Result};

use crate::TrailingSlashPolicy;
use crate::route::{Route, RouteManifestEntry};
use crate::segment::{PatternSegment, Segment};

#[derive(Default)]
pub(crate) struct Node {
    literal_children: HashMap<String, Box<Node>>,
    /// Tried in insertion order; same-kind ties resolve to whichever was
    /// inserted first, per the router's documented tie-break.
    param_children: Vec<ParamChild>,
    wildcard_child: Option<(String, Box<Node>)>,
    route: Option<Arc<Route>>,
}

struct ParamChild {
    name: String,
    constraint: crate::constraint::Constraint,
    node: Box<Node>,
}

impl Node {
    fn insert(&mut self, segments: &[PatternSegment], idx: usize, route: Arc<Route>) -> Result<()> {
        if idx == segments.len() {
            if self.route.is_some() {
                return Err(Error::RouteConflict(format!(
                    "duplicate route for pattern `{}`",
                    route.pattern
                )));
            }
            self.route = Some(route);
            return Ok(());
        }

        let seg = &segments[idx];
        if seg.optional && self.route.is_none() {
            // The pattern may also end right before this segment.
            self.route = Some(route.clone());
        } else if seg.optional {
            return Err(Error::RouteConflict(format!(
                "duplicate route for pattern `{}`",
                route.pattern
            )));
        }

        match &seg.segment {
            Segment::Literal(lit) => {
                let child = self
                    .literal_children
                    .entry(lit.clone())
                    .or_insert_with(|| Box::new(Node::default()));
                child.insert(segments, idx + 1, route)
            }
            Segment::Param { name, constraint } => {
                if let Some(existing) = self
                    .param_children
                    .iter_mut()
                    .find(|c| &c.constraint == constraint && &c.name == name)
                {
                    existing.node.insert(segments, idx + 1, route)
                } else {
                    let mut node = Box::new(Node::default());
                    node.insert(segments, idx + 1, route)?;
                    self.param_children.push(ParamChild {
                        name: name.clone(),
                        constraint: constraint.clone(),
                        node,
                    });
                    Ok(())
                }
            }
            Segment::Wildcard { name } => {
                if self.wildcard_child.is_some() {
                    return Err(Error::RouteConflict(format!(
                        "duplicate wildcard route for pattern `{}`",
                        route.pattern
                    )));
                }
                let mut node = Box::new(Node::default());
                node.route = Some(route);
                self.wildcard_child = Some((name.clone(), node));
                Ok(())
            }
        }
    }

    /// Walk `path_segments[idx..]` against this subtree, preferring a
    /// literal child, then typed params in declaration order, then a
    /// wildcard. No backtracking across a committed branch: once a
    /// candidate child is chosen and the remainder fails to resolve under
    /// it, the walk does not retry sibling branches at this level.
    fn resolve<'a>(
        &self,
        path_segments: &[&'a str],
        idx: usize,
        params: &mut Vec<(String, String)>,
    ) -> Option<Arc<Route>> {
        if idx == path_segments.len() {
            return self.route.clone();
        }
        let current = path_segments[idx];

        if let Some(child) = self.literal_children.get(current) {
            return child.resolve(path_segments, idx + 1, params);
        }

        for candidate in &self.param_children {
            if candidate.constraint.validate(current) {
                params.push((candidate.name.clone(), current.to_string()));
                if let Some(route) = candidate.node.resolve(path_segments, idx + 1, params) {
                    return Some(route);
                }
                params.pop();
            }
        }

        if let Some((name, node)) = &self.wildcard_child {
            let remainder = path_segments[idx..].join("/");
            params.push((name.clone(), remainder));
            return node.route.clone();
        }

        None
    }
}

/// Outcome of [`Router::resolve`].
pub enum Resolution {
    Matched { route: Arc<Route>, params: HashMap<String, String> },
    /// A safe-method request matched a route whose trailing-slash form
    /// differs from the request path, under [`TrailingSlashPolicy::Redirect`].
    Redirect { location: String },
    NotFound,
    MethodNotAllowed { allowed: Vec<http::Method> },
}

/// A mapping from HTTP method to its own route trie.
pub struct Router {
    methods: HashMap<http::Method, Node>,
    trailing_slash_policy: TrailingSlashPolicy,
    /// Every inserted route, in insertion order — the trie itself has no
    /// flat traversal, so this is what `build_route_manifest` walks.
    routes: Vec<Arc<Route>>,
}

impl Default for Router {
    fn default() -> Self {
        Self {
            methods: HashMap::new(),
            trailing_slash_policy: TrailingSlashPolicy::default(),
            routes: Vec::new(),
        }
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trailing_slash_policy(mut self, policy: TrailingSlashPolicy) -> Self {
        self.trailing_slash_policy = policy;
        self
    }

    pub fn insert(&mut self, route: Route) -> Result<Arc<Route>> {
        let route = Arc::new(route);
        self.insert_arc(route.clone())?;
        Ok(route)
    }

    /// Insert a route that's already behind an `Arc`, e.g. one also held by
    /// a [`crate::naming::NameRegistry`] so both structures share one
    /// allocation.
    pub fn insert_arc(&mut self, route: Arc<Route>) -> Result<()> {
        let node = self.methods.entry(route.method.clone()).or_default();
        node.insert(&route.segments, 0, route.clone())?;
        self.routes.push(route);
        Ok(())
    }

    /// The shape a `routes:dump`-style CLI collaborator consumes: every
    /// registered route, in insertion order, with its middleware stack
    /// named rather than carried as live `Arc<dyn Middleware>` values.
    pub fn build_route_manifest(&self) -> Vec<RouteManifestEntry> {
        self.routes
            .iter()
            .map(|route| RouteManifestEntry {
                method: route.method.to_string(),
                pattern: route.pattern.clone(),
                name: route.name.clone(),
                middleware: route.middleware.iter().map(|mw| mw.name().to_string()).collect(),
            })
            .collect()
    }

    pub fn resolve(&self, method: &http::Method, path: &str) -> Resolution {
        let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let path_has_trailing_slash = path == "/" || path.ends_with('/');

        if let Some(root) = self.methods.get(method) {
            let mut params = Vec::new();
            if let Some(route) = root.resolve(&path_segments, 0, &mut params) {
                if route.trailing_slash != path_has_trailing_slash {
                    match self.trailing_slash_policy {
                        TrailingSlashPolicy::Ignore => {}
                        TrailingSlashPolicy::Strict => return Resolution::NotFound,
                        TrailingSlashPolicy::Redirect => {
                            let safe = matches!(*method, http::Method::GET | http::Method::HEAD);
                            if safe {
                                let location = if route.trailing_slash {
                                    format!("{path}/")
                                } else {
                                    path.trim_end_matches('/').to_string()
                                };
                                return Resolution::Redirect { location };
                            }
                            return Resolution::NotFound;
                        }
                    }
                }
                return Resolution::Matched {
                    route,
                    params: params.into_iter().collect(),
                };
            }
        }

        let mut allowed: Vec<http::Method> = self
            .methods
            .iter()
            .filter(|(m, _)| *m != method)
            .filter_map(|(m, node)| {
                let mut params = Vec::new();
                node.resolve(&path_segments, 0, &mut params).map(|_| m.clone())
            })
            .collect();

        if allowed.is_empty() {
            Resolution::NotFound
        } else {
            allowed.sort_by_key(|m| m.to_string());
            Resolution::MethodNotAllowed { allowed }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::RouteBuilder;
    use anvil_core::{Handler, Result as CoreResult};
    use anvil_http::{Request, Response};
    use async_trait::async_trait;
    use http::Method;

    struct Ok200;
    #[async_trait]
    impl Handler for Ok200 {
        async fn handle(&self, _req: Request) -> CoreResult<Response> {
            Ok(Response::ok())
        }
    }

    fn route(method: Method, pattern: &str) -> Route {
        RouteBuilder::new(method, pattern, Arc::new(Ok200)).build().unwrap()
    }

    #[test]
    fn matches_typed_int_param() {
        let mut router = Router::new();
        router.insert(route(Method::GET, "/users/{id:int}")).unwrap();

        match router.resolve(&Method::GET, "/users/42") {
            Resolution::Matched { params, .. } => assert_eq!(params.get("id"), Some(&"42".to_string())),
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn rejects_non_int_segment() {
        let mut router = Router::new();
        router.insert(route(Method::GET, "/users/{id:int}")).unwrap();

        assert!(matches!(router.resolve(&Method::GET, "/users/abc"), Resolution::NotFound));
    }

    #[test]
    fn method_not_allowed_lists_allowed_methods_sorted() {
        let mut router = Router::new();
        router.insert(route(Method::GET, "/a")).unwrap();
        router.insert(route(Method::POST, "/a")).unwrap();

        match router.resolve(&Method::DELETE, "/a") {
            Resolution::MethodNotAllowed { allowed } => {
                assert_eq!(allowed, vec![Method::GET, Method::POST]);
            }
            _ => panic!("expected method not allowed"),
        }
    }

    #[test]
    fn literal_beats_typed_param_at_same_position() {
        let mut router = Router::new();
        router.insert(route(Method::GET, "/users/new")).unwrap();
        router.insert(route(Method::GET, "/users/{id:int}")).unwrap();

        match router.resolve(&Method::GET, "/users/new") {
            Resolution::Matched { route, .. } => assert_eq!(route.pattern, "/users/new"),
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn wildcard_consumes_remaining_segments() {
        let mut router = Router::new();
        router.insert(route(Method::GET, "/assets/{path*}")).unwrap();

        match router.resolve(&Method::GET, "/assets/css/site.css") {
            Resolution::Matched { params, .. } => {
                assert_eq!(params.get("path"), Some(&"css/site.css".to_string()));
            }
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn duplicate_pattern_conflicts() {
        let mut router = Router::new();
        router.insert(route(Method::GET, "/a")).unwrap();
        let err = router.insert(route(Method::GET, "/a")).unwrap_err();
        assert!(matches!(err, Error::RouteConflict(_)));
    }

    #[test]
    fn trailing_slash_redirect_on_safe_method_only() {
        let mut router = Router::new().with_trailing_slash_policy(crate::TrailingSlashPolicy::Redirect);
        router.insert(route(Method::GET, "/items/")).unwrap();
        router.insert(route(Method::POST, "/items/")).unwrap();

        match router.resolve(&Method::GET, "/items") {
            Resolution::Redirect { location } => assert_eq!(location, "/items/"),
            _ => panic!("expected redirect"),
        }
        assert!(matches!(router.resolve(&Method::POST, "/items"), Resolution::NotFound));
    }

    #[test]
    fn optional_trailing_segment_matches_both_lengths() {
        let mut router = Router::new();
        router.insert(route(Method::GET, "/users/{id:int}/edit?")).unwrap();

        assert!(matches!(router.resolve(&Method::GET, "/users/1"), Resolution::Matched { .. }));
        assert!(matches!(router.resolve(&Method::GET, "/users/1/edit"), Resolution::Matched { .. }));
    }
}
