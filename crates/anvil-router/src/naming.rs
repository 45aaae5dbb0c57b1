//! Named routes and reverse routing (`url(name, params)`).

use std::collections::HashMap;
use std::sync::Arc;

use anvil_core::error::{Error, Result};

use crate::route::Route;
use crate::segment::Segment;

/// Registry of named routes, built up as routes are inserted and consulted
/// by [`NameRegistry::url`] to reconstruct a concrete path.
#[derive(Default)]
pub struct NameRegistry {
    routes: HashMap<String, Arc<Route>>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `route` under its dotted name (group prefixes already
    /// folded in by the caller). Fails if the name is already taken.
    pub fn register(&mut self, route: Arc<Route>) -> Result<()> {
        let Some(name) = route.name.clone() else { return Ok(()) };
        if self.routes.contains_key(&name) {
            return Err(Error::NamedRouteError(format!("route name `{name}` is already registered")));
        }
        self.routes.insert(name, route);
        Ok(())
    }

    /// Reconstruct a concrete path for `name`, substituting `params` into
    /// typed/wildcard segments and validating each against its constraint.
    pub fn url(&self, name: &str, params: &HashMap<String, String>) -> Result<String> {
        let route = self
            .routes
            .get(name)
            .ok_or_else(|| Error::NamedRouteError(format!("no route named `{name}`")))?;

        let mut path = String::new();
        for seg in &route.segments {
            path.push('/');
            match &seg.segment {
                Segment::Literal(lit) => path.push_str(lit),
                Segment::Param { name: param_name, constraint } => {
                    let value = params.get(param_name).ok_or_else(|| {
                        Error::NamedRouteError(format!("missing parameter `{param_name}` for route `{name}`"))
                    })?;
                    if !constraint.validate(value) {
                        return Err(Error::NamedRouteError(format!(
                            "value `{value}` for parameter `{param_name}` does not satisfy its constraint"
                        )));
                    }
                    path.push_str(value);
                }
                Segment::Wildcard { name: param_name } => {
                    let value = params.get(param_name).ok_or_else(|| {
                        Error::NamedRouteError(format!("missing parameter `{param_name}` for route `{name}`"))
                    })?;
                    path.push_str(value);
                }
            }
        }
        if path.is_empty() {
            path.push('/');
        }
        Ok(path)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Route>> {
        self.routes.get(name)
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

    #[test]
    fn reverse_routes_typed_params() {
        let mut registry = NameRegistry::new();
        let route = RouteBuilder::new(Method::GET, "/users/{id:int}", Arc::new(Ok200))
            .name("users.show")
            .build()
            .unwrap();
        registry.register(Arc::new(route)).unwrap();

        let mut params = HashMap::new();
        params.insert("id".to_string(), "42".to_string());
        assert_eq!(registry.url("users.show", &params).unwrap(), "/users/42");
    }

    #[test]
    fn unknown_param_errors() {
        let mut registry = NameRegistry::new();
        let route = RouteBuilder::new(Method::GET, "/users/{id:int}", Arc::new(Ok200))
            .name("users.show")
            .build()
            .unwrap();
        registry.register(Arc::new(route)).unwrap();

        assert!(registry.url("users.show", &HashMap::new()).is_err());
    }

    #[test]
    fn roundtrips_with_resolve() {
        use crate::trie::Router;

        let mut router = Router::new();
        let mut registry = NameRegistry::new();
        let route = Arc::new(
            RouteBuilder::new(Method::GET, "/users/{id:int}", Arc::new(Ok200))
                .name("users.show")
                .build()
                .unwrap(),
        );
        registry.register(route.clone()).unwrap();
        router.insert_arc(route).unwrap();

        let mut params = HashMap::new();
        params.insert("id".to_string(), "42".to_string());
        let path = registry.url("users.show", &params).unwrap();

        match router.resolve(&Method::GET, &path) {
            crate::trie::Resolution::Matched { params: resolved, .. } => {
                assert_eq!(resolved, params);
            }
            _ => panic!("expected match"),
        }
    }
}
