//! Gate/policy evaluation: a small `Gate` trait plus a handful of
//! built-ins (`AllowAny`, `IsAuthenticated`, `HasRole`, `IsActiveUser`)
//! composable via `AllOf`/`AnyOf`.

use async_trait::async_trait;

use crate::principal::Principal;

/// The information a [`Gate`] needs to decide, independent of the concrete
/// `Request`/`Context` types in `anvil-http`/`anvil-web` so this crate
/// doesn't have to depend on either.
pub struct GateContext<'a> {
    pub principal: Option<&'a Principal>,
    pub path: &'a str,
    pub method: &'a str,
}

impl<'a> GateContext<'a> {
    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }
}

/// A single authorization rule. Composable via [`AllOf`]/[`AnyOf`].
#[async_trait]
pub trait Gate: Send + Sync {
    async fn allows(&self, context: &GateContext<'_>) -> bool;
}

/// Grants access unconditionally.
#[derive(Clone, Copy, Default)]
pub struct AllowAny;

#[async_trait]
impl Gate for AllowAny {
    async fn allows(&self, _context: &GateContext<'_>) -> bool {
        true
    }
}

/// Requires any principal, active or not. Mirrors `IsAuthenticated`.
#[derive(Clone, Copy, Default)]
pub struct IsAuthenticated;

#[async_trait]
impl Gate for IsAuthenticated {
    async fn allows(&self, context: &GateContext<'_>) -> bool {
        context.is_authenticated()
    }
}

/// Requires an authenticated principal with `is_active`. Mirrors
/// `IsActiveUser`.
#[derive(Clone, Copy, Default)]
pub struct IsActiveUser;

#[async_trait]
impl Gate for IsActiveUser {
    async fn allows(&self, context: &GateContext<'_>) -> bool {
        context.principal.map(|p| p.is_active).unwrap_or(false)
    }
}

/// Requires an authenticated, active principal carrying `role`.
pub struct HasRole {
    pub role: String,
}

impl HasRole {
    pub fn new(role: impl Into<String>) -> Self {
        Self { role: role.into() }
    }
}

#[async_trait]
impl Gate for HasRole {
    async fn allows(&self, context: &GateContext<'_>) -> bool {
        context.principal.map(|p| p.is_active && p.has_role(&self.role)).unwrap_or(false)
    }
}

/// Grants access only if every inner gate does.
pub struct AllOf(pub Vec<Box<dyn Gate>>);

#[async_trait]
impl Gate for AllOf {
    async fn allows(&self, context: &GateContext<'_>) -> bool {
        for gate in &self.0 {
            if !gate.allows(context).await {
                return false;
            }
        }
        true
    }
}

/// Grants access if any inner gate does.
pub struct AnyOf(pub Vec<Box<dyn Gate>>);

#[async_trait]
impl Gate for AnyOf {
    async fn allows(&self, context: &GateContext<'_>) -> bool {
        for gate in &self.0 {
            if gate.allows(context).await {
                return true;
            }
        }
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::AuthSource;

    #[tokio::test]
    async fn is_authenticated_rejects_anonymous() {
        let gate = IsAuthenticated;
        let ctx = GateContext { principal: None, path: "/", method: "GET" };
        assert!(!gate.allows(&ctx).await);
    }

    #[tokio::test]
    async fn has_role_requires_active_and_matching_role() {
        let principal = Principal::new("u1", AuthSource::Session).with_roles(["admin"]);
        let gate = HasRole::new("admin");
        let ctx = GateContext { principal: Some(&principal), path: "/", method: "GET" };
        assert!(gate.allows(&ctx).await);

        let gate = HasRole::new("superadmin");
        assert!(!gate.allows(&ctx).await);
    }

    #[tokio::test]
    async fn all_of_short_circuits_on_first_denial() {
        let gate = AllOf(vec![Box::new(AllowAny), Box::new(IsAuthenticated)]);
        let ctx = GateContext { principal: None, path: "/", method: "GET" };
        assert!(!gate.allows(&ctx).await);
    }

    #[tokio::test]
    async fn any_of_empty_allows_by_vacuous_truth() {
        let gate = AnyOf(Vec::new());
        let ctx = GateContext { principal: None, path: "/", method: "GET" };
        assert!(gate.allows(&ctx).await);
    }
}
