//! Session-vs-token strategy selection: basic/bearer-token auth and
//! cookie-session auth unified behind one `AuthStrategy` seam so the
//! orchestrator doesn't need to special-case each.

use async_trait::async_trait;

use crate::principal::Principal;

/// What an [`AuthStrategy`] needs from the request to attempt extraction,
/// independent of `anvil-http::Request` so this crate stays decoupled
/// from the wire-level request type.
pub struct AuthRequest<'a> {
    pub header: Box<dyn Fn(&str) -> Option<&'a str> + 'a>,
    pub cookie: Box<dyn Fn(&str) -> Option<&'a str> + 'a>,
}

/// One way of extracting a [`Principal`] from a request. An
/// [`AuthOrchestrator`] tries each registered strategy in order and uses
/// the first that matches.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(Some(_))`: matched and produced a principal. `Ok(None)`: this
    /// strategy doesn't apply to this request (e.g. no `Authorization`
    /// header) — the orchestrator tries the next one. `Err`: the
    /// strategy applies but extraction failed (e.g. an expired token).
    async fn extract(&self, request: &AuthRequest<'_>) -> crate::error::Result<Option<Principal>>;
}

/// Bearer-token strategy: matches any request carrying an
/// `Authorization: Bearer <token>` header and hands the raw token to a
/// caller-supplied verifier (JWT decoding, an opaque-token lookup, etc. —
/// out of scope here).
pub struct BearerTokenStrategy<F> {
    verify: F,
}

impl<F> BearerTokenStrategy<F>
where
    F: Fn(&str) -> Option<Principal> + Send + Sync,
{
    pub fn new(verify: F) -> Self {
        Self { verify }
    }
}

#[async_trait]
impl<F> AuthStrategy for BearerTokenStrategy<F>
where
    F: Fn(&str) -> Option<Principal> + Send + Sync,
{
    fn name(&self) -> &'static str {
        "bearer_token"
    }

    async fn extract(&self, request: &AuthRequest<'_>) -> crate::error::Result<Option<Principal>> {
        let Some(header) = (request.header)("authorization") else { return Ok(None) };
        let Some(token) = header.strip_prefix("Bearer ") else { return Ok(None) };
        Ok((self.verify)(token))
    }
}

/// Cookie-session strategy: matches any request carrying the named
/// session cookie and resolves the principal from its stored `user_id`.
pub struct SessionCookieStrategy<F> {
    cookie_name: String,
    resolve: F,
}

impl<F> SessionCookieStrategy<F>
where
    F: Fn(&str) -> Option<Principal> + Send + Sync,
{
    pub fn new(cookie_name: impl Into<String>, resolve: F) -> Self {
        Self { cookie_name: cookie_name.into(), resolve }
    }
}

#[async_trait]
impl<F> AuthStrategy for SessionCookieStrategy<F>
where
    F: Fn(&str) -> Option<Principal> + Send + Sync,
{
    fn name(&self) -> &'static str {
        "session_cookie"
    }

    async fn extract(&self, request: &AuthRequest<'_>) -> crate::error::Result<Option<Principal>> {
        let Some(session_id) = (request.cookie)(&self.cookie_name) else { return Ok(None) };
        Ok((self.resolve)(session_id))
    }
}

/// Tries each registered [`AuthStrategy`] in order, returning the first
/// match. Holds no state of its own beyond the ordered strategy list —
/// each strategy owns whatever lookup it needs.
#[derive(Default)]
pub struct AuthOrchestrator {
    strategies: Vec<Box<dyn AuthStrategy>>,
}

impl AuthOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: impl AuthStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Returns the first strategy's successful extraction, or `None` if
    /// none matched (anonymous request, not an error).
    pub async fn authenticate(&self, request: &AuthRequest<'_>) -> crate::error::Result<Option<Principal>> {
        for strategy in &self.strategies {
            if let Some(principal) = strategy.extract(request).await? {
                tracing::debug!(strategy = strategy.name(), "authenticated via strategy");
                return Ok(Some(principal));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::AuthSource;

    fn request_with<'a>(header_val: Option<&'a str>, cookie_val: Option<&'a str>) -> AuthRequest<'a> {
        AuthRequest {
            header: Box::new(move |name| if name == "authorization" { header_val } else { None }),
            cookie: Box::new(move |name| if name == "session_id" { cookie_val } else { None }),
        }
    }

    #[tokio::test]
    async fn falls_through_to_second_strategy_when_first_does_not_match() {
        let orchestrator = AuthOrchestrator::new()
            .with_strategy(BearerTokenStrategy::new(|_token| None))
            .with_strategy(SessionCookieStrategy::new("session_id", |id| {
                Some(Principal::new(id, AuthSource::Session))
            }));

        let request = request_with(None, Some("sess-abc"));
        let principal = orchestrator.authenticate(&request).await.unwrap().unwrap();
        assert_eq!(principal.id, "sess-abc");
        assert_eq!(principal.source, AuthSource::Session);
    }

    #[tokio::test]
    async fn no_matching_strategy_yields_anonymous() {
        let orchestrator = AuthOrchestrator::new().with_strategy(BearerTokenStrategy::new(|_| None));
        let request = request_with(None, None);
        assert!(orchestrator.authenticate(&request).await.unwrap().is_none());
    }
}
