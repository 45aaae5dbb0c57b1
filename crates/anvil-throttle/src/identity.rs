//! Identity derivation: projecting `(client-ip, user-id, api-key, route)`
//! into a single string key a strategy can key its state on.

/// The inputs available when deriving an identity for a single evaluation.
/// Any of these may be absent; the default projection falls back to the
/// client IP.
#[derive(Debug, Clone, Default)]
pub struct IdentityInputs<'a> {
    pub client_ip: Option<&'a str>,
    pub user_id: Option<&'a str>,
    pub api_key: Option<&'a str>,
    pub route: Option<&'a str>,
}

/// A projection from [`IdentityInputs`] to the string key a policy's
/// strategy state is keyed on. Boxed so `RateLimitPolicy` can carry one per
/// policy without a generic parameter leaking through the engine.
pub trait IdentityStrategy: Send + Sync {
    fn derive(&self, inputs: &IdentityInputs<'_>) -> String;
}

/// `client-ip` only. The default for policies that don't configure one.
pub struct ByClientIp;

impl IdentityStrategy for ByClientIp {
    fn derive(&self, inputs: &IdentityInputs<'_>) -> String {
        inputs.client_ip.unwrap_or("unknown").to_string()
    }
}

/// `user-id`, falling back to `client-ip` for unauthenticated requests.
pub struct ByUser;

impl IdentityStrategy for ByUser {
    fn derive(&self, inputs: &IdentityInputs<'_>) -> String {
        match inputs.user_id {
            Some(id) => format!("user:{id}"),
            None => format!("ip:{}", inputs.client_ip.unwrap_or("unknown")),
        }
    }
}

/// `api-key`, falling back to `client-ip`.
pub struct ByApiKey;

impl IdentityStrategy for ByApiKey {
    fn derive(&self, inputs: &IdentityInputs<'_>) -> String {
        match inputs.api_key {
            Some(key) => format!("key:{key}"),
            None => format!("ip:{}", inputs.client_ip.unwrap_or("unknown")),
        }
    }
}

/// Scopes any other projection per-route, so the same client gets
/// independent budgets on different endpoints.
pub struct PerRoute<I: IdentityStrategy>(pub I);

impl<I: IdentityStrategy> IdentityStrategy for PerRoute<I> {
    fn derive(&self, inputs: &IdentityInputs<'_>) -> String {
        format!("{}:{}", inputs.route.unwrap_or("*"), self.0.derive(inputs))
    }
}

/// A plain closure as an [`IdentityStrategy`], for ad-hoc projections a
/// binary consumer doesn't want to name a type for.
pub struct FnIdentity<F>(pub F);

impl<F> IdentityStrategy for FnIdentity<F>
where
    F: Fn(&IdentityInputs<'_>) -> String + Send + Sync,
{
    fn derive(&self, inputs: &IdentityInputs<'_>) -> String {
        (self.0)(inputs)
    }
}

/// Build the default `(client-ip, user-id, api-key, route)` inputs out of a
/// live request. `client_ip` must be pre-formatted by the caller (a
/// `SocketAddr` doesn't borrow a `&str` of its own, and the request's
/// extensions may carry a proxy-resolved address instead of the socket
/// peer); `api_key` is read straight off the `X-Api-Key` header. `user_id`
/// comes from `anvil-auth`'s principal extraction, when installed upstream
/// of the rate-limit middleware, which this crate has no notion of.
pub fn inputs_from_request<'a>(
    request: &'a anvil_http::Request,
    client_ip: Option<&'a str>,
    user_id: Option<&'a str>,
    route: Option<&'a str>,
) -> IdentityInputs<'a> {
    IdentityInputs { client_ip, user_id, api_key: request.header("x-api-key"), route }
}
