//! The per-request façade handlers actually program against.
//!
//! `Context` is owned by value within the single task handling one request:
//! everything it mutates (the cookie jar, pending headers, the lazily loaded
//! session) is plain `&mut self` state, not behind a lock — there is exactly
//! one task that ever sees a given `Context`.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use anvil_core::binding::{self, MultipartForm, Validate};
use anvil_core::error::{Error, Result};
use anvil_core::negotiate;
use anvil_di::Container;
use anvil_http::conditional::chrono_lite::HttpDate;
use anvil_http::{Cookie, CookieJar, ConditionalOutcome, ETag, Request, Response};
use http::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::runtime::Runtime;

#[cfg(feature = "auth")]
use anvil_auth::{Principal, Session};

/// Everything a handler needs to read the request, build a response, and
/// reach the engine's collaborators (DI scope, session, reverse routing,
/// negotiation) without threading them through as separate arguments.
pub struct Context {
    runtime: Arc<Runtime>,
    request: Request,
    route_name: Option<String>,
    request_id: String,
    scope: Container,
    cookies: CookieJar,
    pending_headers: Vec<(http::HeaderName, String)>,
    cancel: anvil_core::CancelToken,
    #[cfg(feature = "auth")]
    principal: Option<Principal>,
    #[cfg(feature = "auth")]
    session: Option<Session>,
}

impl Context {
    pub(crate) async fn new(
        runtime: Arc<Runtime>,
        request: Request,
        route_name: Option<String>,
        request_id: String,
    ) -> Self {
        let scope = runtime.container.create_scope();
        let cancel = request
            .extensions
            .get::<anvil_core::CancelToken>()
            .cloned()
            .unwrap_or_else(anvil_core::CancelToken::never);
        let cookies = request
            .header("cookie")
            .map(CookieJar::parse)
            .unwrap_or_default();

        #[cfg(feature = "auth")]
        let principal = {
            let headers_ref = &request.headers;
            let cookie_header = request.header("cookie");
            let auth_request = anvil_auth::AuthRequest {
                header: Box::new(move |name| headers_ref.get(name).and_then(|v| v.to_str().ok())),
                cookie: Box::new(move |name| cookie_header.and_then(|h| find_cookie_value(h, name))),
            };
            runtime.auth.authenticate(&auth_request).await.unwrap_or(None)
        };

        Self {
            runtime,
            request,
            route_name,
            request_id,
            scope,
            cookies,
            pending_headers: Vec::new(),
            cancel,
            #[cfg(feature = "auth")]
            principal,
            #[cfg(feature = "auth")]
            session: None,
        }
    }

    // ---- request metadata -------------------------------------------------

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn method(&self) -> &http::Method {
        &self.request.method
    }

    pub fn path(&self) -> &str {
        self.request.path()
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The current route's declared name, if it has one.
    pub fn route_name(&self) -> Option<&str> {
        self.route_name.as_deref()
    }

    pub fn cancel_token(&self) -> &anvil_core::CancelToken {
        &self.cancel
    }

    // ---- params ------------------------------------------------------------

    pub fn param(&self, name: &str) -> Option<&str> {
        self.request.params().get(name).map(|s| s.as_str())
    }

    pub fn require_param(&self, name: &str) -> Result<&str> {
        self.param(name)
            .ok_or_else(|| Error::MissingParam(name.to_string()))
    }

    /// Parse a param into `T`, e.g. `ctx.param_as::<u64>("id")`.
    pub fn param_as<T: FromStr>(&self, name: &str) -> Result<T> {
        let raw = self.require_param(name)?;
        raw.parse()
            .map_err(|_| Error::Binding(format!("parameter `{name}` has the wrong shape")))
    }

    // ---- binding -------------------------------------------------------------

    pub fn bind_json<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        binding::bind_json(&self.request)
    }

    pub fn bind_form<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        binding::bind_form(&self.request)
    }

    pub fn bind_query<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        binding::bind_query(&self.request)
    }

    pub async fn bind_multipart<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        binding::bind_multipart(&self.request).await
    }

    pub async fn multipart(&self) -> Result<MultipartForm> {
        binding::parse_multipart(&self.request).await
    }

    pub fn bind_xml<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        binding::bind_xml(&self.request)
    }

    // ---- headers / cookies --------------------------------------------------

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    /// Queue a header to be applied to whatever response this handler
    /// eventually returns. Unlike mutating a `Response` directly, this
    /// survives across an early `?` return from a fallible handler body
    /// that builds the response at the very end.
    pub fn set_header(&mut self, name: http::HeaderName, value: impl Into<String>) {
        self.pending_headers.push((name, value.into()));
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name)
    }

    pub fn set_cookie(&mut self, cookie: Cookie) {
        self.cookies.set(cookie);
    }

    pub fn remove_cookie(&mut self, name: &str) {
        self.cookies.remove(name);
    }

    // ---- DI scope ------------------------------------------------------------

    /// The request-scoped service container. Bindings with `Scope::Request`
    /// are memoized here for the lifetime of this `Context`.
    pub fn container(&self) -> &Container {
        &self.scope
    }

    pub async fn make<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.scope.make::<T>().await.map_err(Error::from)
    }

    // ---- session (auth feature) ------------------------------------------

    #[cfg(feature = "auth")]
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    #[cfg(feature = "auth")]
    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    /// Lazily loads the session tied to the `session_id` cookie, creating
    /// one bound to a fresh id if none exists yet. Returns an error if no
    /// session store was configured on the engine.
    #[cfg(feature = "auth")]
    pub async fn session(&mut self) -> Result<&mut Session> {
        if self.session.is_none() {
            let store = self
                .runtime
                .session_store
                .clone()
                .ok_or_else(|| Error::State("no session store configured".into()))?;
            let id = self
                .cookies
                .get("session_id")
                .map(|s| s.to_string())
                .unwrap_or_else(crate::ids::generate);
            let session = Session::load(store, id).await.map_err(Error::from)?;
            self.session = Some(session);
        }
        Ok(self.session.as_mut().expect("session just populated"))
    }

    // ---- content negotiation ------------------------------------------------

    pub fn negotiate(
        &self,
        offers: &[&str],
        default_offer: Option<&str>,
    ) -> Option<anvil_core::NegotiatedMediaType> {
        negotiate(self.request.header("accept"), offers, default_offer)
    }

    // ---- conditional shortcut -------------------------------------------------

    /// Evaluate the current request's conditional headers against an ETag
    /// the handler has just computed, returning `Some(response)` when the
    /// caller should short-circuit (`304`/`412`) rather than render the
    /// full body. Complements `anvil_middleware::conditional`'s middleware
    /// form, which covers validators known before the handler runs.
    pub async fn if_none_match(
        &mut self,
        etag: &ETag,
        last_modified: Option<HttpDate>,
    ) -> Result<Option<Response>> {
        match anvil_http::evaluate_conditional(
            &self.request.method,
            &self.request.headers,
            Some(etag),
            last_modified.as_ref(),
        ) {
            ConditionalOutcome::Proceed => Ok(None),
            ConditionalOutcome::NotModified => {
                let mut resp = Response::new(StatusCode::NOT_MODIFIED);
                resp.set_header(http::header::ETAG, &etag.to_header_value());
                Ok(Some(self.finish(resp).await?))
            }
            ConditionalOutcome::PreconditionFailed => Err(Error::PreconditionFailed),
        }
    }

    // ---- reverse routing -----------------------------------------------------

    pub fn url(&self, name: &str, params: &HashMap<String, String>) -> Result<String> {
        self.runtime.names.read().url(name, params)
    }

    // ---- response building ----------------------------------------------------

    pub async fn json<T: Serialize>(&mut self, value: &T) -> Result<Response> {
        let resp = Response::json(value).map_err(|e| Error::Internal(e.into()))?;
        self.finish(resp).await
    }

    pub async fn json_with_status<T: Serialize>(
        &mut self,
        value: &T,
        status: http::StatusCode,
    ) -> Result<Response> {
        let resp = Response::json_with_status(value, status).map_err(|e| Error::Internal(e.into()))?;
        self.finish(resp).await
    }

    pub async fn html(&mut self, body: impl Into<bytes::Bytes>) -> Result<Response> {
        self.finish(Response::html(body)).await
    }

    pub async fn text(&mut self, body: impl Into<bytes::Bytes>) -> Result<Response> {
        self.finish(Response::text(body)).await
    }

    pub async fn no_content(&mut self) -> Result<Response> {
        self.finish(Response::no_content()).await
    }

    pub async fn redirect(&mut self, location: &str) -> Result<Response> {
        self.finish(Response::redirect(location, StatusCode::FOUND)).await
    }

    pub async fn redirect_with_status(&mut self, location: &str, status: http::StatusCode) -> Result<Response> {
        self.finish(Response::redirect(location, status)).await
    }

    /// Serve a byte body as a file download, setting `Content-Disposition`
    /// and computing the engine's configured ETag strategy against it.
    pub async fn file(
        &mut self,
        filename: &str,
        content_type: &str,
        bytes: impl Into<bytes::Bytes>,
    ) -> Result<Response> {
        let bytes = bytes.into();
        let mut resp = Response::builder()
            .header(http::header::CONTENT_TYPE, content_type)
            .header(
                http::header::CONTENT_DISPOSITION,
                &format!("attachment; filename=\"{filename}\""),
            )
            .body(bytes.clone())
            .build();
        if let Some(etag) = self.runtime.etag_strategy.resolve(&bytes) {
            resp.set_header(http::header::ETAG, &etag.to_header_value());
        }
        self.finish(resp).await
    }

    /// Stream a precomputed set of chunks as a single concatenated body.
    ///
    /// The underlying transport (`anvil-server`) buffers bodies fully before
    /// handing a `Response` back to `hyper`, so "streaming" here means
    /// deferring assembly to the last possible moment rather than true
    /// chunked transfer — callers that need backpressure-aware streaming
    /// should look to the transport layer instead.
    pub async fn stream(&mut self, content_type: &str, chunks: Vec<bytes::Bytes>) -> Result<Response> {
        let mut body = bytes::BytesMut::new();
        for chunk in chunks {
            body.extend_from_slice(&chunk);
        }
        let resp = Response::builder()
            .header(http::header::CONTENT_TYPE, content_type)
            .body(body.freeze())
            .build();
        self.finish(resp).await
    }

    /// Renders `name` against `data` through the engine's configured
    /// [`crate::render::Renderer`], then hands the result through the same
    /// pending-header/cookie/session path as every other response method.
    /// Fails with `Error::State` if no renderer was configured.
    pub async fn template<T: Serialize>(&mut self, name: &str, data: &T) -> Result<Response> {
        let renderer = self
            .runtime
            .renderer
            .clone()
            .ok_or_else(|| Error::State("no template renderer configured".into()))?;
        let value = serde_json::to_value(data).map_err(|e| Error::Internal(e.into()))?;
        let body = renderer.render(name, value).await.map_err(Error::Internal)?;
        self.finish(Response::html(body)).await
    }

    /// Applies queued headers/cookies, then persists the session (if one
    /// was loaded and is dirty) and makes sure its id cookie rides along
    /// on the response that triggered the save — this is the only point
    /// in a request's lifetime where that's guaranteed to still be
    /// reachable, since `Context` is otherwise consumed by the handler
    /// that built this response.
    async fn finish(&mut self, mut response: Response) -> Result<Response> {
        self.apply_pending(&mut response);
        #[cfg(feature = "auth")]
        self.finish_session(&mut response).await?;
        Ok(response)
    }

    fn apply_pending(&self, response: &mut Response) {
        for (name, value) in &self.pending_headers {
            response.set_header(name.clone(), value);
        }
        for cookie in self.cookies.outgoing() {
            response.add_header(http::header::SET_COOKIE, &cookie.to_header_value());
        }
    }

    #[cfg(feature = "auth")]
    async fn finish_session(&mut self, response: &mut Response) -> Result<()> {
        let Some(session) = self.session.as_mut() else { return Ok(()) };
        if session.is_dirty() {
            session.save().await.map_err(Error::from)?;
        }
        if self.cookies.get("session_id") != Some(session.id()) {
            response.add_header(
                http::header::SET_COOKIE,
                &Cookie::new("session_id", session.id().to_string()).to_header_value(),
            );
        }
        Ok(())
    }
}

/// A zero-copy `Cookie` header scan, used only for auth extraction — the
/// returned slice borrows directly from the raw header value rather than
/// an owned `CookieJar`, since `AuthRequest`'s closures must hand back
/// references tied to the request itself, not to data the closure owns.
#[cfg(feature = "auth")]
fn find_cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|part| {
        let (k, v) = part.trim().split_once('=')?;
        if k.trim() == name { Some(v.trim()) } else { None }
    })
}
