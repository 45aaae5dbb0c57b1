//! The inbound request value.
//!
//! `Request` is intentionally dumb: it carries the wire-level data (method,
//! URI, headers, body bytes), matched route params, and a handful of parsing
//! conveniences. Anything that needs routing, DI, or signals to exist —
//! session, the request-scoped container, reverse routing — lives on the
//! `Context` type the engine crate builds on top of this one.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use bytes::Bytes;
use http::{Extensions, HeaderMap, HeaderValue, Method, Uri, Version, header::CONTENT_TYPE};

use crate::error::HttpError;

/// A parsed, fully-buffered inbound request.
///
/// Bodies arrive pre-read as `Bytes` — the listener (`anvil-server`) is
/// responsible for streaming the wire body into memory up to the configured
/// `max_body_size` before constructing this value; handlers never see a
/// partially-read body.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub remote_addr: Option<SocketAddr>,
    /// Populated by the router once a route has matched; empty beforehand.
    pub(crate) params: HashMap<String, String>,
    /// Type-keyed side channel for values that don't belong in the wire
    /// model (a `CancelToken`, the request id, an auth `Principal`). Same
    /// pattern `http::Request<T>` itself uses.
    pub extensions: Extensions,
}

impl Request {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// The path component only, e.g. `/users/42` (no query string).
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query_string(&self) -> &str {
        self.uri.query().unwrap_or("")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str())
    }

    /// Whether the request arrived over a secure transport.
    ///
    /// Honors `X-Forwarded-Proto` only when the immediate peer is a trusted
    /// proxy; a bare TCP connection is considered secure only if the scheme
    /// on the URI itself says so (the listener sets this for TLS sockets).
    pub fn is_secure(&self, trusted: &TrustedProxies) -> bool {
        if self.uri.scheme_str() == Some("https") {
            return true;
        }
        if trusted.peer_is_trusted(self.remote_addr) {
            if let Some(proto) = self.header("x-forwarded-proto") {
                return proto.eq_ignore_ascii_case("https");
            }
        }
        false
    }

    /// Methods defined by RFC 7231 as never carrying a meaningful request body.
    pub fn is_bodyless_method(&self) -> bool {
        matches!(self.method, Method::GET | Method::HEAD | Method::OPTIONS)
    }

    /// Returns the raw body bytes, or an empty slice for methods that never
    /// carry a body regardless of what was sent on the wire.
    pub fn read_body(&self) -> crate::Result<Bytes> {
        if self.is_bodyless_method() {
            return Ok(Bytes::new());
        }
        Ok(self.body.clone())
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn form<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_urlencoded::from_bytes(&self.body)?)
    }

    pub fn query<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_urlencoded::from_str(self.query_string())?)
    }

    /// Route params bound during resolution. Empty until the router runs.
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }
}

#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    uri: Option<Uri>,
    version: Option<Version>,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
    extensions: Extensions,
}

impl RequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn uri(mut self, uri: impl TryIntoUri) -> Self {
        self.uri = uri.try_into_uri().ok();
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn header(mut self, name: &'static str, value: &str) -> crate::Result<Self> {
        let value = HeaderValue::from_str(value).map_err(|source| HttpError::InvalidHeaderValue {
            name: name.to_string(),
            source,
        })?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn extension<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }

    pub fn build(self) -> Request {
        Request {
            method: self.method.unwrap_or(Method::GET),
            uri: self.uri.unwrap_or_else(|| Uri::from_static("/")),
            version: self.version.unwrap_or(Version::HTTP_11),
            headers: self.headers,
            body: self.body,
            remote_addr: self.remote_addr,
            params: HashMap::new(),
            extensions: self.extensions,
        }
    }
}

/// Accepts both a pre-parsed [`Uri`] and a raw `&str`/`String`, matching the
/// ergonomics handlers expect from `.uri("/users/42")`.
pub trait TryIntoUri {
    fn try_into_uri(self) -> Result<Uri, http::uri::InvalidUri>;
}

impl TryIntoUri for Uri {
    fn try_into_uri(self) -> Result<Uri, http::uri::InvalidUri> {
        Ok(self)
    }
}

impl TryIntoUri for &str {
    fn try_into_uri(self) -> Result<Uri, http::uri::InvalidUri> {
        Uri::from_str(self)
    }
}

impl TryIntoUri for String {
    fn try_into_uri(self) -> Result<Uri, http::uri::InvalidUri> {
        Uri::from_str(&self)
    }
}

/// CIDR allow-list used to decide whether `X-Forwarded-*` headers from the
/// immediate peer should be trusted.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies {
    nets: Vec<ipnet::IpNet>,
}

impl TrustedProxies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trust(mut self, cidr: &str) -> Self {
        if let Ok(net) = cidr.parse() {
            self.nets.push(net);
        }
        self
    }

    pub fn peer_is_trusted(&self, addr: Option<SocketAddr>) -> bool {
        let Some(addr) = addr else { return false };
        self.nets.iter().any(|n| n.contains(&ip_of(addr)))
    }
}

fn ip_of(addr: SocketAddr) -> IpAddr {
    addr.ip()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_get_root() {
        let request = Request::builder().build();
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.path(), "/");
    }

    #[test]
    fn path_excludes_query_string() {
        let request = Request::builder().uri("/users/42?active=true").build();
        assert_eq!(request.path(), "/users/42");
        assert_eq!(request.query_string(), "active=true");
    }

    #[test]
    fn bodyless_methods_read_empty_body_regardless_of_wire_bytes() {
        let request = Request::builder().method(Method::GET).body(Bytes::from_static(b"ignored")).build();
        assert_eq!(request.read_body().unwrap(), Bytes::new());
    }

    #[test]
    fn post_body_is_read_verbatim() {
        let request = Request::builder().method(Method::POST).body(Bytes::from_static(b"payload")).build();
        assert_eq!(request.read_body().unwrap(), Bytes::from_static(b"payload"));
    }

    #[test]
    fn json_deserializes_body() {
        #[derive(serde::Deserialize, PartialEq, Debug)]
        struct Body {
            id: u32,
        }
        let request = Request::builder()
            .method(Method::POST)
            .body(Bytes::from_static(br#"{"id":42}"#))
            .build();
        assert_eq!(request.json::<Body>().unwrap(), Body { id: 42 });
    }

    #[test]
    fn is_secure_true_for_https_scheme() {
        let request = Request::builder().uri("https://example.com/").build();
        assert!(request.is_secure(&TrustedProxies::new()));
    }

    #[test]
    fn is_secure_honors_forwarded_proto_only_from_trusted_peer() {
        let peer: SocketAddr = "10.0.0.5:443".parse().unwrap();
        let request = Request::builder()
            .remote_addr(peer)
            .header("x-forwarded-proto", "https")
            .unwrap()
            .build();

        assert!(!request.is_secure(&TrustedProxies::new()), "untrusted peer must not be honored");

        let trusted = TrustedProxies::new().trust("10.0.0.0/8");
        assert!(request.is_secure(&trusted));
    }

    #[test]
    fn params_empty_until_router_sets_them() {
        let mut request = Request::builder().build();
        assert!(request.params().is_empty());
        let mut params = HashMap::new();
        params.insert("id".to_string(), "42".to_string());
        request.set_params(params);
        assert_eq!(request.params().get("id"), Some(&"42".to_string()));
    }
}
