//! The outbound response builder.
//!
//! Handlers and middleware both mutate a `Response` in place (`set_body`,
//! `set_header`, ...) rather than threading a separate builder type through
//! the pipeline — this matches how post-middleware rewrites a response that
//! already flowed back up through `next`.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header::CONTENT_TYPE};

/// A response under construction or ready to flush.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    pub fn internal_server_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::default()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_bytes(&self) -> Bytes {
        self.body.clone()
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
    }

    pub fn add_header(&mut self, name: HeaderName, value: &str) {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.append(name, value);
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn json<T: serde::Serialize>(value: &T) -> crate::Result<Self> {
        let bytes = serde_json::to_vec(value)?;
        let mut resp = Self::ok().with_body(bytes);
        resp.set_header(CONTENT_TYPE, "application/json");
        Ok(resp)
    }

    pub fn json_with_status<T: serde::Serialize>(value: &T, status: StatusCode) -> crate::Result<Self> {
        let mut resp = Self::json(value)?;
        resp.status = status;
        Ok(resp)
    }

    pub fn html(html: impl Into<Bytes>) -> Self {
        let mut resp = Self::ok().with_body(html);
        resp.set_header(CONTENT_TYPE, "text/html; charset=utf-8");
        resp
    }

    pub fn text(text: impl Into<Bytes>) -> Self {
        let mut resp = Self::ok().with_body(text);
        resp.set_header(CONTENT_TYPE, "text/plain; charset=utf-8");
        resp
    }

    pub fn redirect(location: &str, status: StatusCode) -> Self {
        let mut resp = Self::new(status);
        resp.set_header(http::header::LOCATION, location);
        resp
    }

    pub fn content_length(&self) -> usize {
        self.body.len()
    }
}

#[derive(Debug, Default)]
pub struct ResponseBuilder {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Bytes,
}

impl ResponseBuilder {
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> Response {
        Response {
            status: self.status.unwrap_or(StatusCode::OK),
            headers: self.headers,
            body: self.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_sets_content_type_and_body() {
        #[derive(serde::Serialize)]
        struct Body {
            id: u32,
        }
        let resp = Response::json(&Body { id: 42 }).unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body(), br#"{"id":42}"#);
        assert_eq!(resp.headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn json_with_status_overrides_default_ok() {
        #[derive(serde::Serialize)]
        struct Body {
            id: u32,
        }
        let resp = Response::json_with_status(&Body { id: 1 }, StatusCode::CREATED).unwrap();
        assert_eq!(resp.status, StatusCode::CREATED);
    }

    #[test]
    fn html_and_text_set_expected_content_types() {
        let html = Response::html("<p>hi</p>");
        assert_eq!(html.headers.get(CONTENT_TYPE).unwrap(), "text/html; charset=utf-8");

        let text = Response::text("hi");
        assert_eq!(text.headers.get(CONTENT_TYPE).unwrap(), "text/plain; charset=utf-8");
    }

    #[test]
    fn redirect_sets_location_and_status() {
        let resp = Response::redirect("/login", StatusCode::FOUND);
        assert_eq!(resp.status, StatusCode::FOUND);
        assert_eq!(resp.headers.get(http::header::LOCATION).unwrap(), "/login");
    }

    #[test]
    fn add_header_appends_rather_than_replaces() {
        let mut resp = Response::ok();
        resp.add_header(http::header::VARY, "Accept");
        resp.add_header(http::header::VARY, "Accept-Encoding");
        let values: Vec<&str> = resp.headers.get_all(http::header::VARY).iter().map(|v| v.to_str().unwrap()).collect();
        assert_eq!(values, vec!["Accept", "Accept-Encoding"]);
    }

    #[test]
    fn set_header_replaces_existing_value() {
        let mut resp = Response::ok();
        resp.set_header(CONTENT_TYPE, "text/plain");
        resp.set_header(CONTENT_TYPE, "application/json");
        assert_eq!(resp.headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn content_length_reflects_body_size() {
        let resp = Response::ok().with_body(Bytes::from_static(b"hello"));
        assert_eq!(resp.content_length(), 5);
    }

    #[test]
    fn builder_defaults_to_200_with_empty_body() {
        let resp = Response::builder().build();
        assert_eq!(resp.status, StatusCode::OK);
        assert!(resp.body().is_empty());
    }
}
