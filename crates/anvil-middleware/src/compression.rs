//! Response body compression, negotiated from `Accept-Encoding`.

use std::io::Write;
use std::sync::Arc;

use anvil_core::{Handler, Middleware, Result};
use anvil_http::{Request, Response};
use async_trait::async_trait;
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE, VARY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Brotli,
    Gzip,
}

impl Encoding {
    fn token(self) -> &'static str {
        match self {
            Encoding::Brotli => "br",
            Encoding::Gzip => "gzip",
        }
    }
}

/// Picks the best encoding the client accepts from the configured list,
/// preferring earlier entries in `algorithms` on a tie (mirrors the
/// specificity/order tie-break `anvil_core::negotiation` uses for media
/// types, applied here to the much smaller `Accept-Encoding` vocabulary).
fn negotiate_encoding(accept_encoding: &str, algorithms: &[Encoding]) -> Option<Encoding> {
    let mut best: Option<(Encoding, f32)> = None;
    for entry in accept_encoding.split(',') {
        let mut parts = entry.split(';');
        let name = parts.next()?.trim().to_ascii_lowercase();
        let mut q = 1.0f32;
        for param in parts {
            if let Some((key, value)) = param.split_once('=') {
                if key.trim().eq_ignore_ascii_case("q") {
                    q = value.trim().parse().unwrap_or(1.0);
                }
            }
        }
        if q <= 0.0 {
            continue;
        }
        let Some(algorithm) = algorithms.iter().find(|a| a.token() == name).copied() else {
            continue;
        };
        let rank = algorithms.iter().position(|a| *a == algorithm).unwrap_or(usize::MAX);
        let score = q - (rank as f32 * 1e-6);
        if best.map(|(_, b)| score > b).unwrap_or(true) {
            best = Some((algorithm, score));
        }
    }
    best.map(|(encoding, _)| encoding)
}

const DEFAULT_MIN_SIZE: usize = 256;

const COMPRESSIBLE_PREFIXES: &[&str] =
    &["text/", "application/json", "application/javascript", "application/xml", "image/svg+xml"];

/// Compresses response bodies with brotli or gzip per the negotiated
/// `Accept-Encoding`. Skips bodies under `min_size`, bodies that already
/// carry a `Content-Encoding`, and content types not in the compressible
/// allow-list (binary formats like images/video are typically already
/// compressed, so re-compressing wastes CPU for no gain).
pub struct CompressionMiddleware {
    min_size: usize,
    algorithms: Vec<Encoding>,
}

impl Default for CompressionMiddleware {
    fn default() -> Self {
        Self { min_size: DEFAULT_MIN_SIZE, algorithms: vec![Encoding::Brotli, Encoding::Gzip] }
    }
}

impl CompressionMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    fn is_compressible(content_type: &str) -> bool {
        let base = content_type.split(';').next().unwrap_or("").trim();
        COMPRESSIBLE_PREFIXES.iter().any(|prefix| base.starts_with(prefix))
    }
}

#[async_trait]
impl Middleware for CompressionMiddleware {
    async fn process(&self, request: Request, next: Arc<dyn Handler>) -> Result<Response> {
        let accept_encoding = request.header(ACCEPT_ENCODING.as_str()).map(str::to_string);
        let mut response = next.handle(request).await?;

        if response.headers.contains_key(CONTENT_ENCODING) {
            return Ok(response);
        }
        let Some(accept_encoding) = accept_encoding else { return Ok(response) };
        let Some(encoding) = negotiate_encoding(&accept_encoding, &self.algorithms) else {
            return Ok(response);
        };
        if response.content_length() < self.min_size {
            return Ok(response);
        }
        let content_type = response.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("");
        if !Self::is_compressible(content_type) {
            return Ok(response);
        }

        let body = response.body();
        let compressed = match encoding {
            Encoding::Brotli => {
                let mut out = Vec::new();
                let params = brotli::enc::BrotliEncoderParams::default();
                brotli::BrotliCompress(&mut std::io::Cursor::new(body), &mut out, &params)
                    .map_err(|err| anvil_core::Error::Internal(anyhow::anyhow!(err)))?;
                out
            }
            Encoding::Gzip => {
                let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder
                    .write_all(body)
                    .map_err(|err| anvil_core::Error::Internal(anyhow::anyhow!(err)))?;
                encoder.finish().map_err(|err| anvil_core::Error::Internal(anyhow::anyhow!(err)))?
            }
        };

        response.set_body(compressed);
        response.set_header(CONTENT_ENCODING, encoding.token());
        response.add_header(VARY, ACCEPT_ENCODING.as_str());
        Ok(response)
    }

    fn name(&self) -> &'static str {
        "anvil.compression"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Returns(Response);
    #[async_trait]
    impl Handler for Returns {
        async fn handle(&self, _request: Request) -> Result<Response> {
            Ok(self.0.clone())
        }
    }

    fn text_response(body: &str) -> Response {
        Response::text(body.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn compresses_large_text_body_with_gzip() {
        let body = "x".repeat(1024);
        let middleware = CompressionMiddleware::new();
        let handler: Arc<dyn Handler> = Arc::new(Returns(text_response(&body)));
        let request = Request::builder().header("accept-encoding", "gzip").unwrap().build();

        let response = middleware.process(request, handler).await.unwrap();
        assert_eq!(response.headers.get(CONTENT_ENCODING).unwrap(), "gzip");
        assert!(response.content_length() < body.len());
    }

    #[tokio::test]
    async fn skips_small_body() {
        let middleware = CompressionMiddleware::new();
        let handler: Arc<dyn Handler> = Arc::new(Returns(text_response("hi")));
        let request = Request::builder().header("accept-encoding", "gzip").unwrap().build();

        let response = middleware.process(request, handler).await.unwrap();
        assert!(response.headers.get(CONTENT_ENCODING).is_none());
    }

    #[tokio::test]
    async fn skips_when_no_accept_encoding() {
        let body = "x".repeat(1024);
        let middleware = CompressionMiddleware::new();
        let handler: Arc<dyn Handler> = Arc::new(Returns(text_response(&body)));
        let request = Request::builder().build();

        let response = middleware.process(request, handler).await.unwrap();
        assert!(response.headers.get(CONTENT_ENCODING).is_none());
    }

    #[test]
    fn prefers_brotli_over_gzip_on_tie() {
        let chosen = negotiate_encoding("gzip;q=1.0, br;q=1.0", &[Encoding::Brotli, Encoding::Gzip]);
        assert_eq!(chosen, Some(Encoding::Brotli));
    }
}
