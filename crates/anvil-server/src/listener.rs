//! The hyper-based TCP listener. Buffers each inbound body up to
//! `max_body_size` before handing a fully-materialized `anvil_http::Request`
//! to the supplied handler (`anvil_http::Request`'s own doc comment: "the
//! listener ... is responsible for streaming the wire body into memory").
//!
//! TLS termination and HTTP/3/QUIC are out of scope for this crate;
//! [`Transport`] is the seam a TLS-terminating wrapper would plug into —
//! it picks HTTP/1.1-only vs. negotiated HTTP/1.1-or-2 on the *plaintext*
//! connection handed to this listener, which is as far as the engine
//! core's responsibility goes.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anvil_core::cancel::CancelToken;
use anvil_core::{Error as CoreError, Handler};
use anvil_http::{Request, Response};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;

use crate::error::{Error, Result};

/// Which protocol negotiation the listener performs on each accepted
/// connection. HTTP/2 is only meaningful once TLS/ALPN picks it, so
/// plaintext deployments normally stay on `Http1Only`; `Auto` is for a
/// TLS-terminating reverse proxy wrapper that hands this listener a
/// plaintext stream but still wants h2c-style negotiation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Transport {
    #[default]
    Http1Only,
    Auto,
}

pub struct ListenerConfig {
    pub addr: SocketAddr,
    pub transport: Transport,
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self { addr: ([127, 0, 0, 1], 0).into(), transport: Transport::Http1Only, max_body_size: 10 * 1024 * 1024 }
    }
}

pub struct Listener {
    tcp: TcpListener,
    config: ListenerConfig,
}

impl Listener {
    pub async fn bind(config: ListenerConfig) -> Result<Self> {
        let tcp = TcpListener::bind(config.addr).await.map_err(Error::Bind)?;
        Ok(Self { tcp, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.tcp.local_addr().map_err(Error::Bind)
    }

    /// Accepts connections until `stop_accepting` is cancelled, then waits
    /// for every in-flight connection to finish its current request before
    /// returning — the listener's contribution to the Shutdown
    /// Controller's `on_drain` future.
    pub async fn serve(self, handler: Arc<dyn Handler>, stop_accepting: CancelToken) -> Result<()> {
        let graceful = GracefulShutdown::new();
        let max_body_size = self.config.max_body_size;
        let transport = self.config.transport;

        loop {
            tokio::select! {
                _ = stop_accepting.cancelled() => break,
                accepted = self.tcp.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(pair) => pair,
                        Err(err) => {
                            tracing::warn!(error = %err, "accept failed");
                            continue;
                        }
                    };
                    let io = TokioIo::new(stream);
                    let handler = handler.clone();
                    let service = service_fn(move |req: hyper::Request<Incoming>| {
                        let handler = handler.clone();
                        async move { serve_one(handler, req, peer_addr, max_body_size).await }
                    });

                    let mut builder = AutoBuilder::new(TokioExecutor::new());
                    if transport == Transport::Http1Only {
                        builder.http1().title_case_headers(true);
                    }
                    let conn = builder.serve_connection(io, service);
                    let conn = graceful.watch(conn);
                    tokio::spawn(async move {
                        if let Err(err) = conn.await {
                            tracing::debug!(error = %err, "connection closed with error");
                        }
                    });
                }
            }
        }

        graceful.shutdown().await;
        Ok(())
    }
}

async fn serve_one(
    handler: Arc<dyn Handler>,
    req: hyper::Request<Incoming>,
    peer_addr: SocketAddr,
    max_body_size: usize,
) -> std::result::Result<hyper::Response<Full<Bytes>>, Infallible> {
    let request = match into_anvil_request(req, peer_addr, max_body_size).await {
        Ok(request) => request,
        Err(err) => return Ok(error_response(err)),
    };

    let response = match handler.handle(request).await {
        Ok(response) => response,
        Err(err) => core_error_response(err),
    };
    Ok(into_hyper_response(response))
}

async fn into_anvil_request(
    req: hyper::Request<Incoming>,
    peer_addr: SocketAddr,
    max_body_size: usize,
) -> Result<Request> {
    let (parts, body) = req.into_parts();
    let collected = body.collect().await.map_err(|e| Error::BodyRead(e.to_string()))?;
    let bytes = collected.to_bytes();
    if bytes.len() > max_body_size {
        return Err(Error::BodyTooLarge { limit: max_body_size, actual: bytes.len() });
    }

    Ok(Request::builder()
        .method(parts.method)
        .uri(parts.uri)
        .version(parts.version)
        .headers(parts.headers)
        .body(bytes)
        .remote_addr(peer_addr)
        .build())
}

fn into_hyper_response(response: Response) -> hyper::Response<Full<Bytes>> {
    let mut builder = hyper::Response::builder().status(response.status);
    if let Some(headers) = builder.headers_mut() {
        *headers = response.headers.clone();
    }
    builder.body(Full::new(response.body_bytes())).unwrap_or_else(|_| {
        hyper::Response::new(Full::new(Bytes::from_static(b"response build failed")))
    })
}

fn error_response(err: Error) -> hyper::Response<Full<Bytes>> {
    tracing::warn!(error = %err, "request rejected before reaching the handler");
    let status = match err {
        Error::BodyTooLarge { .. } => hyper::StatusCode::PAYLOAD_TOO_LARGE,
        _ => hyper::StatusCode::BAD_REQUEST,
    };
    hyper::Response::builder()
        .status(status)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|_| hyper::Response::new(Full::new(Bytes::new())))
}

fn core_error_response(err: CoreError) -> Response {
    tracing::error!(error = %err, "unhandled error reached the listener; anvil-middleware's error-handler should have caught this");
    Response::new(http::StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_core::Result as CoreResult;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn handle(&self, request: Request) -> CoreResult<Response> {
            Ok(Response::ok().with_body(request.body.clone()))
        }
    }

    #[tokio::test]
    async fn bind_then_serve_echoes_request_body() {
        let config = ListenerConfig { addr: ([127, 0, 0, 1], 0).into(), ..Default::default() };
        let listener = Listener::bind(config).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (_source, token) = anvil_core::cancel::CancelSource::new();
        let handle = tokio::spawn(listener.serve(Arc::new(Echo), token));

        let client = hyper_util::client::legacy::Client::builder(TokioExecutor::new())
            .build_http::<Full<Bytes>>();
        let uri: hyper::Uri = format!("http://{addr}/").parse().unwrap();
        let response = client.get(uri).await;
        assert!(response.is_ok());

        handle.abort();
    }
}
