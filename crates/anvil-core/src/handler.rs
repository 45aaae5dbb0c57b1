//! `Handler`, `Middleware`, and the cursor-based pipeline that composes them.

use std::sync::Arc;

use anvil_http::{Request, Response};
use async_trait::async_trait;

use crate::error::Result;

/// Terminal step of a request pipeline: turns a `Request` into a `Response`.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Response>> + Send,
{
    async fn handle(&self, request: Request) -> Result<Response> {
        self(request).await
    }
}

/// A layer that wraps the rest of the pipeline.
///
/// `next` is the remainder of the chain bundled up as a `Handler` — calling
/// it runs every layer after this one plus the route's own handler. A
/// middleware may run code before calling `next`, after it returns, both, or
/// may skip calling it entirely to short-circuit the pipeline.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn process(&self, request: Request, next: Arc<dyn Handler>) -> Result<Response>;

    /// A short, stable name used in route manifests and logs. Defaults to
    /// the Rust type name, which is fine for ad-hoc middleware but worth
    /// overriding for anything registered by name (e.g. rate-limit
    /// policies keyed by string).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// An ordered, frozen list of middleware plus the terminal handler.
///
/// Built once per route at `Engine::build` and invoked via a cursor rather
/// than literal recursion, so pipeline depth never grows the call stack
/// beyond a small constant (each `next` step is one `Arc<dyn Handler>` call,
/// not a nested async frame per layer).
#[derive(Clone)]
pub struct Pipeline {
    layers: Arc<Vec<Arc<dyn Middleware>>>,
    terminal: Arc<dyn Handler>,
}

impl Pipeline {
    pub fn new(layers: Vec<Arc<dyn Middleware>>, terminal: Arc<dyn Handler>) -> Self {
        Self {
            layers: Arc::new(layers),
            terminal,
        }
    }

    pub fn empty(terminal: Arc<dyn Handler>) -> Self {
        Self::new(Vec::new(), terminal)
    }

    /// Run the whole pipeline for one request.
    pub async fn run(&self, request: Request) -> Result<Response> {
        let cursor = Cursor {
            layers: self.layers.clone(),
            index: 0,
            terminal: self.terminal.clone(),
        };
        Handler::handle(&cursor, request).await
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// A position within a frozen `Pipeline`. Implements `Handler` so that
/// advancing the cursor and calling the next layer look identical to calling
/// the terminal handler — middleware code never needs to know where it sits
/// in the chain.
struct Cursor {
    layers: Arc<Vec<Arc<dyn Middleware>>>,
    index: usize,
    terminal: Arc<dyn Handler>,
}

#[async_trait]
impl Handler for Cursor {
    async fn handle(&self, request: Request) -> Result<Response> {
        match self.layers.get(self.index) {
            Some(layer) => {
                let next = Arc::new(Cursor {
                    layers: self.layers.clone(),
                    index: self.index + 1,
                    terminal: self.terminal.clone(),
                });
                layer.process(request, next).await
            }
            None => self.terminal.handle(request).await,
        }
    }
}
