//! The view-engine seam [`crate::Context::template`] calls through.
//!
//! Template-language semantics aren't this crate's concern — `Renderer` is
//! just the trait an application wires its real engine (Tera, Handlebars,
//! Askama, whatever) behind. The engine only needs something that turns a
//! template name and a JSON value into a response body.

use async_trait::async_trait;

#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render `name` against `data`. Errors are wrapped into
    /// `Error::Internal` by the caller, so implementations can use
    /// whatever error type their template engine returns as long as it
    /// converts into `anyhow::Error`.
    async fn render(&self, name: &str, data: serde_json::Value) -> anyhow::Result<String>;
}
