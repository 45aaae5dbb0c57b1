//! The `Provider` seam: `register` for pure bindings, `boot` for
//! side-effectful init, `shutdown` for the reverse teardown.

use anvil_core::Result;
use anvil_di::Container;
use async_trait::async_trait;

/// A boot-time unit that registers bindings into the container and,
/// optionally, performs side-effectful initialization once every
/// provider's bindings are in place.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier used for dependency ordering and diagnostics.
    /// Not the same as a Rust type name — two providers may register
    /// bindings for the same type under different provider names.
    fn name(&self) -> &'static str;

    /// Other providers' [`Provider::name`]s that must `boot` before this
    /// one. Does not affect `register` order — registration is pure and
    /// order-independent by construction.
    fn requires(&self) -> &[&'static str] {
        &[]
    }

    /// Bind services into `container`. Must not depend on any other
    /// provider having booted yet.
    async fn register(&self, container: &Container) -> Result<()>;

    /// Side-effectful initialization, run after every provider has
    /// `register`ed and in dependency order.
    async fn boot(&self, container: &Container) -> Result<()> {
        let _ = container;
        Ok(())
    }

    /// Run in reverse boot order during `Engine::close`.
    async fn shutdown(&self, container: &Container) -> Result<()> {
        let _ = container;
        Ok(())
    }
}
