//! The three binding lifetimes a [`crate::Container`] understands.

/// A binding's scope governs where its instance is memoized, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Memoized once on the root container; every descendant scope sees
    /// the same instance.
    Singleton,
    /// Never memoized: a fresh value is produced on every `make`.
    Transient,
    /// Memoized on whichever container the request started from
    /// (`Container::create_scope`'s return value); lives exactly as long as
    /// that scope does.
    Request,
}
