//! The Anvil route trie: pattern parsing, typed-parameter constraints,
//! resolution, and reverse routing.

pub mod constraint;
pub mod naming;
pub mod route;
pub mod segment;
mod trie;

pub use constraint::Constraint;
pub use naming::NameRegistry;
pub use route::{Route, RouteBuilder, RouteManifestEntry};
pub use segment::{PatternSegment, Segment};
pub use trie::{Resolution, Router};

/// How the router treats a trailing slash that doesn't exactly match how
/// the pattern was registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingSlashPolicy {
    /// The path must match exactly as registered.
    #[default]
    Strict,
    /// A mismatched trailing slash resolves to the same route as if it
    /// matched (no redirect emitted).
    Ignore,
    /// A mismatched trailing slash on a safe method (`GET`/`HEAD`) is
    /// reported so the caller can redirect; unsafe methods fall through to
    /// `Strict` behavior.
    Redirect,
}
