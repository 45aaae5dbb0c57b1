//! The authenticated identity attached to a request, and how it got there.
//!
//! A single `Principal` value rather than a `dyn User` trait object plus
//! a separately-threaded `is_authenticated`/`is_admin`/`is_active` triple —
//! the engine core doesn't need a pluggable user model, only something
//! gates can inspect.

use std::collections::HashSet;

/// How a [`Principal`] was authenticated, carried alongside it so gates and
/// logging can distinguish "no session cookie" from "token rejected".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    Session,
    Token,
}

/// The authenticated identity for one request, or its absence.
///
/// `Context::principal()` (in `anvil-web`) returns `Option<&Principal>`;
/// the anonymous case is represented as plain absence rather than a
/// distinct anonymous-user value, since gates already branch on "is there
/// a principal" first.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: String,
    pub roles: HashSet<String>,
    pub is_active: bool,
    pub source: AuthSource,
}

impl Principal {
    pub fn new(id: impl Into<String>, source: AuthSource) -> Self {
        Self { id: id.into(), roles: HashSet::new(), is_active: true, source }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_roles_replaces_role_set() {
        let principal = Principal::new("u1", AuthSource::Session).with_roles(["admin", "staff"]);
        assert!(principal.has_role("admin"));
        assert!(!principal.has_role("guest"));
    }
}
