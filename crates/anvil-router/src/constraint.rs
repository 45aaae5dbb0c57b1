//! Typed parameter constraints recognized by the route pattern parser.

use std::net::IpAddr;
use std::sync::Arc;

use regex::Regex;

use anvil_core::error::{Error, Result};

/// A constraint attached to a `{name:type}` path parameter.
#[derive(Debug, Clone)]
pub enum Constraint {
    Int,
    Double,
    Slug,
    Uuid,
    Email,
    Ip,
    String,
    Regex(Arc<Regex>),
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int, Self::Int)
            | (Self::Double, Self::Double)
            | (Self::Slug, Self::Slug)
            | (Self::Uuid, Self::Uuid)
            | (Self::Email, Self::Email)
            | (Self::Ip, Self::Ip)
            | (Self::String, Self::String) => true,
            (Self::Regex(a), Self::Regex(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl Constraint {
    /// Parse the `type` half of `{name:type}`. Unqualified `{name}` params
    /// are handled by the caller as `Constraint::String`.
    pub fn parse(tag: &str) -> Result<Self> {
        match tag {
            "int" => Ok(Self::Int),
            "double" => Ok(Self::Double),
            "slug" => Ok(Self::Slug),
            "uuid" => Ok(Self::Uuid),
            "email" => Ok(Self::Email),
            "ip" => Ok(Self::Ip),
            "string" => Ok(Self::String),
            other if other.starts_with("regex(") && other.ends_with(')') => {
                let inner = &other["regex(".len()..other.len() - 1];
                let anchored = format!("^(?:{inner})$");
                let re = Regex::new(&anchored)
                    .map_err(|e| Error::RouteConflict(format!("invalid regex constraint `{inner}`: {e}")))?;
                Ok(Self::Regex(Arc::new(re)))
            }
            other => Err(Error::RouteConflict(format!("unknown parameter constraint `{other}`"))),
        }
    }

    /// Whether `value` satisfies this constraint.
    pub fn validate(&self, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }
        match self {
            Self::Int => validate_int(value),
            Self::Double => validate_double(value),
            Self::Slug => validate_slug(value),
            Self::Uuid => validate_uuid(value),
            Self::Email => validate_email(value),
            Self::Ip => value.parse::<IpAddr>().is_ok(),
            Self::String => !value.contains('/'),
            Self::Regex(re) => re.is_match(value),
        }
    }
}

fn validate_int(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    digits == "0" || !digits.starts_with('0')
}

fn validate_double(value: &str) -> bool {
    let (mantissa, exponent) = match value.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e)),
        None => (value, None),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (mantissa, None),
    };
    let int_digits = int_part.strip_prefix('-').unwrap_or(int_part);
    if int_digits.is_empty() || !int_digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if !(int_digits == "0" || !int_digits.starts_with('0')) {
        return false;
    }
    if let Some(frac) = frac_part {
        if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }
    if let Some(exp) = exponent {
        let exp_digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
        if exp_digits.is_empty() || !exp_digits.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }
    true
}

fn validate_slug(value: &str) -> bool {
    value
        .split('-')
        .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()))
}

fn validate_uuid(value: &str) -> bool {
    let groups: Vec<&str> = value.split('-').collect();
    let lens = [8, 4, 4, 4, 12];
    groups.len() == 5
        && groups
            .iter()
            .zip(lens)
            .all(|(g, len)| g.len() == len && g.bytes().all(|b| b.is_ascii_hexdigit()))
}

fn validate_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else { return false };
    if local.is_empty() || domain.is_empty() || local.contains('"') {
        return false;
    }
    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return false;
    }
    domain.contains('.')
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c))
        && domain.chars().all(|c| c.is_ascii_alphanumeric() || ".-".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0", true)]
    #[case("42", true)]
    #[case("-7", true)]
    #[case("007", false)]
    #[case("1.5", false)]
    #[case("", false)]
    fn int_constraint(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(Constraint::Int.validate(value), expected);
    }

    #[rstest]
    #[case("1.5", true)]
    #[case("0.1e10", true)]
    #[case("-3.14", true)]
    #[case("abc", false)]
    fn double_constraint(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(Constraint::Double.validate(value), expected);
    }

    #[rstest]
    #[case("hello-world", true)]
    #[case("foo", true)]
    #[case("Foo", false)]
    #[case("foo--bar", false)]
    fn slug_constraint(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(Constraint::Slug.validate(value), expected);
    }

    #[test]
    fn uuid_constraint() {
        assert!(Constraint::Uuid.validate("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!Constraint::Uuid.validate("not-a-uuid"));
    }

    #[test]
    fn regex_constraint_is_anchored() {
        let c = Constraint::parse("regex([a-z]+)").unwrap();
        assert!(c.validate("abc"));
        assert!(!c.validate("abc123"));
    }
}
