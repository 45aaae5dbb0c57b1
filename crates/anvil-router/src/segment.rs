//! Route pattern parsing: `/literal/{name}/{name:type}/{wild*}/optional?`.

use anvil_core::error::{Error, Result};

use crate::constraint::Constraint;

/// One parsed segment of a route pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    Param { name: String, constraint: Constraint },
    Wildcard { name: String },
}

impl Segment {
    pub fn kind_rank(&self) -> u8 {
        match self {
            Segment::Literal(_) => 0,
            Segment::Param { .. } => 1,
            Segment::Wildcard { .. } => 2,
        }
    }
}

/// A segment plus whether it's an optional trailing segment (`?` suffix).
#[derive(Debug, Clone, PartialEq)]
pub struct PatternSegment {
    pub segment: Segment,
    pub optional: bool,
}

/// Parse a route pattern into its segments, normalizing duplicate slashes.
///
/// Optional segments (`?` suffix) are only permitted as a contiguous run at
/// the end of the pattern — the router needs every optional segment to be
/// "may or may not extend the path," which only has one sensible reading
/// when nothing required follows it.
pub fn parse_pattern(pattern: &str) -> Result<Vec<PatternSegment>> {
    let collapsed: String = {
        let mut out = String::with_capacity(pattern.len());
        let mut last_was_slash = false;
        for ch in pattern.chars() {
            if ch == '/' {
                if last_was_slash {
                    continue;
                }
                last_was_slash = true;
            } else {
                last_was_slash = false;
            }
            out.push(ch);
        }
        out
    };

    let raw_segments: Vec<&str> = collapsed.split('/').filter(|s| !s.is_empty()).collect();

    let mut segments = Vec::with_capacity(raw_segments.len());
    let mut seen_optional = false;
    for raw in raw_segments {
        let (body, optional) = match raw.strip_suffix('?') {
            Some(stripped) => (stripped, true),
            None => (raw, false),
        };
        if seen_optional && !optional {
            return Err(Error::RouteConflict(format!(
                "pattern `{pattern}`: a required segment cannot follow an optional one"
            )));
        }
        seen_optional |= optional;

        let segment = parse_segment(body, pattern)?;
        segments.push(PatternSegment { segment, optional });
    }
    Ok(segments)
}

fn parse_segment(body: &str, pattern: &str) -> Result<Segment> {
    if let Some(inner) = body.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        if let Some(name) = inner.strip_suffix('*') {
            if name.is_empty() {
                return Err(Error::RouteConflict(format!(
                    "pattern `{pattern}`: wildcard segment is missing a name"
                )));
            }
            return Ok(Segment::Wildcard { name: name.to_string() });
        }
        return match inner.split_once(':') {
            Some((name, type_tag)) => {
                if name.is_empty() {
                    return Err(Error::RouteConflict(format!(
                        "pattern `{pattern}`: parameter is missing a name"
                    )));
                }
                Ok(Segment::Param {
                    name: name.to_string(),
                    constraint: Constraint::parse(type_tag)?,
                })
            }
            None => {
                if inner.is_empty() {
                    return Err(Error::RouteConflict(format!(
                        "pattern `{pattern}`: parameter is missing a name"
                    )));
                }
                Ok(Segment::Param { name: inner.to_string(), constraint: Constraint::String })
            }
        };
    }
    Ok(Segment::Literal(body.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literal_and_typed_params() {
        let segments = parse_pattern("/users/{id:int}/posts/{slug:slug}").unwrap();
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0].segment, Segment::Literal("users".into()));
        assert!(matches!(&segments[1].segment, Segment::Param { constraint: Constraint::Int, .. }));
        assert_eq!(segments[2].segment, Segment::Literal("posts".into()));
        assert!(matches!(&segments[3].segment, Segment::Param { constraint: Constraint::Slug, .. }));
    }

    #[test]
    fn parses_wildcard() {
        let segments = parse_pattern("/assets/{path*}").unwrap();
        assert_eq!(segments[1].segment, Segment::Wildcard { name: "path".into() });
    }

    #[test]
    fn collapses_duplicate_slashes() {
        let segments = parse_pattern("//users///42//").unwrap();
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn trailing_optional_segment() {
        let segments = parse_pattern("/users/{id:int}/edit?").unwrap();
        assert!(segments[2].optional);
    }

    #[test]
    fn required_after_optional_is_rejected() {
        assert!(parse_pattern("/a?/b").is_err());
    }
}
