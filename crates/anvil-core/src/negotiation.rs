//! Accept-header content negotiation.
//!
//! Parses `type/subtype;params;q=` offers from the client and picks the best
//! match against a list of media types the handler can actually produce.

/// A single media-range parsed out of an `Accept` header.
#[derive(Debug, Clone, PartialEq)]
struct MediaRange {
    kind: String,
    subtype: String,
    params: Vec<(String, String)>,
    q: f32,
    order: usize,
}

impl MediaRange {
    fn is_wildcard_type(&self) -> bool {
        self.kind == "*"
    }

    fn is_wildcard_subtype(&self) -> bool {
        self.subtype == "*"
    }

    fn specificity(&self) -> u32 {
        let mut score = 0u32;
        if !self.is_wildcard_type() {
            score += 2;
        }
        if !self.is_wildcard_subtype() {
            score += 2;
        }
        score += self.params.len() as u32;
        score
    }

    fn matches(&self, kind: &str, subtype: &str) -> bool {
        (self.is_wildcard_type() || self.kind == kind)
            && (self.is_wildcard_subtype() || self.subtype == subtype)
    }
}

fn parse_media_type(raw: &str) -> Option<(String, String)> {
    let mut parts = raw.splitn(2, '/');
    let kind = parts.next()?.trim().to_ascii_lowercase();
    let subtype = parts.next()?.trim().to_ascii_lowercase();
    if kind.is_empty() || subtype.is_empty() {
        return None;
    }
    Some((kind, subtype))
}

fn parse_accept(header: &str) -> Vec<MediaRange> {
    header
        .split(',')
        .enumerate()
        .filter_map(|(order, entry)| {
            let mut segments = entry.split(';');
            let (kind, subtype) = parse_media_type(segments.next()?.trim())?;
            let mut q = 1.0f32;
            let mut params = Vec::new();
            for seg in segments {
                let seg = seg.trim();
                if let Some((key, value)) = seg.split_once('=') {
                    let key = key.trim();
                    let value = value.trim().trim_matches('"');
                    if key.eq_ignore_ascii_case("q") {
                        q = value.parse().unwrap_or(1.0);
                    } else {
                        params.push((key.to_ascii_lowercase(), value.to_string()));
                    }
                }
            }
            Some(MediaRange { kind, subtype, params, q, order })
        })
        .collect()
}

/// A media type the handler offers, in the order the handler listed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    pub media_type: String,
    order: usize,
}

impl Offer {
    pub fn new(media_type: impl Into<String>, order: usize) -> Self {
        Self { media_type: media_type.into(), order }
    }
}

/// The result of negotiation: the chosen media type and its effective quality.
#[derive(Debug, Clone, PartialEq)]
pub struct NegotiatedMediaType {
    pub media_type: String,
    pub quality: f32,
}

/// Negotiate an `Accept` header against a list of offers the caller can
/// actually produce, in the order it prefers them.
///
/// Selection order: maximize `q` (`q=0` rejects a type outright), then
/// specificity (`application/json` beats `application/*` beats `*/*`), then
/// `Accept` header order, then offer order. Returns `None` only when there
/// are no offers at all; an absent/unmatched `Accept` falls back to
/// `default_offer` (or the first offer, if `default_offer` is `None`).
pub fn negotiate(
    accept: Option<&str>,
    offers: &[&str],
    default_offer: Option<&str>,
) -> Option<NegotiatedMediaType> {
    if offers.is_empty() {
        return None;
    }

    let ranges = match accept {
        Some(h) if !h.trim().is_empty() => parse_accept(h),
        _ => Vec::new(),
    };

    if ranges.is_empty() {
        let chosen = default_offer.unwrap_or(offers[0]);
        return Some(NegotiatedMediaType { media_type: chosen.to_string(), quality: 1.0 });
    }

    let mut best: Option<(NegotiatedMediaType, u32, usize, usize)> = None;
    let mut explicitly_rejected = false;

    for (offer_order, offer) in offers.iter().enumerate() {
        let Some((kind, subtype)) = parse_media_type(offer) else { continue };
        for range in &ranges {
            if !range.matches(&kind, &subtype) {
                continue;
            }
            if range.q <= 0.0 {
                explicitly_rejected = true;
                continue;
            }
            let specificity = range.specificity();
            let candidate = (
                NegotiatedMediaType { media_type: (*offer).to_string(), quality: range.q },
                specificity,
                range.order,
                offer_order,
            );
            best = Some(match best {
                None => candidate,
                Some(current) => pick_better(current, candidate),
            });
        }
    }

    match best {
        Some((chosen, ..)) => Some(chosen),
        // A range matched an offer's type/subtype but rejected it outright
        // with q=0: that offer was considered and refused, not merely
        // unlisted, so it stands rather than falling back.
        None if explicitly_rejected => None,
        None => {
            let chosen = default_offer.unwrap_or(offers[0]);
            Some(NegotiatedMediaType { media_type: chosen.to_string(), quality: 1.0 })
        }
    }
}

fn pick_better(
    a: (NegotiatedMediaType, u32, usize, usize),
    b: (NegotiatedMediaType, u32, usize, usize),
) -> (NegotiatedMediaType, u32, usize, usize) {
    // Higher q wins; tie -> higher specificity; tie -> earlier Accept order;
    // tie -> earlier offer order.
    if b.0.quality > a.0.quality {
        return b;
    }
    if b.0.quality < a.0.quality {
        return a;
    }
    if b.1 > a.1 {
        return b;
    }
    if b.1 < a.1 {
        return a;
    }
    if b.2 < a.2 {
        return b;
    }
    if b.2 > a.2 {
        return a;
    }
    if b.3 < a.3 { b } else { a }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_prefers_higher_q_over_header_order() {
        // spec.md §8 scenario 5: text/html;q=0.2, application/json;q=0.9
        // against offers [text/html, application/json] selects application/json.
        let chosen = negotiate(
            Some("text/html;q=0.2, application/json;q=0.9"),
            &["text/html", "application/json"],
            None,
        )
        .unwrap();
        assert_eq!(chosen.media_type, "application/json");
        assert_eq!(chosen.quality, 0.9);
    }

    #[test]
    fn q_zero_rejects_a_type_outright() {
        let chosen = negotiate(Some("text/html;q=0"), &["text/html"], None);
        assert!(chosen.is_none());
    }

    #[test]
    fn q_zero_on_one_offer_does_not_fall_back_to_it() {
        // text/html is explicitly rejected, not merely unlisted, so it must
        // not win by fallback even though it's the only offer available.
        let chosen = negotiate(Some("text/html;q=0"), &["text/html"], Some("text/html"));
        assert!(chosen.is_none());
    }

    #[test]
    fn specificity_beats_header_order() {
        // application/json is listed after */* but is more specific and wins.
        let chosen = negotiate(Some("*/*;q=0.8, application/json;q=0.8"), &["application/json", "text/plain"], None).unwrap();
        assert_eq!(chosen.media_type, "application/json");
    }

    #[test]
    fn absent_accept_falls_back_to_default_offer() {
        let chosen = negotiate(None, &["text/html", "application/json"], Some("application/json")).unwrap();
        assert_eq!(chosen.media_type, "application/json");
    }

    #[test]
    fn absent_accept_falls_back_to_first_offer_without_default() {
        let chosen = negotiate(None, &["text/html", "application/json"], None).unwrap();
        assert_eq!(chosen.media_type, "text/html");
    }

    #[test]
    fn no_offers_returns_none_even_with_accept_wildcard() {
        assert!(negotiate(Some("*/*"), &[], None).is_none());
    }

    #[test]
    fn unmatched_accept_falls_back_to_default_offer() {
        let chosen = negotiate(
            Some("application/xml"),
            &["application/json"],
            Some("application/json"),
        )
        .unwrap();
        assert_eq!(chosen.media_type, "application/json");
    }

    #[test]
    fn unmatched_accept_with_no_default_falls_back_to_first_offer() {
        let chosen = negotiate(Some("application/xml"), &["application/json"], None).unwrap();
        assert_eq!(chosen.media_type, "application/json");
    }

    #[test]
    fn adding_a_lower_quality_offer_does_not_change_the_winner() {
        // Testable property #5: monotonicity. Adding an offer with a lower q
        // cannot displace an already-preferred, equal-or-higher offer.
        let accept = "application/json;q=0.9, text/html;q=0.5";
        let before = negotiate(Some(accept), &["application/json", "text/html"], None).unwrap();
        let after = negotiate(Some(accept), &["application/json", "text/html", "text/plain"], None).unwrap();
        assert_eq!(before.media_type, after.media_type);
    }

    #[test]
    fn wildcard_subtype_matches_any_subtype_of_its_type() {
        let chosen = negotiate(Some("text/*;q=1.0"), &["text/plain", "application/json"], None).unwrap();
        assert_eq!(chosen.media_type, "text/plain");
    }
}
