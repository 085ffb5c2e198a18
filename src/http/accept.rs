//! `Accept` negotiation between the HTML preview and the plain redirect.
//!
//! The service offers two representations, `text/html` and `*/*`, in that
//! order.  For each offer the most specific matching media range decides its
//! weight; the offer with the highest weight wins, ties going to the more
//! specific match, then to the earlier range in the header, then to
//! `text/html`.

/// One media range from an `Accept` header.
#[derive(Debug, Clone, PartialEq)]
struct MediaRange<'a> {
    kind: &'a str,
    subtype: &'a str,
    q: f32,
}

/// How well one media range matches one offer.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Priority {
    q: f32,
    specificity: u8,
    position: usize,
}

/// `true` when the client should get the HTML preview.  A missing header
/// counts as `*/*`.
pub fn prefers_html(accept: Option<&str>) -> bool {
    let Some(accept) = accept else {
        return false;
    };
    let ranges = parse(accept);

    let html = priority(&ranges, "text", "html");
    let any = priority(&ranges, "*", "*");

    match (html, any) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(html), Some(any)) => {
            if html.q != any.q {
                html.q > any.q
            } else if html.specificity != any.specificity {
                html.specificity > any.specificity
            } else {
                html.position <= any.position
            }
        }
    }
}

fn parse(accept: &str) -> Vec<MediaRange<'_>> {
    accept
        .split(',')
        .filter_map(|item| {
            let mut parts = item.split(';');
            let (kind, subtype) = parts.next()?.trim().split_once('/')?;
            let q = parts
                .filter_map(|param| param.split_once('='))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("q"))
                .map_or(1.0, |(_, value)| value.trim().parse().unwrap_or(0.0));
            Some(MediaRange {
                kind: kind.trim(),
                subtype: subtype.trim(),
                q,
            })
        })
        .collect()
}

/// Priority of the most specific range matching the offer, or `None` when
/// nothing matches or the best match has `q=0`.
fn priority(ranges: &[MediaRange<'_>], kind: &str, subtype: &str) -> Option<Priority> {
    let mut best: Option<Priority> = None;
    for (position, range) in ranges.iter().enumerate() {
        let kind_eq = range.kind.eq_ignore_ascii_case(kind);
        let subtype_eq = range.subtype.eq_ignore_ascii_case(subtype);
        if !(kind_eq || range.kind == "*") || !(subtype_eq || range.subtype == "*") {
            continue;
        }
        let candidate = Priority {
            q: range.q,
            specificity: u8::from(kind_eq) * 4 + u8::from(subtype_eq) * 2,
            position,
        };
        let better = match best {
            None => true,
            Some(current) => {
                candidate.specificity > current.specificity
                    || (candidate.specificity == current.specificity && candidate.q > current.q)
            }
        };
        if better {
            best = Some(candidate);
        }
    }
    best.filter(|p| p.q > 0.0)
}
