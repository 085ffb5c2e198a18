//! Version token → ref.

use std::sync::LazyLock;

use regex::Regex;

static SEMVER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+").expect("static regex is valid"));

/// Turn a raw version token into the ref to request from the CDN.
///
/// Tokens that start like a semantic version get a `v` prefix, matching the
/// usual tag convention (`1.2.3` → `v1.2.3`).  A trailing `!` opts out for
/// repositories whose tags are not `v`-prefixed (`1.2.3!` → `1.2.3`).
/// Anything else is taken to be a branch or exact tag and passed through.
pub fn normalize(token: &str) -> String {
    if !SEMVER_PREFIX.is_match(token) {
        return token.to_string();
    }
    match token.strip_suffix('!') {
        Some(raw) => raw.to_string(),
        None => format!("v{token}"),
    }
}
