//! Resolution of `/<user>/<repo>{@<version>}?/<path>` requests into exact
//! `(user, repo, ref, path)` targets on the raw-content CDN.
//!
//! - [`version`] canonicalises explicit version tokens.
//! - [`fallback`] infers a default branch by CDN probing when the metadata
//!   API is rate-limited.
//! - [`engine`] orchestrates cache, metadata API, fallback and entry-file
//!   discovery.

pub mod engine;
pub mod error;
pub mod fallback;
pub mod version;

#[cfg(test)]
pub(crate) mod testing;

use serde::Serialize;

pub use engine::{CacheTtls, Resolver};
pub use error::ResolutionError;

/// One inbound request, as parsed from the URL path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    pub user: String,
    pub repo: String,
    /// Raw version token with the leading `@` already stripped.
    pub version_token: Option<String>,
    /// Raw path token.  `None`, empty, or ending in `/` means "directory".
    pub path_token: Option<String>,
}

impl ResolutionRequest {
    pub fn new(
        user: impl Into<String>,
        repo: impl Into<String>,
        version_token: Option<&str>,
        path_token: Option<&str>,
    ) -> Self {
        Self {
            user: user.into(),
            repo: repo.into(),
            version_token: version_token.map(str::to_string),
            path_token: path_token.map(str::to_string),
        }
    }

    /// The requested path when it names a file rather than a directory.
    pub fn file_path(&self) -> Option<&str> {
        self.path_token
            .as_deref()
            .filter(|p| !p.is_empty() && !p.ends_with('/'))
    }

    /// The requested directory (without trailing `/`, empty for the root)
    /// when the path does not name a file.
    pub fn directory(&self) -> Option<&str> {
        if self.file_path().is_some() {
            return None;
        }
        Some(self.path_token.as_deref().unwrap_or("").trim_end_matches('/'))
    }
}

/// Fully resolved CDN location.  `path` is never empty and never ends in `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTarget {
    pub user: String,
    pub repo: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub path: String,
}

impl ResolvedTarget {
    /// `{raw_base}/{user}/{repo}/{ref}/{path}`.
    pub fn raw_url(&self, raw_base: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            raw_base.trim_end_matches('/'),
            self.user,
            self.repo,
            self.git_ref,
            self.path
        )
    }

    /// `user/repo/ref/path`, as shown on the preview page.
    pub fn display_path(&self) -> String {
        format!("{}/{}/{}/{}", self.user, self.repo, self.git_ref, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_path_and_directory_are_exclusive() {
        let file = ResolutionRequest::new("acme", "lib", None, Some("src/mod.ts"));
        assert_eq!(file.file_path(), Some("src/mod.ts"));
        assert_eq!(file.directory(), None);

        let dir = ResolutionRequest::new("acme", "lib", None, Some("src/"));
        assert_eq!(dir.file_path(), None);
        assert_eq!(dir.directory(), Some("src"));

        let root = ResolutionRequest::new("acme", "lib", None, None);
        assert_eq!(root.directory(), Some(""));

        let empty = ResolutionRequest::new("acme", "lib", None, Some(""));
        assert_eq!(empty.directory(), Some(""));
    }

    #[test]
    fn raw_url_joins_components() {
        let target = ResolvedTarget {
            user: "acme".into(),
            repo: "lib".into(),
            git_ref: "v1.2.3".into(),
            path: "src/mod.ts".into(),
        };
        assert_eq!(
            target.raw_url("https://raw.githubusercontent.com/"),
            "https://raw.githubusercontent.com/acme/lib/v1.2.3/src/mod.ts"
        );
        assert_eq!(target.display_path(), "acme/lib/v1.2.3/src/mod.ts");
    }

    #[test]
    fn target_serializes_ref_field() {
        let target = ResolvedTarget {
            user: "acme".into(),
            repo: "lib".into(),
            git_ref: "main".into(),
            path: "mod.ts".into(),
        };
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["ref"], "main");
    }
}
