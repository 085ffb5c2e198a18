//! Default-branch inference for when the metadata API is rate-limited.
//!
//! Conventional branch names are tried in a fixed order by `HEAD`-probing a
//! file on the CDN.  The first branch that has the file wins.

use tracing::{info, warn};

use crate::forge::RepoMetadataSource;

use super::error::ResolutionError;
use super::ResolutionRequest;

/// Probe order.  `master` wins when both exist.
pub const BRANCH_CANDIDATES: [&str; 2] = ["master", "main"];

/// Root-level file used as the existence probe when the request does not name
/// a file.  Present in nearly every repository.
pub const ROOT_PROBE_FILE: &str = ".gitignore";

/// The file to probe for `request`: the requested file itself, or
/// [`ROOT_PROBE_FILE`] for directory and root requests.
pub fn probe_path(request: &ResolutionRequest) -> &str {
    request.file_path().unwrap_or(ROOT_PROBE_FILE)
}

/// Return the first of [`BRANCH_CANDIDATES`] under which `probe_path`
/// exists.  Fails with [`ResolutionError::Forbidden`] when none does; the
/// failure is not retried.
pub async fn infer_default_branch(
    source: &dyn RepoMetadataSource,
    user: &str,
    repo: &str,
    probe_path: &str,
    credential: Option<&str>,
    retry_after_secs: Option<u64>,
) -> Result<String, ResolutionError> {
    for candidate in BRANCH_CANDIDATES {
        if source
            .probe_exists(user, repo, candidate, probe_path, credential)
            .await
        {
            info!(%user, %repo, branch = candidate, probe_path, "inferred default branch by probing");
            return Ok(candidate.to_string());
        }
    }

    warn!(%user, %repo, probe_path, "no conventional branch confirmed while rate-limited");
    Err(ResolutionError::Forbidden {
        user: user.to_string(),
        repo: repo.to_string(),
        retry_after_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::testing::ScriptedSource;

    #[test]
    fn probe_path_uses_requested_file() {
        let req = ResolutionRequest::new("acme", "lib", None, Some("src/mod.ts"));
        assert_eq!(probe_path(&req), "src/mod.ts");
    }

    #[test]
    fn probe_path_falls_back_to_gitignore() {
        let root = ResolutionRequest::new("acme", "lib", None, None);
        assert_eq!(probe_path(&root), ".gitignore");

        let dir = ResolutionRequest::new("acme", "lib", None, Some("src/"));
        assert_eq!(probe_path(&dir), ".gitignore");
    }

    #[tokio::test]
    async fn master_wins_when_both_exist() {
        let source = ScriptedSource::rate_limited()
            .with_file("master", ".gitignore")
            .with_file("main", ".gitignore");

        let branch = infer_default_branch(&source, "acme", "lib", ".gitignore", None, None)
            .await
            .unwrap();

        assert_eq!(branch, "master");
        assert_eq!(source.probes(), vec!["master/.gitignore"]);
    }

    #[tokio::test]
    async fn main_when_master_missing() {
        let source = ScriptedSource::rate_limited().with_file("main", ".gitignore");

        let branch = infer_default_branch(&source, "acme", "lib", ".gitignore", None, None)
            .await
            .unwrap();

        assert_eq!(branch, "main");
        assert_eq!(
            source.probes(),
            vec!["master/.gitignore", "main/.gitignore"]
        );
    }

    #[tokio::test]
    async fn forbidden_when_nothing_matches() {
        let source = ScriptedSource::rate_limited();

        let err = infer_default_branch(&source, "acme", "lib", "mod.ts", None, Some(60))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ResolutionError::Forbidden {
                retry_after_secs: Some(60),
                ..
            }
        ));
        assert_eq!(source.probes(), vec!["master/mod.ts", "main/mod.ts"]);
        assert_eq!(source.metadata_calls(), 0);
    }

    #[tokio::test]
    async fn credential_reaches_probes() {
        let source = ScriptedSource::rate_limited().with_file("master", "mod.ts");

        infer_default_branch(&source, "acme", "lib", "mod.ts", Some("token abc"), None)
            .await
            .unwrap();

        assert_eq!(source.last_credential().as_deref(), Some("token abc"));
    }
}
