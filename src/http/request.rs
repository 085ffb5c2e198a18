//! URL path → [`ResolutionRequest`].
//!
//! Grammar: `/:user/:repo{@:version}?/:path(.*)`.  `/:user/:repo` without
//! a trailing slash is accepted as a root request.

use crate::resolve::{ResolutionError, ResolutionRequest};

pub fn parse_request_path(path: &str) -> Result<ResolutionRequest, ResolutionError> {
    let malformed = || ResolutionError::Malformed {
        path: path.to_string(),
    };

    let rest = path.strip_prefix('/').ok_or_else(malformed)?;
    let (user, rest) = rest.split_once('/').ok_or_else(malformed)?;
    let (repo_part, file_part) = match rest.split_once('/') {
        Some((repo_part, file_part)) => (repo_part, Some(file_part)),
        None => (rest, None),
    };

    let (repo, version) = match repo_part.split_once('@') {
        Some((repo, version)) => (repo, Some(version)),
        None => (repo_part, None),
    };

    if user.is_empty() || repo.is_empty() || version.is_some_and(str::is_empty) {
        return Err(malformed());
    }

    let path_token = file_part.filter(|p| !p.is_empty());

    Ok(ResolutionRequest::new(user, repo, version, path_token))
}
