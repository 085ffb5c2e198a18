//! Scripted [`RepoMetadataSource`] for resolver and router tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use reqwest::StatusCode;

use crate::forge::{RepoMetadata, RepoMetadataSource, UpstreamError};

#[derive(Debug, Clone)]
enum MetadataScript {
    Branch(String),
    RateLimited,
    Status(StatusCode, String),
}

/// Answers metadata lookups from a script and probes from a fixed set of
/// `ref/path` entries.  Records every call.
#[derive(Debug)]
pub struct ScriptedSource {
    metadata: MetadataScript,
    files: HashSet<String>,
    metadata_calls: AtomicUsize,
    probes: Mutex<Vec<String>>,
    last_credential: Mutex<Option<String>>,
}

impl ScriptedSource {
    fn new(metadata: MetadataScript) -> Self {
        Self {
            metadata,
            files: HashSet::new(),
            metadata_calls: AtomicUsize::new(0),
            probes: Mutex::new(Vec::new()),
            last_credential: Mutex::new(None),
        }
    }

    pub fn with_default_branch(branch: &str) -> Self {
        Self::new(MetadataScript::Branch(branch.to_string()))
    }

    pub fn rate_limited() -> Self {
        Self::new(MetadataScript::RateLimited)
    }

    pub fn failing(status: StatusCode, body: &str) -> Self {
        Self::new(MetadataScript::Status(status, body.to_string()))
    }

    /// Make `path` exist at `git_ref` on the fake CDN.
    pub fn with_file(mut self, git_ref: &str, path: &str) -> Self {
        self.files.insert(format!("{git_ref}/{path}"));
        self
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    /// Probed `ref/path` pairs, in call order.
    pub fn probes(&self) -> Vec<String> {
        self.probes.lock().unwrap().clone()
    }

    pub fn last_credential(&self) -> Option<String> {
        self.last_credential.lock().unwrap().clone()
    }

    pub fn network_calls(&self) -> usize {
        self.metadata_calls() + self.probes().len()
    }

    fn remember_credential(&self, credential: Option<&str>) {
        if let Some(credential) = credential {
            *self.last_credential.lock().unwrap() = Some(credential.to_string());
        }
    }
}

#[async_trait::async_trait]
impl RepoMetadataSource for ScriptedSource {
    async fn fetch_repo_metadata(
        &self,
        _user: &str,
        _repo: &str,
        credential: Option<&str>,
    ) -> Result<RepoMetadata, UpstreamError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.remember_credential(credential);
        match &self.metadata {
            MetadataScript::Branch(branch) => Ok(RepoMetadata {
                default_branch: branch.clone(),
            }),
            MetadataScript::RateLimited => Err(UpstreamError::RateLimited {
                retry_after_secs: None,
            }),
            MetadataScript::Status(status, body) => Err(UpstreamError::Status {
                status: *status,
                body: body.clone(),
            }),
        }
    }

    async fn probe_exists(
        &self,
        _user: &str,
        _repo: &str,
        git_ref: &str,
        path: &str,
        credential: Option<&str>,
    ) -> bool {
        let key = format!("{git_ref}/{path}");
        self.remember_credential(credential);
        let found = self.files.contains(&key);
        self.probes.lock().unwrap().push(key);
        found
    }
}
