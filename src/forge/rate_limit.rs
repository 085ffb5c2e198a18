//! Metadata API rate-limit detection.
//!
//! GitHub reports quota exhaustion as `403 Forbidden` with
//! `X-RateLimit-Remaining: 0` (the IETF draft spells it `RateLimit-Remaining`).
//! [`is_exhausted`] is the only place that decides whether a response means
//! "fall back to CDN probing"; everything else just reads the result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use tracing::debug;

/// `true` when the metadata API refused the call because the caller's quota
/// is used up.
pub fn is_exhausted(status: StatusCode, headers: &HeaderMap) -> bool {
    status == StatusCode::FORBIDDEN && remaining(headers) == Some(0)
}

/// Remaining calls reported by the response, if any.
pub fn remaining(headers: &HeaderMap) -> Option<u64> {
    header_u64(headers, "X-RateLimit-Remaining", "RateLimit-Remaining")
}

/// Unix timestamp at which the quota resets, if reported.
pub fn reset_at(headers: &HeaderMap) -> Option<u64> {
    header_u64(headers, "X-RateLimit-Reset", "RateLimit-Reset")
}

/// Seconds from now until the reported reset, or `None` if not reported.
pub fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    let reset = reset_at(headers)?;
    Some(reset.saturating_sub(now_secs()))
}

fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

fn header_u64(headers: &HeaderMap, primary: &str, fallback: &str) -> Option<u64> {
    headers
        .get(primary)
        .or_else(|| headers.get(fallback))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

// ---------------------------------------------------------------------------
// Last observed quota
// ---------------------------------------------------------------------------

/// Last quota snapshot seen on any metadata response.
///
/// Informational only (metrics, logs).  Requests are never gated on it since
/// the quota is per-credential and resets asynchronously.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    remaining: Arc<AtomicU64>,
    reset_at: Arc<AtomicU64>,
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitState {
    pub fn new() -> Self {
        Self {
            remaining: Arc::new(AtomicU64::new(u64::MAX)),
            reset_at: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current remaining calls (`u64::MAX` until a response reported one).
    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::Relaxed)
    }

    /// Unix timestamp when the window resets.
    pub fn reset_at(&self) -> u64 {
        self.reset_at.load(Ordering::Relaxed)
    }

    /// Seconds until the last reported reset, or `None` if no response has
    /// carried a reset time yet.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self.reset_at() {
            0 => None,
            reset => Some(reset.saturating_sub(now_secs())),
        }
    }

    /// Update state from HTTP response headers.
    pub fn update_from_headers(&self, headers: &HeaderMap) {
        if let Some(r) = remaining(headers) {
            self.remaining.store(r, Ordering::Relaxed);
        }
        if let Some(r) = reset_at(headers) {
            self.reset_at.store(r, Ordering::Relaxed);
        }
        debug!(
            remaining = self.remaining(),
            reset_at = self.reset_at(),
            "metadata API quota"
        );
    }
}
