//! Failure taxonomy surfaced to the presentation layer
//!
//! Every failure is local to the triggering user action and bubbles to
//! the caller; nothing is retried or swallowed here.

use thiserror::Error;

/// Why a one-shot geolocation attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoFailure {
    PermissionDenied,
    Timeout,
}

impl GeoFailure {
    pub fn as_str(&self) -> &str {
        match self {
            GeoFailure::PermissionDenied => "permission_denied",
            GeoFailure::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for GeoFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// A share action was attempted with no authenticated identity
    #[error("no authenticated identity")]
    Unauthenticated,

    /// Row-store insert or select failed; not retried automatically
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Device geolocation was denied or timed out
    #[error("geolocation failure: {0}")]
    Geolocation(GeoFailure),

    /// Live feed subscription could not be established
    #[error("live feed failure: {0}")]
    Feed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
