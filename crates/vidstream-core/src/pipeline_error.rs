//! Pipeline execution error types
//!
//! A pipeline stage can fail in two ways: the input is defective and retrying
//! is pointless (corrupt media, empty frame set, missing asset), or an
//! upstream dependency is temporarily unavailable (rate limiting, transient
//! outage). `PipelineError` carries that distinction so the moderation retry
//! loop and the orchestrator's terminal-state mapping can act on it.

use std::fmt;

#[derive(Debug)]
pub struct PipelineError {
    inner: anyhow::Error,
    retryable: bool,
}

impl PipelineError {
    /// A fatal error: the run aborts without retrying.
    ///
    /// Use for defects in the source media or the caller contract:
    /// probe/extraction failures, an empty frame set, an asset that does not
    /// exist, a non-retryable upstream rejection.
    pub fn fatal(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            retryable: false,
        }
    }

    /// A transient upstream error: eligible for retry within the stage's
    /// retry budget (rate-limit or unavailable signals from the
    /// classification API).
    pub fn retryable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            retryable: true,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.inner
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for PipelineError {
    /// Default conversion treats the error as fatal; stages opt in to retry.
    fn from(err: anyhow::Error) -> Self {
        Self::fatal(err)
    }
}

/// Extension trait for Result to mark errors fatal without a map_err dance.
pub trait PipelineResultExt<T> {
    fn fatal(self) -> Result<T, PipelineError>;
}

impl<T, E: Into<anyhow::Error>> PipelineResultExt<T> for Result<T, E> {
    fn fatal(self) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError::fatal(e.into()))
    }
}
