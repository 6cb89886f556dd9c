//! Error taxonomy for a pipeline tick.
//!
//! Upstream failures abort the tick and are surfaced to whoever invoked it.
//! Record write failures are recovered inside the sink and only show up as
//! lower upload counts.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Transport failure or non-2xx status from an upstream endpoint.
    #[error("code: upstream_unavailable, description: {0}")]
    UpstreamUnavailable(String),

    /// The upstream body could not be decoded as the expected JSON shape.
    #[error("code: malformed_response, description: {0}")]
    MalformedResponse(String),

    /// A single document could not be upserted.
    #[error("code: record_write_failure, description: {collection}/{id}: {reason}")]
    RecordWriteFailure {
        collection: String,
        id: String,
        reason: String,
    },
}

impl Error {
    /// Returns the error code.
    #[must_use]
    pub const fn code(&self) -> &str {
        match self {
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::MalformedResponse(_) => "malformed_response",
            Self::RecordWriteFailure { .. } => "record_write_failure",
        }
    }

    /// Upstream and decode errors end the tick; write failures do not.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::RecordWriteFailure { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(format!("failed to parse response body: {err}"))
    }
}
