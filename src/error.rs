use thiserror::Error;

/// Failures that abort an ingestion run. Per-record problems never reach
/// this type; they are logged and counted in the report instead.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to retrieve {url}: {reason}")]
    Retrieval { url: String, reason: String },

    #[error("no candidate records found in {url}")]
    NoCandidates { url: String },

    #[error("invalid source: {0}")]
    InvalidSource(String),

    #[error("source attribution failed")]
    Attribution(#[source] anyhow::Error),
}
