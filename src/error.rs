use thiserror::Error;

pub type Result<T> = std::result::Result<T, DigestError>;

/// Failure taxonomy for the digest pipeline and the admin API.
///
/// Provider/model/notification variants carry the upstream message so the
/// operator sees it verbatim in `error_message` and in trigger responses.
#[derive(Debug, Error)]
pub enum DigestError {
    #[error("analytics provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("analytics query failed: {0}")]
    ProviderQuery(String),

    #[error("model service unavailable: {0}")]
    ModelUnavailable(String),

    #[error("model output invalid: {0}")]
    ModelOutputInvalid(String),

    #[error("notification delivery failed: {0}")]
    NotificationUnavailable(String),

    #[error("illegal status transition: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("a non-failed report already exists for the week starting {start}")]
    DuplicatePeriod { start: String },

    #[error("missing or invalid trigger credential")]
    Unauthorized,

    #[error("report not found: {0}")]
    ReportNotFound(i64),

    #[error("hypothesis not found: {0}")]
    HypothesisNotFound(i64),

    #[error("corrupt stored record: {0}")]
    CorruptRecord(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
