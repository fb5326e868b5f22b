/// Error types for chanscout.
///
/// Errors fall into three groups, and the scheduler treats each differently:
///
/// 1. **Transient source failures** (`SourceError::RateLimited`,
///    `SourceError::ConnectionReset`): the whole work item is retried after a
///    wait. See [`SearchError::retry_hint`].
///
/// 2. **Per-file failures** (decode errors, broken archives, nesting limit):
///    recorded in the errors artifact against the file, and the sweep moves on
///    to the next sibling.
///
/// 3. **Start-up failures** (configuration, invalid pattern, unknown channel):
///    returned to the caller before any work is scheduled.
///
/// ```rust,ignore
/// match processor.search_archive(&path, ArchiveKind::Zip, &parent) {
///     Ok(output) => summary.merge(output),
///     Err(e) if e.retry_hint().is_some() => // wait, then retry the item
///     Err(e) => // recorded against the attachment, item abandoned
/// }
/// ```
use std::time::Duration;
use thiserror::Error;

/// Result type for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors raised by a [`MessageSource`](crate::source::MessageSource)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Rate limited, retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },
    #[error("Connection reset: {0}")]
    ConnectionReset(String),
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Message {0} has no attachment")]
    MissingAttachment(i64),
    #[error("Source error: {0}")]
    Other(String),
}

impl SourceError {
    pub fn rate_limited(retry_after: Duration) -> Self {
        Self::RateLimited { retry_after }
    }

    pub fn connection_reset(msg: impl Into<String>) -> Self {
        Self::ConnectionReset(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted => {
                Self::ConnectionReset(err.to_string())
            }
            _ => Self::Other(err.to_string()),
        }
    }
}

/// Errors that can occur during a scan
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),
    #[error("RAR error: {0}")]
    Rar(String),
    #[error("Unsupported archive: {0}")]
    UnsupportedArchive(String),
    #[error("Archive nesting exceeds limit: depth {depth}, limit {limit}")]
    ArchiveDepthExceeded { depth: usize, limit: usize },
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// What the scheduler should do after an attempt failed with an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryHint {
    /// Wait for exactly this long, as signaled by the source
    After(Duration),
    /// The connection dropped; wait the configured reconnect delay
    Reconnect,
}

impl SearchError {
    pub fn invalid_pattern(pattern: impl Into<String>) -> Self {
        Self::InvalidPattern(pattern.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn pdf(msg: impl ToString) -> Self {
        Self::Pdf(msg.to_string())
    }

    pub fn spreadsheet(msg: impl ToString) -> Self {
        Self::Spreadsheet(msg.to_string())
    }

    pub fn rar(msg: impl ToString) -> Self {
        Self::Rar(msg.to_string())
    }

    pub fn unsupported_archive(msg: impl Into<String>) -> Self {
        Self::UnsupportedArchive(msg.into())
    }

    pub fn depth_exceeded(depth: usize, limit: usize) -> Self {
        Self::ArchiveDepthExceeded { depth, limit }
    }

    pub fn worker_pool(msg: impl Into<String>) -> Self {
        Self::WorkerPool(msg.into())
    }

    /// Returns how to retry if this error is transient, `None` if it is terminal
    pub fn retry_hint(&self) -> Option<RetryHint> {
        match self {
            SearchError::Source(SourceError::RateLimited { retry_after }) => {
                Some(RetryHint::After(*retry_after))
            }
            SearchError::Source(SourceError::ConnectionReset(_)) => Some(RetryHint::Reconnect),
            SearchError::IoError(e) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                Some(RetryHint::Reconnect)
            }
            _ => None,
        }
    }
}
