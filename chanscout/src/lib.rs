/// Multi-format content search over the attachments of a message channel.
///
/// A scan lists every message of a channel, downloads each attachment once
/// and searches its text for a case-insensitive term. PDFs, CSV files,
/// spreadsheets, gzip-compressed text, plain text and zip/rar archives (nested
/// ones included) are understood. Hits and failures are appended to two
/// plain-text artifacts while the scan runs.
///
/// ```rust,ignore
/// let config = ScanConfig::load_from(None)?;
/// let source = Arc::new(DirectorySource::new(&config.source_root));
/// let summary = run_scan(&config, "invoice", source, &SilentProgress).await?;
/// println!("{} matches", summary.output.total_matches);
/// ```
pub mod config;
pub mod errors;
pub mod filters;
pub mod logging;
pub mod metrics;
pub mod pool;
pub mod progress;
pub mod results;
pub mod scheduler;
pub mod search;
pub mod sink;
pub mod source;

pub use config::ScanConfig;
pub use errors::{SearchError, SearchResult, SourceError};
pub use progress::{BarProgress, ProgressReporter, SilentProgress};
pub use results::{FailureRecord, MatchRecord, ScanSummary, SearchOutput};
pub use search::run_scan;
pub use sink::ResultSink;
pub use source::{DirectorySource, MessageSource};
