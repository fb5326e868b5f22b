use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::errors::SearchResult;
use crate::results::{FailureRecord, MatchRecord};

/// Appends records to the results and errors artifacts.
///
/// Every record is rendered up front and written with one `write_all` on a
/// handle opened in append mode, then the handle is closed. Concurrent writers
/// from tasks and pool threads therefore never interleave partial records and
/// need no lock.
#[derive(Debug, Clone)]
pub struct ResultSink {
    results_path: PathBuf,
    errors_path: PathBuf,
}

impl ResultSink {
    pub fn new(results_path: impl Into<PathBuf>, errors_path: impl Into<PathBuf>) -> Self {
        Self {
            results_path: results_path.into(),
            errors_path: errors_path.into(),
        }
    }

    pub fn results_path(&self) -> &Path {
        &self.results_path
    }

    pub fn errors_path(&self) -> &Path {
        &self.errors_path
    }

    fn append(path: &Path, record: &str) -> SearchResult<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(record.as_bytes())?;
        Ok(())
    }

    /// Writes one match to the results artifact
    pub fn record_match(&self, record: &MatchRecord) {
        info!("Found in file {}, {}", record.file_name, record.locator);
        if let Err(e) = Self::append(&self.results_path, &record.to_string()) {
            error!(
                "Failed to write match for {} to {}: {}",
                record.file_name,
                self.results_path.display(),
                e
            );
        }
    }

    /// Writes a no-match or processing-error entry to the errors artifact
    pub fn record_failure(&self, record: &FailureRecord) {
        if let Err(e) = Self::append(&self.errors_path, &record.to_string()) {
            error!(
                "Failed to write failure for {} to {}: {}",
                record.file_name,
                self.errors_path.display(),
                e
            );
        }
    }
}
