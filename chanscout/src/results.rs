/// Record and summary types produced by a scan.
///
/// # Records
///
/// Records are what ends up in the two artifacts. Each one renders itself in a
/// single `Display` call, so the sink can write it with one append:
///
/// ```text
/// Found in file z.txt, line 4
/// Archive: message 42: x.zip > y.zip
/// Line: the matching line
/// ```
///
/// # Summaries
///
/// [`SearchOutput`] counts what happened to the files inside one attachment
/// (an archive yields one entry per member). [`ScanSummary`] folds the
/// per-attachment reports of a whole run.
use std::fmt;

use crate::metrics::ScanStats;
use crate::search::format::{FileFormat, LocatorKind};
use crate::source::MessageId;

/// Position of a chunk inside a file, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locator {
    pub kind: LocatorKind,
    pub index: usize,
}

impl Locator {
    pub fn page(index: usize) -> Self {
        Self {
            kind: LocatorKind::Page,
            index,
        }
    }

    pub fn line(index: usize) -> Self {
        Self {
            kind: LocatorKind::Line,
            index,
        }
    }

    pub fn row(index: usize) -> Self {
        Self {
            kind: LocatorKind::Row,
            index,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            LocatorKind::Page => "page",
            LocatorKind::Line => "line",
            LocatorKind::Row => "row",
        };
        write!(f, "{} {}", kind, self.index)
    }
}

/// A unit of extracted text with its position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub locator: Locator,
    pub text: String,
}

/// Where an archive member came from: the message that carried the outermost
/// archive, and every archive between it and the member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentArchive {
    pub message_id: MessageId,
    pub trail: Vec<String>,
}

impl ParentArchive {
    pub fn new(message_id: MessageId, archive_name: impl Into<String>) -> Self {
        Self {
            message_id,
            trail: vec![archive_name.into()],
        }
    }

    /// Returns the parent for members of `archive_name`, nested below `self`
    pub fn descend(&self, archive_name: impl Into<String>) -> Self {
        let mut trail = self.trail.clone();
        trail.push(archive_name.into());
        Self {
            message_id: self.message_id,
            trail,
        }
    }

    /// Nesting depth of members below this parent
    pub fn depth(&self) -> usize {
        self.trail.len()
    }

    /// Splits off the innermost archive name, returning it with the parent
    /// that archive was found in (`None` for a top-level attachment)
    pub fn split_last(&self) -> (String, Option<ParentArchive>) {
        let (last, outer) = match self.trail.split_last() {
            Some((last, outer)) => (last.clone(), outer),
            None => (String::new(), &[][..]),
        };
        let outer = (!outer.is_empty()).then(|| Self {
            message_id: self.message_id,
            trail: outer.to_vec(),
        });
        (last, outer)
    }

    pub fn trail_display(&self) -> String {
        self.trail.join(" > ")
    }
}

impl fmt::Display for ParentArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "message {}: {}", self.message_id, self.trail_display())
    }
}

/// One search hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub file_name: String,
    pub locator: Locator,
    pub text: String,
    pub parent: Option<ParentArchive>,
}

impl fmt::Display for MatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Found in file {}, {}", self.file_name, self.locator)?;
        if let Some(parent) = &self.parent {
            writeln!(f, "Archive: {}", parent)?;
        }
        let label = match self.locator.kind {
            LocatorKind::Page => "Text",
            LocatorKind::Line | LocatorKind::Row => "Line",
        };
        writeln!(f, "{}: {}", label, self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The file was searched completely without a hit
    NoMatch,
    /// The file could not be decoded or processed
    Error(String),
}

/// A no-match or processing-error entry for the errors artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub file_name: String,
    pub parent: Option<ParentArchive>,
    pub kind: FailureKind,
}

impl FailureRecord {
    pub fn no_match(file_name: impl Into<String>, parent: Option<ParentArchive>) -> Self {
        Self {
            file_name: file_name.into(),
            parent,
            kind: FailureKind::NoMatch,
        }
    }

    pub fn error(
        file_name: impl Into<String>,
        parent: Option<ParentArchive>,
        reason: impl ToString,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            parent,
            kind: FailureKind::Error(reason.to_string()),
        }
    }
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.parent) {
            (FailureKind::NoMatch, None) => {
                writeln!(f, "No data found in file: {}", self.file_name)
            }
            (FailureKind::NoMatch, Some(parent)) => writeln!(
                f,
                "No data found in archive: {}, file: {} (via {})",
                parent.message_id,
                self.file_name,
                parent.trail_display()
            ),
            (FailureKind::Error(reason), None) => writeln!(
                f,
                "Error processing file: {}, error: {}",
                self.file_name, reason
            ),
            (FailureKind::Error(reason), Some(parent)) => writeln!(
                f,
                "Error processing archive member: {} from message {} (via {}), error: {}",
                self.file_name,
                parent.message_id,
                parent.trail_display(),
                reason
            ),
        }
    }
}

/// Counters for the files searched on behalf of one attachment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOutput {
    /// Files whose text was scanned, archive members included
    pub files_searched: usize,
    /// Files with at least one hit
    pub files_with_matches: usize,
    /// Total match records written
    pub total_matches: usize,
    /// Processing errors recorded
    pub failures: usize,
}

impl SearchOutput {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds the result of scanning a single file
    pub fn add_file(&mut self, matches: usize) {
        self.files_searched += 1;
        if matches > 0 {
            self.files_with_matches += 1;
            self.total_matches += matches;
        }
    }

    pub fn add_failure(&mut self) {
        self.failures += 1;
    }

    pub fn merge(&mut self, other: SearchOutput) {
        self.files_searched += other.files_searched;
        self.files_with_matches += other.files_with_matches;
        self.total_matches += other.total_matches;
        self.failures += other.failures;
    }

    pub fn found_any(&self) -> bool {
        self.total_matches > 0
    }
}

/// Final state of one work item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Done,
    Failed(String),
}

/// What happened to one attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub message_id: MessageId,
    pub attachment: String,
    pub format: FileFormat,
    pub attempts: u32,
    pub output: SearchOutput,
    pub status: ItemStatus,
}

/// Aggregate of a whole run
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    /// Attachments handed to the scheduler
    pub items_scheduled: usize,
    /// Attachments filtered out before scheduling
    pub items_skipped: usize,
    /// Attachments abandoned after a terminal error
    pub items_failed: usize,
    /// Extra attempts caused by transient failures
    pub retries: usize,
    pub output: SearchOutput,
    /// Per-attachment reports in completion order
    pub reports: Vec<ItemReport>,
    /// Counters captured when the scan finished
    pub stats: ScanStats,
}

impl ScanSummary {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds an attachment report to the summary
    pub fn add_report(&mut self, report: ItemReport) {
        self.retries += report.attempts.saturating_sub(1) as usize;
        if let ItemStatus::Failed(_) = report.status {
            self.items_failed += 1;
        }
        self.output.merge(report.output);
        self.reports.push(report);
    }
}
