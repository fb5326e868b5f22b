use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, error, trace, warn};

use super::archive::{walk_rar, walk_zip, MemberVisitor};
use super::extract::extract;
use super::format::{ArchiveKind, FileFormat};
use super::matcher::PatternMatcher;
use crate::errors::{SearchError, SearchResult};
use crate::metrics::ScanMetrics;
use crate::results::{FailureRecord, MatchRecord, ParentArchive, SearchOutput};
use crate::sink::ResultSink;

/// Runs the classify → extract → match pipeline over files and archive
/// members, writing every outcome to the sink.
///
/// All methods are blocking; the scheduler calls them from blocking tasks or
/// from the worker pool.
#[derive(Debug, Clone)]
pub struct FileProcessor {
    matcher: PatternMatcher,
    sink: ResultSink,
    metrics: ScanMetrics,
    max_archive_depth: usize,
}

impl FileProcessor {
    pub fn new(
        matcher: PatternMatcher,
        sink: ResultSink,
        metrics: ScanMetrics,
        max_archive_depth: usize,
    ) -> Self {
        Self {
            matcher,
            sink,
            metrics,
            max_archive_depth,
        }
    }

    pub fn sink(&self) -> &ResultSink {
        &self.sink
    }

    /// Searches a downloaded attachment that is not an archive
    pub fn search_file(&self, path: &Path, name: &str) -> SearchOutput {
        let format = FileFormat::classify(name);
        trace!("Processing file {} as {}", name, format);
        match File::open(path) {
            Ok(file) => self.search_stream(name, format, &mut BufReader::new(file), None),
            Err(e) => {
                let mut output = SearchOutput::new();
                self.record_error(name, None, &SearchError::IoError(e), &mut output);
                output
            }
        }
    }

    /// Walks a downloaded archive attachment.
    ///
    /// `parent` names the attachment itself; its members are searched at
    /// depth 1. Fails if the archive cannot be opened; member failures are
    /// recorded and do not fail the walk.
    pub fn search_archive(
        &self,
        path: &Path,
        kind: ArchiveKind,
        parent: &ParentArchive,
    ) -> SearchResult<SearchOutput> {
        match kind {
            ArchiveKind::Zip => {
                let file = BufReader::new(File::open(path)?);
                self.walk_members(kind, parent, |visitor| walk_zip(file, visitor))
            }
            ArchiveKind::Rar => self.walk_members(kind, parent, |visitor| walk_rar(path, visitor)),
        }
    }

    /// Routes an archive member: nested archives are walked, everything else
    /// is searched
    pub fn search_member(
        &self,
        name: &str,
        reader: &mut dyn Read,
        parent: &ParentArchive,
    ) -> SearchOutput {
        match FileFormat::classify(name) {
            FileFormat::Archive(kind) => self.search_nested_archive(name, kind, reader, parent),
            format => self.search_stream(name, format, reader, Some(parent)),
        }
    }

    /// Searches one text-bearing stream and records its outcome
    pub fn search_stream(
        &self,
        name: &str,
        format: FileFormat,
        reader: &mut dyn Read,
        parent: Option<&ParentArchive>,
    ) -> SearchOutput {
        self.metrics.record_file(format);
        let mut output = SearchOutput::new();
        let mut hits = 0;

        let scanned = extract(format, reader).and_then(|chunks| {
            for chunk in chunks {
                let chunk = chunk?;
                if self.matcher.is_match(&chunk.text) {
                    hits += 1;
                    self.sink.record_match(&MatchRecord {
                        file_name: name.to_string(),
                        locator: chunk.locator,
                        text: chunk.text,
                        parent: parent.cloned(),
                    });
                }
            }
            Ok(())
        });

        match scanned {
            Ok(()) => {
                output.add_file(hits);
                if hits == 0 {
                    debug!("No data found in {}", name);
                    self.sink
                        .record_failure(&FailureRecord::no_match(name, parent.cloned()));
                }
            }
            Err(e) => {
                if hits > 0 {
                    output.add_file(hits);
                }
                self.record_error(name, parent, &e, &mut output);
            }
        }
        output
    }

    fn search_nested_archive(
        &self,
        name: &str,
        kind: ArchiveKind,
        reader: &mut dyn Read,
        parent: &ParentArchive,
    ) -> SearchOutput {
        let nested = parent.descend(name);
        let depth = nested.depth();

        let walked = if depth > self.max_archive_depth {
            Err(SearchError::depth_exceeded(depth, self.max_archive_depth))
        } else {
            self.stage_and_walk(kind, reader, &nested)
        };

        walked.unwrap_or_else(|e| {
            let mut output = SearchOutput::new();
            self.record_error(name, Some(parent), &e, &mut output);
            output
        })
    }

    /// Copies a member archive to a temp file and walks it there; zip needs a
    /// seekable reader and rar needs a path
    fn stage_and_walk(
        &self,
        kind: ArchiveKind,
        reader: &mut dyn Read,
        nested: &ParentArchive,
    ) -> SearchResult<SearchOutput> {
        match kind {
            ArchiveKind::Zip => {
                let mut staged = tempfile::tempfile()?;
                io::copy(reader, &mut staged)?;
                staged.seek(SeekFrom::Start(0))?;
                self.walk_members(kind, nested, |visitor| walk_zip(BufReader::new(staged), visitor))
            }
            ArchiveKind::Rar => {
                let mut staged = tempfile::NamedTempFile::new()?;
                io::copy(reader, staged.as_file_mut())?;
                staged.flush()?;
                self.walk_members(kind, nested, |visitor| walk_rar(staged.path(), visitor))
            }
        }
    }

    /// Runs `walk` with a visitor searching the members of `parent`. An
    /// archive without file members gets a no-match record of its own.
    ///
    /// Fails only if the archive broke before any member was reached; a walk
    /// that breaks later keeps what was searched and records the error
    /// against the archive.
    fn walk_members<F>(
        &self,
        kind: ArchiveKind,
        parent: &ParentArchive,
        walk: F,
    ) -> SearchResult<SearchOutput>
    where
        F: FnOnce(&mut dyn MemberVisitor) -> SearchResult<usize>,
    {
        self.metrics.record_file(FileFormat::Archive(kind));
        let mut visitor = MemberSearch {
            processor: self,
            parent,
            output: SearchOutput::new(),
            reached: 0,
        };
        let walked = walk(&mut visitor);
        let (name, outer) = parent.split_last();

        match walked {
            Ok(0) => {
                debug!("Archive {} has no file members", parent.trail_display());
                self.sink.record_failure(&FailureRecord::no_match(name, outer));
            }
            Ok(_) => {}
            Err(e) if visitor.reached == 0 => return Err(e),
            Err(e) => {
                warn!(
                    "Archive {} broke after {} members",
                    parent.trail_display(),
                    visitor.reached
                );
                self.record_error(&name, outer.as_ref(), &e, &mut visitor.output);
            }
        }
        Ok(visitor.output)
    }

    fn record_error(
        &self,
        name: &str,
        parent: Option<&ParentArchive>,
        error: &SearchError,
        output: &mut SearchOutput,
    ) {
        match parent {
            Some(parent) => error!(
                "Error processing {} from message {} ({}): {}",
                name,
                parent.message_id,
                parent.trail_display(),
                error
            ),
            None => error!("Error searching file {}: {}", name, error),
        }
        output.add_failure();
        self.sink
            .record_failure(&FailureRecord::error(name, parent.cloned(), error));
    }
}

/// Searches each member it is handed, accumulating the counters
struct MemberSearch<'a> {
    processor: &'a FileProcessor,
    parent: &'a ParentArchive,
    output: SearchOutput,
    /// Members handed out so far, readable or not
    reached: usize,
}

impl MemberVisitor for MemberSearch<'_> {
    fn visit(&mut self, name: &str, reader: &mut dyn Read) {
        self.reached += 1;
        let output = self.processor.search_member(name, reader, self.parent);
        self.output.merge(output);
    }

    fn member_failed(&mut self, name: &str, error: SearchError) {
        self.reached += 1;
        warn!("Skipping unreadable member {}", name);
        self.processor
            .record_error(name, Some(self.parent), &error, &mut self.output);
    }
}
