/// Searching of channel attachments.
///
/// A scan turns every attachment into a sequence of text chunks and tests each
/// chunk against the search term. The pieces are deliberately small:
///
/// - [`format`] decides what an attachment is from its name alone
/// - [`extract`] lazily yields located chunks (pages, lines, rows)
/// - [`matcher`] tests a chunk against the case-insensitive term
/// - [`archive`] hands out the members of zip and rar containers
/// - [`processor`] ties them together and writes every outcome to the sink
/// - [`engine`] drives a whole channel scan through the scheduler
///
/// # Chunks
///
/// Extraction never materializes a whole file. A plain text file is read line
/// by line, a gzip file is decompressed as a stream, and a CSV file is parsed
/// record by record:
///
/// ```rust,ignore
/// let chunks = extract(FileFormat::GzipText, reader)?;
/// for chunk in chunks {
///     let chunk = chunk?;
///     if matcher.is_match(&chunk.text) {
///         // one record per matching chunk
///     }
/// }
/// ```
///
/// PDFs and spreadsheets are the exception: their decoders need the whole
/// document, so those two formats are buffered before the first chunk is
/// produced.
///
/// # Archives
///
/// Members are searched in archive order. A member that is itself an archive
/// is staged to a temp file and walked recursively, carrying the trail of
/// archive names so a hit deep inside `x.zip > y.zip` still names the message
/// it came from. Nesting is capped by `max_archive_depth`.
///
/// # Failures
///
/// A file that decodes cleanly but has no hit gets a "no data found" record. A
/// file that fails to decode gets an error record; hits written before the
/// failure stay written. Neither stops the rest of the scan.
pub mod archive;
pub mod engine;
pub mod extract;
pub mod format;
pub mod matcher;
pub mod processor;

pub use engine::run_scan;
pub use format::{ArchiveKind, FileFormat, LocatorKind};
pub use matcher::PatternMatcher;
pub use processor::FileProcessor;
