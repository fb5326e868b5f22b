/// Per-format text extraction.
///
/// Every format is exposed as a lazy iterator of [`TextChunk`]s so that the
/// matcher can record hits while the file is still being read:
///
/// | format      | locator | chunk                                   | memory      |
/// |-------------|---------|-----------------------------------------|-------------|
/// | plain text  | line    | one line, invalid UTF-8 dropped         | one line    |
/// | gzip text   | line    | one decompressed line                   | one line    |
/// | csv         | row     | cells joined by a space                 | one record  |
/// | spreadsheet | row     | first sheet, data rows after the header | whole sheet |
/// | pdf         | page    | text of one page, empty pages skipped   | whole file  |
///
/// Iterators are finite and can be consumed once. A decode error ends the
/// iterator after yielding `Err`.
use calamine::Reader as _;
use flate2::read::MultiGzDecoder;
use std::io::{BufRead, BufReader, Cursor, Read};
use tracing::trace;

use super::format::FileFormat;
use crate::errors::{SearchError, SearchResult};
use crate::results::{Locator, TextChunk};

const BUFFER_CAPACITY: usize = 65536;

/// Boxed chunk iterator returned by [`extract`]
pub type Chunks<'a> = Box<dyn Iterator<Item = SearchResult<TextChunk>> + 'a>;

/// Builds the chunk iterator for `format` over `reader`.
///
/// Archives are not extractable; they are walked by the archive module.
pub fn extract<'a, R: Read + 'a>(format: FileFormat, reader: R) -> SearchResult<Chunks<'a>> {
    trace!("Extracting {} stream", format);
    match format {
        FileFormat::PlainText => Ok(Box::new(LineChunks::new(BufReader::with_capacity(
            BUFFER_CAPACITY,
            reader,
        )))),
        FileFormat::GzipText => Ok(Box::new(LineChunks::new(BufReader::with_capacity(
            BUFFER_CAPACITY,
            MultiGzDecoder::new(reader),
        )))),
        FileFormat::Csv => Ok(Box::new(CsvChunks::new(reader))),
        FileFormat::Spreadsheet => spreadsheet_chunks(reader),
        FileFormat::Pdf => pdf_chunks(reader),
        FileFormat::Archive(kind) => Err(SearchError::unsupported_archive(format!(
            "{} archive cannot be read as text",
            kind
        ))),
    }
}

/// Decodes UTF-8, silently dropping invalid byte sequences
pub fn decode_lossy(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

fn trim_line_ending(mut bytes: &[u8]) -> &[u8] {
    if let Some(rest) = bytes.strip_suffix(b"\n") {
        bytes = rest;
    }
    if let Some(rest) = bytes.strip_suffix(b"\r") {
        bytes = rest;
    }
    bytes
}

/// Line-by-line chunks over a buffered reader
pub struct LineChunks<R> {
    reader: R,
    buf: Vec<u8>,
    line: usize,
    done: bool,
}

impl<R: BufRead> LineChunks<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(256),
            line: 0,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for LineChunks<R> {
    type Item = SearchResult<TextChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                self.line += 1;
                Some(Ok(TextChunk {
                    locator: Locator::line(self.line),
                    text: decode_lossy(trim_line_ending(&self.buf)),
                }))
            }
            Err(e) => {
                self.done = true;
                Some(Err(SearchError::IoError(e)))
            }
        }
    }
}

/// Record-by-record chunks over CSV input
pub struct CsvChunks<R> {
    reader: csv::Reader<R>,
    record: csv::ByteRecord,
    row: usize,
    done: bool,
}

impl<R: Read> CsvChunks<R> {
    pub fn new(reader: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        Self {
            reader,
            record: csv::ByteRecord::new(),
            row: 0,
            done: false,
        }
    }
}

impl<R: Read> Iterator for CsvChunks<R> {
    type Item = SearchResult<TextChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_byte_record(&mut self.record) {
            Ok(true) => {
                self.row += 1;
                let text = self
                    .record
                    .iter()
                    .map(decode_lossy)
                    .collect::<Vec<_>>()
                    .join(" ");
                Some(Ok(TextChunk {
                    locator: Locator::row(self.row),
                    text,
                }))
            }
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(SearchError::Csv(e)))
            }
        }
    }
}

fn read_all<R: Read>(mut reader: R) -> SearchResult<Vec<u8>> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Data rows of the first worksheet; the header row is not searched
fn spreadsheet_chunks<'a, R: Read + 'a>(reader: R) -> SearchResult<Chunks<'a>> {
    let bytes = read_all(reader)?;
    let mut workbook =
        calamine::open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(SearchError::spreadsheet)?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(SearchError::spreadsheet)?,
        None => return Ok(Box::new(std::iter::empty())),
    };

    let chunks: Vec<_> = range
        .rows()
        .skip(1)
        .enumerate()
        .map(|(i, row)| {
            let text = row
                .iter()
                .map(|cell| cell.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            Ok(TextChunk {
                locator: Locator::row(i + 1),
                text,
            })
        })
        .collect();

    Ok(Box::new(chunks.into_iter()))
}

/// Pages of a PDF document; pages without text are skipped
fn pdf_chunks<'a, R: Read + 'a>(reader: R) -> SearchResult<Chunks<'a>> {
    let bytes = read_all(reader)?;

    // pdf-extract panics on some malformed documents
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(&bytes))
        .map_err(|_| SearchError::pdf("decoder panicked on malformed document"))?
        .map_err(SearchError::pdf)?;

    Ok(Box::new(
        pages
            .into_iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, text)| {
                Ok(TextChunk {
                    locator: Locator::page(i + 1),
                    text,
                })
            }),
    ))
}
