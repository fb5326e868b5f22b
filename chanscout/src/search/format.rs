use std::fmt;

/// Kind of archive container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    Zip,
    Rar,
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveKind::Zip => write!(f, "zip"),
            ArchiveKind::Rar => write!(f, "rar"),
        }
    }
}

/// Declared format of a byte stream, derived from its file name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Pdf,
    Csv,
    Spreadsheet,
    GzipText,
    Archive(ArchiveKind),
    PlainText,
}

/// Position kind a format reports its matches at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorKind {
    Page,
    Line,
    Row,
}

const SUFFIXES: &[(&str, FileFormat)] = &[
    (".pdf", FileFormat::Pdf),
    (".csv", FileFormat::Csv),
    (".xlsx", FileFormat::Spreadsheet),
    (".xlsm", FileFormat::Spreadsheet),
    (".xls", FileFormat::Spreadsheet),
    (".ods", FileFormat::Spreadsheet),
    (".gz", FileFormat::GzipText),
    (".zip", FileFormat::Archive(ArchiveKind::Zip)),
    (".rar", FileFormat::Archive(ArchiveKind::Rar)),
];

impl FileFormat {
    /// Classifies a file by its name, ignoring case. Unknown suffixes are
    /// treated as plain text.
    pub fn classify(name: &str) -> Self {
        let lower = name.to_lowercase();
        SUFFIXES
            .iter()
            .find(|(suffix, _)| lower.ends_with(suffix))
            .map(|&(_, format)| format)
            .unwrap_or(FileFormat::PlainText)
    }

    /// Short name used in logs and metrics
    pub fn label(self) -> &'static str {
        match self {
            FileFormat::Pdf => "pdf",
            FileFormat::Csv => "csv",
            FileFormat::Spreadsheet => "spreadsheet",
            FileFormat::GzipText => "gzip",
            FileFormat::Archive(ArchiveKind::Zip) => "zip",
            FileFormat::Archive(ArchiveKind::Rar) => "rar",
            FileFormat::PlainText => "text",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
