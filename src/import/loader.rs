//! Bulk CSV loader
//!
//! Streams a delimited file into one prepared INSERT. Rows that fail to
//! decode or to insert are reported as warnings; the rest of the file is
//! still committed, in a single transaction.

use std::fmt;
use std::path::{Path, PathBuf};

use csv::{ByteRecord, ReaderBuilder};
use rusqlite::{params_from_iter, Connection};

use crate::{Error, Result};

/// How a source line maps to rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordMode {
    /// One line is one row
    #[default]
    Single,
    /// `key, v1, v2, ...` gives one `(key, vN)` row per value
    Multi,
}

/// Text encoding of a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
}

impl Encoding {
    fn decode(self, bytes: &[u8]) -> std::result::Result<String, String> {
        match self {
            Encoding::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_string)
                .map_err(|e| format!("invalid UTF-8: {}", e)),
            // Latin-1 maps every byte to the code point of the same value
            Encoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }
}

/// Outcome of a row transform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowAction {
    Insert(Vec<String>),
    Skip,
}

/// Per-row hook applied before insertion
pub type RowTransform = fn(Vec<String>) -> RowAction;

/// A delimited source file and how to read it
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    delimiter: u8,
    quote: u8,
    encoding: Encoding,
    mode: RecordMode,
    columns: Option<Vec<usize>>,
    transform: Option<RowTransform>,
}

impl CsvSource {
    /// Tab-separated UTF-8 file, one row per line
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: b'\t',
            quote: b'"',
            encoding: Encoding::Utf8,
            mode: RecordMode::Single,
            columns: None,
            transform: None,
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn quote(mut self, quote: u8) -> Self {
        self.quote = quote;
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn mode(mut self, mode: RecordMode) -> Self {
        self.mode = mode;
        self
    }

    /// Source columns to insert, in target order (0-based)
    pub fn columns(mut self, columns: &[usize]) -> Self {
        self.columns = Some(columns.to_vec());
        self
    }

    pub fn transform(mut self, transform: RowTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Split a decoded line into the rows it produces
    fn rows(&self, fields: Vec<String>) -> std::result::Result<Vec<Vec<String>>, String> {
        match self.mode {
            RecordMode::Single => Ok(vec![fields]),
            RecordMode::Multi => {
                let mut fields = fields.into_iter();
                let key = fields.next().unwrap_or_default();
                let rows: Vec<Vec<String>> = fields.map(|value| vec![key.clone(), value]).collect();
                if rows.is_empty() {
                    Err("no linked value on the line".to_string())
                } else {
                    Ok(rows)
                }
            }
        }
    }

    /// Pick the configured columns out of a row
    fn select(&self, row: Vec<String>) -> std::result::Result<Vec<String>, String> {
        match &self.columns {
            None => Ok(row),
            Some(columns) => columns
                .iter()
                .map(|&i| {
                    row.get(i)
                        .cloned()
                        .ok_or_else(|| format!("missing column {} (row has {})", i + 1, row.len()))
                })
                .collect(),
        }
    }
}

/// A row that could not be imported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportWarning {
    pub source: PathBuf,
    /// 1-based line in the source file
    pub line: u64,
    /// Row content, fields joined by `,`
    pub row: String,
    pub message: String,
}

impl fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: the line ({}) could not be imported: {}",
            self.source.display(),
            self.line,
            self.row,
            self.message
        )
    }
}

/// Result of importing one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub source: PathBuf,
    /// Source lines read
    pub lines: usize,
    /// Rows written
    pub inserted: usize,
    /// Rows dropped by the transform
    pub skipped: usize,
    pub warnings: Vec<ImportWarning>,
}

impl ImportReport {
    pub fn summary(&self) -> String {
        format!("{} lines imported", self.lines)
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    fn warn(&mut self, source: &CsvSource, line: u64, row: String, message: String) {
        tracing::debug!("{}:{}: {}", source.path.display(), line, message);
        self.warnings.push(ImportWarning {
            source: source.path.clone(),
            line,
            row,
            message,
        });
    }
}

/// Import `source` through `insert_sql`, committing once at the end of the file
pub fn import_file(conn: &mut Connection, insert_sql: &str, source: &CsvSource) -> Result<ImportReport> {
    if !source.path.is_file() {
        return Err(Error::MissingFile(source.path.clone()));
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(source.delimiter)
        .quote(source.quote)
        .has_headers(false)
        .flexible(true)
        .from_path(&source.path)?;

    let mut report = ImportReport {
        source: source.path.clone(),
        ..Default::default()
    };

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(insert_sql)?;
        let mut record = ByteRecord::new();
        loop {
            let line = reader.position().line();
            match reader.read_byte_record(&mut record) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    report.lines += 1;
                    report.warn(source, line, String::new(), e.to_string());
                    continue;
                }
            }
            report.lines += 1;

            let decoded: std::result::Result<Vec<String>, String> =
                record.iter().map(|field| source.encoding.decode(field)).collect();
            let rows = match decoded.and_then(|fields| source.rows(fields)) {
                Ok(rows) => rows,
                Err(message) => {
                    let raw = String::from_utf8_lossy(record.as_slice()).into_owned();
                    report.warn(source, line, raw, message);
                    continue;
                }
            };

            for row in rows {
                let row = match source.transform {
                    Some(transform) => match transform(row) {
                        RowAction::Insert(row) => row,
                        RowAction::Skip => {
                            report.skipped += 1;
                            continue;
                        }
                    },
                    None => row,
                };

                let data = match source.select(row.clone()) {
                    Ok(data) => data,
                    Err(message) => {
                        report.warn(source, line, row.join(","), message);
                        continue;
                    }
                };

                match stmt.execute(params_from_iter(data.iter())) {
                    Ok(_) => report.inserted += 1,
                    Err(e) => report.warn(source, line, data.join(","), e.to_string()),
                }
            }
        }
    }
    tx.commit()?;

    if report.has_warnings() {
        tracing::warn!(
            "{}: {} ({} warning(s))",
            source.path.display(),
            report.summary(),
            report.warnings.len()
        );
    } else {
        tracing::info!("{}: {}", source.path.display(), report.summary());
    }
    Ok(report)
}
