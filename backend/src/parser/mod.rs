//! Source Reader: streams catalog rows from a delimited file.
//!
//! The file's encoding and delimiter are sniffed once when the reader is opened.
//! Rows are then pulled lazily with the `csv` crate over raw bytes and decoded
//! one at a time, so a single undecodable row does not poison the whole file.
//!
//! The reader is restartable: every call to [`SourceReader::records`] reopens
//! the file from the top.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{SourceError, SourceResult};
use crate::models::RawRecord;

/// Bytes sampled for encoding and delimiter detection.
const SNIFF_BYTES: u64 = 64 * 1024;

/// Encodings the reader knows how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    /// Strict: an invalid row is reported as malformed.
    Utf8,
    Latin1,
    Windows1252,
}

impl SourceEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            SourceEncoding::Utf8 => "utf-8",
            SourceEncoding::Latin1 => "iso-8859-1",
            SourceEncoding::Windows1252 => "windows-1252",
        }
    }

    fn from_name(name: &str) -> Self {
        match name {
            "iso-8859-1" => SourceEncoding::Latin1,
            "windows-1252" => SourceEncoding::Windows1252,
            _ => SourceEncoding::Utf8,
        }
    }

    /// Decode one field.
    pub fn decode(&self, bytes: &[u8]) -> Result<String, String> {
        match self {
            SourceEncoding::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_string)
                .map_err(|e| format!("invalid UTF-8: {}", e)),
            // WHATWG maps the iso-8859-1 label onto windows-1252, a strict superset.
            SourceEncoding::Latin1 | SourceEncoding::Windows1252 => {
                Ok(encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned())
            }
        }
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => "utf-8".to_string(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> u8 {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [b',', b';', b'\t', b'|'];
    let mut best_sep = b',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep as char).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Lazily readable catalog file.
#[derive(Debug, Clone)]
pub struct SourceReader {
    path: PathBuf,
    encoding: SourceEncoding,
    delimiter: u8,
    headers: Vec<String>,
}

impl SourceReader {
    /// Open a catalog file, sniffing its encoding and delimiter.
    pub fn open<P: AsRef<Path>>(path: P) -> SourceResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(SourceError::SourceNotFound(path));
        }

        let mut sample = Vec::new();
        File::open(&path)?.take(SNIFF_BYTES).read_to_end(&mut sample)?;

        let encoding = SourceEncoding::from_name(&detect_encoding(&sample));
        let preview = String::from_utf8_lossy(&sample);
        let delimiter = detect_delimiter(&preview);

        Self::with_settings(path, encoding, delimiter)
    }

    /// Open with explicit settings, skipping detection.
    pub fn with_settings<P: AsRef<Path>>(
        path: P,
        encoding: SourceEncoding,
        delimiter: u8,
    ) -> SourceResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(SourceError::SourceNotFound(path));
        }

        let mut reader = csv_reader(&path, delimiter)?;
        let raw_headers = reader
            .byte_headers()
            .map_err(|e| SourceError::MalformedRecord { row: 0, message: e.to_string() })?;

        let headers = raw_headers
            .iter()
            .map(|h| {
                encoding
                    .decode(h)
                    .map(|s| s.trim_start_matches('\u{feff}').trim().to_string())
                    .map_err(|message| SourceError::MalformedRecord { row: 0, message })
            })
            .collect::<SourceResult<Vec<_>>>()?;

        if headers.iter().all(|h| h.is_empty()) {
            return Err(SourceError::NoHeaders);
        }

        Ok(Self { path, encoding, delimiter, headers })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn encoding(&self) -> SourceEncoding {
        self.encoding
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Stream the rows from the top of the file.
    pub fn records(&self) -> SourceResult<Records> {
        let reader = csv_reader(&self.path, self.delimiter)?;
        Ok(Records {
            inner: reader.into_byte_records(),
            headers: self.headers.clone(),
            encoding: self.encoding,
            row: 0,
        })
    }
}

fn csv_reader(path: &Path, delimiter: u8) -> SourceResult<csv::Reader<File>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SourceError::SourceNotFound(path.to_path_buf()),
        _ => SourceError::Io(e),
    })?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(file))
}

/// Iterator over the rows of a [`SourceReader`].
///
/// Yields `Err(MalformedRecord)` for a row that cannot be decoded and keeps going.
pub struct Records {
    inner: csv::ByteRecordsIntoIter<File>,
    headers: Vec<String>,
    encoding: SourceEncoding,
    row: usize,
}

impl Records {
    fn decode_row(&self, record: &csv::ByteRecord) -> SourceResult<RawRecord> {
        let mut fields = std::collections::HashMap::with_capacity(self.headers.len());
        for (header, raw) in self.headers.iter().zip(record.iter()) {
            let value = self
                .encoding
                .decode(raw)
                .map_err(|message| SourceError::MalformedRecord {
                    row: self.row,
                    message: format!("column '{}': {}", header, message),
                })?;
            fields.insert(header.clone(), value);
        }
        Ok(RawRecord::new(self.row, fields))
    }
}

impl Iterator for Records {
    type Item = SourceResult<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.inner.next()?;
        self.row += 1;
        Some(match next {
            Ok(record) => self.decode_row(&record),
            Err(e) => Err(SourceError::MalformedRecord { row: self.row, message: e.to_string() }),
        })
    }
}
