//! Row sources: the opened, not-yet-merged data streams handed to the tree.

use std::collections::HashMap;
use std::io::BufRead;

use log::debug;

use crate::error::{MergeError, MergeResult};

/// One record: column name (dot notation) to string value.
///
/// Enrichment only ever adds keys to a row.
pub type Row = HashMap<String, String>;

/// Column access that reports which column was missing.
pub trait RowExt {
    fn value(&self, column: &str) -> MergeResult<&str>;
}

impl RowExt for Row {
    fn value(&self, column: &str) -> MergeResult<&str> {
        self.get(column)
            .map(String::as_str)
            .ok_or_else(|| MergeError::MissingColumn(column.to_string()))
    }
}

/// A pull-based iterator of rows that must be closed explicitly.
///
/// `close` may be called at most once by the tree; sources should release
/// any descriptors or connections there.
pub trait RowSource: Send {
    /// Next row, `None` when exhausted.
    fn next_row(&mut self) -> Option<MergeResult<Row>>;

    /// Release underlying resources.
    fn close(&mut self) {}
}

pub type BoxedRowSource = Box<dyn RowSource>;

/// Opened streams keyed by stream name, consumed by `accept_streams`.
pub type StreamMap = HashMap<String, BoxedRowSource>;

/// Close every source in `streams`.
pub fn close_all(streams: StreamMap) {
    for (name, mut source) in streams {
        debug!("Closing unclaimed stream {}", name);
        source.close();
    }
}

// =============================================================================
// In-memory source
// =============================================================================

/// Rows held in memory. Used for computed results and tests.
#[derive(Debug)]
pub struct MemorySource {
    rows: std::vec::IntoIter<Row>,
}

impl MemorySource {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }

    /// Build rows from a header and positional values.
    pub fn from_table(columns: &[&str], rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|values| {
                columns
                    .iter()
                    .zip(values.iter())
                    .map(|(c, v)| (c.to_string(), v.to_string()))
                    .collect()
            })
            .collect();
        Self::new(rows)
    }
}

impl RowSource for MemorySource {
    fn next_row(&mut self) -> Option<MergeResult<Row>> {
        self.rows.next().map(Ok)
    }
}

// =============================================================================
// Tab-delimited source
// =============================================================================

/// Tab-delimited text with a header line naming the columns.
pub struct TabularSource<R> {
    name: String,
    reader: Option<R>,
    headers: Vec<String>,
    line: String,
    line_number: usize,
}

impl<R: BufRead> TabularSource<R> {
    /// Read the header line and prepare to stream rows.
    pub fn new(name: impl Into<String>, mut reader: R) -> MergeResult<Self> {
        let name = name.into();
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 {
            return Err(MergeError::MalformedRow {
                stream: name,
                message: "missing header line".to_string(),
            });
        }
        let headers = split_line(&header).map(str::to_string).collect();
        Ok(Self {
            name,
            reader: Some(reader),
            headers,
            line: String::new(),
            line_number: 1,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Fail unless every column in `columns` is in the header.
    pub fn require_columns<S: AsRef<str>>(&self, columns: &[S]) -> MergeResult<()> {
        for column in columns {
            let column = column.as_ref();
            if !self.headers.iter().any(|h| h == column) {
                return Err(MergeError::MissingColumn(column.to_string()));
            }
        }
        Ok(())
    }

    fn read_row(&mut self) -> MergeResult<Option<Row>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        loop {
            self.line.clear();
            if reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            // blank lines carry no row
            if !self.line.trim_end_matches(['\n', '\r']).is_empty() {
                break;
            }
        }
        let values: Vec<&str> = split_line(&self.line).collect();
        if values.len() != self.headers.len() {
            return Err(MergeError::MalformedRow {
                stream: self.name.clone(),
                message: format!(
                    "line {} has {} values but the header names {} columns",
                    self.line_number,
                    values.len(),
                    self.headers.len()
                ),
            });
        }
        Ok(Some(
            self.headers
                .iter()
                .cloned()
                .zip(values.into_iter().map(str::to_string))
                .collect(),
        ))
    }
}

fn split_line(line: &str) -> std::str::Split<'_, char> {
    line.trim_end_matches(['\n', '\r']).split('\t')
}

impl<R: BufRead + Send> RowSource for TabularSource<R> {
    fn next_row(&mut self) -> Option<MergeResult<Row>> {
        self.read_row().transpose()
    }

    fn close(&mut self) {
        debug!("Closing tabular stream {}", self.name);
        self.reader = None;
    }
}
