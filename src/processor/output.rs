//! Merged row streams and the tab-delimited writer.

use std::io::Write;

use log::info;

use crate::error::MergeResult;
use crate::stream::{BoxedRowSource, LookaheadStream, NoEnrichment, RowExt};
use crate::tree::RootEntityStreamNode;

/// The single target stream, copied through without enrichment.
pub struct PassthroughStream {
    columns: Vec<String>,
    stream: LookaheadStream<NoEnrichment>,
    output: Vec<String>,
}

impl PassthroughStream {
    pub fn new(name: &str, columns: Vec<String>, source: BoxedRowSource) -> MergeResult<Self> {
        let mut stream = LookaheadStream::new(name, NoEnrichment);
        stream.attach(source)?;
        Ok(Self {
            output: Vec::with_capacity(columns.len()),
            columns,
            stream,
        })
    }

    fn next_row(&mut self) -> MergeResult<Option<&[String]>> {
        let Some(row) = self.stream.next_row()? else {
            return Ok(None);
        };
        self.output.clear();
        for column in &self.columns {
            self.output.push(row.value(column)?.to_string());
        }
        Ok(Some(self.output.as_slice()))
    }
}

/// Rows ready to be written, either through the entity tree or straight
/// from the one stream that needed no merging.
pub enum MergedStream {
    Merged(RootEntityStreamNode),
    Passthrough(PassthroughStream),
}

impl MergedStream {
    /// Dot-notation header, in row order.
    pub fn columns(&self) -> &[String] {
        match self {
            Self::Merged(root) => root.output_columns(),
            Self::Passthrough(stream) => &stream.columns,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::Passthrough(_))
    }

    /// Next row's values. The slice is reused by the following call.
    pub fn next_row(&mut self) -> MergeResult<Option<&[String]>> {
        match self {
            Self::Merged(root) => root.next_row(),
            Self::Passthrough(stream) => stream.next_row(),
        }
    }

    /// Close every underlying stream. Idempotent.
    pub fn close(&mut self) {
        match self {
            Self::Merged(root) => root.close(),
            Self::Passthrough(stream) => stream.stream.close(),
        }
    }

    /// Pull every row into owned vectors.
    pub fn collect_rows(&mut self) -> MergeResult<Vec<Vec<String>>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row()? {
            rows.push(row.to_vec());
        }
        self.close();
        Ok(rows)
    }
}

/// Write the header and every row as tab-delimited lines.
///
/// Streams are closed whether or not writing succeeds. Returns the number
/// of data rows written.
pub fn write_tabular<W: Write>(stream: &mut MergedStream, out: W) -> MergeResult<u64> {
    let result = write_rows(stream, out);
    stream.close();
    result
}

fn write_rows<W: Write>(stream: &mut MergedStream, out: W) -> MergeResult<u64> {
    let mut writer = std::io::BufWriter::new(out);
    let header = stream.columns().join("\t");
    info!("Writing header row: {}", header);
    writeln!(writer, "{}", header)?;

    let mut count = 0;
    while let Some(row) = stream.next_row()? {
        writeln!(writer, "{}", row.join("\t"))?;
        count += 1;
    }
    writer.flush()?;
    info!("Wrote {} row(s)", count);
    Ok(count)
}
