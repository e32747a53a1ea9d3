//! One-row lookahead over a named row source.

use log::debug;

use super::source::{BoxedRowSource, Row, StreamMap};
use crate::error::{MergeError, MergeResult};

/// Per-row enrichment applied as each row is cached.
///
/// Implementors own whatever sub-streams they read from and must hand
/// those their data in `accept_streams`, before the owning stream caches
/// its first row.
pub trait Enrich: Send {
    /// Claim the streams this enricher depends on.
    fn accept_streams(&mut self, _streams: &mut StreamMap) -> MergeResult<()> {
        Ok(())
    }

    /// Add columns to `row`. Must never remove or rename keys.
    fn enrich(&mut self, row: &mut Row) -> MergeResult<()>;

    /// Close every sub-stream.
    fn close(&mut self) {}
}

/// Rows are cached as read.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEnrichment;

impl Enrich for NoEnrichment {
    fn enrich(&mut self, _row: &mut Row) -> MergeResult<()> {
        Ok(())
    }
}

/// Wraps one row source and keeps at most one enriched row buffered.
///
/// The stream is closed exactly once: by an explicit [`close`](Self::close)
/// or, failing that, when dropped. Closing cascades to the enricher.
pub struct LookaheadStream<E: Enrich = NoEnrichment> {
    name: String,
    source: Option<BoxedRowSource>,
    cached: Option<Row>,
    enricher: E,
    closed: bool,
}

impl<E: Enrich> LookaheadStream<E> {
    pub fn new(name: impl Into<String>, enricher: E) -> Self {
        Self {
            name: name.into(),
            source: None,
            cached: None,
            enricher,
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enricher(&self) -> &E {
        &self.enricher
    }

    /// Hand out sub-streams to the enricher, then claim this stream's own
    /// source from `streams` and cache the first row.
    pub fn accept_streams(&mut self, streams: &mut StreamMap) -> MergeResult<()> {
        self.enricher.accept_streams(streams)?;
        let source = streams
            .remove(&self.name)
            .ok_or_else(|| MergeError::StreamNotDistributed(self.name.clone()))?;
        self.attach(source)
    }

    /// Attach a source directly and cache the first row.
    pub fn attach(&mut self, source: BoxedRowSource) -> MergeResult<()> {
        self.source = Some(source);
        self.cached = self.read_row()?;
        debug!(
            "Stream {} attached; first row has {} columns",
            self.name,
            self.cached.as_ref().map_or(0, |row| row.len())
        );
        Ok(())
    }

    fn read_row(&mut self) -> MergeResult<Option<Row>> {
        if self.closed {
            return Ok(None);
        }
        let source = self
            .source
            .as_mut()
            .ok_or_else(|| MergeError::StreamNotAttached(self.name.clone()))?;
        match source.next_row() {
            None => Ok(None),
            Some(row) => {
                let mut row = row?;
                self.enricher.enrich(&mut row)?;
                Ok(Some(row))
            }
        }
    }

    pub fn has_next(&self) -> bool {
        self.cached.is_some()
    }

    pub fn peek(&self) -> Option<&Row> {
        self.cached.as_ref()
    }

    /// Consume the cached row and refill the cache.
    pub fn next_row(&mut self) -> MergeResult<Option<Row>> {
        match self.cached.take() {
            None => Ok(None),
            Some(row) => {
                self.cached = self.read_row()?;
                Ok(Some(row))
            }
        }
    }

    /// The cached row if it satisfies `pred`; never consumes.
    pub fn peek_if(&self, pred: impl FnOnce(&Row) -> bool) -> Option<&Row> {
        self.cached.as_ref().filter(|row| pred(row))
    }

    /// Consume and return the cached row if it satisfies `pred`.
    pub fn take_if(&mut self, pred: impl FnOnce(&Row) -> bool) -> MergeResult<Option<Row>> {
        if self.peek_if(pred).is_some() {
            self.next_row()
        } else {
            Ok(None)
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the source and every enricher sub-stream. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.cached = None;
        if let Some(mut source) = self.source.take() {
            debug!("Closing stream {}", self.name);
            source.close();
        }
        self.enricher.close();
    }
}

impl<E: Enrich> Drop for LookaheadStream<E> {
    fn drop(&mut self) {
        self.close();
    }
}
