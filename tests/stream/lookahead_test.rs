//! Lookahead stream behavior: buffering, enrichment timing, and closing.

#[path = "../common/mod.rs"]
mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{CloseLog, TrackedSource};
use tabmerge::error::{MergeError, MergeResult};
use tabmerge::stream::{Enrich, LookaheadStream, MemorySource, NoEnrichment, Row, StreamMap};

/// Stamps each row with the order it was enriched in.
#[derive(Default)]
struct Counter {
    enriched: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl Enrich for Counter {
    fn enrich(&mut self, row: &mut Row) -> MergeResult<()> {
        let n = self.enriched.fetch_add(1, Ordering::SeqCst) + 1;
        row.insert("seq".to_string(), n.to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn ids(values: &[&str]) -> Vec<Row> {
    let rows: Vec<Vec<&str>> = values.iter().map(|v| vec![*v]).collect();
    common::rows(&["e.id"], &rows)
}

#[test]
fn test_first_row_is_enriched_when_attached() {
    let counter = Counter::default();
    let enriched = counter.enriched.clone();
    let mut stream = LookaheadStream::new("s", counter);
    stream.attach(Box::new(MemorySource::new(ids(&["a", "b"])))).unwrap();

    assert_eq!(enriched.load(Ordering::SeqCst), 1);
    assert_eq!(stream.peek().unwrap()["seq"], "1");

    // peeking again must not enrich again
    assert!(stream.peek_if(|r| r["e.id"] == "a").is_some());
    assert_eq!(enriched.load(Ordering::SeqCst), 1);

    let first = stream.next_row().unwrap().unwrap();
    assert_eq!(first["seq"], "1");
    assert_eq!(enriched.load(Ordering::SeqCst), 2);
    assert_eq!(stream.peek().unwrap()["e.id"], "b");
}

#[test]
fn test_take_if_stops_at_first_mismatch() {
    let mut stream = LookaheadStream::new("s", NoEnrichment);
    stream
        .attach(Box::new(MemorySource::new(ids(&["a", "a", "b", "a"]))))
        .unwrap();

    let mut taken = 0;
    while stream.take_if(|r| r["e.id"] == "a").unwrap().is_some() {
        taken += 1;
    }
    assert_eq!(taken, 2);
    assert_eq!(stream.peek().unwrap()["e.id"], "b");
}

#[test]
fn test_exhausted_stream() {
    let mut stream = LookaheadStream::new("s", NoEnrichment);
    stream.attach(Box::new(MemorySource::new(Vec::new()))).unwrap();
    assert!(!stream.has_next());
    assert!(stream.peek().is_none());
    assert!(stream.next_row().unwrap().is_none());
    assert!(stream.take_if(|_| true).unwrap().is_none());
}

#[test]
fn test_accept_streams_claims_by_name() {
    let log = CloseLog::default();
    let mut streams = StreamMap::new();
    streams.insert("mine".to_string(), Box::new(TrackedSource::new("mine", ids(&["a"]), &log)) as _);
    streams.insert("other".to_string(), Box::new(TrackedSource::new("other", ids(&["b"]), &log)) as _);

    let mut stream = LookaheadStream::new("mine", NoEnrichment);
    stream.accept_streams(&mut streams).unwrap();
    assert_eq!(stream.peek().unwrap()["e.id"], "a");
    assert_eq!(streams.len(), 1);
    assert!(streams.contains_key("other"));
}

#[test]
fn test_reading_before_attach_fails() {
    let mut stream: LookaheadStream = LookaheadStream::new("lonely", NoEnrichment);
    // nothing cached yet, so nothing to return
    assert!(stream.next_row().unwrap().is_none());
    let mut streams = StreamMap::new();
    let err = stream.accept_streams(&mut streams).unwrap_err();
    assert!(matches!(err, MergeError::StreamNotDistributed(name) if name == "lonely"));
}

#[test]
fn test_close_is_idempotent_and_cascades() {
    let log = CloseLog::default();
    let counter = Counter::default();
    let closed = counter.closed.clone();
    let mut stream = LookaheadStream::new("s", counter);
    stream
        .attach(Box::new(TrackedSource::new("s", ids(&["a", "b"]), &log)))
        .unwrap();

    stream.close();
    stream.close();
    assert!(stream.is_closed());
    assert_eq!(log.count("s"), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);

    assert!(!stream.has_next());
    assert!(stream.next_row().unwrap().is_none());

    drop(stream);
    assert_eq!(log.count("s"), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_drop_closes_once() {
    let log = CloseLog::default();
    {
        let mut stream = LookaheadStream::new("s", NoEnrichment);
        stream
            .attach(Box::new(TrackedSource::new("s", ids(&["a"]), &log)))
            .unwrap();
        assert_eq!(log.count("s"), 0);
    }
    assert_eq!(log.count("s"), 1);
}

#[test]
fn test_enrichment_error_surfaces_on_read() {
    struct Failing;
    impl Enrich for Failing {
        fn enrich(&mut self, row: &mut Row) -> MergeResult<()> {
            if row["e.id"] == "bad" {
                return Err(MergeError::MissingColumn("e.x".to_string()));
            }
            Ok(())
        }
    }

    let mut stream = LookaheadStream::new("s", Failing);
    stream.attach(Box::new(MemorySource::new(ids(&["ok", "bad"])))).unwrap();
    // consuming "ok" caches "bad", which fails enrichment
    assert!(matches!(
        stream.next_row(),
        Err(MergeError::MissingColumn(c)) if c == "e.x"
    ));
}
