//! Tab-delimited input parsing.

use std::io::Cursor;

use tabmerge::error::{ErrorKind, MergeError};
use tabmerge::stream::{RowSource, TabularSource};

fn source(text: &str) -> TabularSource<Cursor<Vec<u8>>> {
    TabularSource::new("samples", Cursor::new(text.as_bytes().to_vec())).unwrap()
}

#[test]
fn test_header_names_columns() {
    let mut s = source("sample.sample_id\tsample.length\nS1\t2\nS2\t\n");
    assert_eq!(s.headers(), ["sample.sample_id", "sample.length"]);

    let first = s.next_row().unwrap().unwrap();
    assert_eq!(first["sample.sample_id"], "S1");
    assert_eq!(first["sample.length"], "2");

    let second = s.next_row().unwrap().unwrap();
    assert_eq!(second["sample.length"], "");
    assert!(s.next_row().is_none());
}

#[test]
fn test_crlf_and_blank_lines() {
    let mut s = source("a.id\ta.x\r\n\r\nA1\tx1\r\n\nA2\tx2");
    assert_eq!(s.headers(), ["a.id", "a.x"]);
    let rows: Vec<_> = std::iter::from_fn(|| s.next_row())
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["a.x"], "x1");
    assert_eq!(rows[1]["a.x"], "x2");
}

#[test]
fn test_width_mismatch_is_malformed() {
    let mut s = source("a.id\ta.x\nA1\tx1\nA2\n");
    assert!(s.next_row().unwrap().is_ok());
    let err = s.next_row().unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Data);
    match err {
        MergeError::MalformedRow { stream, message } => {
            assert_eq!(stream, "samples");
            assert!(message.contains("line 3"), "{}", message);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_empty_input_has_no_header() {
    let result = TabularSource::new("empty", Cursor::new(Vec::new()));
    assert!(matches!(result, Err(MergeError::MalformedRow { stream, .. }) if stream == "empty"));
}

#[test]
fn test_require_columns() {
    let s = source("a.id\ta.x\n");
    assert!(s.require_columns(&["a.id", "a.x"]).is_ok());
    assert!(matches!(
        s.require_columns(&["a.id", "a.y"]),
        Err(MergeError::MissingColumn(c)) if c == "a.y"
    ));
}

#[test]
fn test_close_ends_the_stream() {
    let mut s = source("a.id\nA1\nA2\n");
    assert!(s.next_row().is_some());
    s.close();
    assert!(s.next_row().is_none());
}
