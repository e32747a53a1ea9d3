//! Row streams: named requests, opened sources, and the lookahead wrapper
//! the entity tree pulls through.

mod lookahead;
mod source;
mod spec;

pub use lookahead::{Enrich, LookaheadStream, NoEnrichment};
pub use source::{
    close_all, BoxedRowSource, MemorySource, Row, RowExt, RowSource, StreamMap, TabularSource,
};
pub use spec::{Filter, StreamSpec};
