//! Merge request processing: from a validated request to merged rows.
//!
//! ```text
//! MergeRequest ──▶ MergeRequestProcessor ──▶ RootEntityStreamNode
//!                         │                         │ required_stream_specs()
//!                         ▼                         ▼
//!                   StreamFetcher ◀──────── fetch_all (concurrent)
//!                         │
//!                         ▼
//!                   MergedStream ──▶ write_tabular
//! ```

mod fetch;
mod merge;
mod output;
mod request;

pub use fetch::{fetch_all, DirectoryFetcher, FetchRequest, StreamFetcher};
pub use merge::{MergePlan, MergeRequestProcessor};
pub use output::{write_tabular, MergedStream, PassthroughStream};
pub use request::MergeRequest;
