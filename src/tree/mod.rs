//! The entity stream tree that merges per-entity row streams.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────────┐
//!   output rows ◀─│ RootEntityStreamNode     │◀── computed stream (optional)
//!                 │   target EntityStreamNode│
//!                 └────────────┬─────────────┘
//!                  ┌───────────┴────────────┐
//!                  ▼                        ▼
//!        ancestor nodes             reduction child nodes
//!        (inherited columns)        (descendant rows, aggregated)
//! ```
//!
//! Building the tree is the only place variables are classified; once
//! streams are accepted, pulling a row from the root pulls exactly as far
//! down each branch as that row needs. Every node buffers at most one row.

mod grouping;
mod node;
mod root;

pub use grouping::GroupingGuard;
pub use node::EntityStreamNode;
pub use root::RootEntityStreamNode;

use crate::config::TreeSettings;
use crate::derived::DerivedVariableFactory;
use crate::metadata::ReferenceMetadata;

/// Reserved stream name for the externally computed variables.
pub const COMPUTED_VAR_STREAM_NAME: &str = "__COMPUTED_VAR_STREAM__";

/// What every node consults while the tree is being built.
#[derive(Clone, Copy)]
pub struct TreeContext<'a> {
    pub metadata: &'a ReferenceMetadata,
    pub factory: &'a DerivedVariableFactory,
    pub settings: &'a TreeSettings,
}
