//! # tabmerge
//!
//! Streaming merge engine for hierarchical study data.
//!
//! ## Architecture
//!
//! A request asks for one row per record of a target entity, with columns
//! that may be native to that entity, inherited from its ancestors, or
//! derived by transforms and reductions:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        MergeRequest + ReferenceMetadata (schema)         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [derived]
//! ┌─────────────────────────────────────────────────────────┐
//! │     DerivedVariableFactory (plugins, dependency order)   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [tree]
//! ┌─────────────────────────────────────────────────────────┐
//! │     RootEntityStreamNode → required StreamSpecs          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [processor]
//! ┌─────────────────────────────────────────────────────────┐
//! │   concurrent fetch → accept streams → pull merged rows   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The library logs through the `log` facade and never installs a logger.

pub mod config;
pub mod derived;
pub mod error;
pub mod metadata;
pub mod plugins;
pub mod processor;
pub mod stream;
pub mod tree;

pub use error::{ErrorKind, MergeError, MergeResult};

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::MergeSettings;
    pub use crate::derived::{DerivedVariableFactory, DerivedVariableSpec, PluginRegistry};
    pub use crate::error::{ErrorKind, MergeError, MergeResult};
    pub use crate::metadata::{
        DataShape, EntityDef, ReferenceMetadata, VariableDef, VariableSource, VariableSpec,
        VariableType,
    };
    pub use crate::plugins::standard_registry;
    pub use crate::processor::{
        write_tabular, DirectoryFetcher, MergeRequest, MergeRequestProcessor, MergedStream,
        StreamFetcher,
    };
    pub use crate::stream::{MemorySource, Row, RowSource, StreamMap, StreamSpec};
    pub use crate::tree::{RootEntityStreamNode, TreeContext};
}
