//! Study metadata: the entity tree and variable catalog the merge engine
//! consults while building an entity stream tree.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐      ┌──────────────────────────────┐
//! │ StudyProvider (async)        │ ───▶ │ ReferenceMetadata            │
//! │  - JsonStudyProvider         │      │  - entity tree (parents)     │
//! │    (<dir>/<study>.json)      │      │  - variable catalog          │
//! └──────────────────────────────┘      │  - incorporate_derived()     │
//!                                       │  - incorporate_computed()    │
//!                                       └──────────────────────────────┘
//! ```
//!
//! Derived and computed variables are merged into a per-request copy of the
//! metadata before the tree is built, so every variable a request names can
//! be resolved through the same lookup.

mod provider;
mod reference;
mod study;
mod types;

pub use provider::{JsonStudyProvider, StudyProvider};
pub use reference::ReferenceMetadata;
pub use study::{EntityDefinition, StudyDefinition, VariableDefinition};
pub use types::*;
