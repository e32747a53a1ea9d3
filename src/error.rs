//! Error types for the merge engine.
//!
//! Every failure surfaced by tree construction, stream acquisition, or row
//! iteration is a [`MergeError`]. Callers usually only care about which
//! [`ErrorKind`] they are holding: validation errors are the client's fault
//! and are always raised before the first row is produced, internal errors
//! signal an upstream contract violation mid-stream.

use std::io;
use thiserror::Error;

use crate::config::SettingsError;

/// Result type for merge operations.
pub type MergeResult<T> = Result<T, MergeError>;

/// Broad classification of a [`MergeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad request: raised before streaming starts.
    Validation,
    /// Upstream streams broke an invariant the tree relies on.
    Internal,
    /// One or more required streams could not be opened.
    Fetch,
    /// Tabular input could not be read or parsed.
    Data,
}

/// Errors that can occur while building or running a merge.
#[derive(Error, Debug)]
pub enum MergeError {
    // =========================================================================
    // Validation
    // =========================================================================
    /// Referenced an entity that is not in the study.
    #[error("unknown entity: '{0}'")]
    UnknownEntity(String),

    /// Request names a different study than the metadata describes.
    #[error("request is for study '{requested}' but metadata describes study '{loaded}'")]
    StudyMismatch { requested: String, loaded: String },

    /// Referenced a variable that is not in the study.
    #[error("unknown variable: '{0}'")]
    UnknownVariable(String),

    /// Variable source may not be requested directly (e.g. computed, inherited).
    #[error("variable {variable} is of type {source_kind} and should not be directly requested")]
    IllegalVariableSource {
        variable: String,
        source_kind: String,
    },

    /// Variable lives on a descendant or unrelated entity.
    #[error("variable {variable} cannot be returned on a stream of entity {entity}")]
    VariableNotAvailable { variable: String, entity: String },

    /// The entity tree recursed past the configured depth.
    #[error("maximum number of concurrent entity streams ({0}) exceeded")]
    DependencyDepthExceeded(usize),

    /// The same column appears twice in the output.
    #[error("output variables (columns) must be distinct; column '{0}' is specified more than once")]
    DuplicateOutputColumn(String),

    /// Derived variable configuration was rejected.
    #[error("invalid config for derived variable '{function}': {message}")]
    InvalidConfig { function: String, message: String },

    /// No plugin registered under this function name.
    #[error("unrecognized derived variable function name: {0}")]
    UnrecognizedFunction(String),

    /// Two derived variables share one (entity, variable) pair.
    #[error("derived variable names are not unique: {0}")]
    DuplicateDerivedVariable(String),

    /// Derived variables depend on each other in a loop.
    #[error("cyclic dependency detected among derived variables: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    /// A derived or computed variable collides with an existing study variable.
    #[error("variable {0} already exists on its entity")]
    VariableAlreadyExists(String),

    /// Two entities in one study share an id.
    #[error("entity '{0}' is declared more than once")]
    DuplicateEntity(String),

    /// Settings could not be used.
    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),

    // =========================================================================
    // Internal (upstream contract violations)
    // =========================================================================
    /// Ancestor stream exhausted before a row matching our id was found.
    #[error("ancestor stream '{entity}' could not provide a row matching '{column}' with value '{value}'")]
    AncestorRowMissing {
        entity: String,
        column: String,
        value: String,
    },

    /// Computed stream ran out before the target stream did.
    #[error("computed data stream does not have enough rows for this subset")]
    ComputedStreamShort,

    /// Computed row id does not line up with the target row id.
    #[error("computed row entity id '{found}' does not match expected id '{expected}'")]
    ComputedRowMismatch { expected: String, found: String },

    /// A stream the tree expected was not handed to it.
    #[error("stream with name {0} expected but not distributed")]
    StreamNotDistributed(String),

    /// Streams were handed to the tree that no node claimed.
    #[error("not all data streams were claimed by the processor tree; remaining: {}", .0.join(", "))]
    UnclaimedStreams(Vec<String>),

    /// Rows for one parent were not contiguous.
    #[error("rows of stream '{stream}' are not grouped by '{column}': value '{value}' reappeared")]
    GroupingViolation {
        stream: String,
        column: String,
        value: String,
    },

    /// A row did not carry a column the tree needs.
    #[error("row is missing required column '{0}'")]
    MissingColumn(String),

    /// Iteration attempted before streams were accepted.
    #[error("stream '{0}' has not been assigned a data source")]
    StreamNotAttached(String),

    // =========================================================================
    // Fetch
    // =========================================================================
    /// At least one stream could not be opened; nothing was merged.
    #[error("failed to fetch {} stream(s): {}", .failures.len(), format_failures(.failures))]
    StreamFetch { failures: Vec<(String, String)> },

    /// Stream acquisition did not finish in time.
    #[error("stream acquisition timed out after {0} seconds")]
    FetchTimeout(u64),

    // =========================================================================
    // Data
    // =========================================================================
    /// Tabular data was malformed.
    #[error("malformed tabular data in stream '{stream}': {message}")]
    MalformedRow { stream: String, message: String },

    /// A value could not be interpreted.
    #[error("cannot parse value '{value}' in column '{column}': {message}")]
    InvalidValue {
        column: String,
        value: String,
        message: String,
    },

    /// Reading input or writing output failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// A JSON document (study, request, plugin output) could not be parsed.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(name, message)| format!("[{}] {}", name, message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl MergeError {
    /// Create an invalid-config error for a derived variable plugin.
    pub fn invalid_config(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-value error.
    pub fn invalid_value(
        column: impl Into<String>,
        value: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        Self::InvalidValue {
            column: column.into(),
            value: value.into(),
            message: message.to_string(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownEntity(_)
            | Self::StudyMismatch { .. }
            | Self::UnknownVariable(_)
            | Self::IllegalVariableSource { .. }
            | Self::VariableNotAvailable { .. }
            | Self::DependencyDepthExceeded(_)
            | Self::DuplicateOutputColumn(_)
            | Self::InvalidConfig { .. }
            | Self::UnrecognizedFunction(_)
            | Self::DuplicateDerivedVariable(_)
            | Self::CyclicDependency(_)
            | Self::VariableAlreadyExists(_)
            | Self::DuplicateEntity(_)
            | Self::Settings(_) => ErrorKind::Validation,

            Self::AncestorRowMissing { .. }
            | Self::ComputedStreamShort
            | Self::ComputedRowMismatch { .. }
            | Self::StreamNotDistributed(_)
            | Self::UnclaimedStreams(_)
            | Self::GroupingViolation { .. }
            | Self::MissingColumn(_)
            | Self::StreamNotAttached(_) => ErrorKind::Internal,

            Self::StreamFetch { .. } | Self::FetchTimeout(_) => ErrorKind::Fetch,

            Self::MalformedRow { .. }
            | Self::InvalidValue { .. }
            | Self::Io(_)
            | Self::Json(_) => ErrorKind::Data,
        }
    }

    /// Check if this error was caused by the request rather than the data.
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}
