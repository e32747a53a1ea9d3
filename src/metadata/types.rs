//! Core metadata types: variable identity, variable definitions, and entities.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Variable identity
// =============================================================================

/// Identity of a variable: the (entity, variable) pair that names one column
/// across the whole study.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableSpec {
    pub entity_id: String,
    pub variable_id: String,
}

impl VariableSpec {
    pub fn new(entity_id: impl Into<String>, variable_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            variable_id: variable_id.into(),
        }
    }

    /// Column name in tabular data: `entity.variable`.
    pub fn dot_notation(&self) -> String {
        format!("{}.{}", self.entity_id, self.variable_id)
    }

    /// Parse from `entity.variable` format.
    /// Returns None if either half is empty.
    pub fn parse(s: &str) -> Option<Self> {
        let (entity, variable) = s.split_once('.')?;
        if entity.is_empty() || variable.is_empty() {
            return None;
        }
        Some(Self::new(entity, variable))
    }
}

impl fmt::Display for VariableSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity_id, self.variable_id)
    }
}

/// Convert a list of specs to their column names.
pub fn to_dot_notation(specs: &[VariableSpec]) -> Vec<String> {
    specs.iter().map(VariableSpec::dot_notation).collect()
}

// =============================================================================
// Variable classification
// =============================================================================

/// Where a variable's values come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VariableSource {
    /// The entity's id column.
    Id,
    /// Stored on the entity's own data stream.
    #[default]
    Native,
    /// Native to an ancestor, propagated onto descendant rows.
    Inherited,
    /// Produced by a per-row transform.
    DerivedTransform,
    /// Produced by aggregating descendant rows.
    DerivedReduction,
    /// Supplied by an external compute job.
    Computed,
}

impl fmt::Display for VariableSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Id => "ID",
            Self::Native => "NATIVE",
            Self::Inherited => "INHERITED",
            Self::DerivedTransform => "DERIVED_TRANSFORM",
            Self::DerivedReduction => "DERIVED_REDUCTION",
            Self::Computed => "COMPUTED",
        };
        f.write_str(name)
    }
}

/// Value type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    #[default]
    String,
    Number,
    Integer,
    Date,
    Longitude,
}

impl VariableType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Number | Self::Integer | Self::Longitude)
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Date => "date",
            Self::Longitude => "longitude",
        };
        f.write_str(name)
    }
}

/// Statistical shape of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataShape {
    Continuous,
    #[default]
    Categorical,
    Ordinal,
    Binary,
}

impl fmt::Display for DataShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Continuous => "continuous",
            Self::Categorical => "categorical",
            Self::Ordinal => "ordinal",
            Self::Binary => "binary",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Definitions
// =============================================================================

/// Full definition of a variable as known to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDef {
    #[serde(flatten)]
    pub spec: VariableSpec,
    #[serde(rename = "type", default)]
    pub var_type: VariableType,
    #[serde(default)]
    pub data_shape: DataShape,
    #[serde(default)]
    pub source: VariableSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vocabulary: Option<Vec<String>>,
    #[serde(default)]
    pub impute_zero: bool,
}

impl VariableDef {
    pub fn new(spec: VariableSpec, var_type: VariableType, data_shape: DataShape) -> Self {
        Self {
            spec,
            var_type,
            data_shape,
            source: VariableSource::Native,
            display_name: None,
            units: None,
            vocabulary: None,
            impute_zero: false,
        }
    }

    /// A native variable on `entity_id`.
    pub fn native(
        entity_id: impl Into<String>,
        variable_id: impl Into<String>,
        var_type: VariableType,
        data_shape: DataShape,
    ) -> Self {
        Self::new(VariableSpec::new(entity_id, variable_id), var_type, data_shape)
    }

    /// The id column of `entity_id`.
    pub fn id(entity_id: impl Into<String>, variable_id: impl Into<String>) -> Self {
        Self::native(entity_id, variable_id, VariableType::String, DataShape::Categorical)
            .with_source(VariableSource::Id)
    }

    pub fn with_source(mut self, source: VariableSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_vocabulary(mut self, vocabulary: Vec<String>) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_impute_zero(mut self, impute_zero: bool) -> Self {
        self.impute_zero = impute_zero;
        self
    }

    pub fn entity_id(&self) -> &str {
        &self.spec.entity_id
    }

    pub fn variable_id(&self) -> &str {
        &self.spec.variable_id
    }

    pub fn column_name(&self) -> String {
        self.spec.dot_notation()
    }
}

impl fmt::Display for VariableDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {}, {})",
            self.spec, self.var_type, self.data_shape, self.source
        )
    }
}

/// One entity in the study hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDef {
    pub id: String,
    pub display_name: String,
    id_column: VariableDef,
    variables: Vec<VariableDef>,
}

impl EntityDef {
    /// Create an entity whose id column is `<id>.<id_variable>`.
    pub fn new(id: impl Into<String>, id_variable: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id_column: VariableDef::id(id.clone(), id_variable),
            id,
            variables: Vec::new(),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Add a variable; its entity id is forced to this entity.
    pub fn with_variable(mut self, mut variable: VariableDef) -> Self {
        variable.spec.entity_id = self.id.clone();
        self.variables.push(variable);
        self
    }

    pub fn id_column(&self) -> &VariableDef {
        &self.id_column
    }

    pub fn id_column_name(&self) -> String {
        self.id_column.column_name()
    }

    /// Non-id variables in declaration order.
    pub fn variables(&self) -> &[VariableDef] {
        &self.variables
    }

    /// Look up a variable by id, including the id column.
    pub fn variable(&self, variable_id: &str) -> Option<&VariableDef> {
        if self.id_column.variable_id() == variable_id {
            return Some(&self.id_column);
        }
        self.variables.iter().find(|v| v.variable_id() == variable_id)
    }

    pub(crate) fn push_variable(&mut self, variable: VariableDef) {
        self.variables.push(variable);
    }
}
