//! Data requirements analysis errors

use thiserror::Error;

/// Result type for analysis operations
pub type DataRequirementsResult<T> = Result<T, DataRequirementsError>;

/// Broad failure class, for callers that report per-expression outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    ReferenceResolution,
    NormalForm,
    TypeTag,
    TraversalInvariant,
}

/// Kind of named definition a reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Expression,
    Parameter,
    ValueSet,
    CodeSystem,
    Code,
    Concept,
}

impl std::fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Expression => "expression",
            Self::Parameter => "parameter",
            Self::ValueSet => "value set",
            Self::CodeSystem => "code system",
            Self::Code => "code",
            Self::Concept => "concept",
        };
        f.write_str(name)
    }
}

/// Errors raised while deriving data requirements
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataRequirementsError {
    // === Reference resolution ===
    /// Include alias or library not available
    #[error("Could not resolve reference to library {name}")]
    UnknownLibrary { name: String },

    /// Named definition missing from a library
    #[error("Unknown {kind} '{name}' in library {library}")]
    UnknownDefinition {
        kind: DefinitionKind,
        name: String,
        library: String,
    },

    // === Normal form ===
    /// An operator received a frame that still holds OR branches
    #[error("{operator}: can't merge frames with multiple OR branches (not in disjunctive normal form)")]
    NotDisjunctiveNormalForm { operator: String },

    /// An operator received a branch holding several types
    #[error("{operator}: can't merge a branch holding multiple types")]
    MultipleTypes { operator: String },

    /// Two explicit, different types in one merge
    #[error("Type mismatch: can't merge {left} with {right}")]
    TypeMismatch { left: String, right: String },

    /// Two records of one type inside a single branch
    #[error("Requirement map holds more than one record of type {data_type}")]
    NotNormalized { data_type: String },

    /// Operand frame has the wrong shape for a requirement-bearing operator
    #[error("{operator}: {message}")]
    UnsupportedShape { operator: String, message: String },

    /// Aliased source carrying both code and date constraints
    #[error("Source aliased as {alias} can't alias more than one property")]
    AliasConflict { alias: String },

    // === Type tags ===
    /// A constraint without the type tag needed to classify it
    #[error("Missing type tag on {what}")]
    MissingTypeTag { what: String },

    /// Path and value tags disagree on temporal vs categorical
    #[error("Type tag mismatch on path {path}: {path_type} vs {value_type}")]
    TypeTagMismatch {
        path: String,
        path_type: String,
        value_type: String,
    },

    /// Literal text that can't be read as the declared temporal type
    #[error("Can't parse '{value}' as {type_name}")]
    InvalidTemporalValue { type_name: String, value: String },

    // === Traversal invariants ===
    /// Exit from a query scope that was never entered
    #[error("Query nesting depth would become negative")]
    NegativeQueryDepth,

    /// A named expression requested while it is still being resolved
    #[error("Expression {name} re-entered while resolving")]
    ReentrantExpression { name: String },

    /// Frame stack not fully consumed at an expression boundary
    #[error("Expression {name} not fully resolved: stack height {height}")]
    UnresolvedStack { name: String, height: usize },

    /// A node handler left the wrong number of frames behind
    #[error("Node left {actual} frames on the stack, expected {expected}")]
    StackImbalance { expected: usize, actual: usize },

    /// Fewer frames on the stack than an operator consumes
    #[error("Frame stack underflow: needed {needed}, found {available}")]
    StackUnderflow { needed: usize, available: usize },

    /// `mergeFrames` called without operands
    #[error("No frames to merge")]
    EmptyMerge,
}

impl DataRequirementsError {
    pub fn unknown_library(name: impl Into<String>) -> Self {
        Self::UnknownLibrary { name: name.into() }
    }

    pub fn unknown_definition(
        kind: DefinitionKind,
        name: impl Into<String>,
        library: impl Into<String>,
    ) -> Self {
        Self::UnknownDefinition {
            kind,
            name: name.into(),
            library: library.into(),
        }
    }

    pub fn not_dnf(operator: impl Into<String>) -> Self {
        Self::NotDisjunctiveNormalForm {
            operator: operator.into(),
        }
    }

    pub fn multiple_types(operator: impl Into<String>) -> Self {
        Self::MultipleTypes {
            operator: operator.into(),
        }
    }

    pub fn type_mismatch(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::TypeMismatch {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn unsupported_shape(operator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnsupportedShape {
            operator: operator.into(),
            message: message.into(),
        }
    }

    pub fn alias_conflict(alias: impl Into<String>) -> Self {
        Self::AliasConflict {
            alias: alias.into(),
        }
    }

    pub fn missing_type_tag(what: impl Into<String>) -> Self {
        Self::MissingTypeTag { what: what.into() }
    }

    pub fn invalid_temporal(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidTemporalValue {
            type_name: type_name.into(),
            value: value.into(),
        }
    }

    /// Failure class of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownLibrary { .. } | Self::UnknownDefinition { .. } => {
                ErrorCategory::ReferenceResolution
            }
            Self::NotDisjunctiveNormalForm { .. }
            | Self::MultipleTypes { .. }
            | Self::TypeMismatch { .. }
            | Self::NotNormalized { .. }
            | Self::UnsupportedShape { .. }
            | Self::AliasConflict { .. } => ErrorCategory::NormalForm,
            Self::MissingTypeTag { .. }
            | Self::TypeTagMismatch { .. }
            | Self::InvalidTemporalValue { .. } => ErrorCategory::TypeTag,
            Self::NegativeQueryDepth
            | Self::ReentrantExpression { .. }
            | Self::UnresolvedStack { .. }
            | Self::StackImbalance { .. }
            | Self::StackUnderflow { .. }
            | Self::EmptyMerge => ErrorCategory::TraversalInvariant,
        }
    }
}
