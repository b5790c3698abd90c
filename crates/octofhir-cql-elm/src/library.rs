//! Compiled library structure and definition lookups

use serde::{Deserialize, Serialize};

use crate::expression::{CodeSystemRef, Expression};
use crate::types::{Element, TypeSpecifier};

// ============================================================================
// Library
// ============================================================================

/// Top-level wrapper emitted by the CQL-to-ELM translator (`{"library": {...}}`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElmDocument {
    pub library: Library,
}

/// A compiled CQL library
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    pub identifier: VersionedIdentifier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_identifier: Option<VersionedIdentifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usings: Option<Defs<UsingDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub includes: Option<Defs<IncludeDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Defs<ParameterDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_systems: Option<Defs<CodeSystemDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_sets: Option<Defs<ValueSetDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codes: Option<Defs<CodeDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concepts: Option<Defs<ConceptDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Defs<ContextDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statements: Option<Defs<ExpressionDef>>,
}

/// ELM definition container (`{"def": [...]}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defs<T> {
    #[serde(rename = "def", default = "Vec::new")]
    pub defs: Vec<T>,
}

impl<T> Default for Defs<T> {
    fn default() -> Self {
        Self { defs: Vec::new() }
    }
}

impl<T> From<Vec<T>> for Defs<T> {
    fn from(defs: Vec<T>) -> Self {
        Self { defs }
    }
}

fn find<'a, T>(defs: &'a Option<Defs<T>>, pred: impl Fn(&T) -> bool) -> Option<&'a T> {
    defs.as_ref().and_then(|d| d.defs.iter().find(|def| pred(def)))
}

impl Library {
    /// Create an empty library with the given identifier
    pub fn new(id: impl Into<String>, version: Option<&str>) -> Self {
        Self {
            identifier: VersionedIdentifier {
                id: id.into(),
                system: None,
                version: version.map(str::to_string),
            },
            ..Self::default()
        }
    }

    /// Parse translator JSON output, accepting both the wrapped
    /// `{"library": ...}` document and a bare library object.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if value.get("library").is_some() {
            serde_json::from_value::<ElmDocument>(value).map(|doc| doc.library)
        } else {
            serde_json::from_value(value)
        }
    }

    pub fn id(&self) -> &str {
        &self.identifier.id
    }

    pub fn version(&self) -> Option<&str> {
        self.identifier.version.as_deref()
    }

    /// Include definition registered under a local alias
    pub fn include(&self, local_identifier: &str) -> Option<&IncludeDef> {
        find(&self.includes, |def| def.local_identifier == local_identifier)
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterDef> {
        find(&self.parameters, |def| def.name == name)
    }

    pub fn code_system(&self, name: &str) -> Option<&CodeSystemDef> {
        find(&self.code_systems, |def| def.name == name)
    }

    pub fn value_set(&self, name: &str) -> Option<&ValueSetDef> {
        find(&self.value_sets, |def| def.name == name)
    }

    pub fn code(&self, name: &str) -> Option<&CodeDef> {
        find(&self.codes, |def| def.name == name)
    }

    pub fn concept(&self, name: &str) -> Option<&ConceptDef> {
        find(&self.concepts, |def| def.name == name)
    }

    /// Named expression definition. Function definitions share the
    /// statement list but are never returned here.
    pub fn expression(&self, name: &str) -> Option<&ExpressionDef> {
        find(&self.statements, |def| def.name == name && !def.is_function())
    }

    /// All named expression definitions in declaration order
    pub fn expression_defs(&self) -> impl Iterator<Item = &ExpressionDef> {
        self.statements
            .iter()
            .flat_map(|s| s.defs.iter())
            .filter(|def| !def.is_function())
    }

    /// Builder-style helper for adding a statement
    pub fn with_expression(mut self, def: ExpressionDef) -> Self {
        self.statements.get_or_insert_with(Defs::default).defs.push(def);
        self
    }
}

/// Versioned identifier for libraries
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionedIdentifier {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

// ============================================================================
// Definitions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsingDef {
    pub local_identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludeDef {
    pub local_identifier: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_level: Option<String>,
    #[serde(rename = "default", skip_serializing_if = "Option::is_none")]
    pub default_expr: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_type_specifier: Option<TypeSpecifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_type_specifier: Option<TypeSpecifier>,
}

impl ParameterDef {
    /// Declared type name with namespaces stripped
    pub fn declared_type(&self) -> Option<String> {
        self.parameter_type_specifier
            .as_ref()
            .or(self.result_type_specifier.as_ref())
            .map(TypeSpecifier::display_name)
            .or_else(|| {
                self.result_type_name
                    .as_deref()
                    .map(|name| crate::types::local_name(name).to_string())
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSystemDef {
    pub name: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueSetDef {
    pub name: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeDef {
    pub name: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    pub code_system: CodeSystemRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptDef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default)]
    pub code: Vec<crate::expression::CodeRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDef {
    pub name: String,
}

/// Named statement: an expression definition or a function definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionDef {
    /// `FunctionDef` for functions; usually absent on expression definitions
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operand: Option<Vec<OperandDef>>,
    #[serde(flatten)]
    pub element: Element,
}

impl ExpressionDef {
    /// Expression definition in the Patient context
    pub fn new(name: impl Into<String>, expression: Expression) -> Self {
        Self {
            kind: None,
            name: name.into(),
            context: Some("Patient".to_string()),
            access_level: Some("Public".to_string()),
            expression: Some(Box::new(expression)),
            operand: None,
            element: Element::default(),
        }
    }

    pub fn is_function(&self) -> bool {
        self.kind.as_deref() == Some("FunctionDef") || self.operand.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperandDef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operand_type_specifier: Option<TypeSpecifier>,
}
