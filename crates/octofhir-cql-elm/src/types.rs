//! Shared ELM building blocks: the node element header and type specifiers

use serde::{Deserialize, Serialize};

/// Namespace of the ELM system types
pub const SYSTEM_NAMESPACE: &str = "urn:hl7-org:elm-types:r1";

/// Strip the `{namespace}` prefix of an ELM qualified name.
///
/// `{http://hl7.org/fhir}Observation` becomes `Observation`; an unqualified
/// name is returned as-is.
pub fn local_name(qualified: &str) -> &str {
    match qualified.strip_prefix('{') {
        Some(rest) => rest.split_once('}').map_or(qualified, |(_, name)| name),
        None => qualified,
    }
}

/// Build a qualified name in the ELM system namespace.
pub fn system_type(name: &str) -> String {
    format!("{{{SYSTEM_NAMESPACE}}}{name}")
}

// ============================================================================
// Element
// ============================================================================

/// Common header carried by every ELM expression node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_type_specifier: Option<TypeSpecifier>,
}

impl Element {
    /// Element with a declared result type name
    pub fn typed(result_type_name: impl Into<String>) -> Self {
        Self {
            result_type_name: Some(result_type_name.into()),
            ..Self::default()
        }
    }

    /// The declared result type, without namespace qualifiers.
    ///
    /// Prefers `resultTypeName`, falling back to a rendering of the
    /// `resultTypeSpecifier` (`Interval<DateTime>`, `List<Code>`).
    pub fn result_type(&self) -> Option<String> {
        self.result_type_name
            .as_deref()
            .map(|name| local_name(name).to_string())
            .or_else(|| self.result_type_specifier.as_ref().map(TypeSpecifier::display_name))
    }
}

// ============================================================================
// Type Specifiers
// ============================================================================

/// ELM type specifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TypeSpecifier {
    #[serde(rename = "NamedTypeSpecifier")]
    Named(NamedTypeSpecifier),
    #[serde(rename = "ListTypeSpecifier")]
    List(ListTypeSpecifier),
    #[serde(rename = "IntervalTypeSpecifier")]
    Interval(IntervalTypeSpecifier),
    #[serde(rename = "TupleTypeSpecifier")]
    Tuple(TupleTypeSpecifier),
    #[serde(rename = "ChoiceTypeSpecifier")]
    Choice(ChoiceTypeSpecifier),
}

impl TypeSpecifier {
    /// Named specifier for a qualified or local type name
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(NamedTypeSpecifier {
            namespace: None,
            name: name.into(),
        })
    }

    /// Interval specifier over a point type
    pub fn interval(point: TypeSpecifier) -> Self {
        Self::Interval(IntervalTypeSpecifier {
            point_type: Box::new(point),
        })
    }

    /// Human-readable name with namespaces stripped
    pub fn display_name(&self) -> String {
        match self {
            Self::Named(named) => local_name(&named.name).to_string(),
            Self::List(list) => format!("List<{}>", list.element_type.display_name()),
            Self::Interval(interval) => {
                format!("Interval<{}>", interval.point_type.display_name())
            }
            Self::Tuple(_) => "Tuple".to_string(),
            Self::Choice(choice) => {
                let names: Vec<String> = choice.choice.iter().map(Self::display_name).collect();
                format!("Choice<{}>", names.join(","))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedTypeSpecifier {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTypeSpecifier {
    pub element_type: Box<TypeSpecifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalTypeSpecifier {
    pub point_type: Box<TypeSpecifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TupleTypeSpecifier {
    #[serde(default)]
    pub element: Vec<TupleElementDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TupleElementDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_type: Option<TypeSpecifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceTypeSpecifier {
    #[serde(default)]
    pub choice: Vec<TypeSpecifier>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("{http://hl7.org/fhir}Observation"), "Observation");
        assert_eq!(local_name("Observation"), "Observation");
        assert_eq!(local_name("{broken"), "{broken");
    }

    #[test]
    fn test_result_type_prefers_name() {
        let element = Element {
            result_type_name: Some(system_type("DateTime")),
            result_type_specifier: Some(TypeSpecifier::named("ignored")),
            ..Element::default()
        };
        assert_eq!(element.result_type().as_deref(), Some("DateTime"));
    }

    #[test]
    fn test_result_type_from_specifier() {
        let element = Element {
            result_type_specifier: Some(TypeSpecifier::interval(TypeSpecifier::named(
                system_type("DateTime"),
            ))),
            ..Element::default()
        };
        assert_eq!(element.result_type().as_deref(), Some("Interval<DateTime>"));
    }
}
