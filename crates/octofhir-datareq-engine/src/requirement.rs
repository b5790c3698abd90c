//! Data requirement records
//!
//! A [`DataRequirement`] names one resource type plus the code and date
//! constraints a retrieval of that type must satisfy. The serialized form
//! follows the FHIR `DataRequirement` shape; classification type tags and
//! the transient alias tag are internal and never serialized.

use serde::{Deserialize, Serialize};

use crate::temporal::TemporalValue;

/// Literal code in a code filter
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Coding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    /// Declared type of the literal (`String`, `DateTime`, `Code`)
    #[serde(skip)]
    pub type_name: Option<String>,
}

impl Coding {
    /// Bare literal value with its declared type
    pub fn literal(code: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            type_name: Some(type_name.into()),
            ..Self::default()
        }
    }
}

/// Categorical constraint: a path, optionally restricted to codes or a value set
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_set: Option<String>,
    #[serde(rename = "code", default, skip_serializing_if = "Vec::is_empty")]
    pub codes: Vec<Coding>,
    /// Declared type of the element at `path`
    #[serde(skip)]
    pub type_name: Option<String>,
}

impl CodeFilter {
    /// Path-only filter
    pub fn path(path: impl Into<String>, type_name: Option<String>) -> Self {
        Self {
            path: Some(path.into()),
            type_name,
            ..Self::default()
        }
    }

    /// Path-less literal value
    pub fn literal(coding: Coding) -> Self {
        Self {
            codes: vec![coding],
            ..Self::default()
        }
    }

    /// Path-less value set reference
    pub fn value_set(url: impl Into<String>) -> Self {
        Self {
            value_set: Some(url.into()),
            ..Self::default()
        }
    }

    /// Carries a literal code or value set
    pub fn has_value(&self) -> bool {
        !self.codes.is_empty() || self.value_set.is_some()
    }

    /// A path with nothing bound to it yet
    pub fn is_bare_path(&self) -> bool {
        self.path.is_some() && !self.has_value()
    }

    /// Literal codes or a value set with no path yet
    pub fn is_bare_literal(&self) -> bool {
        self.path.is_none() && self.has_value()
    }
}

/// Temporal constraint: a path, optionally restricted to a date or period
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(flatten)]
    pub value: Option<TemporalValue>,
    /// Declared type of the element at `path`, or of the literal value
    #[serde(skip)]
    pub type_name: Option<String>,
}

impl DateFilter {
    pub fn path(path: impl Into<String>, type_name: Option<String>) -> Self {
        Self {
            path: Some(path.into()),
            value: None,
            type_name,
        }
    }

    pub fn literal(value: TemporalValue, type_name: impl Into<String>) -> Self {
        Self {
            path: None,
            value: Some(value),
            type_name: Some(type_name.into()),
        }
    }

    pub fn is_bare_path(&self) -> bool {
        self.path.is_some() && self.value.is_none()
    }

    pub fn is_bare_literal(&self) -> bool {
        self.path.is_none() && self.value.is_some()
    }
}

/// One data requirement: a resource type and its constraints
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequirement {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profile: Vec<String>,
    #[serde(rename = "codeFilter", default, skip_serializing_if = "Vec::is_empty")]
    pub code_filters: Vec<CodeFilter>,
    #[serde(rename = "dateFilter", default, skip_serializing_if = "Vec::is_empty")]
    pub date_filters: Vec<DateFilter>,
    /// Query alias this record is bound to while its query is composed
    #[serde(skip)]
    pub alias: Option<String>,
}

impl DataRequirement {
    /// Record for a resource type (or an alias while inside a query)
    pub fn of_type(data_type: impl Into<String>) -> Self {
        Self {
            data_type: Some(data_type.into()),
            ..Self::default()
        }
    }

    pub fn with_code_filter(mut self, filter: CodeFilter) -> Self {
        self.code_filters.push(filter);
        self
    }

    pub fn with_date_filter(mut self, filter: DateFilter) -> Self {
        self.date_filters.push(filter);
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile.push(profile.into());
        self
    }

    /// Path of the first constraint, code filters first
    pub fn first_path(&self) -> Option<&str> {
        self.code_filters
            .first()
            .and_then(|f| f.path.as_deref())
            .or_else(|| self.date_filters.first().and_then(|f| f.path.as_deref()))
    }

    /// No type and no constraints
    pub fn is_empty(&self) -> bool {
        self.data_type.is_none()
            && self.profile.is_empty()
            && self.code_filters.is_empty()
            && self.date_filters.is_empty()
    }

    pub fn type_label(&self) -> &str {
        self.data_type.as_deref().unwrap_or("<untyped>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_as_fhir_data_requirement() {
        let requirement = DataRequirement::of_type("Observation")
            .with_code_filter(CodeFilter {
                path: Some("code".into()),
                value_set: Some("http://fakeurl.com/ersd-diagnosis".into()),
                codes: Vec::new(),
                type_name: Some("CodeableConcept".into()),
            })
            .with_date_filter(DateFilter::path("effective", Some("dateTime".into())));

        assert_eq!(
            serde_json::to_value(&requirement).unwrap(),
            json!({
                "type": "Observation",
                "codeFilter": [{"path": "code", "valueSet": "http://fakeurl.com/ersd-diagnosis"}],
                "dateFilter": [{"path": "effective"}]
            })
        );
    }

    #[test]
    fn test_alias_is_never_serialized() {
        let mut requirement = DataRequirement::of_type("Claim");
        requirement.alias = Some("C".into());
        assert_eq!(
            serde_json::to_value(&requirement).unwrap(),
            json!({"type": "Claim"})
        );
    }

    #[test]
    fn test_bare_shapes() {
        let path = CodeFilter::path("status", None);
        let literal = CodeFilter::literal(Coding::literal("final", "String"));
        assert!(path.is_bare_path() && !path.is_bare_literal());
        assert!(literal.is_bare_literal() && !literal.is_bare_path());
        assert!(CodeFilter::value_set("vs").is_bare_literal());
        assert!(!CodeFilter::default().is_bare_literal());
    }
}
