//! Shared ELM fixtures for integration tests
//!
//! Libraries are written as translator-style JSON and parsed through
//! `Library::from_json`, so the fixtures exercise the ELM model as well.

#![allow(dead_code)]

use octofhir_cql_elm::Library;
use serde_json::{json, Value};

pub const FHIR: &str = "{http://hl7.org/fhir}";
pub const CLAIM_VS: &str = "http://example.org/fhir/ValueSet/revenue";
pub const OBS_VS: &str = "http://example.org/fhir/ValueSet/observation-codes";
pub const CATEGORY_VS: &str = "http://example.org/fhir/ValueSet/observation-category";

/// Parse a library from its statements and definition sections
pub fn library(id: &str, sections: Value, statements: Vec<Value>) -> Library {
    let mut body = json!({
        "identifier": {"id": id, "version": "1.0.0"},
        "schemaIdentifier": {"id": "urn:hl7-org:elm", "version": "r1"},
        "statements": {"def": statements},
    });
    if let (Some(body), Some(sections)) = (body.as_object_mut(), sections.as_object()) {
        body.extend(sections.clone());
    }
    Library::from_json(&json!({ "library": body }).to_string()).expect("fixture library")
}

pub fn define(name: &str, expression: Value) -> Value {
    json!({
        "name": name,
        "context": "Patient",
        "accessLevel": "Public",
        "expression": expression,
    })
}

pub fn value_sets(defs: &[(&str, &str)]) -> Value {
    let defs: Vec<Value> = defs
        .iter()
        .map(|(name, id)| json!({"name": name, "id": id}))
        .collect();
    json!({ "def": defs })
}

pub fn retrieve(data_type: &str) -> Value {
    json!({"type": "Retrieve", "dataType": format!("{FHIR}{data_type}")})
}

pub fn retrieve_in(data_type: &str, value_set: &str) -> Value {
    json!({
        "type": "Retrieve",
        "dataType": format!("{FHIR}{data_type}"),
        "templateId": format!("http://hl7.org/fhir/StructureDefinition/{data_type}"),
        "codeProperty": "code",
        "codes": {"type": "ValueSetRef", "name": value_set},
    })
}

pub fn query(alias: &str, source: Value, where_clause: Option<Value>) -> Value {
    let mut query = json!({
        "type": "Query",
        "source": [{"alias": alias, "expression": source}],
        "relationship": [],
    });
    if let Some(condition) = where_clause {
        query["where"] = condition;
    }
    query
}

pub fn property(scope: &str, path: &str, result_type: &str) -> Value {
    json!({
        "type": "Property",
        "path": path,
        "scope": scope,
        "resultTypeName": format!("{FHIR}{result_type}"),
    })
}

pub fn property_of(source: Value, path: &str, result_type: &str) -> Value {
    json!({
        "type": "Property",
        "path": path,
        "source": source,
        "resultTypeName": format!("{FHIR}{result_type}"),
    })
}

pub fn string(value: &str) -> Value {
    json!({
        "type": "Literal",
        "valueType": "{urn:hl7-org:elm-types:r1}String",
        "value": value,
    })
}

pub fn binary(op: &str, left: Value, right: Value) -> Value {
    json!({"type": op, "operand": [left, right]})
}

pub fn exists(operand: Value) -> Value {
    json!({"type": "Exists", "operand": operand})
}

pub fn in_value_set(code: Value, value_set: &str) -> Value {
    json!({
        "type": "InValueSet",
        "code": code,
        "valueset": {"name": value_set, "preserve": true},
    })
}

pub fn parameter_ref(name: &str) -> Value {
    json!({"type": "ParameterRef", "name": name})
}

pub fn interval_parameter(name: &str) -> Value {
    json!({
        "def": [{
            "name": name,
            "accessLevel": "Public",
            "parameterTypeSpecifier": {
                "type": "IntervalTypeSpecifier",
                "pointType": {
                    "type": "NamedTypeSpecifier",
                    "name": "{urn:hl7-org:elm-types:r1}DateTime",
                },
            },
        }]
    })
}

pub fn named_parameter(name: &str, system_type: &str) -> Value {
    json!({
        "def": [{
            "name": name,
            "accessLevel": "Public",
            "parameterTypeSpecifier": {
                "type": "NamedTypeSpecifier",
                "name": format!("{{urn:hl7-org:elm-types:r1}}{system_type}"),
            },
        }]
    })
}

pub fn system_literal(system_type: &str, value: &str) -> Value {
    json!({
        "type": "Literal",
        "valueType": format!("{{urn:hl7-org:elm-types:r1}}{system_type}"),
        "value": value,
    })
}
