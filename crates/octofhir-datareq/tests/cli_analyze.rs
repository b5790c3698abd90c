//! Analyze command against ELM files on disk
#![cfg(feature = "cli")]

use octofhir_datareq::cli::analyze::{analyze, AnalyzeConfig};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_json(dir: &Path, name: &str, value: Value) {
    fs::write(dir.join(name), value.to_string()).unwrap();
}

fn fixtures(dir: &Path) {
    write_json(
        dir,
        "Common-1.0.0.json",
        json!({"library": {
            "identifier": {"id": "Common", "version": "1.0.0"},
            "valueSets": {"def": [{"name": "Diabetes", "id": "http://example.org/vs/diabetes"}]},
            "statements": {"def": [{
                "name": "Diabetes Conditions",
                "expression": {
                    "type": "Retrieve",
                    "dataType": "{http://hl7.org/fhir}Condition",
                    "codeProperty": "code",
                    "codes": {"type": "ValueSetRef", "name": "Diabetes"},
                },
            }]},
        }}),
    );
    write_json(
        dir,
        "Measure.json",
        json!({"library": {
            "identifier": {"id": "Measure", "version": "1.0.0"},
            "includes": {"def": [{"localIdentifier": "C", "path": "Common", "version": "1.0.0"}]},
            "parameters": {"def": [{
                "name": "Measurement Period",
                "parameterTypeSpecifier": {
                    "type": "IntervalTypeSpecifier",
                    "pointType": {"type": "NamedTypeSpecifier", "name": "{urn:hl7-org:elm-types:r1}DateTime"},
                },
            }]},
            "statements": {"def": [{
                "name": "Active Diabetes",
                "expression": {
                    "type": "Query",
                    "source": [{
                        "alias": "D",
                        "expression": {"type": "ExpressionRef", "libraryName": "C", "name": "Diabetes Conditions"},
                    }],
                    "where": {
                        "type": "In",
                        "operand": [
                            {"type": "Property", "scope": "D", "path": "recordedDate", "resultTypeName": "{http://hl7.org/fhir}dateTime"},
                            {"type": "ParameterRef", "name": "Measurement Period"},
                        ],
                    },
                },
            }]},
        }}),
    );
}

fn config(dir: &TempDir, params: Vec<String>) -> AnalyzeConfig {
    AnalyzeConfig {
        file: dir.path().join("Measure.json"),
        expressions: vec!["Active Diabetes".to_string()],
        strict: true,
        params,
        library_paths: vec![dir.path().to_path_buf()],
        verbose: false,
        output_format: Some("json".to_string()),
        output_file: Some(dir.path().join("out.json")),
    }
}

fn read_report(dir: &TempDir) -> Value {
    serde_json::from_str(&fs::read_to_string(dir.path().join("out.json")).unwrap()).unwrap()
}

#[test]
fn test_analyze_with_include_and_parameter() {
    let dir = TempDir::new().unwrap();
    fixtures(dir.path());

    analyze(config(
        &dir,
        vec!["Measurement Period=Interval[@2019-01-01, @2020-01-01)".to_string()],
    ))
    .unwrap();

    let report = read_report(&dir);
    assert_eq!(
        report["expressions"]["Active Diabetes"]["dataRequirement"],
        json!([{
            "type": "Condition",
            "codeFilter": [{"path": "code", "valueSet": "http://example.org/vs/diabetes"}],
            "dateFilter": [{
                "path": "recordedDate",
                "valuePeriod": {"start": "2019-01-01", "end": "2020-01-01"},
            }],
        }])
    );
}

#[test]
fn test_unbound_parameter_keeps_path() {
    let dir = TempDir::new().unwrap();
    fixtures(dir.path());

    analyze(config(&dir, Vec::new())).unwrap();

    let report = read_report(&dir);
    assert_eq!(
        report["expressions"]["Active Diabetes"]["dataRequirement"][0]["dateFilter"],
        json!([{"path": "recordedDate"}])
    );
}

#[test]
fn test_unknown_expression_fails() {
    let dir = TempDir::new().unwrap();
    fixtures(dir.path());

    let mut config = config(&dir, Vec::new());
    config.expressions = vec!["Nope".to_string()];
    let err = analyze(config).unwrap_err();
    assert!(err.to_string().contains("Nope"));
}

#[test]
fn test_include_resolved_from_input_directory() {
    let dir = TempDir::new().unwrap();
    fixtures(dir.path());

    let mut config = config(&dir, Vec::new());
    config.library_paths = Vec::new();
    analyze(config).unwrap();

    let report = read_report(&dir);
    assert_eq!(
        report["expressions"]["Active Diabetes"]["dataRequirement"][0]["type"],
        json!("Condition")
    );
}
