//! List command implementation

use super::{output, resolver};
use anyhow::{Context, Result};
use octofhir_cql_elm::Library;
use serde_json::{json, Value};
use std::path::PathBuf;

/// Configuration for list command
pub struct ListConfig {
    pub file: PathBuf,
    pub output_format: Option<String>,
    pub output_file: Option<PathBuf>,
}

/// Print the definitions of an ELM library that can be analyzed or bound
pub fn list(config: ListConfig) -> Result<()> {
    let loader = resolver::LibraryLoader::default();
    let library = loader
        .resolve_path(&config.file)
        .with_context(|| format!("Failed to load library: {}", config.file.display()))?;

    let inventory = inventory(&library);
    let format = output::OutputFormat::parse(config.output_format.as_deref().unwrap_or("pretty"));
    let content = match format {
        output::OutputFormat::Json => output::format_json(&inventory, false)?,
        output::OutputFormat::JsonPretty => output::format_json(&inventory, true)?,
        output::OutputFormat::Summary => summary(&library),
    };
    output::write_output(&content, config.output_file.as_deref())
}

/// Expressions, functions, parameters and includes of `library`
pub fn inventory(library: &Library) -> Value {
    let (functions, expressions): (Vec<_>, Vec<_>) = library
        .statements
        .iter()
        .flat_map(|defs| defs.defs.iter())
        .partition(|def| def.is_function());
    let parameters: Vec<Value> = library
        .parameters
        .iter()
        .flat_map(|defs| defs.defs.iter())
        .map(|p| json!({"name": p.name, "type": p.declared_type()}))
        .collect();
    let includes: Vec<Value> = library
        .includes
        .iter()
        .flat_map(|defs| defs.defs.iter())
        .map(|i| json!({"alias": i.local_identifier, "path": i.path, "version": i.version}))
        .collect();

    json!({
        "library": {"id": library.id(), "version": library.version()},
        "expressions": expressions.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
        "functions": functions.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
        "parameters": parameters,
        "includes": includes,
    })
}

fn summary(library: &Library) -> String {
    let mut lines = vec![format!(
        "{} {}",
        library.id(),
        library.version().unwrap_or("(unversioned)")
    )];
    lines.extend(library.expression_defs().map(|def| format!("  {}", def.name)));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_inventory() {
        let library = Library::from_json(
            &json!({
                "identifier": {"id": "Lib"},
                "parameters": {"def": [{"name": "Measurement Period", "resultTypeName": "{urn:hl7-org:elm-types:r1}DateTime"}]},
                "includes": {"def": [{"localIdentifier": "FHIRHelpers", "path": "FHIRHelpers", "version": "4.0.1"}]},
                "statements": {"def": [
                    {"name": "Patient", "expression": {"type": "Null"}},
                    {"type": "FunctionDef", "name": "ToCode", "operand": [{"name": "c"}]},
                ]},
            })
            .to_string(),
        )
        .unwrap();

        let inventory = inventory(&library);
        assert_eq!(inventory["expressions"], json!(["Patient"]));
        assert_eq!(inventory["functions"], json!(["ToCode"]));
        assert_eq!(
            inventory["parameters"],
            json!([{"name": "Measurement Period", "type": "DateTime"}])
        );
        assert_eq!(inventory["includes"][0]["alias"], json!("FHIRHelpers"));
        assert_eq!(summary(&library), "Lib (unversioned)\n  Patient");
    }
}
