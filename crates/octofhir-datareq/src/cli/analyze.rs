//! Analyze command implementation

use super::{output, resolver};
use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use octofhir_cql_elm::Library;
use octofhir_datareq_engine::{
    AnalyzerOptions, DataRequirement, DataRequirementsAnalyzer, DataRequirementsError,
    LibraryProvider, NormalFormPolicy,
};
use serde_json::{json, Value};
use std::path::PathBuf;

/// Configuration for analyze command
pub struct AnalyzeConfig {
    pub file: PathBuf,
    /// Expressions to analyze; every expression definition when empty
    pub expressions: Vec<String>,
    pub strict: bool,
    pub params: Vec<String>,
    pub library_paths: Vec<PathBuf>,
    pub verbose: bool,
    pub output_format: Option<String>,
    pub output_file: Option<PathBuf>,
}

type Outcome = Result<Vec<DataRequirement>, DataRequirementsError>;

/// Analyze the expressions of an ELM library and print their requirements
pub fn analyze(config: AnalyzeConfig) -> Result<()> {
    let loader = resolver::LibraryLoader::new(config.library_paths.clone());
    if config.verbose {
        eprintln!("Library search paths:");
        for path in loader.search_paths() {
            eprintln!("  - {}", path.display());
        }
        if let Some(dir) = config.file.parent() {
            eprintln!("  - {} (input directory)", dir.display());
        }
    }

    let (library, registry) = loader
        .load_with_includes(&config.file)
        .with_context(|| format!("Failed to load library: {}", config.file.display()))?;
    log::info!(
        "analyzing {} {} ({} libraries loaded)",
        library.id(),
        library.version().unwrap_or("(unversioned)"),
        registry.len()
    );

    let options = analyzer_options(config.strict, &config.params)?;
    let results = run_analysis(&library, &registry, options, &config.expressions);

    if !config.expressions.is_empty() {
        if let Some((name, Err(err))) = results.iter().find(|(_, r)| r.is_err()) {
            bail!("{name}: {err}");
        }
    }
    for (name, result) in &results {
        if let Err(err) = result {
            eprintln!("{}", output::format_warning(&format!("{name}: {err}")));
        }
    }

    let format = output::OutputFormat::parse(config.output_format.as_deref().unwrap_or("pretty"));
    let content = match format {
        output::OutputFormat::Summary => {
            let summary: Vec<(String, Result<Vec<DataRequirement>, String>)> = results
                .iter()
                .map(|(name, r)| {
                    let rendered = r.as_ref().map(Vec::clone).map_err(ToString::to_string);
                    (name.clone(), rendered)
                })
                .collect();
            output::format_summary(&summary)
        }
        output::OutputFormat::Json => output::format_json(&report(&library, &results), false)?,
        output::OutputFormat::JsonPretty => output::format_json(&report(&library, &results), true)?,
    };
    output::write_output(&content, config.output_file.as_deref())?;

    if config.verbose {
        let failed = results.values().filter(|r| r.is_err()).count();
        eprintln!(
            "{}",
            output::format_success(&format!(
                "Analyzed {} expressions ({} failed)",
                results.len(),
                failed
            ))
        );
    }
    Ok(())
}

/// Options from command-line flags; parameters are `name=value` pairs
pub fn analyzer_options(strict: bool, params: &[String]) -> Result<AnalyzerOptions> {
    let policy = if strict {
        NormalFormPolicy::Strict
    } else {
        NormalFormPolicy::Relaxed
    };
    let mut options = AnalyzerOptions::new().with_normal_form(policy);
    for param in params {
        let Some((name, value)) = param.split_once('=') else {
            bail!("Invalid parameter format: '{}'. Expected 'name=value'", param);
        };
        options = options.with_parameter(name.trim(), value.trim());
    }
    Ok(options)
}

/// Data requirements per expression, in library order when no names are given
pub fn run_analysis(
    library: &Library,
    provider: &dyn LibraryProvider,
    options: AnalyzerOptions,
    expressions: &[String],
) -> IndexMap<String, Outcome> {
    let mut analyzer = DataRequirementsAnalyzer::new(provider, options);
    if expressions.is_empty() {
        return analyzer.library_data_requirements(library);
    }
    expressions
        .iter()
        .map(|name| (name.clone(), analyzer.data_requirements(library, name)))
        .collect()
}

/// JSON report: library identity plus per-expression requirements or error
pub fn report(library: &Library, results: &IndexMap<String, Outcome>) -> Value {
    let expressions: serde_json::Map<String, Value> = results
        .iter()
        .map(|(name, result)| {
            let entry = match result {
                Ok(requirements) => json!({ "dataRequirement": requirements }),
                Err(err) => json!({
                    "error": {
                        "category": format!("{:?}", err.category()),
                        "message": err.to_string(),
                    }
                }),
            };
            (name.clone(), entry)
        })
        .collect();

    json!({
        "library": {
            "id": library.id(),
            "version": library.version(),
        },
        "expressions": expressions,
    })
}
