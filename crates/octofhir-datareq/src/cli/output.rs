//! Output formatting utilities

use anyhow::{Context, Result};
use colored::Colorize;
use octofhir_datareq_engine::DataRequirement;
use serde_json::Value;
use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::path::Path;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    JsonPretty,
    /// One line per requirement, for reading in a terminal
    Summary,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "summary" | "text" => Self::Summary,
            _ => Self::JsonPretty,
        }
    }
}

/// Set up color output based on user preference
pub fn setup_colors(mode: &str) {
    match mode.to_lowercase().as_str() {
        "always" => colored::control::set_override(true),
        "never" => colored::control::set_override(false),
        _ => colored::control::set_override(io::stdout().is_terminal()),
    }
}

/// Format an error for display
pub fn format_error(error: &anyhow::Error) -> String {
    format!("{} {:#}", "Error:".red().bold(), error)
}

/// Format a warning for display
pub fn format_warning(warning: &str) -> String {
    format!("{} {}", "Warning:".yellow().bold(), warning)
}

/// Format a success message for display
pub fn format_success(message: &str) -> String {
    format!("{} {}", "Success:".green().bold(), message)
}

/// Write output to a file or stdout
pub fn write_output(content: &str, output_file: Option<&Path>) -> Result<()> {
    if let Some(path) = output_file {
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write to output file: {}", path.display()))?;
        eprintln!(
            "{}",
            format_success(&format!("Output written to {}", path.display()))
        );
    } else {
        println!("{}", content);
    }
    Ok(())
}

/// Format JSON value for output
pub fn format_json(value: &Value, pretty: bool) -> Result<String> {
    if pretty {
        serde_json::to_string_pretty(value).context("Failed to serialize JSON")
    } else {
        serde_json::to_string(value).context("Failed to serialize JSON")
    }
}

/// One-line rendering of a requirement:
/// `Observation  code in <url>; status = final; effective`
pub fn format_requirement(requirement: &DataRequirement) -> String {
    let mut constraints = Vec::new();
    for filter in &requirement.code_filters {
        let path = filter.path.as_deref().unwrap_or("?");
        if let Some(url) = &filter.value_set {
            constraints.push(format!("{path} in {}", url.cyan()));
        } else if filter.codes.is_empty() {
            constraints.push(path.to_string());
        } else {
            let codes: Vec<&str> = filter.codes.iter().map(|c| c.code.as_str()).collect();
            constraints.push(format!("{path} = {}", codes.join(" | ").cyan()));
        }
    }
    for filter in &requirement.date_filters {
        let path = filter.path.as_deref().unwrap_or("?");
        match &filter.value {
            Some(value) => {
                let rendered = serde_json::to_string(value).unwrap_or_default();
                constraints.push(format!("{path} @ {}", rendered.cyan()));
            }
            None => constraints.push(path.to_string()),
        }
    }

    let label = requirement.type_label().bold();
    if constraints.is_empty() {
        label.to_string()
    } else {
        format!("{label}  {}", constraints.join("; "))
    }
}

/// Per-expression results as summary text
pub fn format_summary(results: &[(String, Result<Vec<DataRequirement>, String>)]) -> String {
    let mut lines = Vec::new();
    for (name, result) in results {
        lines.push(name.green().bold().to_string());
        match result {
            Ok(requirements) if requirements.is_empty() => {
                lines.push("  (no data requirements)".dimmed().to_string());
            }
            Ok(requirements) => {
                lines.extend(requirements.iter().map(|r| format!("  {}", format_requirement(r))));
            }
            Err(message) => lines.push(format!("  {}", format_warning(message))),
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_datareq_engine::{CodeFilter, Coding, DateFilter};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("summary"), OutputFormat::Summary);
        assert_eq!(OutputFormat::parse("anything"), OutputFormat::JsonPretty);
    }

    #[test]
    fn test_format_requirement() {
        colored::control::set_override(false);
        let requirement = DataRequirement::of_type("Observation")
            .with_code_filter(CodeFilter {
                path: Some("code".into()),
                value_set: Some("http://example.org/vs".into()),
                ..CodeFilter::default()
            })
            .with_code_filter(CodeFilter {
                path: Some("status".into()),
                codes: vec![Coding::literal("final", "String")],
                ..CodeFilter::default()
            })
            .with_date_filter(DateFilter::path("effective", None));
        assert_eq!(
            format_requirement(&requirement),
            "Observation  code in http://example.org/vs; status = final; effective"
        );
        assert_eq!(format_requirement(&DataRequirement::of_type("Patient")), "Patient");
    }
}
