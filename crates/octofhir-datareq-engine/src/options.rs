//! Analyzer configuration

use std::collections::HashMap;

/// What an `And` does when an operand still holds several OR branches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalFormPolicy {
    /// Fail the analysis
    Strict,
    /// Merge anyway, drop literal constants and log a warning
    #[default]
    Relaxed,
}

/// Options for [`DataRequirementsAnalyzer`](crate::DataRequirementsAnalyzer)
#[derive(Debug, Clone, Default)]
pub struct AnalyzerOptions {
    pub normal_form: NormalFormPolicy,
    /// External parameter bindings, as CQL literal text
    /// (`@2019-01-01`, `Interval[@2019-01-01, @2020-01-01)`)
    pub parameters: HashMap<String, String>,
}

impl AnalyzerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict() -> Self {
        Self::new().with_normal_form(NormalFormPolicy::Strict)
    }

    pub fn with_normal_form(mut self, policy: NormalFormPolicy) -> Self {
        self.normal_form = policy;
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn is_strict(&self) -> bool {
        self.normal_form == NormalFormPolicy::Strict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_relaxed() {
        let options = AnalyzerOptions::default();
        assert!(!options.is_strict());
        assert!(options.parameters.is_empty());
    }

    #[test]
    fn test_builder() {
        let options = AnalyzerOptions::strict().with_parameter("Measurement Period", "@2019");
        assert!(options.is_strict());
        assert_eq!(options.parameters["Measurement Period"], "@2019");
    }
}
