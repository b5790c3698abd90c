//! CQL data requirements analysis
//!
//! Given compiled CQL libraries (ELM JSON), reports the resources each
//! named expression needs retrieved, with the code and date constraints
//! that narrow each retrieval.
//!
//! # Example
//!
//! ```ignore
//! use octofhir_datareq::{AnalyzerOptions, DataRequirementsAnalyzer, Library, LibraryRegistry};
//!
//! let library = Library::from_json(&std::fs::read_to_string("Measure.json")?)?;
//! let registry = LibraryRegistry::new();
//! let mut analyzer = DataRequirementsAnalyzer::new(&registry, AnalyzerOptions::strict());
//! for requirement in analyzer.data_requirements(&library, "Denominator")? {
//!     println!("{}", serde_json::to_string(&requirement)?);
//! }
//! ```

pub use octofhir_cql_elm as elm;
pub use octofhir_datareq_engine as engine;

pub use octofhir_cql_elm::Library;
pub use octofhir_datareq_engine::{
    AnalyzerOptions, CodeFilter, Coding, DataRequirement, DataRequirementsAnalyzer,
    DataRequirementsError, DataRequirementsResult, DateFilter, LibraryProvider, LibraryRegistry,
    NormalFormPolicy,
};

// CLI module (only available with cli feature)
#[cfg(feature = "cli")]
pub mod cli;
