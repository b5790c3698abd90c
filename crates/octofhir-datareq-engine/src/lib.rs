//! Data requirements analysis for CQL ELM
//!
//! Walks the ELM of a named expression without evaluating it and reports
//! which resources it needs, and with which code and date constraints:
//!
//! - [`Frame`] values model requirements in disjunctive normal form
//! - [`operations`] holds the AND/OR algebra over frames and the where-clause
//!   attachment of constraints to query sources
//! - [`DataRequirementsAnalyzer`] drives the traversal with a per-library
//!   memo of named expressions
//!
//! # Example
//!
//! ```ignore
//! use octofhir_datareq_engine::{AnalyzerOptions, DataRequirementsAnalyzer, LibraryRegistry};
//!
//! let registry = LibraryRegistry::new().with_library(common);
//! let mut analyzer = DataRequirementsAnalyzer::new(&registry, AnalyzerOptions::default());
//! let requirements = analyzer.data_requirements(&main, "Denominator")?;
//! ```

pub mod analyzer;
pub mod cache;
pub mod classify;
pub mod context;
mod dispatch;
pub mod error;
pub mod extractor;
pub mod frame;
pub mod operations;
pub mod options;
pub mod requirement;
pub mod resolver;
pub mod temporal;

pub use analyzer::DataRequirementsAnalyzer;
pub use cache::ExpressionCache;
pub use classify::{convert_code_filters, is_temporal_type};
pub use error::{DataRequirementsError, DataRequirementsResult, DefinitionKind, ErrorCategory};
pub use frame::{Frame, RequirementMap};
pub use options::{AnalyzerOptions, NormalFormPolicy};
pub use requirement::{CodeFilter, Coding, DataRequirement, DateFilter};
pub use resolver::{LibraryProvider, LibraryRegistry, LibraryScope};
pub use temporal::{PartialDateTime, Period, TemporalValue};
