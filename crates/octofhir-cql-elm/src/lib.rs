//! CQL ELM (Expression Logical Model) representation
//!
//! This crate provides:
//! - Serde model of compiled CQL libraries as emitted by the CQL-to-ELM translator
//! - Definition lookups (includes, parameters, terminology, statements)
//! - A uniform child/arity view over expression nodes for tree walkers

pub mod expression;
pub mod library;
pub mod types;

pub use expression::*;
pub use library::*;
pub use types::*;
