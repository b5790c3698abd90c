//! CLI functionality for the data requirements tool
//!
//! - ELM library loading and include resolution
//! - Analysis and listing commands
//! - Output formatting

pub mod analyze;
pub mod list;
pub mod output;
pub mod resolver;
