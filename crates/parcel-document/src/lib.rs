//! Parcel Action Documents
//!
//! This crate provides the schema and parser for the action documents
//! shipped inside package archives (`install.json`, `uninstall.json`,
//! `validate.json`).
//!
//! # Resources
//!
//! - `ActionDocument` - The raw declaration: schema version plus `mainSteps`
//! - `DocumentContext` - Addressing and correlation shared by every step
//! - `ActionStep` - A parsed, validated step ready for a runner
//!
//! Parsing never executes anything. The same bytes and context always
//! produce the same ordered step list.

pub mod context;
pub mod document;
pub mod error;
pub mod parser;
pub mod step;

pub use context::*;
pub use document::*;
pub use error::*;
pub use parser::*;
pub use step::*;

/// Major schema version accepted by the parser
pub const SUPPORTED_SCHEMA_MAJOR: &str = "2";
