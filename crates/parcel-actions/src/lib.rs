//! Parcel Native Action Engine
//!
//! This crate runs the steps of a parsed action document. Actions are
//! small Rust implementations registered by type tag; the [`ActionEngine`]
//! looks them up and runs a document's steps strictly in order.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            ActionEngine                  │
//! │  ┌─────────────────────────────────┐    │
//! │  │     Action Registry             │    │
//! │  │  runShellScript | writefile     │    │
//! │  └─────────────────────────────────┘    │
//! │                  │                       │
//! │                  ▼                       │
//! │  ┌─────────────────────────────────┐    │
//! │  │     StepRunner                  │    │
//! │  │  - Execute steps in order       │    │
//! │  │  - Apply the failure policy     │    │
//! │  │  - Collect one outcome per step │    │
//! │  └─────────────────────────────────┘    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use parcel_actions::{create_engine_with_actions, RunContext, StepRunner};
//!
//! let engine = create_engine_with_actions();
//! let results = engine.execute_steps(&steps, &RunContext::new("doc-1")).await;
//! ```

pub mod actions;
pub mod context;
pub mod engine;
pub mod error;
pub mod outcome;
pub mod policy;
pub mod progress;
pub mod runner;
pub mod traits;

pub use actions::{create_engine_with_actions, register_all};
pub use context::*;
pub use engine::*;
pub use error::*;
pub use outcome::*;
pub use policy::*;
pub use progress::*;
pub use runner::*;
pub use traits::*;
