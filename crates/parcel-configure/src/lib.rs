//! Parcel Package Configurator
//!
//! This crate drives one package-configure invocation end to end: stage
//! the archive on local disk, parse the operation's action document, run
//! its steps and reduce the step outcomes to one status.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              PackageConfigurator                     │
//! │  ┌─────────────────────────────────────────────┐    │
//! │  │  Stager          prepare | extract | remove  │    │
//! │  └─────────────────────────────────────────────┘    │
//! │                      │                               │
//! │                      ▼                               │
//! │  ┌─────────────────────────────────────────────┐    │
//! │  │  DocumentService     parse | execute        │    │
//! │  │        └── StepRunner (ActionEngine)        │    │
//! │  └─────────────────────────────────────────────┘    │
//! │                      │                               │
//! │                      ▼                               │
//! │  ┌─────────────────────────────────────────────┐    │
//! │  │         ConfigureEvent Stream               │    │
//! │  │   PhaseChanged | StepProgress | Finished    │    │
//! │  └─────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use parcel_actions::create_engine_with_actions;
//! use parcel_configure::*;
//! use std::sync::Arc;
//!
//! let engine = create_engine_with_actions();
//! let configurator = PackageConfigurator::new(
//!     Arc::new(LocalStager::new()),
//!     Arc::new(NativeDocumentService::for_engine(&engine)),
//!     Arc::new(engine),
//! );
//!
//! let staging = unique_staging_dir(&configurator.config().staging_root);
//! let request = ConfigureRequest::new("pkgA.zip", staging, PackageOperation::Install);
//! let outcome = configurator.configure(request).await;
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod outcome;
pub mod request;
pub mod service;
pub mod stager;

pub use config::*;
pub use error::*;
pub use executor::*;
pub use outcome::*;
pub use request::*;
pub use service::*;
pub use stager::*;
