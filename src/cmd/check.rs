use clap::Args;
use color_eyre::eyre::{Result, WrapErr};
use parcel_actions::create_engine_with_actions;
use parcel_configure::{DocumentService, NativeDocumentService};
use parcel_document::DocumentContext;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Action document to validate
    pub document: PathBuf,

    /// Accept action types that have no built-in implementation
    #[arg(long)]
    pub allow_unknown_actions: bool,

    /// Working directory used to resolve step paths in the output
    #[arg(long, default_value = ".")]
    pub working_dir: PathBuf,
}

/// Parse a document without running it and print the resolved steps
pub fn run_check(args: CheckArgs) -> Result<()> {
    let raw = std::fs::read(&args.document)
        .wrap_err_with(|| format!("Failed to read {}", args.document.display()))?;

    let service = if args.allow_unknown_actions {
        NativeDocumentService::new()
    } else {
        NativeDocumentService::for_engine(&create_engine_with_actions())
    };

    let ctx = DocumentContext::new("check", PathBuf::new(), &args.working_dir);
    let steps = service
        .parse_document(&raw, &ctx)
        .wrap_err_with(|| format!("Invalid document {}", args.document.display()))?;

    info!(document = %args.document.display(), steps = steps.len(), "Document is valid");
    println!("{}", serde_json::to_string_pretty(&steps)?);
    Ok(())
}
