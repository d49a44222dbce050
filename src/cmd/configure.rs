use clap::Args;
use color_eyre::eyre::{Result, WrapErr};
use parcel_actions::{create_engine_with_actions, FailurePolicy};
use parcel_configure::{
    unique_staging_dir, ConfigureRequest, ConfiguratorConfig, ConfigureStatus, CriticalMode,
    LocalStager, NativeDocumentService, PackageConfigurator, PackageOperation,
    DEFAULT_STAGING_ROOT,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Args, Debug)]
pub struct ConfigureArgs {
    /// Package archive (.zip or .tar.gz)
    pub archive: PathBuf,

    /// Package operation; selects install.json, uninstall.json or validate.json
    #[arg(long, env = "PARCEL_OPERATION", default_value_t = PackageOperation::Install)]
    pub operation: PackageOperation,

    /// Document file inside the archive, overriding the operation's default
    #[arg(long)]
    pub document: Option<String>,

    /// Parent directory for per-invocation staging directories
    #[arg(long, env = "PARCEL_STAGING_ROOT", default_value = DEFAULT_STAGING_ROOT)]
    pub staging_root: PathBuf,

    /// Exact staging directory, which must not exist yet; a unique one
    /// under --staging-root when unset
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,

    /// Directory for step output and result.json
    #[arg(long, env = "PARCEL_ORCHESTRATION_DIR")]
    pub orchestration_dir: Option<PathBuf>,

    /// Default working directory for steps (defaults to the staging directory)
    #[arg(long)]
    pub working_dir: Option<PathBuf>,

    /// Output bucket passed to every step
    #[arg(long, env = "PARCEL_BUCKET", default_value = "")]
    pub bucket: String,

    /// Key prefix inside the bucket
    #[arg(long, env = "PARCEL_KEY_PREFIX", default_value = "")]
    pub key_prefix: String,

    /// Correlating message id
    #[arg(long, env = "PARCEL_MESSAGE_ID", default_value = "")]
    pub message_id: String,

    /// Correlating document id (random when unset)
    #[arg(long, env = "PARCEL_DOCUMENT_ID")]
    pub document_id: Option<String>,

    /// What to do after a failed step: continue, stop, stop-on-critical
    #[arg(long, env = "PARCEL_FAILURE_POLICY", default_value_t = FailurePolicy::ContinueOnFailure)]
    pub failure_policy: FailurePolicy,

    /// How steps are classified critical: none, all, named, declared
    #[arg(long, env = "PARCEL_CRITICAL_MODE", default_value_t = CriticalMode::Declared)]
    pub critical: CriticalMode,

    /// Step names treated as critical
    #[arg(long = "critical-step", env = "PARCEL_CRITICAL_STEPS", value_delimiter = ',')]
    pub critical_steps: Vec<String>,

    /// Timeout in seconds for steps that declare none
    #[arg(long, env = "PARCEL_STEP_TIMEOUT")]
    pub step_timeout: Option<u64>,

    /// Skip side effects in actions that support it
    #[arg(long, env = "PARCEL_DRY_RUN")]
    pub dry_run: bool,
}

impl ConfigureArgs {
    pub fn config(&self) -> ConfiguratorConfig {
        ConfiguratorConfig {
            staging_root: self.staging_root.clone(),
            failure_policy: self.failure_policy,
            critical_mode: self.critical,
            critical_steps: self.critical_steps.clone(),
            dry_run: self.dry_run,
            default_step_timeout_secs: self.step_timeout,
        }
    }

    pub fn request(&self, config: &ConfiguratorConfig) -> ConfigureRequest {
        let staging = self
            .staging_dir
            .clone()
            .unwrap_or_else(|| unique_staging_dir(&config.staging_root));

        let mut request = ConfigureRequest::new(&self.archive, staging, self.operation)
            .with_bucket(&self.bucket, &self.key_prefix)
            .with_message_id(&self.message_id);

        if let Some(name) = &self.document {
            request = request.with_document_name(name);
        }
        if let Some(id) = &self.document_id {
            request = request.with_document_id(id);
        }
        if let Some(dir) = &self.orchestration_dir {
            request = request.with_orchestration_dir(dir);
        }
        if let Some(dir) = &self.working_dir {
            request = request.with_working_dir(dir);
        }
        request
    }
}

/// Run one package-configure invocation, print the outcome as JSON and
/// return its status
pub async fn run_configure(args: ConfigureArgs) -> Result<ConfigureStatus> {
    let config = args.config();
    debug!(?config, "Configurator settings");

    let engine = create_engine_with_actions();
    let configurator = PackageConfigurator::new(
        Arc::new(LocalStager::new()),
        Arc::new(NativeDocumentService::for_engine(&engine)),
        Arc::new(engine),
    )
    .with_config(config);

    let request = args.request(configurator.config());
    info!(
        archive = %request.archive.display(),
        operation = %request.operation,
        document = %request.document_id,
        "Configuring package"
    );

    let outcome = configurator.configure(request).await;

    let report = serde_json::to_string_pretty(&outcome.report())
        .wrap_err("Failed to serialize configure outcome")?;
    println!("{}", report);

    if outcome.reboot_required {
        info!("A step requested a reboot");
    }

    Ok(outcome.status)
}
