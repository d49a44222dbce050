//! Package configure orchestration
//!
//! This module provides the PackageConfigurator that stages a package,
//! parses its action document, runs the steps and aggregates the result.

use crate::config::ConfiguratorConfig;
use crate::error::{ConfigureError, Result};
use crate::outcome::{aggregate, ConfigureOutcome, ConfigurePhase, ConfigureStatus};
use crate::request::ConfigureRequest;
use crate::service::DocumentService;
use crate::stager::Stager;
use parcel_actions::{ExecutionResult, Progress, ProgressReporter, RunContext, StepRunner};
use parcel_document::ActionStep;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// File written into the orchestration directory after each invocation
pub const RESULT_FILE: &str = "result.json";

/// Event emitted during a configure invocation
#[derive(Debug, Clone)]
pub enum ConfigureEvent {
    /// Entered a new phase
    PhaseChanged {
        document: String,
        phase: ConfigurePhase,
    },
    /// Step progress update
    StepProgress {
        document: String,
        progress: Progress,
    },
    /// Invocation finished and staging was cleaned up
    Finished {
        document: String,
        status: ConfigureStatus,
    },
}

/// Package configure engine
///
/// Drives one invocation through its phases:
/// 1. Staging: prepare the staging directory and extract the archive
/// 2. Parsing: read and parse the operation's document
/// 3. Executing: run the steps through the injected runner
/// 4. Aggregating: reduce step outcomes to an overall status
///
/// The staging directory is removed exactly once, whatever the outcome.
pub struct PackageConfigurator {
    stager: Arc<dyn Stager>,
    service: Arc<dyn DocumentService>,
    runner: Arc<dyn StepRunner>,
    config: ConfiguratorConfig,
    event_sender: broadcast::Sender<ConfigureEvent>,
}

impl PackageConfigurator {
    /// Create a configurator from its capabilities
    pub fn new(
        stager: Arc<dyn Stager>,
        service: Arc<dyn DocumentService>,
        runner: Arc<dyn StepRunner>,
    ) -> Self {
        let (event_sender, _) = broadcast::channel(1024);
        Self {
            stager,
            service,
            runner,
            config: ConfiguratorConfig::default(),
            event_sender,
        }
    }

    pub fn with_config(mut self, config: ConfiguratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ConfiguratorConfig {
        &self.config
    }

    /// Subscribe to configure events
    pub fn subscribe(&self) -> broadcast::Receiver<ConfigureEvent> {
        self.event_sender.subscribe()
    }

    /// Run one package-configure invocation
    ///
    /// Staging and parsing failures end the invocation with `Failed`, an
    /// empty result and the terminal error. Step failures are recorded per
    /// step and aggregated.
    pub async fn configure(&self, request: ConfigureRequest) -> ConfigureOutcome {
        let document = request.document_id.clone();
        info!(
            document = %document,
            operation = %request.operation,
            archive = %request.archive.display(),
            staging = %request.staging_dir.display(),
            "Starting package configure"
        );

        let mut phases = Vec::new();
        self.enter(&document, ConfigurePhase::Staging, &mut phases);

        // Cleanup only ever covers a directory this invocation created
        let (outcome, guard) = match self.stager.prepare_directory(&request.staging_dir) {
            Err(e) => (self.abort(&document, e.into(), phases), None),
            Ok(()) => {
                let guard = StagingGuard::new(self.stager.clone(), request.staging_dir.clone());
                let outcome = match self.extract_and_parse(&request, &mut phases) {
                    Ok(steps) => self.execute(&request, steps, &mut phases).await,
                    Err(e) => self.abort(&document, e, phases),
                };
                (outcome, Some(guard))
            }
        };

        self.write_result(&request.orchestration_dir, &outcome);
        if let Some(guard) = guard {
            guard.release();
        }

        info!(
            document = %document,
            status = %outcome.status,
            steps = outcome.results.len(),
            reboot = outcome.reboot_required,
            "Package configure finished"
        );
        let _ = self.event_sender.send(ConfigureEvent::Finished {
            document,
            status: outcome.status,
        });

        outcome
    }

    fn abort(
        &self,
        document: &str,
        e: ConfigureError,
        mut phases: Vec<ConfigurePhase>,
    ) -> ConfigureOutcome {
        error!(document = %document, kind = e.kind(), error = %e, "Package configure aborted");
        self.enter(document, ConfigurePhase::Failed, &mut phases);
        ConfigureOutcome {
            status: ConfigureStatus::Failed,
            results: ExecutionResult::new(),
            error: Some(e),
            reboot_required: false,
            phases,
        }
    }

    fn extract_and_parse(
        &self,
        request: &ConfigureRequest,
        phases: &mut Vec<ConfigurePhase>,
    ) -> Result<Vec<ActionStep>> {
        let document = &request.document_id;

        self.stager.extract(&request.archive, &request.staging_dir)?;

        self.enter(document, ConfigurePhase::Parsing, phases);
        let raw = self.stager.read_file(&request.document_path())?;
        let mut steps = self
            .service
            .parse_document(&raw, &request.document_context())
            .map_err(ConfigureError::from)?;

        if let Some(secs) = self.config.default_step_timeout_secs {
            for step in steps.iter_mut().filter(|s| s.timeout.is_none()) {
                step.timeout = Some(Duration::from_secs(secs));
            }
        }

        Ok(steps)
    }

    async fn execute(
        &self,
        request: &ConfigureRequest,
        steps: Vec<ActionStep>,
        phases: &mut Vec<ConfigurePhase>,
    ) -> ConfigureOutcome {
        let document = &request.document_id;
        let critical = self.config.critical_policy();

        let reporter = Arc::new(EventProgressReporter {
            document: document.clone(),
            sender: self.event_sender.clone(),
        });
        let run = RunContext::new(document.clone())
            .with_created_date(request.created_date)
            .with_failure_policy(self.config.failure_policy)
            .with_critical_policy(critical.clone())
            .with_progress_reporter(reporter)
            .with_dry_run(self.config.dry_run);

        self.enter(document, ConfigurePhase::Executing, phases);
        let results = self
            .service
            .execute_document(self.runner.as_ref(), &steps, &run)
            .await;

        self.enter(document, ConfigurePhase::Aggregating, phases);
        let status = aggregate(&steps, &results, critical.as_ref());
        for name in results.failed_steps() {
            warn!(document = %document, step = %name, "Step did not succeed");
        }
        self.enter(document, status.into(), phases);

        ConfigureOutcome {
            status,
            reboot_required: results.reboot_requested(),
            results,
            error: None,
            phases: std::mem::take(phases),
        }
    }

    fn enter(&self, document: &str, phase: ConfigurePhase, phases: &mut Vec<ConfigurePhase>) {
        debug!(document = %document, phase = %phase, "Entering phase");
        phases.push(phase);
        let _ = self.event_sender.send(ConfigureEvent::PhaseChanged {
            document: document.to_string(),
            phase,
        });
    }

    /// Persist the outcome summary; failures never change the outcome
    fn write_result(&self, orchestration_dir: &Path, outcome: &ConfigureOutcome) {
        if orchestration_dir.as_os_str().is_empty() {
            return;
        }

        let body = match serde_json::to_string_pretty(&outcome.report()) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Failed to serialize configure result");
                return;
            }
        };

        let path = orchestration_dir.join(RESULT_FILE);
        let written = self
            .stager
            .ensure_directory(orchestration_dir)
            .and_then(|_| self.stager.write_text(&path, &body));
        if let Err(e) = written {
            warn!(path = %path.display(), error = %e, "Failed to write configure result");
        }
    }
}

impl std::fmt::Debug for PackageConfigurator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageConfigurator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Removes the staging directory once, on release or drop
struct StagingGuard {
    stager: Arc<dyn Stager>,
    path: PathBuf,
    done: bool,
}

impl StagingGuard {
    fn new(stager: Arc<dyn Stager>, path: PathBuf) -> Self {
        Self {
            stager,
            path,
            done: false,
        }
    }

    fn release(mut self) {
        self.cleanup();
    }

    fn cleanup(&mut self) {
        if std::mem::replace(&mut self.done, true) {
            return;
        }
        match self.stager.remove_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Staging directory removed"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Staging cleanup failed"),
        }
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Progress reporter that emits configure events
struct EventProgressReporter {
    document: String,
    sender: broadcast::Sender<ConfigureEvent>,
}

impl ProgressReporter for EventProgressReporter {
    fn report(&self, progress: Progress) {
        debug!(
            document = %self.document,
            step = %progress.step,
            percentage = progress.percentage,
            message = %progress.message,
            "Step progress"
        );
        let _ = self.sender.send(ConfigureEvent::StepProgress {
            document: self.document.clone(),
            progress,
        });
    }
}
