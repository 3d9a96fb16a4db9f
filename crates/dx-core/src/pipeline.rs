//! Run-completion pipeline.
//!
//! [`DxRunListener`] is the composition root: it extracts raw fields from a
//! completed run, normalizes them, resolves the pipeline source for this host,
//! applies the repository denylist and hands the canonical event to the
//! delivery gateway.
//!
//! Nothing here returns an error. Each run ends in exactly one
//! [`Disposition`]; missing data degrades to empty fields, and the only early
//! exits are "not configured" and "repository denylisted".

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn, Instrument};

use crate::config::DxConfig;
use crate::delivery::DeliveryGateway;
use crate::event::{non_empty, CanonicalRunEvent, RunStatus, RunWindow};
use crate::extract::extract_fields;
use crate::host_mapping::{current_hostname, HostIdentity, HostMappingTable, SystemHostIdentity};
use crate::normalize::{repository_short_name, strip_branch_ref};
use crate::obs::{self, RunSpan};
use crate::run::{CompletedRun, NoUserDirectory, RunReference, UserDirectory};

/// Why a run produced no report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotConfigured,
    Denylisted { repository: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotConfigured => write!(f, "plugin not configured"),
            SkipReason::Denylisted { repository } => {
                write!(f, "repository '{repository}' is denylisted")
            }
        }
    }
}

/// What happened to one run-completion notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The gateway accepted the event.
    Delivered(CanonicalRunEvent),

    /// The event was built but the gateway reported a failure.
    DeliveryFailed {
        event: CanonicalRunEvent,
        error: String,
    },

    /// No event was sent.
    Skipped(SkipReason),
}

impl Disposition {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Disposition::Delivered(_))
    }

    /// The event built for this run, if one was built.
    pub fn event(&self) -> Option<&CanonicalRunEvent> {
        match self {
            Disposition::Delivered(event) | Disposition::DeliveryFailed { event, .. } => Some(event),
            Disposition::Skipped(_) => None,
        }
    }
}

/// Turns completed runs into DX pipeline-run reports.
pub struct DxRunListener {
    config: DxConfig,
    gateway: Arc<dyn DeliveryGateway>,
    host_mapping: Arc<HostMappingTable>,
    host_identity: Arc<dyn HostIdentity>,
    directory: Arc<dyn UserDirectory>,
}

impl DxRunListener {
    /// A listener using the embedded host table, the system hostname and no
    /// user directory.
    pub fn new(config: DxConfig, gateway: Arc<dyn DeliveryGateway>) -> Self {
        Self {
            config,
            gateway,
            host_mapping: Arc::new(HostMappingTable::embedded()),
            host_identity: Arc::new(SystemHostIdentity),
            directory: Arc::new(NoUserDirectory),
        }
    }

    /// Share a host mapping table, typically one per process.
    pub fn with_host_mapping(mut self, host_mapping: Arc<HostMappingTable>) -> Self {
        self.host_mapping = host_mapping;
        self
    }

    pub fn with_host_identity(mut self, host_identity: Arc<dyn HostIdentity>) -> Self {
        self.host_identity = host_identity;
        self
    }

    pub fn with_directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn config(&self) -> &DxConfig {
        &self.config
    }

    pub fn host_mapping(&self) -> &HostMappingTable {
        &self.host_mapping
    }

    /// Handle one completed run: build its event and deliver it.
    pub async fn on_completed(&self, run: &dyn CompletedRun) -> Disposition {
        let reference = run.reference();
        let event = match self.normalize(run) {
            Ok(event) => event,
            Err(reason) => return Disposition::Skipped(reason),
        };

        let span = tracing::info_span!("dx.run", run = %reference);
        self.deliver(event, &reference).instrument(span).await
    }

    /// Build the canonical event for `run`, or say why there is none.
    pub fn normalize(&self, run: &dyn CompletedRun) -> Result<CanonicalRunEvent, SkipReason> {
        let reference = run.reference();
        let reference_id = reference.to_string();
        let _span = RunSpan::enter(&reference_id);

        if !self.config.is_configured() {
            run.console("DX: plugin not configured. Skipping.");
            obs::emit_event_skipped(&reference_id, &SkipReason::NotConfigured);
            return Err(SkipReason::NotConfigured);
        }

        let raw = extract_fields(run, self.directory.as_ref());
        let head_branch = strip_branch_ref(&raw.branch);
        let base_branch = strip_branch_ref(&raw.target_branch);
        let repository = repository_short_name(&raw.repository_url);

        let pipeline_source = self.pipeline_source(run);
        let status = RunStatus::from_outcome(run.outcome());
        let window = RunWindow::from_millis(run.start_time_millis(), run.duration_millis());

        if self.config.is_repository_denied(&repository) {
            run.console(&format!(
                "DX: repository '{repository}' is denylisted. Skipping DX submission."
            ));
            let reason = SkipReason::Denylisted { repository };
            obs::emit_event_skipped(&reference_id, &reason);
            return Err(reason);
        }

        let job = reference.job_full_name.clone();
        let pipeline_name = if job.is_empty() {
            "jenkins-".to_string()
        } else {
            job.clone()
        };

        Ok(CanonicalRunEvent {
            pipeline_name,
            pipeline_source,
            reference_id,
            source_id: job,
            started_at: window.started_at,
            finished_at: window.finished_at,
            status,
            repository,
            source_url: raw.repository_url,
            head_branch,
            base_branch: non_empty(base_branch),
            commit_sha: raw.commit_sha,
            pr_number: non_empty(raw.pr_number),
            email: raw.email,
        })
    }

    /// Resolve the hostname once; the console reports the name that was looked up.
    fn pipeline_source(&self, run: &dyn CompletedRun) -> String {
        let hostname = current_hostname(self.host_identity.as_ref());
        let source = match &hostname {
            Ok(hostname) => self.host_mapping.resolve(hostname),
            Err(e) => {
                warn!(error = %e, "falling back to default pipeline source");
                self.host_mapping.default_source().to_string()
            }
        };
        run.console(&format!("DX: Using pipeline source: {source}"));
        match hostname {
            Ok(hostname) => run.console(&format!("DX: Detected hostname: {hostname}")),
            Err(e) => run.console(&format!("DX: Could not determine hostname: {e}")),
        }
        source
    }

    async fn deliver(&self, event: CanonicalRunEvent, reference: &RunReference) -> Disposition {
        let payload = match event.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                obs::emit_delivery_failed(&event.reference_id, &e);
                return Disposition::DeliveryFailed {
                    event,
                    error: e.to_string(),
                };
            }
        };
        if let Ok(pretty) = event.to_json_pretty() {
            debug!(payload = %pretty, "DX payload");
        }

        match self.gateway.send(&payload, reference).await {
            Ok(()) => {
                obs::emit_event_delivered(
                    &event.reference_id,
                    event.status.as_str(),
                    &event.pipeline_source,
                );
                Disposition::Delivered(event)
            }
            Err(e) => {
                obs::emit_delivery_failed(&event.reference_id, &e);
                Disposition::DeliveryFailed {
                    event,
                    error: e.to_string(),
                }
            }
        }
    }
}
