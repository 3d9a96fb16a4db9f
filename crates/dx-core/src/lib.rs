//! DX Core Library
//!
//! Turns CI run-completion notifications into DX pipeline-run reports:
//! - `extract` pulls raw metadata from a completed run through the `run` traits
//! - `normalize` cleans branch names, derives repository names, parses the
//!   host table and matches the repository denylist
//! - `host_mapping` resolves this host to a pipeline source label
//! - `pipeline` assembles the `CanonicalRunEvent` and hands it to a
//!   `DeliveryGateway`

pub mod config;
pub mod delivery;
pub mod error;
pub mod event;
pub mod extract;
pub mod fakes;
pub mod fallback;
pub mod host_mapping;
pub mod normalize;
pub mod obs;
pub mod pipeline;
pub mod run;
pub mod snapshot;
pub mod telemetry;

pub use config::{check_base_url, DxConfig, UrlCheck};
pub use delivery::{DeliveryError, DeliveryGateway};
pub use error::{DxError, Result};
pub use event::{CanonicalRunEvent, RunStatus, RunWindow};
pub use extract::{extract_fields, RawFields};
pub use host_mapping::{
    current_hostname, CacheState, EmbeddedResource, FileResource, HostIdentity, HostMappingTable,
    MappingResource, SystemHostIdentity, DEFAULT_PIPELINE_SOURCE,
};
pub use normalize::{is_repository_denied, repository_short_name, split_csv_line, strip_branch_ref};
pub use obs::{
    emit_delivery_failed, emit_event_delivered, emit_event_skipped, emit_host_mapping_loaded,
    RunSpan,
};
pub use pipeline::{Disposition, DxRunListener, SkipReason};
pub use run::{
    ChangeLogEntry, CompletedRun, EnvVars, NoUserDirectory, RunOutcome, RunReference, ScmHead,
    ScmRevision, UserDirectory,
};
pub use snapshot::RunSnapshot;
pub use telemetry::init_tracing;

/// DX core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
