//! Hostname to pipeline-source resolution.
//!
//! [`HostMappingTable`] reads a two-column table (`hostname`,`pipeline source`)
//! once, on first lookup, and serves every later lookup from memory.
//!
//! ## State
//!
//! `Uninitialized -> Initializing -> Ready`. A build runs under `build_lock`,
//! so concurrent first lookups perform exactly one load; the others block on
//! the lock and then read the finished table. The table itself is published as
//! an `Arc` only once fully populated, so readers never see a partial map, and
//! a lookup that started before [`HostMappingTable::reload`] keeps reading the
//! snapshot it already holds.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, error, info, warn};

use crate::error::{DxError, Result};
use crate::fallback::{first_non_empty, Step};
use crate::normalize::split_csv_line;
use crate::obs;

/// Label reported for hosts that have no mapping.
pub const DEFAULT_PIPELINE_SOURCE: &str = "jenkins-unmapped";

/// Mapping table compiled into the binary.
pub const EMBEDDED_TABLE: &str = include_str!("../resources/jenkins-server.csv");

/// Samples logged at debug level after a successful load.
const SAMPLE_LOG_LIMIT: usize = 5;

/// Where the mapping table comes from.
pub trait MappingResource: Send + Sync {
    /// Human-readable location, for diagnostics.
    fn describe(&self) -> String;

    /// Full text of the table.
    fn read(&self) -> Result<String>;
}

impl<T: MappingResource + ?Sized> MappingResource for Arc<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn read(&self) -> Result<String> {
        (**self).read()
    }
}

/// The table shipped in `resources/jenkins-server.csv`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedResource;

impl MappingResource for EmbeddedResource {
    fn describe(&self) -> String {
        "embedded:jenkins-server.csv".to_string()
    }

    fn read(&self) -> Result<String> {
        Ok(EMBEDDED_TABLE.to_string())
    }
}

/// A table read from disk on every (re)build.
#[derive(Debug, Clone)]
pub struct FileResource {
    path: PathBuf,
}

impl FileResource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MappingResource for FileResource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self) -> Result<String> {
        std::fs::read_to_string(&self.path).map_err(|e| {
            DxError::MappingResource(format!("{}: {}", self.path.display(), e))
        })
    }
}

/// Source of the current process's host identity.
pub trait HostIdentity: Send + Sync {
    /// Live hostname query against the OS.
    fn live_hostname(&self) -> Result<String>;

    /// Hostname supplied by the environment (`HOSTNAME`).
    fn env_hostname(&self) -> Option<String>;
}

/// Host identity of the machine this process runs on.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHostIdentity;

impl HostIdentity for SystemHostIdentity {
    fn live_hostname(&self) -> Result<String> {
        hostname::get()?
            .into_string()
            .map_err(|raw| DxError::HostnameUnavailable(format!("non UTF-8 hostname {raw:?}")))
    }

    fn env_hostname(&self) -> Option<String> {
        std::env::var("HOSTNAME").ok()
    }
}

/// Current hostname: live query first, then the environment.
pub fn current_hostname(identity: &dyn HostIdentity) -> Result<String> {
    first_non_empty(
        "hostname",
        [
            Step::new("live", || identity.live_hostname().map(Some)),
            Step::value("env", identity.env_hostname()),
        ],
    )
    .ok_or_else(|| DxError::HostnameUnavailable("could not determine hostname".to_string()))
}

/// Observable lifecycle of a [`HostMappingTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Uninitialized,
    Initializing,
    Ready,
}

type Entries = HashMap<String, String>;

/// Lazily built, reloadable hostname → pipeline-source table.
pub struct HostMappingTable {
    resource: Box<dyn MappingResource>,
    default_source: String,
    entries: RwLock<Option<Arc<Entries>>>,
    build_lock: Mutex<()>,
    building: AtomicBool,
}

impl HostMappingTable {
    /// A table backed by `resource`. Nothing is read until the first lookup.
    pub fn new(resource: impl MappingResource + 'static) -> Self {
        Self {
            resource: Box::new(resource),
            default_source: DEFAULT_PIPELINE_SOURCE.to_string(),
            entries: RwLock::new(None),
            build_lock: Mutex::new(()),
            building: AtomicBool::new(false),
        }
    }

    /// A table backed by [`EmbeddedResource`].
    pub fn embedded() -> Self {
        Self::new(EmbeddedResource)
    }

    /// Override the label returned for unmapped hosts.
    pub fn with_default_source(mut self, default_source: impl Into<String>) -> Self {
        self.default_source = default_source.into();
        self
    }

    pub fn default_source(&self) -> &str {
        &self.default_source
    }

    pub fn state(&self) -> CacheState {
        if self.building.load(Ordering::Acquire) {
            CacheState::Initializing
        } else if self.published().is_some() {
            CacheState::Ready
        } else {
            CacheState::Uninitialized
        }
    }

    /// Pipeline source for `hostname`, or the default label.
    pub fn resolve(&self, hostname: &str) -> String {
        let entries = self.snapshot();
        match entries.get(hostname) {
            Some(source) if !source.trim().is_empty() => {
                debug!(hostname = %hostname, source = %source, "host mapping found");
                source.clone()
            }
            _ => {
                info!(
                    hostname = %hostname,
                    default = %self.default_source,
                    "no host mapping found, using default"
                );
                self.default_source.clone()
            }
        }
    }

    /// Pipeline source for the host this process runs on.
    ///
    /// An undeterminable hostname resolves to the default label.
    pub fn source_for_current_host(&self, identity: &dyn HostIdentity) -> String {
        match current_hostname(identity) {
            Ok(hostname) => self.resolve(&hostname),
            Err(e) => {
                warn!(error = %e, "falling back to default pipeline source");
                self.default_source.clone()
            }
        }
    }

    /// Drop the current table. The next lookup rebuilds it.
    pub fn reload(&self) {
        let _guard = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);
        *self.entries.write().unwrap_or_else(PoisonError::into_inner) = None;
        debug!(resource = %self.resource.describe(), "host mapping reset");
    }

    /// Number of mapped hosts. Builds the table if needed.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn published(&self) -> Option<Arc<Entries>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn snapshot(&self) -> Arc<Entries> {
        if let Some(entries) = self.published() {
            return entries;
        }

        let _guard = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entries) = self.published() {
            return entries;
        }

        self.building.store(true, Ordering::Release);
        let entries = Arc::new(self.build());
        *self.entries.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&entries));
        self.building.store(false, Ordering::Release);
        entries
    }

    fn build(&self) -> Entries {
        let location = self.resource.describe();
        let content = match self.resource.read() {
            Ok(content) => content,
            Err(e) => {
                error!(resource = %location, error = %e, "host mapping resource unavailable");
                return Entries::new();
            }
        };

        let entries = parse_table(&content);
        obs::emit_host_mapping_loaded(&location, entries.len());
        for (hostname, source) in entries.iter().take(SAMPLE_LOG_LIMIT) {
            debug!(hostname = %hostname, source = %source, "sample host mapping");
        }
        entries
    }
}

impl std::fmt::Debug for HostMappingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostMappingTable")
            .field("resource", &self.resource.describe())
            .field("default_source", &self.default_source)
            .field("state", &self.state())
            .finish()
    }
}

/// Parse mapping table text. Later duplicate hostnames overwrite earlier ones.
pub fn parse_table(content: &str) -> HashMap<String, String> {
    let mut entries = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields = split_csv_line(line);
        if let [hostname, source, ..] = fields.as_slice() {
            if !hostname.is_empty() && !source.is_empty() {
                entries.insert(hostname.clone(), source.clone());
            }
        }
    }
    entries
}
