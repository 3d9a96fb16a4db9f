//! In-memory fakes for the pipeline's ports (testing only)
//!
//! Provides `StaticResource`, `StaticHostIdentity`, `StaticDirectory`,
//! `FailingDirectory` and `RecordingGateway`, which satisfy the trait
//! contracts without touching the OS or the network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::delivery::{DeliveryError, DeliveryGateway};
use crate::error::{DxError, Result};
use crate::host_mapping::{HostIdentity, MappingResource};
use crate::run::{RunReference, UserDirectory};

// ---------------------------------------------------------------------------
// StaticResource
// ---------------------------------------------------------------------------

/// Mapping table held in memory. Counts reads and can be swapped between
/// reloads.
#[derive(Debug, Default)]
pub struct StaticResource {
    content: Mutex<Option<String>>,
    reads: AtomicUsize,
    read_delay: Option<Duration>,
}

impl StaticResource {
    pub fn new(content: &str) -> Self {
        Self {
            content: Mutex::new(Some(content.to_string())),
            ..Default::default()
        }
    }

    /// A resource whose reads always fail.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Sleep on every read, to widen race windows in concurrency tests.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Replace the table text seen by the next build.
    pub fn set(&self, content: &str) {
        *self.content.lock().unwrap() = Some(content.to_string());
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl MappingResource for StaticResource {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn read(&self) -> Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.read_delay {
            std::thread::sleep(delay);
        }
        self.content
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| DxError::MappingResource("memory resource unavailable".to_string()))
    }
}

// ---------------------------------------------------------------------------
// StaticHostIdentity
// ---------------------------------------------------------------------------

/// Host identity with fixed answers. `None` for `live` makes the live query fail.
#[derive(Debug, Default)]
pub struct StaticHostIdentity {
    live: Option<String>,
    env: Option<String>,
    live_queries: AtomicUsize,
}

impl StaticHostIdentity {
    pub fn new(live: Option<&str>, env: Option<&str>) -> Self {
        Self {
            live: live.map(str::to_string),
            env: env.map(str::to_string),
            ..Default::default()
        }
    }

    /// Number of live hostname queries made so far.
    pub fn live_queries(&self) -> usize {
        self.live_queries.load(Ordering::SeqCst)
    }
}

impl HostIdentity for StaticHostIdentity {
    fn live_hostname(&self) -> Result<String> {
        self.live_queries.fetch_add(1, Ordering::SeqCst);
        self.live
            .clone()
            .ok_or_else(|| DxError::HostnameUnavailable("live lookup disabled".to_string()))
    }

    fn env_hostname(&self) -> Option<String> {
        self.env.clone()
    }
}

// ---------------------------------------------------------------------------
// Directories
// ---------------------------------------------------------------------------

/// User directory backed by a `HashMap<user id, email>`.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    users: HashMap<String, String>,
    lookups: AtomicUsize,
}

impl StaticDirectory {
    pub fn with_user(mut self, user_id: &str, email: &str) -> Self {
        self.users.insert(user_id.to_string(), email.to_string());
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl UserDirectory for StaticDirectory {
    fn email_for(&self, user_id: &str) -> Result<Option<String>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.users.get(user_id).cloned())
    }
}

/// User directory whose every lookup fails.
pub struct FailingDirectory {
    make_error: Box<dyn Fn(&str) -> DxError + Send + Sync>,
}

impl FailingDirectory {
    pub fn new(make_error: impl Fn(&str) -> DxError + Send + Sync + 'static) -> Self {
        Self {
            make_error: Box::new(make_error),
        }
    }
}

impl UserDirectory for FailingDirectory {
    fn email_for(&self, user_id: &str) -> Result<Option<String>> {
        Err((self.make_error)(user_id))
    }
}

// ---------------------------------------------------------------------------
// RecordingGateway
// ---------------------------------------------------------------------------

/// One call observed by [`RecordingGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEvent {
    pub payload: String,
    pub run: RunReference,
}

/// Gateway that records every send and optionally fails it.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<SentEvent>>,
    failure: Option<String>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that records each send, then reports a transport error.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<SentEvent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryGateway for RecordingGateway {
    async fn send(&self, payload: &str, run: &RunReference) -> std::result::Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(SentEvent {
            payload: payload.to_string(),
            run: run.clone(),
        });
        match &self.failure {
            Some(message) => Err(DeliveryError::Transport(message.clone())),
            None => Ok(()),
        }
    }
}
