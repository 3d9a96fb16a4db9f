//! Runtime configuration for DX reporting.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DxError, Result};
use crate::normalize::is_repository_denied;

pub const ENV_BASE_URL: &str = "DX_BASE_URL";
pub const ENV_REPOSITORY_DENYLIST: &str = "DX_REPOSITORY_DENYLIST";
pub const ENV_HOST_MAPPING_FILE: &str = "DX_HOST_MAPPING_FILE";

/// DX reporting configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DxConfig {
    /// DX API base URL. Reporting is disabled while this is unset or blank.
    pub base_url: Option<String>,

    /// Repository short names never reported, separated by commas or newlines.
    pub repository_denylist: String,

    /// Mapping table to use instead of the embedded one.
    pub host_mapping_file: Option<PathBuf>,
}

/// Result of checking a base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlCheck {
    Ok,
    Warning(String),
}

impl DxConfig {
    /// Create a config for a specific base URL.
    pub fn new(base_url: &str) -> Self {
        DxConfig {
            base_url: Some(base_url.to_string()),
            ..Default::default()
        }
    }

    /// Read `DX_BASE_URL`, `DX_REPOSITORY_DENYLIST` and `DX_HOST_MAPPING_FILE`.
    pub fn from_env() -> Self {
        DxConfig {
            base_url: std::env::var(ENV_BASE_URL).ok(),
            repository_denylist: std::env::var(ENV_REPOSITORY_DENYLIST).unwrap_or_default(),
            host_mapping_file: std::env::var(ENV_HOST_MAPPING_FILE).ok().map(PathBuf::from),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| DxError::Config(e.to_string()))
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Set the repository denylist.
    pub fn with_denylist(mut self, denylist: &str) -> Self {
        self.repository_denylist = denylist.to_string();
        self
    }

    /// Fill unset fields from `fallback`.
    pub fn or(self, fallback: DxConfig) -> Self {
        DxConfig {
            base_url: self.base_url.or(fallback.base_url),
            repository_denylist: if self.repository_denylist.trim().is_empty() {
                fallback.repository_denylist
            } else {
                self.repository_denylist
            },
            host_mapping_file: self.host_mapping_file.or(fallback.host_mapping_file),
        }
    }

    /// Whether a non-blank base URL is set.
    pub fn is_configured(&self) -> bool {
        self.base_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    pub fn is_repository_denied(&self, repository: &str) -> bool {
        is_repository_denied(repository, &self.repository_denylist)
    }

    /// Check the configured base URL. Warnings never disable reporting.
    pub fn check_base_url(&self) -> UrlCheck {
        check_base_url(self.base_url.as_deref().unwrap_or_default())
    }
}

/// Blank URLs and URLs without `https://` draw a warning.
pub fn check_base_url(value: &str) -> UrlCheck {
    if value.trim().is_empty() {
        return UrlCheck::Warning("DX API base URL is empty.".to_string());
    }
    if !value.starts_with("https://") {
        return UrlCheck::Warning("DX base URL should start with https://".to_string());
    }
    UrlCheck::Ok
}
