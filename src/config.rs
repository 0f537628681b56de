//! Configuration Management
//!
//! Handles persistent configuration storage for gkemc.

use crate::gcp::auth;
use crate::gcp::client::gkemulticloud_base_path;
use crate::reconcile::{ReconcilerSettings, RetryConfig};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Backoff for optimistic-concurrency conflicts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictRetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for ConflictRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// User configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Last used project ID
    pub project: Option<String>,
    /// Last used location
    pub location: Option<String>,
    /// API endpoint override
    pub base_path: Option<String>,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub delete_confirm_attempts: u32,
    pub delete_confirm_interval_ms: u64,
    pub conflict_retry: ConflictRetryConfig,
    pub page_size: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: None,
            location: None,
            base_path: None,
            timeout_secs: 3600,
            poll_interval_ms: 2000,
            delete_confirm_attempts: 10,
            delete_confirm_interval_ms: 1000,
            conflict_retry: ConflictRetryConfig::default(),
            page_size: None,
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gkemc").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    fn load_from(path: &std::path::Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get effective project (CLI > config > environment / gcloud default)
    pub fn effective_project(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string)
            .or_else(|| self.project.clone())
            .or_else(auth::get_default_project)
    }

    /// Get effective location (CLI > config > environment / gcloud default)
    pub fn effective_location(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string)
            .or_else(|| self.location.clone())
            .or_else(auth::get_default_location)
    }

    /// Endpoint for `location`, unless overridden
    pub fn base_path(&self, location: &str) -> String {
        self.base_path
            .clone()
            .unwrap_or_else(|| gkemulticloud_base_path(location))
    }

    /// Library-facing timing settings
    pub fn settings(&self) -> ReconcilerSettings {
        let retry = &self.conflict_retry;
        ReconcilerSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            delete_confirm_attempts: self.delete_confirm_attempts,
            delete_confirm_interval: Duration::from_millis(self.delete_confirm_interval_ms),
            conflict_retry: RetryConfig {
                max_attempts: retry.max_attempts,
                initial_delay: Duration::from_millis(retry.initial_delay_ms),
                max_delay: Duration::from_millis(retry.max_delay_ms),
                backoff_multiplier: retry.backoff_multiplier,
            },
            page_size: self.page_size,
        }
    }

    /// Set project and save
    pub fn set_project(&mut self, project: &str) -> Result<()> {
        self.project = Some(project.to_string());
        self.save()
    }

    /// Set location and save
    pub fn set_location(&mut self, location: &str) -> Result<()> {
        self.location = Some(location.to_string());
        self.save()
    }
}
