//! GCP Authentication
//!
//! Handles authentication using Application Default Credentials (ADC) or a
//! pre-issued access token, and resolves defaults from the gcloud
//! configuration.

use crate::error::{Error, Result};
use gcp_auth::TokenProvider;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Default scopes for GCP API access
pub const DEFAULT_SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform"];

/// Refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if we can't determine expiry (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Environment variable gcloud honours for a pre-issued access token
const ACCESS_TOKEN_ENV: &str = "CLOUDSDK_AUTH_ACCESS_TOKEN";

/// Environment variables checked for the default project, in order
const PROJECT_ENV_VARS: &[&str] = &["CLOUDSDK_CORE_PROJECT", "GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"];

#[derive(Clone)]
enum TokenSource {
    Provider(Arc<dyn TokenProvider>),
    Static(String),
}

/// GCP credentials holder with token caching
#[derive(Clone)]
pub struct GcpCredentials {
    source: TokenSource,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

impl GcpCredentials {
    /// Resolve credentials: an access token from the environment if set,
    /// Application Default Credentials otherwise
    pub async fn new() -> Result<Self> {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.trim().is_empty() {
                tracing::debug!("Using access token from {}", ACCESS_TOKEN_ENV);
                return Ok(Self::from_token(token.trim()));
            }
        }

        let provider = gcp_auth::provider().await.map_err(|e| {
            Error::Auth(format!(
                "{}. Run 'gcloud auth application-default login'",
                e
            ))
        })?;

        Ok(Self {
            source: TokenSource::Provider(provider),
            token_cache: Arc::new(RwLock::new(None)),
        })
    }

    /// Credentials that always present the given bearer token
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            source: TokenSource::Static(token.into()),
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Get an access token for API calls, reusing the cached one while valid
    pub async fn get_token(&self) -> Result<String> {
        let provider = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Provider(provider) => provider,
        };

        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let token = provider
            .token(DEFAULT_SCOPES)
            .await
            .map_err(|e| Error::Auth(format!("failed to get access token: {}", e)))?;
        let token_str = token.as_str().to_string();

        // gcp_auth does not expose a reliable expiry here, use a conservative TTL
        let expires_at = Instant::now() + DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER;
        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token_str.clone(),
                expires_at,
            });
        }

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            (DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(token_str)
    }

    /// Drop the cached token and fetch a fresh one
    pub async fn refresh_token(&self) -> Result<String> {
        {
            let mut cache = self.token_cache.write().await;
            *cache = None;
        }
        self.get_token().await
    }
}

/// Get the gcloud configuration directory
pub fn get_gcloud_config_dir() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CLOUDSDK_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|p| p.join("gcloud"))
}

/// Validate a GCP project ID format.
///
/// Project IDs are 6-30 characters of lowercase letters, digits and hyphens,
/// start with a letter and do not end with a hyphen.
pub fn validate_project_id(project: &str) -> bool {
    if project.len() < 6 || project.len() > 30 {
        return false;
    }
    if !project.starts_with(|c: char| c.is_ascii_lowercase()) || project.ends_with('-') {
        return false;
    }
    project
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Read the default project from the environment or gcloud configuration
pub fn get_default_project() -> Option<String> {
    for var in PROJECT_ENV_VARS {
        if let Ok(project) = std::env::var(var) {
            if validate_project_id(&project) {
                return Some(project);
            }
            tracing::warn!("Invalid project ID format in {}", var);
        }
    }

    read_gcloud_property("core", "project").filter(|p| validate_project_id(p))
}

/// Read the default GKE Multi-Cloud location (`container_aws/location`)
pub fn get_default_location() -> Option<String> {
    if let Ok(location) = std::env::var("CLOUDSDK_CONTAINER_AWS_LOCATION") {
        return Some(location);
    }
    read_gcloud_property("container_aws", "location")
}

/// Look up `key` in `[section]` of the active gcloud configuration,
/// falling back to the legacy `properties` file
fn read_gcloud_property(section: &str, key: &str) -> Option<String> {
    let config_dir = get_gcloud_config_dir()?;

    if let Some(name) = active_config_name(&config_dir) {
        let path = config_dir
            .join("configurations")
            .join(format!("config_{}", name));
        if let Ok(content) = std::fs::read_to_string(&path) {
            if let Some(value) = find_property(&content, section, key) {
                return Some(value);
            }
        }
    }

    let content = std::fs::read_to_string(config_dir.join("properties")).ok()?;
    find_property(&content, section, key)
}

fn active_config_name(config_dir: &std::path::Path) -> Option<String> {
    let name = std::fs::read_to_string(config_dir.join("active_config")).ok()?;
    let name = name.trim();

    // Reject anything that could escape the configurations directory
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        tracing::warn!("Invalid characters in active_config name");
        return None;
    }
    Some(name.to_string())
}

/// Minimal INI lookup for gcloud property files
fn find_property(content: &str, section: &str, key: &str) -> Option<String> {
    let header = format!("[{}]", section);
    let mut in_section = false;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') {
            in_section = line == header;
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            if k.trim() == key {
                let value = v.trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_project_id() {
        assert!(validate_project_id("my-project-123"));
        assert!(!validate_project_id("short"));
        assert!(!validate_project_id("1-starts-with-digit"));
        assert!(!validate_project_id("ends-with-hyphen-"));
        assert!(!validate_project_id("Has-Upper-Case"));
        assert!(!validate_project_id("../../etc/passwd"));
    }

    #[test]
    fn test_find_property_respects_sections() {
        let content = "\
[core]
account = someone@example.com
project = my-project-123

[container_aws]
location = us-west1
";
        assert_eq!(find_property(content, "core", "project"), Some("my-project-123".into()));
        assert_eq!(find_property(content, "container_aws", "location"), Some("us-west1".into()));
        assert_eq!(find_property(content, "core", "location"), None);
    }

    #[test]
    fn test_find_property_skips_comments() {
        let content = "[core]\n# project = commented-out\nproject = real-project\n";
        assert_eq!(find_property(content, "core", "project"), Some("real-project".into()));
    }

    #[tokio::test]
    async fn test_static_token_is_returned_as_is() {
        let creds = GcpCredentials::from_token("test-token");
        assert_eq!(creds.get_token().await.unwrap(), "test-token");
        assert_eq!(creds.refresh_token().await.unwrap(), "test-token");
    }
}
