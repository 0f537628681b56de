//! GCP Client
//!
//! Authenticated transport for GCP APIs, combining credentials and the HTTP
//! client, plus URL helpers for the GKE Multi-Cloud API.

use super::auth::GcpCredentials;
use super::http::GcpHttpClient;
use super::transport::{Method, Response, Transport};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    pub credentials: GcpCredentials,
    pub http: GcpHttpClient,
}

impl GcpClient {
    /// Create a client using the ambient credentials
    pub async fn new() -> Result<Self> {
        let credentials = GcpCredentials::new().await?;
        Self::with_credentials(credentials)
    }

    pub fn with_credentials(credentials: GcpCredentials) -> Result<Self> {
        Ok(Self {
            credentials,
            http: GcpHttpClient::new()?,
        })
    }
}

#[async_trait]
impl Transport for GcpClient {
    async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Response> {
        let token = self.credentials.get_token().await?;
        let response = self.http.send(method, url, Some(&token), body).await?;

        // An expired token surfaces as 401; refresh once and replay
        if response.status == 401 {
            tracing::debug!("Received 401, refreshing token and retrying {} {}", method, url);
            let token = self.credentials.refresh_token().await?;
            return self.http.send(method, url, Some(&token), body).await;
        }
        Ok(response)
    }
}

// =========================================================================
// GKE Multi-Cloud API helpers
// =========================================================================

/// Regional GKE Multi-Cloud endpoint for `location`
pub fn gkemulticloud_base_path(location: &str) -> String {
    format!("https://{}-gkemulticloud.googleapis.com/v1", location)
}

/// Join a base path and a resource path
pub fn resource_url(base_path: &str, path: &str) -> String {
    format!("{}/{}", base_path.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Append query parameters, encoding values
pub fn with_query(url: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            parsed.query_pairs_mut().extend_pairs(params.iter().copied());
            parsed.to_string()
        }
        Err(_) => {
            let query: Vec<String> = params
                .iter()
                .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                .collect();
            let sep = if url.contains('?') { '&' } else { '?' };
            format!("{}{}{}", url, sep, query.join("&"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_path_is_regional() {
        assert_eq!(
            gkemulticloud_base_path("us-west1"),
            "https://us-west1-gkemulticloud.googleapis.com/v1"
        );
    }

    #[test]
    fn test_resource_url_joins_cleanly() {
        assert_eq!(
            resource_url("http://localhost:8080/v1/", "/projects/p/locations/l"),
            "http://localhost:8080/v1/projects/p/locations/l"
        );
    }

    #[test]
    fn test_with_query_encodes_values() {
        let url = with_query(
            "https://example.com/v1/x",
            &[("updateMask", "annotations,control_plane.version")],
        );
        assert_eq!(
            url,
            "https://example.com/v1/x?updateMask=annotations%2Ccontrol_plane.version"
        );
    }

    #[test]
    fn test_with_query_without_params_is_identity() {
        assert_eq!(with_query("https://example.com/v1/x", &[]), "https://example.com/v1/x");
    }
}
