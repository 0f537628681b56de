//! GCP API interaction module
//!
//! This module provides the remote side of reconciliation: authentication,
//! the HTTP client, the [`Transport`](transport::Transport) seam the
//! reconciler is written against, and long-running operation polling.
//!
//! # Module Structure
//!
//! - [`auth`] - GCP authentication using Application Default Credentials
//! - [`client`] - Authenticated transport and GKE Multi-Cloud URL helpers
//! - [`http`] - HTTP utilities for REST API calls
//! - [`operation`] - Polling `google.longrunning.Operation` handles
//! - [`transport`] - The request/response primitive and status mapping
//!
//! # Example
//!
//! ```ignore
//! use gkemc::gcp::client::GcpClient;
//! use gkemc::gcp::transport::{call, Method};
//!
//! async fn example() -> gkemc::Result<()> {
//!     let client = GcpClient::new().await?;
//!     let url = "https://us-west1-gkemulticloud.googleapis.com/v1/projects/p/locations/us-west1/awsClusters";
//!     let clusters = call(&client, Method::Get, url, None, "awsClusters").await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod operation;
pub mod transport;
