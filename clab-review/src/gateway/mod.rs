//! Backend Gateway
//!
//! Typed client for the external clustering service. Each operation is a
//! single request/response pair; all are network-fallible. Sentinel values are
//! decoded here so nothing past this boundary interprets a raw `-1`.

mod http;

pub use http::HttpGateway;

use async_trait::async_trait;
use clab_common::api::{ClusterId, Exemplar, FinalLabels};
use thiserror::Error;

/// Gateway errors
///
/// A malformed payload is treated like a transport failure by the session:
/// the triggering action can simply be retried.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Backend returned a non-success status
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Response body was not the expected JSON shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Response parsed but carried an impossible value
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Operations exposed by the clustering backend
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    /// Upload the dataset; returns the reference series row index
    async fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<usize, GatewayError>;

    /// Least similar member of `cluster`, or `Exhausted` when no cluster
    /// exists at or after this id
    async fn fetch_farthest(&self, cluster: ClusterId) -> Result<Exemplar, GatewayError>;

    /// Most similar member of `cluster`, or `Exhausted` when the cluster has
    /// no counter-example left
    async fn fetch_closest(&self, cluster: ClusterId) -> Result<Exemplar, GatewayError>;

    /// Ask the backend to split `cluster`; effect observed via later fetches
    async fn request_subcluster(&self, cluster: ClusterId) -> Result<(), GatewayError>;

    /// Record reviewer agreement for `cluster`
    async fn label_true(&self, cluster: ClusterId) -> Result<(), GatewayError>;

    /// Record that `cluster` was accepted after the closest check
    async fn label_false(&self, cluster: ClusterId) -> Result<(), GatewayError>;

    /// Authoritative per-row cluster assignment and label names
    async fn fetch_final_labels(&self) -> Result<FinalLabels, GatewayError>;
}
