//! REST implementation of [`ClusterBackend`]
//!
//! Endpoints (relative to the configured base URL):
//! - `POST /upload` (multipart, field `file`)
//! - `GET  /getFarthestGraph?graph_id=<id>`
//! - `GET  /getClosestGraph?graph_id=<id>`
//! - `POST /furtherCluster?cluster_no=<id>`
//! - `GET  /labelTrue?graph_id=<id>`
//! - `GET  /labelFalse?graph_id=<id>`
//! - `GET  /getLabelGraphId`

use async_trait::async_trait;
use clab_common::api::{
    ClosestResponse, ClusterId, Exemplar, FarthestResponse, FinalLabels, FinalLabelsResponse,
    UploadResponse,
};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::{ClusterBackend, GatewayError};

const USER_AGENT: &str = concat!("clab-review/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the clustering backend
pub struct HttpGateway {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    /// Create a client for `base_url` with a per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, u32)],
    ) -> Result<T, GatewayError> {
        let url = self.url(path);
        tracing::debug!(url = %url, ?query, "GET");

        let response = self
            .http_client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        read_json(response).await
    }

    /// Send a command whose response body carries nothing we need
    async fn send_ack(&self, request: reqwest::RequestBuilder) -> Result<(), GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        check_status(response).await.map(|_| ())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(GatewayError::Api(status.as_u16(), error_text));
    }
    Ok(response)
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
    check_status(response)
        .await?
        .json::<T>()
        .await
        .map_err(|e| GatewayError::Parse(e.to_string()))
}

fn decode_exemplar(value: i64) -> Result<Exemplar, GatewayError> {
    Exemplar::from_wire(value).map_err(|e| GatewayError::Malformed(e.to_string()))
}

#[async_trait]
impl ClusterBackend for HttpGateway {
    async fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<usize, GatewayError> {
        let part = Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str("text/csv")
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        let form = Form::new().part("file", part);

        let url = self.url("/upload");
        tracing::debug!(url = %url, file = %file_name, bytes = bytes.len(), "Uploading dataset");

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let body: UploadResponse = read_json(response).await?;
        let reference_row = usize::try_from(body.expected_graph).map_err(|_| {
            GatewayError::Malformed(format!("invalid reference row: {}", body.expected_graph))
        })?;

        tracing::info!(reference_row, "Upload accepted");
        Ok(reference_row)
    }

    async fn fetch_farthest(&self, cluster: ClusterId) -> Result<Exemplar, GatewayError> {
        let body: FarthestResponse = self
            .get_json("/getFarthestGraph", &[("graph_id", cluster.0)])
            .await?;
        decode_exemplar(body.farthest_graph)
    }

    async fn fetch_closest(&self, cluster: ClusterId) -> Result<Exemplar, GatewayError> {
        let body: ClosestResponse = self
            .get_json("/getClosestGraph", &[("graph_id", cluster.0)])
            .await?;
        decode_exemplar(body.closest_graph)
    }

    async fn request_subcluster(&self, cluster: ClusterId) -> Result<(), GatewayError> {
        tracing::debug!(cluster_id = %cluster, "POST /furtherCluster");
        self.send_ack(
            self.http_client
                .post(self.url("/furtherCluster"))
                .query(&[("cluster_no", cluster.0)]),
        )
        .await
    }

    async fn label_true(&self, cluster: ClusterId) -> Result<(), GatewayError> {
        tracing::debug!(cluster_id = %cluster, "GET /labelTrue");
        self.send_ack(
            self.http_client
                .get(self.url("/labelTrue"))
                .query(&[("graph_id", cluster.0)]),
        )
        .await
    }

    async fn label_false(&self, cluster: ClusterId) -> Result<(), GatewayError> {
        tracing::debug!(cluster_id = %cluster, "GET /labelFalse");
        self.send_ack(
            self.http_client
                .get(self.url("/labelFalse"))
                .query(&[("graph_id", cluster.0)]),
        )
        .await
    }

    async fn fetch_final_labels(&self) -> Result<FinalLabels, GatewayError> {
        let body: FinalLabelsResponse = self.get_json("/getLabelGraphId", &[]).await?;
        let labels =
            FinalLabels::from_wire(body).map_err(|e| GatewayError::Malformed(e.to_string()))?;

        tracing::info!(
            rows = labels.row_count(),
            clusters = labels.cluster_count(),
            "Final labels received"
        );
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let gateway = HttpGateway::new("http://127.0.0.1:5000/", Duration::from_secs(5)).unwrap();
        assert_eq!(gateway.base_url(), "http://127.0.0.1:5000");
        assert_eq!(gateway.url("/upload"), "http://127.0.0.1:5000/upload");
    }

    #[test]
    fn test_decode_exemplar_maps_errors_to_malformed() {
        assert_eq!(decode_exemplar(-1).unwrap(), Exemplar::Exhausted);
        assert_eq!(decode_exemplar(4).unwrap(), Exemplar::Row(4));
        assert!(matches!(decode_exemplar(-5), Err(GatewayError::Malformed(_))));
    }
}
