//! Integration tests for the HTTP backend gateway
//!
//! Runs [`HttpGateway`] against a fake backend on a local port and checks
//! routes, query parameters, sentinel decoding and error classification.

mod helpers;

use std::time::Duration;

use clab_common::api::{ClusterId, Exemplar};
use clab_review::gateway::{ClusterBackend, GatewayError, HttpGateway};
use helpers::FakeServer;

fn gateway(server: &FakeServer) -> HttpGateway {
    HttpGateway::new(server.url(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_upload_sends_multipart_file() {
    let server = FakeServer::start().await;
    server.set_reference_row(5);

    let reference = gateway(&server).upload("wells.csv", b"1,2,3\n4,5,6\n").await.unwrap();

    assert_eq!(reference, 5);
    assert!(server.upload_had_file_field());
    assert_eq!(server.requests(), vec!["POST /upload".to_string()]);
}

#[tokio::test]
async fn test_upload_rejects_negative_reference() {
    let server = FakeServer::start().await;
    server.set_reference_row(-1);

    let err = gateway(&server).upload("wells.csv", b"1\n").await.unwrap_err();
    assert!(matches!(err, GatewayError::Malformed(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_exemplar_fetches_decode_sentinel() {
    let server = FakeServer::start().await;
    server.set_farthest(0, 12);
    server.set_closest(0, 3);
    let gateway = gateway(&server);

    assert_eq!(gateway.fetch_farthest(ClusterId(0)).await.unwrap(), Exemplar::Row(12));
    assert_eq!(gateway.fetch_closest(ClusterId(0)).await.unwrap(), Exemplar::Row(3));
    assert_eq!(gateway.fetch_farthest(ClusterId(1)).await.unwrap(), Exemplar::Exhausted);
    assert_eq!(gateway.fetch_closest(ClusterId(1)).await.unwrap(), Exemplar::Exhausted);

    assert_eq!(
        server.requests(),
        vec![
            "GET /getFarthestGraph?graph_id=0",
            "GET /getClosestGraph?graph_id=0",
            "GET /getFarthestGraph?graph_id=1",
            "GET /getClosestGraph?graph_id=1",
        ]
    );
}

#[tokio::test]
async fn test_invalid_exemplar_is_malformed() {
    let server = FakeServer::start().await;
    server.set_farthest(2, -7);

    let err = gateway(&server).fetch_farthest(ClusterId(2)).await.unwrap_err();
    assert!(matches!(err, GatewayError::Malformed(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_commands_hit_expected_routes() {
    let server = FakeServer::start().await;
    let gateway = gateway(&server);

    gateway.label_true(ClusterId(1)).await.unwrap();
    gateway.label_false(ClusterId(2)).await.unwrap();
    gateway.request_subcluster(ClusterId(3)).await.unwrap();

    assert_eq!(
        server.requests(),
        vec![
            "GET /labelTrue?graph_id=1",
            "GET /labelFalse?graph_id=2",
            "POST /furtherCluster?cluster_no=3",
        ]
    );
}

#[tokio::test]
async fn test_final_labels() {
    let server = FakeServer::start().await;
    server.set_final_labels(&["A", "B"], &[0, -1, 1, 0]);

    let labels = gateway(&server).fetch_final_labels().await.unwrap();

    assert_eq!(labels.row_count(), 4);
    assert_eq!(labels.cluster_count(), 2);
    assert_eq!(labels.label_for(0), Some("A"));
    assert_eq!(labels.label_for(1), None);
    assert_eq!(labels.label_for(2), Some("B"));
}

#[tokio::test]
async fn test_final_labels_with_unknown_cluster_is_malformed() {
    let server = FakeServer::start().await;
    server.set_final_labels(&["A"], &[0, 3]);

    let err = gateway(&server).fetch_final_labels().await.unwrap_err();
    assert!(matches!(err, GatewayError::Malformed(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_server_error_status() {
    let server = FakeServer::start().await;
    server.override_path("/labelTrue", 500, "internal failure");

    let err = gateway(&server).label_true(ClusterId(0)).await.unwrap_err();
    match err {
        GatewayError::Api(status, body) => {
            assert_eq!(status, 500);
            assert_eq!(body, "internal failure");
        }
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_json_body_is_parse_error() {
    let server = FakeServer::start().await;
    server.override_path("/getClosestGraph", 200, "<html>oops</html>");

    let err = gateway(&server).fetch_closest(ClusterId(0)).await.unwrap_err();
    assert!(matches!(err, GatewayError::Parse(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    // Grab a free port, then release it so nothing is listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gateway = HttpGateway::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    let err = gateway.fetch_farthest(ClusterId(0)).await.unwrap_err();
    assert!(matches!(err, GatewayError::Network(_)), "got {:?}", err);
}
