//! Prometheus metrics and the metrics/health HTTP endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Method, Response, StatusCode};
use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{Error, Result};
use crate::server::{serve_tcp, text_response, RouteHandler};

static QUERY_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "memvol_query_requests_total",
        "Query socket requests by route and outcome",
        &["route", "outcome"]
    )
    .expect("query request counter registers once")
});

static VOLUME_OPERATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "memvol_volume_operations_total",
        "Volume lifecycle operations by result",
        &["operation", "result"]
    )
    .expect("volume operation counter registers once")
});

static RPC_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "memvol_csi_requests_total",
        "CSI requests by method and result",
        &["method", "result"]
    )
    .expect("csi request counter registers once")
});

fn result_label(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "error"
    }
}

/// Count a query socket request.
pub fn record_query(route: &str, outcome: &str) {
    QUERY_REQUESTS.with_label_values(&[route, outcome]).inc();
}

/// Count a lifecycle operation (`publish`, `unpublish`, `expand`).
pub fn record_volume_operation(operation: &str, ok: bool) {
    VOLUME_OPERATIONS
        .with_label_values(&[operation, result_label(ok)])
        .inc();
}

/// Count a CSI request.
pub fn record_rpc(method: &str, ok: bool) {
    RPC_REQUESTS
        .with_label_values(&[method, result_label(ok)])
        .inc();
}

/// Serves `/metrics`, `/healthz`, `/livez` and `/readyz`.
#[derive(Debug, Default)]
pub struct MetricsHandler;

#[async_trait]
impl RouteHandler for MetricsHandler {
    async fn handle(&self, _method: &Method, path: &str, _body: Bytes) -> Response<Full<Bytes>> {
        match path {
            "/metrics" => {
                let encoder = TextEncoder::new();
                let mut buffer = Vec::new();
                if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
                    return text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
                }
                let mut response = text_response(StatusCode::OK, buffer);
                if let Ok(value) = HeaderValue::from_str(encoder.format_type()) {
                    response.headers_mut().insert(CONTENT_TYPE, value);
                }
                response
            }
            "/healthz" | "/livez" | "/readyz" => text_response(StatusCode::OK, "ok"),
            _ => text_response(StatusCode::NOT_FOUND, "not found"),
        }
    }
}

/// Run the metrics server on `addr` until `shutdown` is cancelled.
pub async fn run_metrics_server(addr: &str, shutdown: CancellationToken) -> Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Config(format!("Invalid metrics server address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind metrics server: {}", e)))?;

    info!("Metrics server listening on {}", addr);
    serve_tcp(listener, Arc::new(MetricsHandler), shutdown).await
}
