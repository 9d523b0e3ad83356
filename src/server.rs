//! HTTP/1 accept loops for the node-local sockets and the metrics port.
//!
//! Each accepted connection is served on its own task. Handlers share no
//! mutable state, so nothing here locks.

use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

/// Routes a fully-read request to a response.
#[async_trait]
pub trait RouteHandler: Send + Sync + 'static {
    async fn handle(&self, method: &Method, path: &str, body: Bytes) -> Response<Full<Bytes>>;
}

/// Content type of every reply built by [`text_response`].
pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// Plain-text response with the given status. Callers that send another
/// format replace the `Content-Type` header.
pub fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF8));
    response
}

/// Strip a `unix://` scheme from an endpoint. Other schemes are rejected.
pub fn unix_socket_path(endpoint: &str) -> Result<&str> {
    if let Some(path) = endpoint.strip_prefix("unix://") {
        return Ok(path);
    }
    if endpoint.contains("://") {
        return Err(Error::Config(format!(
            "unsupported endpoint scheme: {}",
            endpoint
        )));
    }
    Ok(endpoint)
}

/// Remove any stale socket file at `path`, then bind a fresh listener.
pub async fn bind_unix_socket(path: &Path) -> Result<UnixListener> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed stale socket"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(Error::Io(e)),
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let listener = UnixListener::bind(path)?;
    info!(path = %path.display(), "Listening on unix socket");
    Ok(listener)
}

/// Serve `handler` on a Unix listener until `shutdown` is cancelled.
pub async fn serve_unix<H: RouteHandler>(
    listener: UnixListener,
    handler: Arc<H>,
    shutdown: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                spawn_connection(stream, handler.clone());
            }
        }
    }
}

/// Serve `handler` on a TCP listener until `shutdown` is cancelled.
pub async fn serve_tcp<H: RouteHandler>(
    listener: TcpListener,
    handler: Arc<H>,
    shutdown: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                spawn_connection(stream, handler.clone());
            }
        }
    }
}

fn spawn_connection<S, H>(stream: S, handler: Arc<H>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: RouteHandler,
{
    let io = TokioIo::new(stream);

    tokio::spawn(async move {
        let service = service_fn(move |req: Request<hyper::body::Incoming>| {
            let handler = handler.clone();
            async move {
                let (parts, body) = req.into_parts();
                let body = match body.collect().await {
                    Ok(collected) => collected.to_bytes(),
                    Err(e) => {
                        warn!(error = %e, "Failed to read request body");
                        Bytes::new()
                    }
                };
                let response = handler.handle(&parts.method, parts.uri.path(), body).await;
                Ok::<_, Infallible>(response)
            }
        });

        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
            error!("Connection error: {}", e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_socket_path() {
        assert_eq!(unix_socket_path("unix:///run/csi.sock").unwrap(), "/run/csi.sock");
        assert_eq!(unix_socket_path("/run/csi.sock").unwrap(), "/run/csi.sock");
        assert!(matches!(
            unix_socket_path("tcp://127.0.0.1:10000"),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_bind_replaces_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("query.sock");

        let first = bind_unix_socket(&path).await.unwrap();
        drop(first);
        assert!(path.exists());

        let _second = bind_unix_socket(&path).await.unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_text_response() {
        let resp = text_response(StatusCode::NOT_FOUND, "404 page not found\n");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers()[CONTENT_TYPE], TEXT_PLAIN_UTF8);
    }
}
