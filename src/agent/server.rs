//! Route table for the volume query socket.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Method, Response, StatusCode};

use crate::agent::query::QueryService;
use crate::server::{text_response, RouteHandler};

pub const VOLUME_INFO_ROUTE: &str = "/api/v1/volumeinfo";
pub const PING_ROUTE: &str = "/api/v1/ping";

/// Default location of the query socket.
pub const DEFAULT_QUERY_SOCKET: &str = "/var/run/node-extender-server/volume-query-server.sock";

/// Serves [`QueryService`] over HTTP. Any method is accepted.
#[derive(Debug, Clone, Default)]
pub struct QueryRouter {
    service: QueryService,
}

impl QueryRouter {
    pub fn new(service: QueryService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl RouteHandler for QueryRouter {
    async fn handle(&self, _method: &Method, path: &str, body: Bytes) -> Response<Full<Bytes>> {
        match path {
            VOLUME_INFO_ROUTE => text_response(StatusCode::OK, self.service.volume_info(&body).await),
            PING_ROUTE => text_response(StatusCode::OK, self.service.ping()),
            _ => text_response(StatusCode::NOT_FOUND, "404 page not found\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use hyper::header::CONTENT_TYPE;

    use crate::server::TEXT_PLAIN_UTF8;

    async fn body_text(resp: Response<Full<Bytes>>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_routes() {
        let router = QueryRouter::default();

        let resp = router.handle(&Method::GET, PING_ROUTE, Bytes::new()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], TEXT_PLAIN_UTF8);
        assert_eq!(body_text(resp).await, "Ping successful");

        let resp = router
            .handle(&Method::POST, VOLUME_INFO_ROUTE, Bytes::from_static(b"{\"identity\":\"\"}"))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], TEXT_PLAIN_UTF8);
        assert_eq!(body_text(resp).await, "null");

        let resp = router.handle(&Method::GET, "/api/v1/podruntime", Bytes::new()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(resp).await, "404 page not found\n");
    }
}
