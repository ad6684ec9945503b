//! HTTP transport boundary.
//!
//! Buffers each axum request into a [`ServiceRequest`], runs the dispatcher
//! on the blocking pool and writes the outcome back. When the dispatcher
//! hands a failure back (debug mode only) this adapter renders it as a
//! diagnostic page.
use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    body::Body as AxumBody,
    extract::{ConnectInfo, Request},
    http::{StatusCode, header},
    middleware,
    response::Response,
    routing::any,
};
use http_body_util::LengthLimitError;
use tower_http::compression::CompressionLayer;

use crate::{
    adapters::middleware::{request_id_middleware, request_timing_middleware},
    core::{Dispatcher, ServiceRequest, ServiceResponse, dispatcher::panic_message},
};

/// Largest request body that is buffered before dispatch.
pub const MAX_REQUEST_BODY_BYTES: usize = 16 * 1024 * 1024;

/// HTTP handler wrapping the dispatcher
#[derive(Clone)]
pub struct HttpHandler {
    dispatcher: Arc<Dispatcher>,
}

impl HttpHandler {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Handle one request end to end. Always produces a response.
    pub async fn handle_request(&self, req: Request) -> Response<AxumBody> {
        let client_addr = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let (parts, body) = req.into_parts();
        let request_line = format!("{} {}", parts.method, parts.uri);

        let body = match axum::body::to_bytes(body, MAX_REQUEST_BODY_BYTES).await {
            Ok(body) => body,
            Err(e) if is_length_limit(&e) => {
                tracing::warn!(
                    "Body of {} exceeds {} bytes",
                    request_line,
                    MAX_REQUEST_BODY_BYTES
                );
                return plain(StatusCode::PAYLOAD_TOO_LARGE, "payload too large".into());
            }
            Err(e) => {
                tracing::warn!("Failed to read body of {}: {}", request_line, e);
                return plain(StatusCode::BAD_REQUEST, "bad request".into());
            }
        };

        let service_request = ServiceRequest::new(parts, body, client_addr);
        let dispatcher = self.dispatcher.clone();
        // The blocking pool does not inherit the request span.
        let span = tracing::Span::current();
        let outcome = tokio::task::spawn_blocking(move || {
            span.in_scope(|| dispatcher.dispatch(&service_request))
        })
        .await;

        match outcome {
            Ok(Ok(response)) => Self::into_axum(response),
            Ok(Err(report)) => {
                tracing::error!(request = %request_line, error = ?report, "service failed in debug mode");
                let mut page = diagnostic_header(&request_line);
                for (i, cause) in report.chain().enumerate() {
                    let label = if i == 0 { "error" } else { "caused by" };
                    page.push_str(&format!("{label}: {cause}\n"));
                }
                plain(StatusCode::INTERNAL_SERVER_ERROR, page)
            }
            Err(join_error) if join_error.is_panic() => {
                let payload = join_error.into_panic();
                let message = panic_message(payload.as_ref());
                tracing::error!(request = %request_line, panic = %message, "service panicked in debug mode");
                let mut page = diagnostic_header(&request_line);
                page.push_str(&format!("panic: {message}\n"));
                plain(StatusCode::INTERNAL_SERVER_ERROR, page)
            }
            Err(join_error) => {
                tracing::error!(request = %request_line, "dispatch task did not complete: {}", join_error);
                Self::into_axum(ServiceResponse::internal_error())
            }
        }
    }

    fn into_axum(response: ServiceResponse) -> Response<AxumBody> {
        match response.into_http() {
            Ok(response) => response.map(AxumBody::from),
            Err(e) => {
                tracing::error!("Service produced an invalid response: {}", e);
                plain(StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
            }
        }
    }
}

fn is_length_limit(err: &axum::Error) -> bool {
    std::error::Error::source(err)
        .is_some_and(|source| source.downcast_ref::<LengthLimitError>().is_some())
}

fn diagnostic_header(request_line: &str) -> String {
    format!("Internal error while handling {request_line} (debug mode)\n\n")
}

fn plain(status: StatusCode, body: String) -> Response<AxumBody> {
    let mut response = Response::new(AxumBody::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain"),
    );
    response
}

/// Build the axum router serving every path through `handler`.
pub fn router(handler: Arc<HttpHandler>) -> Router {
    let make_request_route = |handler: Arc<HttpHandler>| {
        any(move |req: Request| {
            let handler = handler.clone();
            async move { handler.handle_request(req).await }
        })
    };

    Router::new()
        .route("/{*path}", make_request_route(handler.clone()))
        .route("/", make_request_route(handler))
        .layer(middleware::from_fn(request_timing_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CompressionLayer::new())
}

#[cfg(test)]
mod tests {
    use arc_swap::ArcSwap;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::AppConfig,
        core::ServiceRegistry,
        ports::Service,
    };

    #[derive(Debug, thiserror::Error)]
    #[error("cache directory not writable")]
    struct CacheLocked;

    struct Failing {
        names: Vec<String>,
    }

    impl Service for Failing {
        fn names(&self) -> &[String] {
            &self.names
        }

        fn handle(&self, _req: &ServiceRequest) -> eyre::Result<ServiceResponse> {
            Err(eyre::Report::new(CacheLocked).wrap_err("seeding tile 3/4/5 failed"))
        }
    }

    fn create_test_router(debug_mode: bool) -> Router {
        let config = Arc::new(ArcSwap::from_pointee(AppConfig {
            debug_mode,
            ..AppConfig::default()
        }));
        let registry = ServiceRegistry::build([Arc::new(Failing {
            names: vec!["tiles".to_string()],
        }) as Arc<dyn Service>]);
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry), config));
        router(Arc::new(HttpHandler::new(dispatcher)))
    }

    async fn body_text(response: Response<AxumBody>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_production_failure_is_generic() {
        let response = create_test_router(false)
            .oneshot(http::Request::builder().uri("/tiles/3/4/5.png").body(AxumBody::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "internal error");
    }

    #[tokio::test]
    async fn test_debug_failure_renders_diagnostics() {
        let response = create_test_router(true)
            .oneshot(http::Request::builder().uri("/tiles/3/4/5.png").body(AxumBody::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_text(response).await;
        assert!(body.contains("GET /tiles/3/4/5.png"));
        assert!(body.contains("error: seeding tile 3/4/5 failed"));
        assert!(body.contains("caused by: cache directory not writable"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = create_test_router(false)
            .oneshot(http::Request::builder().uri("/wms").body(AxumBody::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        assert!(response.headers().contains_key("X-Request-ID"));
        assert_eq!(body_text(response).await, "not found");
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let body = vec![b'x'; MAX_REQUEST_BODY_BYTES + 1];
        let response = create_test_router(false)
            .oneshot(
                http::Request::builder()
                    .method("POST")
                    .uri("/tiles/seed")
                    .body(AxumBody::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_text(response).await, "payload too large");
    }

    #[tokio::test]
    async fn test_body_at_limit_reaches_service() {
        let body = vec![b'x'; MAX_REQUEST_BODY_BYTES];
        let response = create_test_router(false)
            .oneshot(
                http::Request::builder()
                    .method("POST")
                    .uri("/tiles/seed")
                    .body(AxumBody::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        // The failing service was reached, so the body was accepted.
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
