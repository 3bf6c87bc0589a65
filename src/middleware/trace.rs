//! Per-request correlation-id middleware.
//!
//! Assigns an `X-Request-Id` UUID (v4) to every incoming request (or
//! inherits one supplied by the caller), injects it into the [`tracing`]
//! span so every log line emitted while handling the request carries the
//! same `request_id` field, and echoes it back in the response header.

use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::HeaderName;
use axum::http::{HeaderValue, Response};
use futures::future::BoxFuture;
use tower::{Layer, Service};
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

/// HTTP header carrying the per-request correlation id.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// [`tower::Layer`] that wraps each handler with correlation-id injection.
#[derive(Clone, Default)]
pub struct TraceLayer;

impl TraceLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TraceLayer {
    type Service = TraceMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TraceMiddleware { inner }
    }
}

/// The middleware service produced by [`TraceLayer`].
#[derive(Clone)]
pub struct TraceMiddleware<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for TraceMiddleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let request_id: Uuid = req
            .headers()
            .get(&X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Uuid::new_v4);

        req.extensions_mut().insert(request_id);

        let method = req.method().to_string();
        let path = req.uri().path().to_owned();
        let started = Instant::now();

        let span = info_span!(
            "http_request",
            request_id = %request_id,
            method = %method,
            path = %path,
        );

        let mut inner = self.inner.clone();
        Box::pin(
            async move {
                info!(%method, %path, "-> request");

                let mut response = inner.call(req).await?;

                let status = response.status().as_u16();
                let latency_ms = started.elapsed().as_millis() as u64;
                info!(status, latency_ms, "<- response");

                // SAFETY: UUID v4 is hex + hyphens -- always a valid HeaderValue.
                response.headers_mut().insert(
                    X_REQUEST_ID.clone(),
                    HeaderValue::from_str(&request_id.to_string()).unwrap(),
                );

                Ok(response)
            }
            .instrument(span),
        )
    }
}
