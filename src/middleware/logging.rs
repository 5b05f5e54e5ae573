//! Request logging middleware.
//!
//! Logs method, path, status and latency. Query strings and headers are
//! never logged, so tokens in transit stay out of the logs.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn};

pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // Skip health checks to reduce noise
    if path == "/health" {
        return next.run(request).await;
    }

    let start = Instant::now();
    let response = next.run(request).await;
    let latency_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    if status >= 500 {
        warn!(%method, %path, status, latency_ms, "Request failed (5xx)");
    } else if status >= 400 {
        info!(%method, %path, status, latency_ms, "Request rejected (4xx)");
    } else {
        info!(%method, %path, status, latency_ms, "Request completed");
    }

    response
}
