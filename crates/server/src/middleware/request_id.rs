use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{info_span, Instrument};
use uuid::Uuid;

pub(crate) const X_REQUEST_ID: &str = "x-request-id";

/// Keep the inbound request identifier or generate a new one,
/// and return it with the response.
pub(crate) async fn request_id(mut req: Request<Body>, next: Next<Body>) -> Response {
    let inbound = req
        .headers()
        .get(X_REQUEST_ID)
        .filter(|id| !id.is_empty())
        .cloned();

    let id = match inbound {
        Some(id) => id,
        None => {
            let generated = HeaderValue::from_str(&Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
            req.headers_mut().insert(X_REQUEST_ID, generated.clone());
            generated
        }
    };

    let span = info_span!(
        "request",
        id = id.to_str().unwrap_or_default(),
        method = %req.method(),
        path = req.uri().path(),
    );

    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(X_REQUEST_ID, id);

    response
}
