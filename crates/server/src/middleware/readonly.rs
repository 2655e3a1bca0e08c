use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};

use crate::{error::RegistryError, state::AppState};

/// Reject modifying requests while the registry is read-only.
pub(crate) async fn read_only(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, RegistryError> {
    let safe = matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS);

    if state.config.read_only && !safe {
        return Err(RegistryError::forbidden(
            "the system is in read only mode, any modification is prohibited",
        ));
    }

    Ok(next.run(req).await)
}
