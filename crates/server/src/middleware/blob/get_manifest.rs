use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::{
    error::RegistryError,
    middleware::{
        request_info::{ArtifactInfo, Endpoint},
        security::SecurityContext,
        transaction::Transaction,
    },
    state::AppState,
};

/// Record the pull time of the artifact, and of the tag when pulled by tag.
///
/// Scanner pulls are not counted.
pub(crate) async fn get_manifest(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, RegistryError> {
    let Some(info) = ArtifactInfo::matching(&req, Endpoint::Manifest, &Method::GET).cloned()
    else {
        return Ok(next.run(req).await);
    };

    let scanner = SecurityContext::get(&req).is_scanner();
    let txn = Transaction::get(&req)?;
    let response = next.run(req).await;

    if response.status() != StatusCode::OK || scanner {
        return Ok(response);
    }

    let Some(reference) = info.reference.as_deref() else {
        return Ok(response);
    };

    let artifact = match state
        .artifacts
        .get_by_reference(&*txn, &info.repository, reference)
        .await
    {
        Ok(artifact) => artifact,
        Err(err) if err.is_not_found() => {
            debug!(repository = %info.repository, %reference, "pulled artifact is not recorded");
            return Ok(response);
        }
        Err(err) => return Err(err.into()),
    };

    state
        .artifacts
        .update_pull_time(&*txn, artifact.id, info.tag.as_deref())
        .await?;

    Ok(response)
}
