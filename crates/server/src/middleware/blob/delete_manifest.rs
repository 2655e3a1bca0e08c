use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::info;

use crate::{
    error::RegistryError,
    middleware::{
        request_info::{ArtifactInfo, Endpoint},
        transaction::Transaction,
    },
    state::AppState,
};

/// Delete the artifact, or only the tag when the manifest was deleted by tag.
pub(crate) async fn delete_manifest(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, RegistryError> {
    let Some(info) = ArtifactInfo::matching(&req, Endpoint::Manifest, &Method::DELETE).cloned()
    else {
        return Ok(next.run(req).await);
    };

    let txn = Transaction::get(&req)?;
    let response = next.run(req).await;

    if response.status() != StatusCode::ACCEPTED {
        return Ok(response);
    }

    if let Some(tag) = info.tag.as_deref() {
        match state.artifacts.delete_tag(&*txn, &info.repository, tag).await {
            Err(err) if !err.is_not_found() => return Err(err.into()),
            _ => return Ok(response),
        }
    }

    let Some(digest) = info.digest.as_deref() else {
        return Ok(response);
    };

    match state
        .artifacts
        .get_by_digest(&*txn, None, &info.repository, digest)
        .await
    {
        Ok(artifact) => {
            state.artifacts.delete(&*txn, artifact.id).await?;
            info!(repository = %info.repository, %digest, "artifact deleted");
        }
        Err(err) if err.is_not_found() => {
            info!(repository = %info.repository, %digest, "no artifact to delete");
        }
        Err(err) => return Err(err.into()),
    }

    Ok(response)
}
