use axum::{
    body::Body,
    extract::State,
    http::{header, Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use controller::project;
use db::blob;
use tracing::info;

use super::{blob_in_gc, find};
use crate::{
    error::RegistryError,
    middleware::{
        request_info::{ArtifactInfo, Endpoint},
        transaction::Transaction,
    },
    state::AppState,
};

pub(crate) const DOCKER_CONTENT_DIGEST: &str = "docker-content-digest";

/// Record the finished blob upload and associate the blob with the project.
pub(crate) async fn put_blob_upload(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, RegistryError> {
    let Some(info) = ArtifactInfo::matching(&req, Endpoint::BlobUpload, &Method::PUT).cloned()
    else {
        return Ok(next.run(req).await);
    };

    let txn = Transaction::get(&req)?;

    if let Some(digest) = &info.digest {
        if let Some(blob) = find(&state.blobs, &txn, digest).await? {
            if blob.is_deleting() {
                return Err(blob_in_gc(digest));
            }
        }
    }

    let content_length = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|length| *length > 0);

    let response = next.run(req).await;

    if response.status() != StatusCode::CREATED {
        return Ok(response);
    }

    let digest = response
        .headers()
        .get(DOCKER_CONTENT_DIGEST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| RegistryError::bad_request("blob upload response has no digest"))?;

    let size = match (content_length, &info.session_id) {
        (Some(length), _) => length,
        (None, Some(session_id)) => state.blobs.get_accepted_blob_size(session_id).await?,
        (None, None) => 0,
    };

    let existing = find(&state.blobs, &txn, &digest).await?;

    if existing.as_ref().map_or(false, blob::Model::is_deleting) {
        return Err(blob_in_gc(&digest));
    }

    let project = project::get(&*txn, &info.project_name).await?;

    let id = state
        .blobs
        .ensure(&*txn, &digest, blob::DEFAULT_CONTENT_TYPE, size)
        .await?;
    state
        .blobs
        .associate_with_project_by_id(&*txn, id, project.id)
        .await?;

    if let Some(blob) = existing.filter(|blob| blob.status != blob::Status::None) {
        state.blobs.touch(&*txn, &blob).await?;
    }

    info!(%digest, size, project = %project.name, "blob upload finished");

    Ok(response)
}
