use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use controller::project;
use tracing::info;

use crate::{
    error::RegistryError,
    middleware::{
        request_info::{ArtifactInfo, Endpoint},
        transaction::Transaction,
    },
    state::AppState,
};

/// Associate a blob mounted from another repository with the current project.
pub(crate) async fn post_blob_upload(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, RegistryError> {
    let Some(info) = ArtifactInfo::matching(&req, Endpoint::BlobUpload, &Method::POST)
        .filter(|info| info.mount_digest.is_some())
        .cloned()
    else {
        return Ok(next.run(req).await);
    };

    let txn = Transaction::get(&req)?;
    let response = next.run(req).await;

    if response.status() != StatusCode::CREATED {
        return Ok(response);
    }

    let Some(digest) = info.mount_digest.as_deref() else {
        return Ok(response);
    };

    let project = project::get(&*txn, &info.project_name).await?;
    state
        .blobs
        .associate_with_project_by_digest(&*txn, digest, project.id)
        .await?;

    info!(
        %digest,
        from = info.mount_repository.as_deref().unwrap_or_default(),
        project = %project.name,
        "mounted blob associated with project"
    );

    Ok(response)
}
