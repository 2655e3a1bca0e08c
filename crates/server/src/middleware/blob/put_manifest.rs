use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use controller::{artifact::NewArtifact, manifest::Manifest, project};
use tracing::info;

use crate::{
    error::RegistryError,
    middleware::{
        request_info::{ArtifactInfo, Endpoint, ManifestPayload},
        transaction::Transaction,
    },
    state::AppState,
};

/// Record the pushed manifest: its blobs, their project and artifact associations,
/// and the artifact with its tag.
pub(crate) async fn put_manifest(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, RegistryError> {
    let Some(info) = ArtifactInfo::matching(&req, Endpoint::Manifest, &Method::PUT).cloned()
    else {
        return Ok(next.run(req).await);
    };

    let payload = req
        .extensions()
        .get::<ManifestPayload>()
        .cloned()
        .ok_or_else(|| RegistryError::unknown("manifest payload is missing"))?;
    let txn = Transaction::get(&req)?;

    let response = next.run(req).await;

    if response.status() != StatusCode::CREATED {
        return Ok(response);
    }

    let manifest = Manifest::parse(payload.media_type.as_deref(), &payload.bytes)?;
    let project = project::get(&*txn, &info.project_name).await?;

    let references = manifest.references();
    state.blobs.sync(&*txn, &references).await?;

    // Garbage collection may have dropped associations of blobs still in use
    for reference in &references {
        state
            .blobs
            .associate_with_project_by_digest(&*txn, &reference.digest, project.id)
            .await?;
    }

    let descriptor = manifest.descriptor();
    let id = state
        .blobs
        .ensure(&*txn, &descriptor.digest, &descriptor.media_type, descriptor.size)
        .await?;
    state
        .blobs
        .associate_with_project_by_id(&*txn, id, project.id)
        .await?;

    let digests: Vec<String> = references
        .iter()
        .map(|reference| reference.digest.clone())
        .collect();
    state
        .blobs
        .associate_with_artifact(&*txn, &digests, &descriptor.digest)
        .await?;

    state
        .artifacts
        .ensure(
            &*txn,
            &NewArtifact {
                project_id: project.id,
                repository_name: info.repository.clone(),
                digest: descriptor.digest.clone(),
                media_type: manifest.artifact_media_type().to_string(),
                manifest_media_type: manifest.media_type().to_string(),
                artifact_type: manifest.artifact_type().to_string(),
                size: descriptor.size,
            },
            info.tag.as_deref(),
        )
        .await?;

    info!(
        repository = %info.repository,
        digest = %descriptor.digest,
        references = references.len(),
        "manifest pushed"
    );

    Ok(response)
}
