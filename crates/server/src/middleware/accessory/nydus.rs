use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use controller::accessory::{AccessoryData, TYPE_NYDUS_ACCELERATOR};
use tracing::info;

use super::Push;
use crate::{error::RegistryError, state::AppState};

pub(crate) const NYDUS_BOOTSTRAP: &str = "containerd.io/snapshot/nydus-bootstrap";
pub(crate) const ACCELERATION_SOURCE: &str = "io.goharbor.artifact.v1alpha1.acceleration.source.digest";

/// Link pushed nydus images to the images they accelerate.
pub(crate) async fn nydus(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, RegistryError> {
    let Some(push) = Push::from_request(&req)? else {
        return Ok(next.run(req).await);
    };

    let response = next.run(req).await;

    if response.status() != StatusCode::CREATED {
        return Ok(response);
    }

    let manifest = push.manifest()?;

    if !manifest
        .layers()
        .iter()
        .any(|layer| layer.annotations.contains_key(NYDUS_BOOTSTRAP))
    {
        return Ok(response);
    }

    let Some(source_digest) = manifest.annotations().get(ACCELERATION_SOURCE) else {
        return Ok(response);
    };

    let Some(source) = push.artifact(&state, source_digest).await? else {
        info!(digest = %source_digest, "accelerated artifact is not stored, skipping");
        return Ok(response);
    };

    let Some(accelerator) = push.artifact(&state, manifest.digest()).await? else {
        return Ok(response);
    };

    push.create_accessory(AccessoryData {
        artifact_id: accelerator.id,
        subject_artifact_id: Some(source.id),
        subject_artifact_digest: source.digest,
        subject_artifact_repo: push.info.repository.clone(),
        accessory_type: TYPE_NYDUS_ACCELERATOR.to_string(),
        size: manifest.descriptor().size,
        digest: accelerator.digest,
        ..Default::default()
    })
    .await?;

    Ok(response)
}
