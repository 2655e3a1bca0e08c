use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use controller::accessory::{AccessoryData, TYPE_COSIGN_SIGNATURE};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use super::Push;
use crate::{error::RegistryError, state::AppState};

/// Tag of a cosign signature, derived from the signed manifest digest.
static SIGNATURE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^sha256-(?P<digest>[a-f0-9]{64})\.sig$").expect("invalid regex string")
});

pub(crate) const SIMPLE_SIGNING_LAYER: &str = "application/vnd.dev.cosign.simplesigning.v1+json";

/// Digest of the signed manifest, if the tag names a cosign signature.
fn signed_digest(tag: &str) -> Option<String> {
    SIGNATURE_TAG
        .captures(tag)
        .map(|captures| format!("sha256:{}", &captures["digest"]))
}

/// Link pushed cosign signatures to the signed artifacts.
pub(crate) async fn cosign(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, RegistryError> {
    let Some(push) = Push::from_request(&req)? else {
        return Ok(next.run(req).await);
    };

    let Some(subject_digest) = push.info.tag.as_deref().and_then(signed_digest) else {
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
        .any(|layer| layer.media_type == SIMPLE_SIGNING_LAYER)
    {
        return Ok(response);
    }

    let Some(subject) = push.artifact(&state, &subject_digest).await? else {
        info!(digest = %subject_digest, "signed artifact is not stored, skipping signature");
        return Ok(response);
    };

    let Some(signature) = push.artifact(&state, manifest.digest()).await? else {
        return Ok(response);
    };

    push.create_accessory(AccessoryData {
        artifact_id: signature.id,
        subject_artifact_id: Some(subject.id),
        subject_artifact_digest: subject.digest,
        subject_artifact_repo: push.info.repository.clone(),
        accessory_type: TYPE_COSIGN_SIGNATURE.to_string(),
        size: manifest.descriptor().size,
        digest: signature.digest,
        ..Default::default()
    })
    .await?;

    Ok(response)
}
