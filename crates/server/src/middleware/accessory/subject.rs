use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use controller::{
    accessory::{manager, AccessoryData, TYPE_COSIGN_SIGNATURE, TYPE_HARBOR_SBOM, TYPE_SUBJECT},
    manifest::Manifest,
};
use tracing::{debug, info};

use super::Push;
use crate::{error::RegistryError, state::AppState};

pub(crate) const OCI_SUBJECT: &str = "oci-subject";

const COSIGN_SIGNATURE_CONFIG: &str = "application/vnd.dev.cosign.artifact.sig.v1+json";
const HARBOR_SBOM_CONFIG: &str = "application/vnd.goharbor.harbor.sbom.v1";

/// Accessory type of a manifest referring to a subject.
fn accessory_type(manifest: &Manifest) -> &'static str {
    match manifest.artifact_media_type() {
        COSIGN_SIGNATURE_CONFIG => TYPE_COSIGN_SIGNATURE,
        HARBOR_SBOM_CONFIG => TYPE_HARBOR_SBOM,
        _ => TYPE_SUBJECT,
    }
}

/// Record manifests referring to a subject, and link accessories pushed
/// before their subject.
pub(crate) async fn subject(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, RegistryError> {
    let Some(push) = Push::from_request(&req)? else {
        return Ok(next.run(req).await);
    };

    let mut response = next.run(req).await;

    if response.status() != StatusCode::CREATED {
        return Ok(response);
    }

    let manifest = push.manifest()?;

    let Some(artifact) = push.artifact(&state, manifest.digest()).await? else {
        return Ok(response);
    };

    let linked = manager::update_subject_artifact_id(
        &*push.txn,
        &artifact.digest,
        &push.info.repository,
        artifact.id,
    )
    .await?;

    if linked > 0 {
        debug!(digest = %artifact.digest, linked, "accessories linked to subject");
    }

    let Some(descriptor) = manifest.subject() else {
        return Ok(response);
    };

    let subject = push.artifact(&state, &descriptor.digest).await?;

    if subject.is_none() {
        info!(digest = %descriptor.digest, "subject is not stored yet, recording the digest");
    }

    push.create_accessory(AccessoryData {
        artifact_id: artifact.id,
        subject_artifact_id: subject.map(|subject| subject.id),
        subject_artifact_digest: descriptor.digest.clone(),
        subject_artifact_repo: push.info.repository.clone(),
        accessory_type: accessory_type(&manifest).to_string(),
        size: manifest.descriptor().size,
        digest: artifact.digest.clone(),
        ..Default::default()
    })
    .await?;

    if let Ok(value) = HeaderValue::from_str(&descriptor.digest) {
        response.headers_mut().insert(OCI_SUBJECT, value);
    }

    Ok(response)
}
