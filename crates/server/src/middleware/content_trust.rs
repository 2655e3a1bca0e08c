//! Pull policy: only signed images may be pulled from projects that require it.

use axum::{
    body::Body,
    extract::State,
    http::{header, Method, Request},
    middleware::Next,
    response::Response,
};
use controller::{accessory, artifact::ArtifactController, project};
use db::{artifact, DatabaseConnection};
use tracing::debug;

use super::{
    request_info::{ArtifactInfo, Endpoint},
    security::SecurityContext,
};
use crate::{error::RegistryError, state::AppState};

const COSIGN_USER_AGENT: &str = "cosign/";

/// Cosign verifies signatures itself, it has to be able to pull unsigned manifests.
fn is_cosign_client<B>(req: &Request<B>) -> bool {
    req.headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map_or(false, |agent| {
            agent.to_ascii_lowercase().starts_with(COSIGN_USER_AGENT)
        })
}

/// Check if the pull request bypasses project pull policies.
pub(super) fn is_policy_exempt<B>(req: &Request<B>) -> bool {
    SecurityContext::get(req).is_scanner() || is_cosign_client(req)
}

/// Resolve the pulled artifact. Unknown artifacts are left to the backend to report.
pub(super) async fn pulled_artifact(
    artifacts: &ArtifactController,
    db: &DatabaseConnection,
    info: &ArtifactInfo,
) -> Result<Option<artifact::Model>, RegistryError> {
    let Some(reference) = info.reference.as_deref() else {
        return Ok(None);
    };

    match artifacts.get_by_reference(db, &info.repository, reference).await {
        Ok(artifact) => Ok(Some(artifact)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err.into()),
    }
}

pub(crate) async fn content_trust(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, RegistryError> {
    let Some(info) = ArtifactInfo::matching(&req, Endpoint::Manifest, &Method::GET).cloned()
    else {
        return Ok(next.run(req).await);
    };

    if is_policy_exempt(&req) {
        debug!("content trust check skipped");
        return Ok(next.run(req).await);
    }

    let project = project::get(&*state.db, &info.project_name).await?;

    let cosign = project.content_trust_cosign_enabled();
    let notary = project.content_trust_enabled() && state.config.content_trust.notary;

    if !cosign && !notary {
        return Ok(next.run(req).await);
    }

    let Some(artifact) = pulled_artifact(&state.artifacts, &state.db, &info).await? else {
        return Ok(next.run(req).await);
    };

    if cosign {
        let signatures = accessory::manager::count(
            &*state.db,
            &accessory::Query {
                subject_artifact_id: Some(artifact.id),
                accessory_type: Some(accessory::TYPE_COSIGN_SIGNATURE.to_string()),
                ..Default::default()
            },
        )
        .await?;

        if signatures == 0 {
            return Err(RegistryError::policy_violation(
                "the image is not signed by cosign",
            ));
        }
    }

    if notary {
        let signed = state
            .signatures
            .is_signed(&info.repository, info.tag.as_deref(), &artifact.digest)
            .await
            .map_err(|err| {
                RegistryError::unknown(format!("unable to check signatures: {err}"))
            })?;

        if !signed {
            return Err(RegistryError::policy_violation(
                "the image is not signed in Notary",
            ));
        }
    }

    Ok(next.run(req).await)
}
