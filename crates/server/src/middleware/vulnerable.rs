//! Pull policy: images with known vulnerabilities are blocked in projects that require it.

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use controller::{
    accessory,
    manifest::{DOCKER_MANIFEST_LIST, OCI_INDEX},
    project, vuln,
};
use db::OffsetDateTime;
use tracing::{debug, info};

use super::{
    content_trust::{is_policy_exempt, pulled_artifact},
    request_info::{ArtifactInfo, Endpoint},
};
use crate::{error::RegistryError, state::AppState};

pub(crate) async fn vulnerable(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, RegistryError> {
    let Some(info) = ArtifactInfo::matching(&req, Endpoint::Manifest, &Method::GET).cloned()
    else {
        return Ok(next.run(req).await);
    };

    if is_policy_exempt(&req) {
        debug!("vulnerability check skipped");
        return Ok(next.run(req).await);
    }

    let project = project::get(&*state.db, &info.project_name).await?;

    if !project.prevent_vul() {
        return Ok(next.run(req).await);
    }

    let Some(artifact) = pulled_artifact(&state.artifacts, &state.db, &info).await? else {
        return Ok(next.run(req).await);
    };

    if [OCI_INDEX, DOCKER_MANIFEST_LIST].contains(&artifact.manifest_media_type.as_str()) {
        debug!(digest = %artifact.digest, "image index is not checked for vulnerabilities");
        return Ok(next.run(req).await);
    }

    // Signatures and other accessories are never scanned
    let accessories =
        accessory::manager::count(&*state.db, &accessory::Query::artifact(artifact.id)).await?;

    if accessories > 0 {
        debug!(digest = %artifact.digest, "accessory is not checked for vulnerabilities");
        return Ok(next.run(req).await);
    }

    if !state.vulnerabilities.is_scannable(&artifact).await? {
        debug!(digest = %artifact.digest, "artifact is not scannable");
        return Ok(next.run(req).await);
    }

    let threshold = project.severity();

    let Some(vulnerabilities) = state.vulnerabilities.vulnerabilities(&artifact).await? else {
        return Err(RegistryError::policy_violation(format!(
            "current image without vulnerability scanning cannot be pulled due to configured policy \
             in 'Prevent images with vulnerability severity of \"{threshold}\" or higher from running.'"
        )));
    };

    let now = OffsetDateTime::now_utc().unix_timestamp();
    let allowlist = project::effective_cve_allowlist(&*state.db, &project, now).await?;
    let violations = vuln::violations(&vulnerabilities, threshold, &allowlist);

    if !violations.is_empty() {
        info!(
            digest = %artifact.digest,
            count = violations.len(),
            "pull blocked by vulnerability policy"
        );

        let count = match violations.len() {
            1 => String::from("1 vulnerability"),
            count => format!("{count} vulnerabilities"),
        };

        return Err(RegistryError::policy_violation(format!(
            "current image with {count} cannot be pulled due to configured policy \
             in 'Prevent images with vulnerability severity of \"{threshold}\" or higher from running.'"
        )));
    }

    Ok(next.run(req).await)
}
