use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use controller::project;
use tracing::info;

use super::{request_info::ArtifactInfo, security::SecurityContext};
use crate::{error::RegistryError, state::AppState};

fn is_pull(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn deny(context: &SecurityContext, action: &str, project_name: &str) -> RegistryError {
    info!(principal = context.name(), action, project = project_name, "access denied");

    if context.is_authenticated() {
        RegistryError::forbidden(format!(
            "{} is not allowed to {action} {project_name}",
            context.name()
        ))
    } else {
        RegistryError::unauthorized("authentication required")
    }
}

/// Check the principal access to the project addressed by the request.
///
/// Cross-repository mounts also require pull access to the source project.
pub(crate) async fn authorization(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, RegistryError> {
    let Some(info) = ArtifactInfo::get(&req).cloned() else {
        return Ok(next.run(req).await);
    };

    let context = SecurityContext::get(&req);
    let project = project::get(&*state.db, &info.project_name).await?;

    if is_pull(req.method()) {
        if !context.can_pull(&project) {
            return Err(deny(&context, "pull from", &project.name));
        }
    } else if !context.can_push(&project) {
        return Err(deny(&context, "push to", &project.name));
    }

    if let Some(source) = &info.mount_project_name {
        let source = project::get(&*state.db, source).await?;

        if !context.can_pull(&source) {
            return Err(deny(&context, "pull from", &source.name));
        }
    }

    Ok(next.run(req).await)
}
