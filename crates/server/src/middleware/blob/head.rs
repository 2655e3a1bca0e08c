use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use db::blob::Status;
use tracing::debug;

use super::{blob_in_gc, find};
use crate::{
    error::RegistryError,
    middleware::{
        request_info::{ArtifactInfo, Endpoint},
        transaction::{must_commit, Transaction},
    },
    state::AppState,
};

/// Keep the blob out of the garbage collector, or hide it if it is being collected.
pub(crate) async fn head_blob(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, RegistryError> {
    let Some(digest) = ArtifactInfo::matching(&req, Endpoint::Blob, &Method::HEAD)
        .and_then(|info| info.digest.clone())
    else {
        return Ok(next.run(req).await);
    };

    let txn = Transaction::get(&req)?;

    if let Some(blob) = find(&state.blobs, &txn, &digest).await? {
        if blob.is_deleting() {
            return Err(blob_in_gc(&digest));
        }

        state.blobs.touch(&*txn, &blob).await?;
        debug!(%digest, status = ?blob.status, "blob touched");

        // The client may push the blob again after a 404, it must stay out of GC meanwhile
        if blob.status != Status::None {
            must_commit(&req);
        }
    }

    Ok(next.run(req).await)
}
