use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use super::{blob_in_gc, find};
use crate::{
    error::RegistryError,
    middleware::{
        request_info::{ArtifactInfo, Endpoint},
        transaction::Transaction,
    },
    state::AppState,
};

fn blob_descriptor_key(digest: &str) -> String {
    format!("blobs::{digest}")
}

/// Hide blobs that are being collected and drop zero-sized cached descriptors.
pub(crate) async fn get_blob(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, RegistryError> {
    let Some(digest) = ArtifactInfo::matching(&req, Endpoint::Blob, &Method::GET)
        .and_then(|info| info.digest.clone())
    else {
        return Ok(next.run(req).await);
    };

    let txn = Transaction::get(&req)?;

    if let Some(blob) = find(&state.blobs, &txn, &digest).await? {
        if blob.is_deleting() {
            return Err(blob_in_gc(&digest));
        }
    }

    let key = blob_descriptor_key(&digest);
    if state.cache.hget(&key, "size").await?.as_deref() == Some("0") {
        state.cache.del(&key).await?;
        debug!(%digest, "zero-sized blob descriptor purged");
    }

    Ok(next.run(req).await)
}
