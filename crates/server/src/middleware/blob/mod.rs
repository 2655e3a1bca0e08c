//! Blob and manifest lifecycle middlewares.
//!
//! Most of them act after the backend answered: the database is only changed
//! once the backend accepted the request, and database failures replace the
//! backend response with an error.

pub(crate) mod delete_manifest;
pub(crate) mod get;
pub(crate) mod get_manifest;
pub(crate) mod head;
pub(crate) mod patch_upload;
pub(crate) mod post_upload;
pub(crate) mod put_manifest;
pub(crate) mod put_upload;

use controller::blob::{BlobController, Options};
use db::{blob, DatabaseTransaction};

use crate::error::RegistryError;

/// Find the blob row, `None` if there is none.
async fn find(
    blobs: &BlobController,
    db: &DatabaseTransaction,
    digest: &str,
) -> Result<Option<blob::Model>, RegistryError> {
    match blobs.get(db, digest, Options::default()).await {
        Ok(blob) => Ok(Some(blob)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn blob_in_gc(digest: &str) -> RegistryError {
    RegistryError::not_found(format!(
        "the asking blob is in GC, mark it as non existing: {digest}"
    ))
}
