//! Blob controller.
//!
//! Composes the blob [`manager`] with the shared key-value cache.
//! Every operation accepts either a database pool or an open transaction.

pub mod manager;

use std::{collections::HashMap, sync::Arc, time::Duration};

use db::{blob, ConnectionTrait, TransactionTrait};
use tracing::{info, instrument, warn};

pub use manager::ListParams;

use crate::{cache::Cache, manifest::Descriptor, Error};

/// Blob lookup scoping options.
#[derive(Clone, Debug, Default)]
pub struct Options {
    /// Require the blob to be associated with this project.
    pub project_id: Option<i64>,

    /// Require the blob to be associated with this artifact digest.
    pub artifact_digest: Option<String>,
}

impl Options {
    pub fn project(project_id: i64) -> Self {
        Self {
            project_id: Some(project_id),
            ..Default::default()
        }
    }

    pub fn artifact(artifact_digest: impl Into<String>) -> Self {
        Self {
            artifact_digest: Some(artifact_digest.into()),
            ..Default::default()
        }
    }
}

fn blob_size_key(session_id: &str) -> String {
    format!("upload:{session_id}:size")
}

#[derive(Clone)]
pub struct BlobController {
    cache: Arc<dyn Cache>,
    size_ttl: Duration,
}

impl BlobController {
    pub fn new(cache: Arc<dyn Cache>, size_ttl: Duration) -> Self {
        Self { cache, size_ttl }
    }

    /// Create the blob if it does not exist yet, returning its identifier.
    pub async fn ensure<C: ConnectionTrait>(
        &self,
        db: &C,
        digest: &str,
        content_type: &str,
        size: i64,
    ) -> Result<i64, Error> {
        if digest.is_empty() {
            return Err(Error::bad_request("ensure blob require digest"));
        }

        if let Some(blob) = manager::get(db, digest).await? {
            return Ok(blob.id);
        }

        Ok(manager::create(db, digest, content_type, size).await?)
    }

    pub async fn exist<C: ConnectionTrait>(
        &self,
        db: &C,
        digest: &str,
        options: Options,
    ) -> Result<bool, Error> {
        if digest.is_empty() {
            return Err(Error::bad_request("exist blob require digest"));
        }

        match self.get(db, digest, options).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn get<C: ConnectionTrait>(
        &self,
        db: &C,
        digest: &str,
        options: Options,
    ) -> Result<blob::Model, Error> {
        if digest.is_empty() {
            return Err(Error::bad_request("require digest"));
        }

        let params = ListParams {
            digests: Some(vec![digest.to_string()]),
            artifact_digest: options.artifact_digest,
            project_id: options.project_id,
        };

        manager::list(db, &params)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("blob {digest} not found")))
    }

    pub async fn list<C: ConnectionTrait>(
        &self,
        db: &C,
        params: &ListParams,
    ) -> Result<Vec<blob::Model>, Error> {
        Ok(manager::list(db, params).await?)
    }

    /// Associate blobs with a manifest.
    ///
    /// The manifest digest is associated with itself as well. If that association
    /// already exists, the manifest was pushed before and nothing is done.
    #[instrument(skip_all, fields(%artifact_digest))]
    pub async fn associate_with_artifact<C: ConnectionTrait>(
        &self,
        db: &C,
        blob_digests: &[String],
        artifact_digest: &str,
    ) -> Result<(), Error> {
        if self
            .exist(db, artifact_digest, Options::artifact(artifact_digest))
            .await?
        {
            info!("artifact already exists, skip to associate blobs with the artifact");
            return Ok(());
        }

        for blob_digest in blob_digests
            .iter()
            .map(String::as_str)
            .chain([artifact_digest])
        {
            manager::create_artifact_blob(db, artifact_digest, blob_digest).await?;
        }

        Ok(())
    }

    pub async fn associate_with_project_by_id<C: ConnectionTrait>(
        &self,
        db: &C,
        blob_id: i64,
        project_id: i64,
    ) -> Result<(), Error> {
        manager::create_project_blob(db, project_id, blob_id).await?;

        Ok(())
    }

    pub async fn associate_with_project_by_digest<C: ConnectionTrait>(
        &self,
        db: &C,
        blob_digest: &str,
        project_id: i64,
    ) -> Result<(), Error> {
        let blob = self.get(db, blob_digest, Options::default()).await?;

        self.associate_with_project_by_id(db, blob.id, project_id)
            .await
    }

    /// Create blobs for the references that do not exist yet, and update
    /// content types of those that exist.
    ///
    /// Updates are applied in a single (nested) transaction, creations are idempotent.
    #[instrument(skip_all)]
    pub async fn sync<C>(&self, db: &C, references: &[Descriptor]) -> Result<(), Error>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        if references.is_empty() {
            return Ok(());
        }

        if let Some(reference) = references
            .iter()
            .find(|reference| reference.digest.is_empty() || reference.size < 0)
        {
            return Err(Error::bad_request(format!(
                "invalid blob reference {:?} of size {}",
                reference.digest, reference.size
            )));
        }

        let params = ListParams {
            digests: Some(references.iter().map(|r| r.digest.clone()).collect()),
            ..Default::default()
        };

        let existing: HashMap<String, blob::Model> = manager::list(db, &params)
            .await?
            .into_iter()
            .map(|blob| (blob.digest.clone(), blob))
            .collect();

        let mut updating = Vec::new();
        let mut missing = Vec::new();

        for reference in references {
            match existing.get(&reference.digest) {
                Some(blob) if blob.content_type != reference.media_type => {
                    updating.push(blob::Model {
                        content_type: reference.media_type.clone(),
                        ..blob.clone()
                    });
                }
                Some(_) => {}
                None => missing.push(reference),
            }
        }

        if !updating.is_empty() {
            let txn = db.begin().await?;

            for blob in &updating {
                if let Err(error) = manager::update(&txn, blob).await {
                    warn!(digest = %blob.digest, %error, "failed to update blob");
                    return Err(error.into());
                }
            }

            txn.commit().await?;
        }

        for reference in missing {
            manager::create(db, &reference.digest, &reference.media_type, reference.size).await?;
        }

        Ok(())
    }

    /// Find the blobs that are not associated with the project yet.
    pub async fn find_missing_associations_for_project<C: ConnectionTrait>(
        &self,
        db: &C,
        project_id: i64,
        blobs: Vec<blob::Model>,
    ) -> Result<Vec<blob::Model>, Error> {
        if blobs.is_empty() {
            return Ok(blobs);
        }

        let params = ListParams {
            digests: Some(blobs.iter().map(|blob| blob.digest.clone()).collect()),
            project_id: Some(project_id),
            ..Default::default()
        };

        let associated = manager::list(db, &params).await?;

        if associated.is_empty() {
            return Ok(blobs);
        } else if associated.len() == blobs.len() {
            return Ok(Vec::new());
        }

        Ok(blobs
            .into_iter()
            .filter(|blob| !associated.iter().any(|a| a.digest == blob.digest))
            .collect())
    }

    pub async fn calculate_total_size_by_project<C: ConnectionTrait>(
        &self,
        db: &C,
        project_id: i64,
        exclude_foreign_layer: bool,
    ) -> Result<i64, Error> {
        Ok(manager::sum_size_by_project(db, project_id, exclude_foreign_layer).await?)
    }

    pub async fn calculate_total_size<C: ConnectionTrait>(
        &self,
        db: &C,
        exclude_foreign_layer: bool,
    ) -> Result<i64, Error> {
        Ok(manager::sum_size_total(db, exclude_foreign_layer).await?)
    }

    pub async fn count_by_project<C: ConnectionTrait>(
        &self,
        db: &C,
        project_id: i64,
    ) -> Result<u64, Error> {
        Ok(manager::count_by_project(db, project_id).await?)
    }

    /// Record the number of bytes accepted so far by a chunked upload session.
    pub async fn set_accepted_blob_size(&self, session_id: &str, size: i64) -> Result<(), Error> {
        self.cache
            .set_ex(&blob_size_key(session_id), size, self.size_ttl)
            .await
            .map_err(|error| {
                warn!(%session_id, %error, "failed to set accepted blob size");
                Error::from(error)
            })
    }

    /// Get the number of bytes accepted by a chunked upload session, zero if unknown.
    pub async fn get_accepted_blob_size(&self, session_id: &str) -> Result<i64, Error> {
        Ok(self
            .cache
            .get_i64(&blob_size_key(session_id))
            .await?
            .unwrap_or_default())
    }

    /// Bring the blob back to the [`blob::Status::None`] status.
    ///
    /// Fails with [`Error::NotFound`] if the blob row is gone or another actor
    /// changed its status first.
    pub async fn touch<C: ConnectionTrait>(&self, db: &C, blob: &blob::Model) -> Result<(), Error> {
        if blob.status == blob::Status::None {
            return Ok(());
        }

        if manager::update_status(db, blob, blob::Status::None).await? == 0 {
            return Err(Error::not_found(format!(
                "no blob item is updated to none status, id: {}, digest: {}",
                blob.id, blob.digest
            )));
        }

        Ok(())
    }

    /// Move a blob that is being deleted into the [`blob::Status::DeleteFailed`] status.
    pub async fn fail<C: ConnectionTrait>(&self, db: &C, blob: &blob::Model) -> Result<(), Error> {
        if manager::update_status(db, blob, blob::Status::DeleteFailed).await? == 0 {
            return Err(Error::not_found(format!(
                "no blob item is updated to delete failed status, id: {}, digest: {}",
                blob.id, blob.digest
            )));
        }

        Ok(())
    }

    /// Move the blob into any status allowed by the transition table.
    ///
    /// Returns `false` when the compare-and-swap was lost.
    pub async fn update_status<C: ConnectionTrait>(
        &self,
        db: &C,
        blob: &blob::Model,
        target: blob::Status,
    ) -> Result<bool, Error> {
        Ok(manager::update_status(db, blob, target).await? > 0)
    }

    /// Update blob size and content type.
    pub async fn update<C: ConnectionTrait>(&self, db: &C, blob: &blob::Model) -> Result<(), Error> {
        Ok(manager::update(db, blob).await?)
    }

    /// Delete the blob row.
    ///
    /// Artifact associations of manifests that no longer exist are removed first,
    /// any remaining project or artifact association is a conflict.
    #[instrument(skip(self, db))]
    pub async fn delete<C: ConnectionTrait>(&self, db: &C, id: i64) -> Result<(), Error> {
        let blob = manager::get_by_id(db, id)
            .await?
            .ok_or_else(|| Error::not_found(format!("blob {id} not found")))?;

        manager::delete_dangling_artifact_blobs(db, &blob.digest).await?;

        if manager::is_referenced(db, &blob).await? {
            return Err(Error::conflict(format!(
                "blob {} is still referenced",
                blob.digest
            )));
        }

        if manager::delete(db, id).await? == 0 {
            return Err(Error::not_found(format!("blob {id} not found")));
        }

        Ok(())
    }

    /// Remove the artifact associations of a manifest digest that no artifact uses anymore.
    pub async fn cleanup_associations_for_artifact<C: ConnectionTrait>(
        &self,
        db: &C,
        artifact_digest: &str,
    ) -> Result<(), Error> {
        if crate::artifact::manager::digest_in_use(db, artifact_digest).await? {
            return Ok(());
        }

        manager::delete_artifact_blobs(db, artifact_digest).await?;

        Ok(())
    }

    /// Remove the project associations of the blobs that no artifact of the project references.
    pub async fn cleanup_associations_for_project<C: ConnectionTrait>(
        &self,
        db: &C,
        project_id: i64,
        blobs: &[blob::Model],
    ) -> Result<(), Error> {
        let unused =
            manager::find_blobs_should_unassociate_with_project(db, project_id, blobs).await?;

        let ids: Vec<i64> = unused.iter().map(|blob| blob.id).collect();
        manager::delete_project_blobs(db, project_id, &ids).await?;

        Ok(())
    }

    /// Blobs that no project references, not updated within the reserve window.
    pub async fn blobs_not_referenced_by_project<C: ConnectionTrait>(
        &self,
        db: &C,
        window: Duration,
    ) -> Result<Vec<blob::Model>, Error> {
        Ok(manager::blobs_not_referenced_by_project(db, window).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use db::{blob, DatabaseConnection};

    use super::*;
    use crate::{
        cache::MemoryCache,
        testing::{create_database, create_project},
    };

    fn controller() -> BlobController {
        BlobController::new(Arc::new(MemoryCache::new()), Duration::from_secs(60))
    }

    fn descriptor(digest: &str, media_type: &str, size: i64) -> Descriptor {
        Descriptor {
            media_type: media_type.to_string(),
            digest: digest.to_string(),
            size,
            artifact_type: None,
            annotations: Default::default(),
        }
    }

    async fn set_status(db: &DatabaseConnection, digest: &str, status: blob::Status) -> blob::Model {
        let blob = manager::get(db, digest).await.unwrap().unwrap();
        assert_eq!(manager::update_status(db, &blob, status).await.unwrap(), 1);
        manager::get(db, digest).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let db = create_database().await;
        let ctl = controller();

        let id = ctl.ensure(&db, "sha256:aa", "application/octet-stream", 512).await.unwrap();
        let again = ctl.ensure(&db, "sha256:aa", "text/plain", 1).await.unwrap();

        assert_eq!(id, again);

        let blob = ctl.get(&db, "sha256:aa", Options::default()).await.unwrap();
        assert_eq!(blob.size, 512);
        assert_eq!(blob.content_type, "application/octet-stream");
        assert_eq!(blob.status, blob::Status::None);
    }

    #[tokio::test]
    async fn empty_digest() {
        let db = create_database().await;
        let ctl = controller();

        assert!(matches!(
            ctl.exist(&db, "", Options::default()).await,
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            ctl.get(&db, "", Options::default()).await,
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            ctl.ensure(&db, "", "application/octet-stream", 1).await,
            Err(Error::BadRequest(_))
        ));

        assert!(ctl.list(&db, &ListParams::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn exist_with_scopes() {
        let db = create_database().await;
        let ctl = controller();
        let project = create_project(&db, "library").await;
        let other = create_project(&db, "other").await;

        let id = ctl.ensure(&db, "sha256:aa", "application/octet-stream", 1).await.unwrap();
        ctl.associate_with_project_by_id(&db, id, project).await.unwrap();
        ctl.associate_with_project_by_id(&db, id, project).await.unwrap();

        assert!(ctl.exist(&db, "sha256:aa", Options::project(project)).await.unwrap());
        assert!(!ctl.exist(&db, "sha256:aa", Options::project(other)).await.unwrap());
        assert!(!ctl.exist(&db, "sha256:aa", Options::artifact("sha256:mm")).await.unwrap());
        assert!(!ctl.exist(&db, "sha256:zz", Options::default()).await.unwrap());

        assert_eq!(ctl.count_by_project(&db, project).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn associate_with_artifact() {
        let db = create_database().await;
        let ctl = controller();
        let digests = vec![String::from("sha256:aa"), String::from("sha256:bb")];

        for digest in digests.iter().chain([&String::from("sha256:mm")]) {
            ctl.ensure(&db, digest, "application/octet-stream", 1).await.unwrap();
        }

        ctl.associate_with_artifact(&db, &digests, "sha256:mm").await.unwrap();

        let listed = ctl
            .list(&db, &ListParams {
                artifact_digest: Some(String::from("sha256:mm")),
                ..Default::default()
            })
            .await
            .unwrap();
        let mut listed: Vec<_> = listed.into_iter().map(|b| b.digest).collect();
        listed.sort();
        assert_eq!(listed, ["sha256:aa", "sha256:bb", "sha256:mm"]);

        // Re-push of the same manifest with a different blob set is ignored
        ctl.associate_with_artifact(&db, &[String::from("sha256:cc")], "sha256:mm")
            .await
            .unwrap();
        assert!(!ctl
            .exist(&db, "sha256:cc", Options::artifact("sha256:mm"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn sync_is_idempotent() {
        let db = create_database().await;
        let ctl = controller();

        ctl.ensure(&db, "sha256:aa", "application/octet-stream", 10).await.unwrap();

        let references = [
            descriptor("sha256:aa", "application/vnd.oci.image.layer.v1.tar+gzip", 10),
            descriptor("sha256:bb", "application/vnd.oci.image.config.v1+json", 20),
        ];

        ctl.sync(&db, &references).await.unwrap();
        let first = ctl.list(&db, &ListParams::default()).await.unwrap();

        ctl.sync(&db, &references).await.unwrap();
        let second = ctl.list(&db, &ListParams::default()).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(
            first.iter().map(|b| (&b.digest, &b.content_type, b.size)).collect::<Vec<_>>(),
            second.iter().map(|b| (&b.digest, &b.content_type, b.size)).collect::<Vec<_>>()
        );
        assert_eq!(first[0].content_type, "application/vnd.oci.image.layer.v1.tar+gzip");
        assert_eq!(first[1].size, 20);
    }

    #[tokio::test]
    async fn sync_rejects_invalid_references() {
        let db = create_database().await;
        let ctl = controller();

        let empty = [
            descriptor("sha256:aa", "application/vnd.oci.image.config.v1+json", 1),
            descriptor("", "application/vnd.oci.image.layer.v1.tar+gzip", 1),
        ];
        assert!(matches!(ctl.sync(&db, &empty).await, Err(Error::BadRequest(_))));

        let negative = [descriptor("sha256:bb", "application/vnd.oci.image.layer.v1.tar+gzip", -1)];
        assert!(matches!(ctl.sync(&db, &negative).await, Err(Error::BadRequest(_))));

        assert!(ctl.list(&db, &ListParams::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn find_missing_associations() {
        let db = create_database().await;
        let ctl = controller();
        let project = create_project(&db, "library").await;

        let mut blobs = Vec::new();
        for digest in ["sha256:aa", "sha256:bb"] {
            ctl.ensure(&db, digest, "application/octet-stream", 1).await.unwrap();
            blobs.push(ctl.get(&db, digest, Options::default()).await.unwrap());
        }

        let missing = ctl
            .find_missing_associations_for_project(&db, project, blobs.clone())
            .await
            .unwrap();
        assert_eq!(missing.len(), 2);

        ctl.associate_with_project_by_digest(&db, "sha256:aa", project).await.unwrap();
        let missing = ctl
            .find_missing_associations_for_project(&db, project, blobs.clone())
            .await
            .unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].digest, "sha256:bb");

        ctl.associate_with_project_by_digest(&db, "sha256:bb", project).await.unwrap();
        assert!(ctl
            .find_missing_associations_for_project(&db, project, blobs)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn total_size_excludes_foreign_layers() {
        let db = create_database().await;
        let ctl = controller();
        let project = create_project(&db, "library").await;

        assert_eq!(ctl.calculate_total_size_by_project(&db, project, true).await.unwrap(), 0);

        let layer = ctl.ensure(&db, "sha256:aa", "application/octet-stream", 100).await.unwrap();
        let foreign = ctl.ensure(&db, "sha256:bb", blob::FOREIGN_LAYER, 1000).await.unwrap();
        ctl.ensure(&db, "sha256:cc", "application/octet-stream", 7).await.unwrap();
        ctl.associate_with_project_by_id(&db, layer, project).await.unwrap();
        ctl.associate_with_project_by_id(&db, foreign, project).await.unwrap();

        assert_eq!(ctl.calculate_total_size_by_project(&db, project, true).await.unwrap(), 100);
        assert_eq!(ctl.calculate_total_size_by_project(&db, project, false).await.unwrap(), 1100);
        assert_eq!(ctl.calculate_total_size(&db, true).await.unwrap(), 107);
        assert_eq!(ctl.count_by_project(&db, project).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn accepted_blob_size() {
        let ctl = controller();

        assert_eq!(ctl.get_accepted_blob_size("session").await.unwrap(), 0);

        ctl.set_accepted_blob_size("session", 1024).await.unwrap();
        assert_eq!(ctl.get_accepted_blob_size("session").await.unwrap(), 1024);
    }

    #[tokio::test]
    async fn touch_and_fail() {
        let db = create_database().await;
        let ctl = controller();

        ctl.ensure(&db, "sha256:aa", "application/octet-stream", 1).await.unwrap();

        let alive = ctl.get(&db, "sha256:aa", Options::default()).await.unwrap();
        ctl.touch(&db, &alive).await.unwrap();
        assert_eq!(
            ctl.get(&db, "sha256:aa", Options::default()).await.unwrap().version,
            alive.version
        );

        // Fail is only allowed from deleting
        assert!(ctl.fail(&db, &alive).await.unwrap_err().is_not_found());

        let marked = set_status(&db, "sha256:aa", blob::Status::Delete).await;
        let deleting = set_status(&db, "sha256:aa", blob::Status::Deleting).await;
        assert_eq!(deleting.version, marked.version + 1);

        // Touch can't revive a blob that is being deleted
        assert!(ctl.touch(&db, &deleting).await.unwrap_err().is_not_found());

        ctl.fail(&db, &deleting).await.unwrap();
        let failed = ctl.get(&db, "sha256:aa", Options::default()).await.unwrap();
        assert_eq!(failed.status, blob::Status::DeleteFailed);

        // A stale version loses the compare-and-swap
        assert!(ctl.fail(&db, &deleting).await.unwrap_err().is_not_found());

        ctl.touch(&db, &failed).await.unwrap();
        let touched = ctl.get(&db, "sha256:aa", Options::default()).await.unwrap();
        assert_eq!(touched.status, blob::Status::None);
        assert_eq!(touched.version, failed.version + 1);
    }

    #[tokio::test]
    async fn stale_touch_accepts_newer_version() {
        let db = create_database().await;
        let ctl = controller();

        ctl.ensure(&db, "sha256:aa", "application/octet-stream", 1).await.unwrap();
        let stale = set_status(&db, "sha256:aa", blob::Status::Delete).await;
        let blob = set_status(&db, "sha256:aa", blob::Status::Deleting).await;
        ctl.fail(&db, &blob).await.unwrap();

        ctl.touch(&db, &stale).await.unwrap();
        assert_eq!(
            ctl.get(&db, "sha256:aa", Options::default()).await.unwrap().status,
            blob::Status::None
        );
    }

    #[tokio::test]
    async fn delete() {
        let db = create_database().await;
        let ctl = controller();
        let project = create_project(&db, "library").await;

        let id = ctl.ensure(&db, "sha256:aa", "application/octet-stream", 1).await.unwrap();
        ctl.associate_with_project_by_id(&db, id, project).await.unwrap();

        assert!(ctl.delete(&db, id).await.unwrap_err().is_conflict());

        manager::delete_project_blobs(&db, project, &[id]).await.unwrap();

        // Edges of manifests without artifact rows are dangling
        ctl.associate_with_artifact(&db, &[String::from("sha256:aa")], "sha256:mm")
            .await
            .unwrap();

        ctl.delete(&db, id).await.unwrap();
        assert!(!ctl.exist(&db, "sha256:aa", Options::default()).await.unwrap());
        assert!(ctl.delete(&db, id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn nested_transaction() {
        let db = create_database().await;
        let ctl = controller();

        let txn = db.begin().await.unwrap();
        ctl.ensure(&txn, "sha256:aa", "application/octet-stream", 1).await.unwrap();
        ctl.sync(&txn, &[descriptor("sha256:aa", "text/plain", 1)]).await.unwrap();
        assert_eq!(
            ctl.get(&txn, "sha256:aa", Options::default()).await.unwrap().content_type,
            "text/plain"
        );
        txn.rollback().await.unwrap();

        assert!(!ctl.exist(&db, "sha256:aa", Options::default()).await.unwrap());
    }

    #[tokio::test]
    async fn not_referenced_by_project() {
        let db = create_database().await;
        let ctl = controller();
        let project = create_project(&db, "library").await;

        let id = ctl.ensure(&db, "sha256:aa", "application/octet-stream", 1).await.unwrap();
        ctl.ensure(&db, "sha256:bb", "application/octet-stream", 1).await.unwrap();
        ctl.associate_with_project_by_id(&db, id, project).await.unwrap();

        let orphans = ctl
            .blobs_not_referenced_by_project(&db, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].digest, "sha256:bb");

        assert!(ctl
            .blobs_not_referenced_by_project(&db, Duration::from_secs(3600))
            .await
            .unwrap()
            .is_empty());
    }
}
