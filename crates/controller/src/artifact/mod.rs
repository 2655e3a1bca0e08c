//! Artifact controller.
//!
//! Artifacts are created by manifest pushes and removed by manifest deletes.
//! Deleting an artifact also deletes the hard accessories attached to it,
//! together with their own artifacts.

pub mod manager;

use std::collections::HashSet;

use db::{artifact, ConnectionTrait, TransactionErrorExt, TransactionTrait};
use tracing::{info, instrument};

pub use manager::NewArtifact;

use crate::{
    accessory::{self, Accessory},
    blob::{BlobController, ListParams},
    Error,
};

#[derive(Clone)]
pub struct ArtifactController {
    blob: BlobController,
}

impl ArtifactController {
    pub fn new(blob: BlobController) -> Self {
        Self { blob }
    }

    /// Resolve a manifest reference, either a digest or a tag.
    pub async fn get_by_reference<C: ConnectionTrait>(
        &self,
        db: &C,
        repository_name: &str,
        reference: &str,
    ) -> Result<artifact::Model, Error> {
        if reference.contains(':') {
            return self.get_by_digest(db, None, repository_name, reference).await;
        }

        let tag = manager::get_tag(db, repository_name, reference)
            .await?
            .ok_or_else(|| {
                Error::not_found(format!("tag {repository_name}:{reference} not found"))
            })?;

        manager::get(db, tag.artifact_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("artifact {} not found", tag.artifact_id)))
    }

    pub async fn get_by_digest<C: ConnectionTrait>(
        &self,
        db: &C,
        project_id: Option<i64>,
        repository_name: &str,
        digest: &str,
    ) -> Result<artifact::Model, Error> {
        manager::get_by_digest(db, project_id, repository_name, digest)
            .await?
            .ok_or_else(|| Error::not_found(format!("artifact {repository_name}@{digest} not found")))
    }

    /// Create the artifact if it is missing and point the tag at it.
    ///
    /// A re-push of an existing artifact only refreshes its push time.
    pub async fn ensure<C: ConnectionTrait>(
        &self,
        db: &C,
        new: &NewArtifact,
        tag: Option<&str>,
    ) -> Result<i64, Error> {
        let (id, created) = manager::create(db, new).await?;

        if !created {
            manager::update_push_time(db, id).await?;
        }

        if let Some(tag) = tag {
            manager::attach_tag(db, &new.repository_name, tag, id).await?;
        }

        Ok(id)
    }

    pub async fn update_pull_time<C: ConnectionTrait>(
        &self,
        db: &C,
        id: i64,
        tag: Option<&str>,
    ) -> Result<(), Error> {
        if manager::update_pull_time(db, id).await? == 0 {
            return Err(Error::not_found(format!("artifact {id} not found")));
        }

        if let Some(tag) = tag {
            manager::update_tag_pull_time(db, id, tag).await?;
        }

        Ok(())
    }

    /// Remove the tag, keeping the artifact it points at.
    pub async fn delete_tag<C: ConnectionTrait>(
        &self,
        db: &C,
        repository_name: &str,
        name: &str,
    ) -> Result<(), Error> {
        if manager::delete_tag(db, repository_name, name).await? == 0 {
            return Err(Error::not_found(format!(
                "tag {repository_name}:{name} not found"
            )));
        }

        Ok(())
    }

    /// List the accessories attached to the artifact, directly or through other accessories.
    pub async fn list_accessories<C: ConnectionTrait>(
        &self,
        db: &C,
        artifact_id: i64,
    ) -> Result<Vec<Box<dyn Accessory>>, Error> {
        let mut visited = HashSet::from([artifact_id]);
        let mut pending = vec![artifact_id];
        let mut found = Vec::new();

        while let Some(subject_id) = pending.pop() {
            for accessory in
                accessory::manager::list(db, &accessory::Query::subject(subject_id)).await?
            {
                if visited.insert(accessory.data().artifact_id) {
                    pending.push(accessory.data().artifact_id);
                }

                found.push(accessory);
            }
        }

        Ok(found)
    }

    /// Delete the artifact with its hard accessories, in one transaction.
    #[instrument(skip(self, db))]
    pub async fn delete<C: ConnectionTrait + TransactionTrait>(
        &self,
        db: &C,
        id: i64,
    ) -> Result<(), Error> {
        let controller = self.clone();

        db.transaction::<_, (), Error>(|txn| {
            Box::pin(async move {
                let plan = controller.collect(txn, id).await?;

                // Accessories go first, their subjects refuse deletion otherwise
                for artifact in plan.into_iter().rev() {
                    controller.delete_one(txn, &artifact).await?;
                }

                Ok(())
            })
        })
        .await
        .into_raw_result()
    }

    /// Collect the artifact and its hard accessory artifacts, subjects before accessories.
    async fn collect<C: ConnectionTrait>(
        &self,
        db: &C,
        id: i64,
    ) -> Result<Vec<artifact::Model>, Error> {
        let root = manager::get(db, id)
            .await?
            .ok_or_else(|| Error::not_found(format!("artifact {id} not found")))?;

        let mut visited = HashSet::from([root.id]);
        let mut pending = vec![root.id];
        let mut plan = vec![root];

        while let Some(subject_id) = pending.pop() {
            for accessory in
                accessory::manager::list(db, &accessory::Query::subject(subject_id)).await?
            {
                let artifact_id = accessory.data().artifact_id;

                if !accessory.is_hard() || !visited.insert(artifact_id) {
                    continue;
                }

                if let Some(artifact) = manager::get(db, artifact_id).await? {
                    pending.push(artifact.id);
                    plan.push(artifact);
                }
            }
        }

        Ok(plan)
    }

    async fn delete_one<C: ConnectionTrait>(
        &self,
        db: &C,
        artifact: &artifact::Model,
    ) -> Result<(), Error> {
        // Remaining accessories of the subject are soft or plain ones
        accessory::manager::delete_accessories(db, &accessory::Query::subject(artifact.id))
            .await?;
        accessory::manager::delete_accessories(db, &accessory::Query::artifact(artifact.id))
            .await?;

        manager::delete_tags(db, artifact.id).await?;

        let blobs = self
            .blob
            .list(
                db,
                &ListParams {
                    artifact_digest: Some(artifact.digest.clone()),
                    ..Default::default()
                },
            )
            .await?;

        manager::delete(db, artifact.id).await?;

        self.blob
            .cleanup_associations_for_artifact(db, &artifact.digest)
            .await?;
        self.blob
            .cleanup_associations_for_project(db, artifact.project_id, &blobs)
            .await?;

        info!(
            id = artifact.id,
            repository = %artifact.repository_name,
            digest = %artifact.digest,
            "artifact deleted"
        );

        Ok(())
    }
}
