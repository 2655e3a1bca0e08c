//! Accessory recognition on manifest push.
//!
//! These middlewares inspect the pushed manifest after the backend accepted it
//! and record the accessory linking it to its subject artifact.

pub(crate) mod cosign;
pub(crate) mod nydus;
pub(crate) mod subject;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
};
use controller::{
    accessory::{manager, AccessoryData},
    manifest::Manifest,
};
use db::{artifact, DatabaseTransaction};
use tracing::debug;

use crate::{
    error::RegistryError,
    middleware::{
        request_info::{ArtifactInfo, Endpoint, ManifestPayload},
        transaction::Transaction,
    },
    state::AppState,
};

/// Manifest push observed by an accessory middleware.
pub(super) struct Push {
    pub info: ArtifactInfo,
    pub payload: ManifestPayload,
    pub txn: Arc<DatabaseTransaction>,
}

impl Push {
    pub(super) fn from_request(req: &Request<Body>) -> Result<Option<Self>, RegistryError> {
        let Some(info) = ArtifactInfo::matching(req, Endpoint::Manifest, &Method::PUT).cloned()
        else {
            return Ok(None);
        };

        let Some(payload) = req.extensions().get::<ManifestPayload>().cloned() else {
            return Ok(None);
        };

        Ok(Some(Self {
            info,
            payload,
            txn: Transaction::get(req)?,
        }))
    }

    pub(super) fn manifest(&self) -> Result<Manifest, RegistryError> {
        Ok(Manifest::parse(
            self.payload.media_type.as_deref(),
            &self.payload.bytes,
        )?)
    }

    /// Find an artifact of the pushed repository, `None` if it is not stored.
    pub(super) async fn artifact(
        &self,
        state: &AppState,
        digest: &str,
    ) -> Result<Option<artifact::Model>, RegistryError> {
        match state
            .artifacts
            .get_by_digest(&*self.txn, None, &self.info.repository, digest)
            .await
        {
            Ok(artifact) => Ok(Some(artifact)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Record an accessory, an existing record counts as success.
    pub(super) async fn create_accessory(&self, data: AccessoryData) -> Result<(), RegistryError> {
        match manager::create(&*self.txn, &data).await {
            Ok(id) => {
                debug!(id, accessory_type = %data.accessory_type, digest = %data.digest, "accessory created");
                Ok(())
            }
            Err(err) if err.is_conflict() => {
                debug!(digest = %data.digest, "accessory already exists");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
