use std::sync::Arc;

use axum::extract::FromRef;
use common::config::Config;
use controller::{
    artifact::ArtifactController,
    blob::BlobController,
    cache::Cache,
    signature::{SignatureChecker, SignatureStore},
    vuln::{ReportStore, VulnerabilityChecker},
};
use db::DatabaseConnection;

use crate::{
    middleware::security::{Authenticator, StaticAuthenticator},
    proxy::Proxy,
};

/// Shared handles, available to every middleware.
#[derive(Clone)]
pub(crate) struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<Config>,
    pub cache: Arc<dyn Cache>,
    pub blobs: BlobController,
    pub artifacts: ArtifactController,
    pub authenticator: Arc<dyn Authenticator>,
    pub signatures: Arc<dyn SignatureChecker>,
    pub vulnerabilities: Arc<dyn VulnerabilityChecker>,
    pub proxy: Proxy,
}

impl AppState {
    pub(crate) fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<Config>,
        cache: Arc<dyn Cache>,
        proxy: Proxy,
    ) -> Self {
        let blobs = BlobController::new(cache.clone(), config.upload.size_ttl());

        Self {
            authenticator: Arc::new(StaticAuthenticator::new(&config.auth)),
            artifacts: ArtifactController::new(blobs.clone()),
            signatures: Arc::new(SignatureStore::new()),
            vulnerabilities: Arc::new(ReportStore::new()),
            blobs,
            db,
            config,
            cache,
            proxy,
        }
    }
}

impl FromRef<AppState> for Proxy {
    fn from_ref(state: &AppState) -> Self {
        state.proxy.clone()
    }
}
