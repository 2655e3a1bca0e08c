//! Request-scoped database transaction.
//!
//! Downstream middlewares run their queries inside the transaction opened here.
//! It is committed when the final response status is in `[200, 400)` or when
//! a middleware called [`must_commit`], and rolled back otherwise.
//!
//! Only requests recorded in the database get a transaction, so streamed
//! upload chunks never hold a connection.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use db::{DatabaseTransaction, TransactionTrait};
use tracing::{debug, error};

use super::request_info::{ArtifactInfo, Endpoint};
use crate::{error::RegistryError, state::AppState};

#[derive(Clone)]
pub(crate) struct Transaction(Arc<DatabaseTransaction>);

impl Transaction {
    /// Get the transaction of the request.
    pub(crate) fn get<B>(req: &Request<B>) -> Result<Arc<DatabaseTransaction>, RegistryError> {
        req.extensions()
            .get::<Transaction>()
            .map(|txn| txn.0.clone())
            .ok_or_else(|| RegistryError::unknown("request has no database transaction"))
    }
}

#[derive(Clone, Default)]
struct MustCommit(Arc<AtomicBool>);

/// Commit the request transaction even if the response is an error.
pub(crate) fn must_commit<B>(req: &Request<B>) {
    if let Some(flag) = req.extensions().get::<MustCommit>() {
        flag.0.store(true, Ordering::Release);
    }
}

/// Check if a lifecycle middleware writes to the database for the request.
fn is_recorded<B>(req: &Request<B>) -> bool {
    let Some(endpoint) = ArtifactInfo::get(req).and_then(|info| info.endpoint) else {
        return false;
    };

    let method = req.method();

    match endpoint {
        Endpoint::Manifest => [Method::GET, Method::PUT, Method::DELETE].contains(method),
        Endpoint::Blob => [Method::GET, Method::HEAD].contains(method),
        Endpoint::BlobUpload => [Method::POST, Method::PUT].contains(method),
        Endpoint::TagList => false,
    }
}

pub(crate) async fn transaction(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, RegistryError> {
    if !is_recorded(&req) {
        return Ok(next.run(req).await);
    }

    let txn = Arc::new(state.db.begin().await?);
    let flag = MustCommit::default();

    req.extensions_mut().insert(Transaction(txn.clone()));
    req.extensions_mut().insert(flag.clone());

    let response = next.run(req).await;

    let Ok(txn) = Arc::try_unwrap(txn) else {
        error!("transaction is still referenced after the response");
        return Err(RegistryError::unknown("unable to finish the transaction"));
    };

    let status = response.status();
    let commit = status.is_success() || status.is_redirection() || flag.0.load(Ordering::Acquire);

    if commit {
        txn.commit().await?;
        debug!(%status, "transaction committed");
    } else {
        txn.rollback().await?;
        debug!(%status, "transaction rolled back");
    }

    Ok(response)
}
