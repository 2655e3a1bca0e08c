use std::{error::Error, sync::Arc};

use axum::async_trait;
use common::config::{Config, User};
use controller::cache::MemoryCache;
use db::{Database, DatabaseConnection};
use hyper::body::{self, Bytes, HttpBody};
use migration::MigratorTrait;
use serde::Serialize;

use crate::{proxy::Proxy, state::AppState};

/// `Authorization` header value of the administrator account (`admin:secret`).
pub(crate) const ADMIN: &str = "Basic YWRtaW46c2VjcmV0";

pub(crate) async fn create_database() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("unable to create test database");

    migration::Migrator::up(&db, None)
        .await
        .expect("unable to run migrations");

    db
}

/// Create application state backed by a fresh database and an in-memory cache.
///
/// The configuration has a single `admin` account with the `secret` password.
pub(crate) async fn create_state(configure: impl FnOnce(&mut Config)) -> AppState {
    let mut config = Config::for_tests();
    config.auth.users.push(User {
        name: String::from("admin"),
        password: String::from("secret"),
        admin: true,
        projects: Vec::new(),
        scanner: false,
    });
    configure(&mut config);

    let proxy = Proxy::new("http://127.0.0.1:5000").expect("invalid proxy url");

    AppState::new(
        Arc::new(create_database().await),
        Arc::new(config),
        Arc::new(MemoryCache::new()),
        proxy,
    )
}

pub(crate) trait RequestBodyExt: Sized {
    fn from_json<B: Serialize>(val: B) -> Self;
}

impl<T> RequestBodyExt for T
where
    T: HttpBody + From<Vec<u8>>,
{
    fn from_json<B: Serialize>(val: B) -> Self {
        T::from(serde_json::to_vec(&val).expect("unable to serialize"))
    }
}

#[async_trait(?Send)]
pub(crate) trait ResponseBodyExt {
    async fn bytes(self) -> Bytes;

    async fn json(self) -> serde_json::Value;
}

#[async_trait(?Send)]
impl<T> ResponseBodyExt for T
where
    T: HttpBody,
    T::Error: Error,
{
    async fn bytes(self) -> Bytes {
        body::to_bytes(self)
            .await
            .expect("unable to convert to bytes")
    }

    async fn json(self) -> serde_json::Value {
        serde_json::from_slice(&self.bytes().await).expect("unable to convert to json")
    }
}
