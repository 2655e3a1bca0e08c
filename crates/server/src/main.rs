mod error;
mod middleware;
mod proxy;
mod state;

#[cfg(test)]
mod testing;

use std::{path::PathBuf, sync::Arc};

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{any, MethodRouter},
    Router, Server,
};
use clap::Parser;
use common::{config::Config, logging};
use controller::{
    cache::{Cache, MemoryCache, RedisCache},
    project::{self, CveAllowlist, SYSTEM_PROJECT_ID},
};
use db::Database;
use tower::ServiceBuilder;
use tracing::info;

use crate::{
    middleware::{
        accessory::{cosign::cosign, nydus::nydus, subject::subject},
        authorization::authorization,
        blob::{
            delete_manifest::delete_manifest, get::get_blob, get_manifest::get_manifest,
            head::head_blob, patch_upload::patch_blob_upload, post_upload::post_blob_upload,
            put_manifest::put_manifest, put_upload::put_blob_upload,
        },
        content_trust::content_trust,
        readonly::read_only,
        request_id::request_id,
        request_info::request_info,
        security::security,
        transaction::transaction,
        vulnerable::vulnerable,
    },
    proxy::Proxy,
    state::AppState,
};

#[derive(Parser)]
#[command(about, version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    let config = Config::new(cli.config)?;

    logging::init(&config);

    let Some(server_config) = config.server.as_ref() else {
        return Err(anyhow::Error::msg("unable to load server config"));
    };

    let Some(registry_config) = config.registry.as_ref() else {
        return Err(anyhow::Error::msg("unable to load registry config"));
    };

    let proxy = Proxy::new(&registry_config.url).map_err(|err| anyhow::Error::msg(err.to_string()))?;

    info!("connecting to database");
    let database = Arc::new(Database::connect(&config.database.url).await?);

    project::set_cve_allowlist(
        &*database,
        SYSTEM_PROJECT_ID,
        &CveAllowlist {
            items: config.cve_allowlist.clone(),
            expires_at: None,
        },
    )
    .await?;

    let cache: Arc<dyn Cache> = match &config.redis {
        Some(redis) => {
            info!("connecting to redis");
            Arc::new(RedisCache::connect(&redis.url).await?)
        }
        None => Arc::new(MemoryCache::new()),
    };

    let server = Server::bind(&server_config.address);
    let state = AppState::new(database, Arc::new(config), cache, proxy);

    server
        .serve(app_router(state).into_make_service())
        .await?;

    Ok(())
}

fn app_router(state: AppState) -> Router {
    v2_router(state, any(proxy::handler))
}

/// Distribution API routes, with every request passing through the middleware
/// chain before reaching the backend.
fn v2_router(state: AppState, backend: MethodRouter<AppState>) -> Router {
    let middlewares = ServiceBuilder::new()
        .layer(from_fn(request_id))
        .layer(from_fn_with_state(state.clone(), request_info))
        .layer(from_fn_with_state(state.clone(), security))
        .layer(from_fn_with_state(state.clone(), authorization))
        .layer(from_fn_with_state(state.clone(), read_only))
        .layer(from_fn_with_state(state.clone(), content_trust))
        .layer(from_fn_with_state(state.clone(), vulnerable))
        .layer(from_fn_with_state(state.clone(), transaction))
        .layer(from_fn_with_state(state.clone(), cosign))
        .layer(from_fn_with_state(state.clone(), subject))
        .layer(from_fn_with_state(state.clone(), nydus))
        .layer(from_fn_with_state(state.clone(), delete_manifest))
        .layer(from_fn_with_state(state.clone(), get_manifest))
        .layer(from_fn_with_state(state.clone(), put_manifest))
        .layer(from_fn_with_state(state.clone(), head_blob))
        .layer(from_fn_with_state(state.clone(), get_blob))
        .layer(from_fn_with_state(state.clone(), post_blob_upload))
        .layer(from_fn_with_state(state.clone(), patch_blob_upload))
        .layer(from_fn_with_state(state.clone(), put_blob_upload));

    Router::new()
        .route("/v2/", backend.clone())
        .route("/v2/*path", backend)
        .layer(middlewares)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use assert_json::assert_json;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        response::{IntoResponse, Response},
        routing::{any, MethodRouter},
    };
    use common::{config::User, digest::sha256};
    use controller::{
        accessory::{self, TYPE_COSIGN_SIGNATURE, TYPE_NYDUS_ACCELERATOR},
        blob::Options,
        manifest::OCI_MANIFEST,
        project::{self, CONTENT_TRUST_COSIGN},
    };
    use db::blob::{Status, DEFAULT_CONTENT_TYPE};
    use serde_json::json;
    use tower::ServiceExt;

    use super::v2_router;
    use crate::{
        middleware::{
            accessory::{
                cosign::SIMPLE_SIGNING_LAYER,
                nydus::{ACCELERATION_SOURCE, NYDUS_BOOTSTRAP},
            },
            blob::put_upload::DOCKER_CONTENT_DIGEST,
            request_id::X_REQUEST_ID,
        },
        state::AppState,
        testing::{create_state, RequestBodyExt, ResponseBodyExt, ADMIN},
    };

    const SESSION: &str = "b2e3b0f8-7c2f-4a55-9d34-0f0a5d3c1e11";

    /// Backend that accepts every request, answering with the status a
    /// distribution backend would use for it.
    fn backend(upload_digest: Option<String>) -> MethodRouter<AppState> {
        any(move |req: Request<Body>| {
            let upload_digest = upload_digest.clone();

            async move {
                let path = req.uri().path().to_string();

                match *req.method() {
                    Method::PUT if path.contains("/blobs/uploads/") => match upload_digest {
                        Some(digest) => {
                            (StatusCode::CREATED, [(DOCKER_CONTENT_DIGEST, digest)]).into_response()
                        }
                        None => StatusCode::CREATED.into_response(),
                    },
                    Method::PUT | Method::POST => StatusCode::CREATED.into_response(),
                    Method::PATCH => {
                        (StatusCode::ACCEPTED, [(header::RANGE, "0-1023")]).into_response()
                    }
                    Method::DELETE => StatusCode::ACCEPTED.into_response(),
                    _ => StatusCode::OK.into_response(),
                }
            }
        })
    }

    fn request(method: Method, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, ADMIN)
    }

    async fn send(state: &AppState, backend: MethodRouter<AppState>, req: Request<Body>) -> Response {
        v2_router(state.clone(), backend)
            .oneshot(req)
            .await
            .unwrap()
    }

    fn image(config: &[u8], layer: &[u8]) -> serde_json::Value {
        json!({
            "schemaVersion": 2,
            "mediaType": OCI_MANIFEST,
            "config": {
                "mediaType": "application/vnd.oci.image.config.v1+json",
                "digest": sha256(config),
                "size": config.len(),
            },
            "layers": [{
                "mediaType": "application/vnd.oci.image.layer.v1.tar+gzip",
                "digest": sha256(layer),
                "size": layer.len(),
            }]
        })
    }

    async fn push_manifest(state: &AppState, reference: &str, manifest: &serde_json::Value) -> Response {
        send(
            state,
            backend(None),
            request(Method::PUT, &format!("/v2/library/app/manifests/{reference}"))
                .header(header::CONTENT_TYPE, OCI_MANIFEST)
                .body(Body::from_json(manifest))
                .unwrap(),
        )
        .await
    }

    #[tokio::test]
    async fn request_id() {
        let state = create_state(|_| {}).await;

        let response = send(
            &state,
            backend(None),
            Request::get("/v2/").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));

        let response = send(
            &state,
            backend(None),
            Request::get("/v2/")
                .header(X_REQUEST_ID, "client-id")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.headers()[X_REQUEST_ID], "client-id");
    }

    #[tokio::test]
    async fn blob_upload() {
        let state = create_state(|_| {}).await;
        let project_id = project::create(&*state.db, "library", &[]).await.unwrap();
        let digest = sha256(b"layer");

        let response = send(
            &state,
            backend(Some(digest.clone())),
            request(
                Method::PUT,
                &format!("/v2/library/app/blobs/uploads/{SESSION}?digest={digest}"),
            )
            .header(header::CONTENT_LENGTH, "512")
            .body(Body::empty())
            .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);

        let blob = state
            .blobs
            .get(&*state.db, &digest, Options::project(project_id))
            .await
            .unwrap();

        assert_eq!(blob.size, 512);
        assert_eq!(blob.content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(blob.status, Status::None);

        let response = send(
            &state,
            backend(None),
            request(Method::HEAD, &format!("/v2/library/app/blobs/{digest}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn chunked_blob_upload() {
        let state = create_state(|_| {}).await;
        project::create(&*state.db, "library", &[]).await.unwrap();
        let digest = sha256(b"chunked layer");

        let response = send(
            &state,
            backend(None),
            request(Method::PATCH, &format!("/v2/library/app/blobs/uploads/{SESSION}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(state.blobs.get_accepted_blob_size(SESSION).await.unwrap(), 1024);

        let response = send(
            &state,
            backend(Some(digest.clone())),
            request(
                Method::PUT,
                &format!("/v2/library/app/blobs/uploads/{SESSION}?digest={digest}"),
            )
            .body(Body::empty())
            .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);

        let blob = state
            .blobs
            .get(&*state.db, &digest, Options::default())
            .await
            .unwrap();

        assert_eq!(blob.size, 1024);
    }

    #[tokio::test]
    async fn manifest_push() {
        let state = create_state(|_| {}).await;
        let project_id = project::create(&*state.db, "library", &[]).await.unwrap();

        let manifest = image(b"config", b"layer");
        let digest = sha256(&serde_json::to_vec(&manifest).unwrap());

        let response = push_manifest(&state, "latest", &manifest).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let artifact = state
            .artifacts
            .get_by_reference(&*state.db, "library/app", "latest")
            .await
            .unwrap();

        assert_eq!(artifact.digest, digest);
        assert_eq!(artifact.project_id, project_id);
        assert_eq!(artifact.manifest_media_type, OCI_MANIFEST);

        for blob_digest in [sha256(b"config"), sha256(b"layer"), digest.clone()] {
            assert!(state
                .blobs
                .exist(&*state.db, &blob_digest, Options::artifact(&digest))
                .await
                .unwrap());
            assert!(state
                .blobs
                .exist(&*state.db, &blob_digest, Options::project(project_id))
                .await
                .unwrap());
        }

        // Pushing the same manifest again changes nothing
        let response = push_manifest(&state, "latest", &manifest).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            state
                .blobs
                .count_by_project(&*state.db, project_id)
                .await
                .unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn manifest_delete() {
        let state = create_state(|_| {}).await;
        project::create(&*state.db, "library", &[]).await.unwrap();

        let manifest = image(b"config", b"layer");
        let digest = sha256(&serde_json::to_vec(&manifest).unwrap());

        push_manifest(&state, "latest", &manifest).await;
        push_manifest(&state, "stable", &manifest).await;

        let response = send(
            &state,
            backend(None),
            request(Method::DELETE, "/v2/library/app/manifests/stable")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(state
            .artifacts
            .get_by_reference(&*state.db, "library/app", "stable")
            .await
            .unwrap_err()
            .is_not_found());
        assert!(state
            .artifacts
            .get_by_reference(&*state.db, "library/app", "latest")
            .await
            .is_ok());

        let response = send(
            &state,
            backend(None),
            request(Method::DELETE, &format!("/v2/library/app/manifests/{digest}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(state
            .artifacts
            .get_by_reference(&*state.db, "library/app", &digest)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn cosign_signature() {
        let state = create_state(|_| {}).await;
        project::create(&*state.db, "library", &[(CONTENT_TRUST_COSIGN, "true")])
            .await
            .unwrap();

        let manifest = image(b"config", b"layer");
        let digest = sha256(&serde_json::to_vec(&manifest).unwrap());
        push_manifest(&state, "latest", &manifest).await;

        let pull = || {
            request(Method::GET, "/v2/library/app/manifests/latest")
                .body(Body::empty())
                .unwrap()
        };

        let response = send(&state, backend(None), pull()).await;
        assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
        assert_json!(response.into_body().json().await, {
            "errors": [{
                "code": "PROJECT_POLICY_VIOLATION",
                "message": "the image is not signed by cosign",
                "detail": "the image is not signed by cosign",
            }]
        });

        let signature = json!({
            "schemaVersion": 2,
            "mediaType": OCI_MANIFEST,
            "config": {
                "mediaType": "application/vnd.oci.image.config.v1+json",
                "digest": sha256(b"signature config"),
                "size": 16,
            },
            "layers": [{
                "mediaType": SIMPLE_SIGNING_LAYER,
                "digest": sha256(b"payload"),
                "size": 7,
            }]
        });
        let tag = digest.replace(':', "-") + ".sig";

        for _ in 0..2 {
            let response = push_manifest(&state, &tag, &signature).await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let subject = state
            .artifacts
            .get_by_reference(&*state.db, "library/app", &digest)
            .await
            .unwrap();

        let signatures = accessory::manager::list(
            &*state.db,
            &accessory::Query {
                subject_artifact_id: Some(subject.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(signatures.len(), 1);
        assert_eq!(signatures[0].data().accessory_type, TYPE_COSIGN_SIGNATURE);
        assert!(signatures[0].is_hard());

        let response = send(&state, backend(None), pull()).await;
        assert_eq!(response.status(), StatusCode::OK);

        // Signed artifacts are deleted together with their signatures
        let response = send(
            &state,
            backend(None),
            request(Method::DELETE, &format!("/v2/library/app/manifests/{digest}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(state
            .artifacts
            .get_by_reference(&*state.db, "library/app", &tag)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn subject_pushed_before_referrer() {
        let state = create_state(|_| {}).await;
        project::create(&*state.db, "library", &[]).await.unwrap();

        let manifest = image(b"config", b"layer");
        let digest = sha256(&serde_json::to_vec(&manifest).unwrap());

        let sbom = json!({
            "schemaVersion": 2,
            "mediaType": OCI_MANIFEST,
            "config": {
                "mediaType": "application/vnd.example.sbom.v1+json",
                "digest": sha256(b"sbom config"),
                "size": 11,
            },
            "layers": [],
            "subject": {
                "mediaType": OCI_MANIFEST,
                "digest": digest,
                "size": 100,
            }
        });

        let response = push_manifest(&state, "sbom", &sbom).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["oci-subject"], digest.as_str());

        let query = accessory::Query {
            subject_artifact_digest: Some(digest.clone()),
            ..Default::default()
        };

        let accessories = accessory::manager::list(&*state.db, &query).await.unwrap();
        assert_eq!(accessories.len(), 1);
        assert_eq!(accessories[0].data().subject_artifact_id, None);

        push_manifest(&state, "latest", &manifest).await;

        let subject = state
            .artifacts
            .get_by_reference(&*state.db, "library/app", "latest")
            .await
            .unwrap();
        let accessories = accessory::manager::list(&*state.db, &query).await.unwrap();

        assert_eq!(accessories[0].data().subject_artifact_id, Some(subject.id));
    }

    #[tokio::test]
    async fn read_only() {
        let state = create_state(|config| config.read_only = true).await;
        project::create(&*state.db, "library", &[]).await.unwrap();

        let response = send(
            &state,
            backend(None),
            request(Method::DELETE, "/v2/library/app/manifests/latest")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_json!(response.into_body().json().await, {
            "errors": [{
                "code": "DENIED",
                "message": "the system is in read only mode, any modification is prohibited",
                "detail": "the system is in read only mode, any modification is prohibited",
            }]
        });

        let response = send(
            &state,
            backend(None),
            request(Method::GET, "/v2/library/app/manifests/latest")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn blob_in_gc() {
        let state = create_state(|_| {}).await;
        project::create(&*state.db, "library", &[]).await.unwrap();
        let digest = sha256(b"collected layer");

        state
            .blobs
            .ensure(&*state.db, &digest, DEFAULT_CONTENT_TYPE, 10)
            .await
            .unwrap();

        for status in [Status::Delete, Status::Deleting] {
            let blob = state
                .blobs
                .get(&*state.db, &digest, Options::default())
                .await
                .unwrap();
            assert!(state
                .blobs
                .update_status(&*state.db, &blob, status)
                .await
                .unwrap());
        }

        let upload = || {
            request(
                Method::PUT,
                &format!("/v2/library/app/blobs/uploads/{SESSION}?digest={digest}"),
            )
            .header(header::CONTENT_LENGTH, "10")
            .body(Body::empty())
            .unwrap()
        };

        let response = send(&state, backend(Some(digest.clone())), upload()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(
            &state,
            backend(None),
            request(Method::HEAD, &format!("/v2/library/app/blobs/{digest}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let blob = state
            .blobs
            .get(&*state.db, &digest, Options::default())
            .await
            .unwrap();
        state.blobs.fail(&*state.db, &blob).await.unwrap();

        let response = send(&state, backend(Some(digest.clone())), upload()).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let blob = state
            .blobs
            .get(&*state.db, &digest, Options::default())
            .await
            .unwrap();
        assert_eq!(blob.status, Status::None);
    }

    #[tokio::test]
    async fn head_protects_blob_from_gc() {
        let state = create_state(|_| {}).await;
        project::create(&*state.db, "library", &[]).await.unwrap();
        let digest = sha256(b"marked layer");

        state
            .blobs
            .ensure(&*state.db, &digest, DEFAULT_CONTENT_TYPE, 10)
            .await
            .unwrap();
        let blob = state
            .blobs
            .get(&*state.db, &digest, Options::default())
            .await
            .unwrap();
        state
            .blobs
            .update_status(&*state.db, &blob, Status::Delete)
            .await
            .unwrap();

        let missing = any(|| async { StatusCode::NOT_FOUND });
        let response = send(
            &state,
            missing,
            request(Method::HEAD, &format!("/v2/library/app/blobs/{digest}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let blob = state
            .blobs
            .get(&*state.db, &digest, Options::default())
            .await
            .unwrap();
        assert_eq!(blob.status, Status::None);
    }

    #[tokio::test]
    async fn cross_repository_mount() {
        let state = create_state(|_| {}).await;
        let source_id = project::create(&*state.db, "source", &[]).await.unwrap();
        let project_id = project::create(&*state.db, "library", &[]).await.unwrap();
        let digest = sha256(b"shared layer");

        let blob_id = state
            .blobs
            .ensure(&*state.db, &digest, DEFAULT_CONTENT_TYPE, 10)
            .await
            .unwrap();
        state
            .blobs
            .associate_with_project_by_id(&*state.db, blob_id, source_id)
            .await
            .unwrap();

        let response = send(
            &state,
            backend(None),
            request(
                Method::POST,
                &format!("/v2/library/app/blobs/uploads/?mount={digest}&from=source/app"),
            )
            .body(Body::empty())
            .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(state
            .blobs
            .exist(&*state.db, &digest, Options::project(project_id))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn access_control() {
        let state = create_state(|config| {
            config.auth.users.push(User {
                name: String::from("dev"),
                password: String::from("secret"),
                admin: false,
                projects: vec![String::from("library")],
                scanner: false,
            })
        })
        .await;
        project::create(&*state.db, "library", &[]).await.unwrap();
        project::create(&*state.db, "private", &[]).await.unwrap();

        let response = send(
            &state,
            backend(None),
            Request::get("/v2/library/app/manifests/latest")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

        // dev:secret
        let dev = |uri: &str| {
            Request::get(uri)
                .header(header::AUTHORIZATION, "Basic ZGV2OnNlY3JldA==")
                .body(Body::empty())
                .unwrap()
        };

        let response = send(&state, backend(None), dev("/v2/library/app/manifests/latest")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&state, backend(None), dev("/v2/private/app/manifests/latest")).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(&state, backend(None), dev("/v2/missing/app/manifests/latest")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn pull_time() {
        let state = create_state(|_| {}).await;
        project::create(&*state.db, "library", &[]).await.unwrap();

        push_manifest(&state, "latest", &image(b"config", b"layer")).await;

        let artifact = state
            .artifacts
            .get_by_reference(&*state.db, "library/app", "latest")
            .await
            .unwrap();
        assert_eq!(artifact.pull_time, None);

        let response = send(
            &state,
            backend(None),
            request(Method::GET, "/v2/library/app/manifests/latest")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let artifact = state
            .artifacts
            .get_by_reference(&*state.db, "library/app", "latest")
            .await
            .unwrap();
        assert!(artifact.pull_time.is_some());
    }

    #[tokio::test]
    async fn nydus_accelerator() {
        let state = create_state(|_| {}).await;
        project::create(&*state.db, "library", &[]).await.unwrap();

        let manifest = image(b"config", b"layer");
        let digest = sha256(&serde_json::to_vec(&manifest).unwrap());
        push_manifest(&state, "latest", &manifest).await;

        let accelerated = json!({
            "schemaVersion": 2,
            "mediaType": OCI_MANIFEST,
            "config": {
                "mediaType": "application/vnd.oci.image.config.v1+json",
                "digest": sha256(b"nydus config"),
                "size": 12,
            },
            "layers": [{
                "mediaType": "application/vnd.oci.image.layer.v1.tar+gzip",
                "digest": sha256(b"nydus bootstrap"),
                "size": 15,
                "annotations": { NYDUS_BOOTSTRAP: "true" },
            }],
            "annotations": { ACCELERATION_SOURCE: digest },
        });

        let response = push_manifest(&state, "latest-nydus", &accelerated).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let source = state
            .artifacts
            .get_by_reference(&*state.db, "library/app", "latest")
            .await
            .unwrap();
        let accelerator = state
            .artifacts
            .get_by_reference(&*state.db, "library/app", "latest-nydus")
            .await
            .unwrap();

        let accessories = accessory::manager::list(&*state.db, &accessory::Query::subject(source.id))
            .await
            .unwrap();

        assert_eq!(accessories.len(), 1);
        assert_eq!(accessories[0].data().accessory_type, TYPE_NYDUS_ACCELERATOR);
        assert_eq!(accessories[0].data().artifact_id, accelerator.id);
        assert!(accessories[0].is_hard());
    }

    #[tokio::test]
    async fn blob_download() {
        let state = create_state(|_| {}).await;
        project::create(&*state.db, "library", &[]).await.unwrap();
        let digest = sha256(b"downloaded layer");

        state
            .blobs
            .ensure(&*state.db, &digest, DEFAULT_CONTENT_TYPE, 10)
            .await
            .unwrap();

        let key = format!("blobs::{digest}");
        state.cache.hset(&key, "size", "0").await.unwrap();

        let download = || {
            request(Method::GET, &format!("/v2/library/app/blobs/{digest}"))
                .body(Body::empty())
                .unwrap()
        };

        let response = send(&state, backend(None), download()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.cache.hget(&key, "size").await.unwrap(), None);

        for status in [Status::Delete, Status::Deleting] {
            let blob = state
                .blobs
                .get(&*state.db, &digest, Options::default())
                .await
                .unwrap();
            state
                .blobs
                .update_status(&*state.db, &blob, status)
                .await
                .unwrap();
        }

        let response = send(&state, backend(None), download()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_upload_range() {
        let state = create_state(|_| {}).await;
        project::create(&*state.db, "library", &[]).await.unwrap();

        let patch = || {
            request(Method::PATCH, &format!("/v2/library/app/blobs/uploads/{SESSION}"))
                .body(Body::empty())
                .unwrap()
        };

        let backends = [
            any(|| async { StatusCode::ACCEPTED }),
            any(|| async { (StatusCode::ACCEPTED, [(header::RANGE, "bytes")]) }),
        ];

        for backend in backends {
            let response = send(&state, backend, patch()).await;
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }

        assert_eq!(state.blobs.get_accepted_blob_size(SESSION).await.unwrap(), 0);
    }
}
