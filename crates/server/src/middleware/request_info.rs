//! Distribution API request recognition.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, Method, Request, Uri},
    middleware::Next,
    response::Response,
};
use hyper::body::{Bytes, HttpBody};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::{error::RegistryError, state::AppState};

static MANIFEST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/v2/(?P<repository>.+)/manifests/(?P<reference>[^/]+)$")
        .expect("invalid regex string")
});

static TAG_LIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/v2/(?P<repository>.+)/tags/list$").expect("invalid regex string")
});

static BLOB_UPLOAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/v2/(?P<repository>.+)/blobs/uploads/?(?P<session>[^/]*)$")
        .expect("invalid regex string")
});

static BLOB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/v2/(?P<repository>.+)/blobs/(?P<digest>[^/]+)$")
        .expect("invalid regex string")
});

static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w][\w.-]{0,127}$").expect("invalid regex string"));

/// Kind of the distribution API endpoint.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Endpoint {
    Manifest,
    TagList,
    Blob,
    BlobUpload,
}

/// Artifact addressed by a distribution API request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ArtifactInfo {
    pub endpoint: Option<Endpoint>,
    pub project_name: String,
    pub repository: String,
    pub reference: Option<String>,
    pub tag: Option<String>,
    pub digest: Option<String>,
    pub session_id: Option<String>,
    pub mount_digest: Option<String>,
    pub mount_repository: Option<String>,
    pub mount_project_name: Option<String>,
}

impl ArtifactInfo {
    pub(crate) fn get<B>(req: &Request<B>) -> Option<&ArtifactInfo> {
        req.extensions().get::<ArtifactInfo>()
    }

    /// Match the request endpoint and method.
    pub(crate) fn matching<'a, B>(
        req: &'a Request<B>,
        endpoint: Endpoint,
        method: &Method,
    ) -> Option<&'a ArtifactInfo> {
        Self::get(req)
            .filter(|info| info.endpoint == Some(endpoint) && req.method() == method)
    }
}

/// Manifest body of a push request, read once and forwarded unchanged.
#[derive(Clone, Debug)]
pub(crate) struct ManifestPayload {
    pub media_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Default, Deserialize)]
struct UploadQuery {
    mount: Option<String>,
    from: Option<String>,
    digest: Option<String>,
}

/// Split repository name into project name and the repository itself.
fn project_name(repository: &str) -> Result<String, RegistryError> {
    let components: Vec<&str> = repository.split('/').collect();

    if components.len() < 2 || components.iter().any(|component| component.is_empty()) {
        return Err(RegistryError::bad_request(format!(
            "invalid repository name {repository}"
        )));
    }

    Ok(components[0].to_string())
}

fn artifact(endpoint: Endpoint, repository: &str) -> Result<ArtifactInfo, RegistryError> {
    Ok(ArtifactInfo {
        endpoint: Some(endpoint),
        project_name: project_name(repository)?,
        repository: repository.to_string(),
        ..Default::default()
    })
}

fn validate_digest(digest: &str) -> Result<(), RegistryError> {
    if common::digest::is_valid(digest) {
        Ok(())
    } else {
        Err(RegistryError::bad_request(format!("invalid digest {digest}")))
    }
}

/// Recognize the distribution API request.
///
/// Returns `None` for the base and catalog endpoints and for unknown paths.
pub(crate) fn parse(method: &Method, uri: &Uri) -> Result<Option<ArtifactInfo>, RegistryError> {
    let path = uri.path();

    if let Some(captures) = MANIFEST.captures(path) {
        let mut info = artifact(Endpoint::Manifest, &captures["repository"])?;
        let reference = captures["reference"].to_string();

        if reference.contains(':') {
            validate_digest(&reference)?;
            info.digest = Some(reference.clone());
        } else if TAG.is_match(&reference) {
            info.tag = Some(reference.clone());
        } else {
            return Err(RegistryError::bad_request(format!(
                "invalid reference {reference}"
            )));
        }

        info.reference = Some(reference);
        return Ok(Some(info));
    }

    if let Some(captures) = TAG_LIST.captures(path) {
        return artifact(Endpoint::TagList, &captures["repository"]).map(Some);
    }

    if let Some(captures) = BLOB_UPLOAD.captures(path) {
        let mut info = artifact(Endpoint::BlobUpload, &captures["repository"])?;

        let session = &captures["session"];
        if !session.is_empty() {
            info.session_id = Some(session.to_string());
        }

        let Query(query) = Query::<UploadQuery>::try_from_uri(uri)
            .map_err(|err| RegistryError::bad_request(err.to_string()))?;

        if let Some(digest) = query.digest {
            validate_digest(&digest)?;
            info.digest = Some(digest);
        }

        if method == Method::POST && info.session_id.is_none() {
            if let (Some(mount), Some(from)) = (query.mount, query.from) {
                validate_digest(&mount)?;
                info.mount_project_name = Some(project_name(&from)?);
                info.mount_repository = Some(from);
                info.mount_digest = Some(mount);
            }
        }

        return Ok(Some(info));
    }

    if let Some(captures) = BLOB.captures(path) {
        let mut info = artifact(Endpoint::Blob, &captures["repository"])?;

        let digest = &captures["digest"];
        validate_digest(digest)?;
        info.digest = Some(digest.to_string());

        return Ok(Some(info));
    }

    Ok(None)
}

/// Read the manifest body, refusing bodies larger than the limit.
async fn read_manifest(mut body: Body, limit: usize) -> Result<Bytes, RegistryError> {
    let mut bytes = Vec::new();

    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(|err| RegistryError::bad_request(err.to_string()))?;

        if bytes.len() + chunk.len() > limit {
            return Err(RegistryError::bad_request(format!(
                "manifest exceeds {limit} bytes"
            )));
        }

        bytes.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(bytes))
}

pub(crate) async fn request_info(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, RegistryError> {
    let Some(info) = parse(req.method(), req.uri())? else {
        return Ok(next.run(req).await);
    };

    let (mut parts, body) = req.into_parts();

    let body = if info.endpoint == Some(Endpoint::Manifest) && parts.method == Method::PUT {
        let bytes = read_manifest(body, state.config.upload.max_manifest_size).await?;

        let media_type = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        parts.extensions.insert(ManifestPayload {
            media_type,
            bytes: bytes.clone(),
        });

        Body::from(bytes)
    } else {
        body
    };

    parts.extensions.insert(info);

    Ok(next.run(Request::from_parts(parts, body)).await)
}
