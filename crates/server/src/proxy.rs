//! Reverse proxy to the storage backend.

use axum::{
    body::{boxed, Body},
    extract::State,
    http::{header, uri::PathAndQuery, HeaderMap, HeaderValue, Request, Uri},
    response::Response,
};
use hyper::client::{Client, HttpConnector};
use tracing::warn;

use crate::error::RegistryError;

/// Connection-scoped headers, never forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Clone)]
pub(crate) struct Proxy {
    client: Client<HttpConnector>,
    target: Uri,
}

impl Proxy {
    pub(crate) fn new(url: &str) -> Result<Self, RegistryError> {
        let target: Uri = url
            .parse()
            .map_err(|err| RegistryError::unknown(format!("invalid registry url {url}: {err}")))?;

        if target.authority().is_none() {
            return Err(RegistryError::unknown(format!("registry url {url} has no host")));
        }

        Ok(Self {
            client: Client::new(),
            target,
        })
    }

    fn target_uri(&self, uri: &Uri) -> Result<Uri, RegistryError> {
        let mut parts = self.target.clone().into_parts();
        parts.path_and_query = Some(
            uri.path_and_query()
                .cloned()
                .unwrap_or_else(|| PathAndQuery::from_static("/")),
        );

        Uri::from_parts(parts).map_err(|err| RegistryError::unknown(err.to_string()))
    }

    /// Forward the request to the backend and stream its response back.
    pub(crate) async fn forward(&self, req: Request<Body>) -> Result<Response, RegistryError> {
        let (parts, body) = req.into_parts();

        let mut outgoing = Request::new(body);
        *outgoing.method_mut() = parts.method;
        *outgoing.uri_mut() = self.target_uri(&parts.uri)?;
        *outgoing.headers_mut() = parts.headers;

        strip_hop_by_hop(outgoing.headers_mut());

        if let Some(authority) = self.target.authority() {
            let host = HeaderValue::from_str(authority.as_str())
                .map_err(|err| RegistryError::unknown(err.to_string()))?;
            outgoing.headers_mut().insert(header::HOST, host);
        }

        let response = self.client.request(outgoing).await.map_err(|err| {
            warn!(%err, "storage backend is unavailable");
            RegistryError::unknown(format!("storage backend is unavailable: {err}"))
        })?;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);

        Ok(Response::from_parts(parts, boxed(body)))
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Terminal handler of the v2 chain.
pub(crate) async fn handler(
    State(proxy): State<Proxy>,
    req: Request<Body>,
) -> Result<Response, RegistryError> {
    proxy.forward(req).await
}
