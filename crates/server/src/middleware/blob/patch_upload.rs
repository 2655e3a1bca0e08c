use axum::{
    body::Body,
    extract::State,
    http::{header, Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::{
    error::RegistryError,
    middleware::request_info::{ArtifactInfo, Endpoint},
    state::AppState,
};

/// Parse the number of accepted bytes from a `Range: 0-<end>` header.
///
/// The end offset is inclusive.
fn accepted_size(range: &str) -> Result<i64, RegistryError> {
    let invalid = || RegistryError::unknown(format!("invalid upload range {range}"));

    let range = range.trim().trim_start_matches("bytes=");
    let (start, end) = range.split_once('-').ok_or_else(invalid)?;

    start.parse::<i64>().map_err(|_| invalid())?;
    let end: i64 = end.parse().map_err(|_| invalid())?;

    if end < 0 {
        return Err(invalid());
    }

    Ok(if end > 0 { end + 1 } else { 0 })
}

/// Remember how many bytes the backend accepted for the upload session.
pub(crate) async fn patch_blob_upload(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, RegistryError> {
    let Some(session_id) = ArtifactInfo::matching(&req, Endpoint::BlobUpload, &Method::PATCH)
        .and_then(|info| info.session_id.clone())
    else {
        return Ok(next.run(req).await);
    };

    let response = next.run(req).await;

    if response.status() != StatusCode::ACCEPTED {
        return Ok(response);
    }

    let range = response
        .headers()
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| RegistryError::unknown("backend response has no upload range"))?;

    let size = accepted_size(range)?;
    state.blobs.set_accepted_blob_size(&session_id, size).await?;

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::accepted_size;

    #[test]
    fn ranges() {
        assert_eq!(accepted_size("0-1023").unwrap(), 1024);
        assert_eq!(accepted_size("0-0").unwrap(), 0);
        assert_eq!(accepted_size("bytes=0-9").unwrap(), 10);
        assert!(accepted_size("0").is_err());
        assert!(accepted_size("0-abc").is_err());
        assert!(accepted_size("0--1").is_err());
    }
}
