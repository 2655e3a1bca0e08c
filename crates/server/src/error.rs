//! Registry error envelope.
//!
//! Every rejected request is answered with the distribution error format:
//! `{"errors": [{"code": ..., "message": ..., "detail": ...}]}`.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use controller::{cache::CacheError, manifest::ManifestError, Error, Kind};
use db::DbErr;
use derive_more::{Display, From};
use serde::Serialize;
use tracing::error;

#[derive(Debug, Display, From)]
pub(crate) struct RegistryError(Error);

impl RegistryError {
    pub(crate) fn kind(&self) -> Kind {
        self.0.kind()
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self(Error::not_found(message))
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self(Error::bad_request(message))
    }

    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self(Error::Unauthorized(message.into()))
    }

    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        Self(Error::Forbidden(message.into()))
    }

    pub(crate) fn policy_violation(message: impl Into<String>) -> Self {
        Self(Error::ProjectPolicyViolation(message.into()))
    }

    pub(crate) fn unknown(message: impl Into<String>) -> Self {
        Self(Error::Unknown(message.into()))
    }
}

impl From<DbErr> for RegistryError {
    fn from(err: DbErr) -> Self {
        Self(err.into())
    }
}

impl From<CacheError> for RegistryError {
    fn from(err: CacheError) -> Self {
        Self(err.into())
    }
}

impl From<ManifestError> for RegistryError {
    fn from(err: ManifestError) -> Self {
        Self(err.into())
    }
}

/// HTTP status and distribution error code of an error kind.
fn status_and_code(kind: Kind) -> (StatusCode, &'static str) {
    match kind {
        Kind::BadRequest => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
        Kind::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        Kind::Forbidden => (StatusCode::FORBIDDEN, "DENIED"),
        Kind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        Kind::Conflict => (StatusCode::CONFLICT, "CONFLICT"),
        Kind::PreconditionFailed => (StatusCode::PRECONDITION_FAILED, "PRECONDITION_FAILED"),
        Kind::ProjectPolicyViolation => {
            (StatusCode::PRECONDITION_FAILED, "PROJECT_POLICY_VIOLATION")
        }
        Kind::UnsupportedMediaType => {
            (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_MEDIA_TYPE")
        }
        Kind::Unknown => (StatusCode::INTERNAL_SERVER_ERROR, "UNKNOWN"),
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    detail: String,
}

#[derive(Serialize)]
struct Envelope {
    errors: [ErrorBody; 1],
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let (status, code) = status_and_code(self.kind());

        let message = if status.is_server_error() {
            error!(error = %self.0, "unable to handle registry request");
            String::from("internal server error")
        } else {
            self.0.to_string()
        };

        let body = Envelope {
            errors: [ErrorBody {
                code,
                detail: message.clone(),
                message,
            }],
        };

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(r#"Basic realm="registry""#),
            );
        }

        response
    }
}
