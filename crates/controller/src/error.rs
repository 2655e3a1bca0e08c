use db::DbErr;
use derive_more::{Display, Error, From};

use crate::{cache::CacheError, manifest::ManifestError};

/// Error kind, as reported to registry clients.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    NotFound,
    BadRequest,
    Unauthorized,
    Forbidden,
    Conflict,
    PreconditionFailed,
    ProjectPolicyViolation,
    UnsupportedMediaType,
    Unknown,
}

#[derive(Debug, Display, Error, From)]
pub enum Error {
    #[display(fmt = "{}", _0)]
    #[from(ignore)]
    NotFound(#[error(not(source))] String),

    #[display(fmt = "{}", _0)]
    #[from(ignore)]
    BadRequest(#[error(not(source))] String),

    #[display(fmt = "{}", _0)]
    #[from(ignore)]
    Unauthorized(#[error(not(source))] String),

    #[display(fmt = "{}", _0)]
    #[from(ignore)]
    Forbidden(#[error(not(source))] String),

    #[display(fmt = "{}", _0)]
    #[from(ignore)]
    Conflict(#[error(not(source))] String),

    #[display(fmt = "{}", _0)]
    #[from(ignore)]
    PreconditionFailed(#[error(not(source))] String),

    #[display(fmt = "{}", _0)]
    #[from(ignore)]
    ProjectPolicyViolation(#[error(not(source))] String),

    #[display(fmt = "{}", _0)]
    #[from(ignore)]
    UnsupportedMediaType(#[error(not(source))] String),

    #[display(fmt = "database error: {}", _0)]
    Database(DbErr),

    #[display(fmt = "cache error: {}", _0)]
    Cache(CacheError),

    Manifest(ManifestError),

    #[display(fmt = "{}", _0)]
    #[from(ignore)]
    Unknown(#[error(not(source))] String),
}

impl Error {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Get the kind of this error.
    pub fn kind(&self) -> Kind {
        match self {
            Error::NotFound(_) => Kind::NotFound,
            Error::BadRequest(_) => Kind::BadRequest,
            Error::Unauthorized(_) => Kind::Unauthorized,
            Error::Forbidden(_) => Kind::Forbidden,
            Error::Conflict(_) => Kind::Conflict,
            Error::PreconditionFailed(_) => Kind::PreconditionFailed,
            Error::ProjectPolicyViolation(_) => Kind::ProjectPolicyViolation,
            Error::UnsupportedMediaType(_) => Kind::UnsupportedMediaType,
            Error::Manifest(ManifestError::UnsupportedMediaType(_)) => Kind::UnsupportedMediaType,
            Error::Manifest(ManifestError::Malformed(_)) => Kind::BadRequest,
            Error::Database(_) | Error::Cache(_) | Error::Unknown(_) => Kind::Unknown,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == Kind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == Kind::Conflict
    }
}
