//! Error taxonomy shared by every core operation.
//!
//! Expected outcomes such as "not found" or "access denied" are regular
//! variants, never panics. Store failures are carried through unchanged.

use crate::store::StoreError;

/// Errors surfaced by the tree, rights, account and session operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Resource absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Target already resolves to a resource
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Rights check failed
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Parent missing or malformed path
    #[error("bad path: {0}")]
    BadPath(String),

    /// Underlying store call failed
    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    /// Unknown user or wrong password, deliberately indistinguishable
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Session token unknown, expired or logged out
    #[error("session expired")]
    SessionExpired,
}

/// Flat error kind, translatable to a transport-level response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    AccessDenied,
    BadPath,
    StoreFailure,
    InvalidCredentials,
    SessionExpired,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::AccessDenied(_) => ErrorKind::AccessDenied,
            Error::BadPath(_) => ErrorKind::BadPath,
            Error::Store(_) => ErrorKind::StoreFailure,
            Error::InvalidCredentials => ErrorKind::InvalidCredentials,
            Error::SessionExpired => ErrorKind::SessionExpired,
        }
    }

    /// Uniqueness violations reported by a store surface as `AlreadyExists`
    pub(crate) fn from_insert(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(what) => Error::AlreadyExists(what),
            other => Error::Store(other),
        }
    }
}

impl From<crate::crypto::CryptoError> for Error {
    fn from(err: crate::crypto::CryptoError) -> Self {
        Error::Store(StoreError::Backend(err.into()))
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::AlreadyExists => "AlreadyExists",
            ErrorKind::AccessDenied => "AccessDenied",
            ErrorKind::BadPath => "BadPath",
            ErrorKind::StoreFailure => "StoreFailure",
            ErrorKind::InvalidCredentials => "InvalidCredentials",
            ErrorKind::SessionExpired => "SessionExpired",
        };
        write!(f, "{}", s)
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
