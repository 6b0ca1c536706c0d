use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("store document: {0}")]
    Document(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

#[derive(Error, Debug)]
pub enum RaceError {
    #[error("No participants uploaded yet")]
    EmptyRoster,

    #[error("No valid participants found in CSV")]
    NoValidParticipants,

    #[error("Invalid station: {0}")]
    InvalidStation(String),

    #[error("Invalid time format '{0}'. Use MM:SS")]
    InvalidTimeFormat(String),

    #[error("Unknown team mode: {0}")]
    InvalidMode(String),

    #[error("A team needs 1 to 3 members, got {0}")]
    InvalidTeamSize(usize),

    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    #[error("Team {0} not found")]
    TeamNotFound(u32),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Auth,
    Internal,
}

impl RaceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RaceError::EmptyRoster
            | RaceError::NoValidParticipants
            | RaceError::InvalidStation(_)
            | RaceError::InvalidTimeFormat(_)
            | RaceError::InvalidMode(_)
            | RaceError::InvalidTeamSize(_)
            | RaceError::MalformedUpload(_) => ErrorKind::Validation,
            RaceError::TeamNotFound(_) => ErrorKind::NotFound,
            RaceError::Auth(_) => ErrorKind::Auth,
            RaceError::Store(_) => ErrorKind::Internal,
        }
    }
}

impl IntoResponse for RaceError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Auth => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {self}");
        }

        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
