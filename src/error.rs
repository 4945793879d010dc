use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use log::{error, warn};
use mongodb::error::Error as DbError;
use rocket::{http::Status, response::Responder};
use thiserror::Error;

use crate::model::{common::Identity, mongodb::Id};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Voting for meeting {0} is not open")]
    WindowClosed(Id),
    #[error("Voting for meeting {0} has not ended yet")]
    VotingNotEnded(Id),
    #[error("{identity} is not a participant of meeting {meeting}")]
    NotParticipant { meeting: Id, identity: Identity },
    #[error("{0} may not vote for themselves")]
    SelfVote(Identity),
    #[error("Invalid recurrence: {0}")]
    InvalidRecurrence(String),
    #[error("Invalid meeting: {0}")]
    InvalidMeeting(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Did the underlying persistence layer fail?
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Db(_) | Self::StoreUnavailable(_))
    }

    /// The HTTP status this error maps to.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::StoreUnavailable(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::WindowClosed(_) | Self::VotingNotEnded(_) => Status::Conflict,
            Self::NotParticipant { .. } | Self::SelfVote(_) | Self::Forbidden(_) => {
                Status::Forbidden
            }
            Self::InvalidRecurrence(_) | Self::InvalidMeeting(_) | Self::BadRequest(_) => {
                Status::BadRequest
            }
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::NotFound(_) => Status::NotFound,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status.class().is_server_error() {
            error!("{self}");
        } else {
            warn!("{self}");
        }
        Err(status)
    }
}
