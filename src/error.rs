//! The crate level error type and its mapping onto HTTP responses.
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;

use crate::money::Money;
use crate::schemas::MemberId;

/// The errors that may occur while building expenses or serving requests.
///
/// The balance aggregator and the settlement matcher never fail, so every
/// variant here comes from expense validation or the service around it.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A monetary value was negative, not a number, or had sub-cent precision.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// An equal split was requested over zero members.
    #[error("cannot split an expense between {0} members")]
    InvalidMemberCount(usize),

    /// The custom split amounts do not add up to the expense total.
    #[error("custom splits add up to {actual} but the expense total is {expected}")]
    SplitMismatch { expected: Money, actual: Money },

    /// A payer or split referred to someone outside the group.
    #[error("{0} is not a member of the group")]
    UnknownMember(MemberId),

    /// The same member appears more than once in the splits of one expense.
    #[error("{0} appears more than once in the splits")]
    DuplicateSplit(MemberId),

    /// An expense has to be split between at least one member.
    #[error("an expense needs at least one split")]
    NoSplits,

    /// A required request field was missing or empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("{0} is already a member of the group")]
    DuplicateMember(MemberId),

    #[error("a group with the id {0} already exists")]
    GroupExists(String),

    /// The requested group could not be found.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The request carried no valid member credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// An unexpected error from the group store.
    ///
    /// The message is only logged on the server, clients get a generic
    /// internal server error.
    #[error("database error: {0}")]
    Database(String),
}

impl From<mongodb::error::Error> for Error {
    fn from(err: mongodb::error::Error) -> Self {
        Error::Database(err.to_string())
    }
}

impl From<bson::ser::Error> for Error {
    fn from(err: bson::ser::Error) -> Self {
        Error::Database(err.to_string())
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidAmount(_)
            | Error::InvalidMemberCount(_)
            | Error::SplitMismatch { .. }
            | Error::UnknownMember(_)
            | Error::DuplicateSplit(_)
            | Error::NoSplits
            | Error::MissingField(_) => StatusCode::BAD_REQUEST,
            Error::DuplicateMember(_) | Error::GroupExists(_) => StatusCode::CONFLICT,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            Error::Database(message) => {
                tracing::error!("Request failed with a database error: {message}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({ "error": message }))
    }
}
