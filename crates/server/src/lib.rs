use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{ForwardedFor, ServerState, router, run_with_listener};

mod catalog;
mod convert;
mod payments;
mod public;
mod rentals;
mod reservations;
mod server;
mod user;

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::PreconditionFailed { .. }
        | EngineError::TargetClosed(_)
        | EngineError::AlreadyCompleted(_)
        | EngineError::Conflict(_) => StatusCode::CONFLICT,
        EngineError::InvalidAmount(_)
        | EngineError::OverpaymentAttempt(_)
        | EngineError::MissingClient(_)
        | EngineError::InvalidPeriod(_)
        | EngineError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
        EngineError::Collaborator(_) => StatusCode::BAD_GATEWAY,
        EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        EngineError::TooManyRequests(_) => "too many requests, retry later".to_string(),
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), message_for_engine_error(err)),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
