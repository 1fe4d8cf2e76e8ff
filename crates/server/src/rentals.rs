//! Rental API endpoints.

use api_types::rental::{RentalExtend, RentalStarted, RentalTerminate, RentalView, Termination};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{ServerError, convert, server::ServerState, user};

/// Starts the rental of a confirmed reservation. Answers `201` when the
/// rental was opened and `200` when it already existed.
pub async fn start(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(reservation_id): Path<Uuid>,
) -> Result<(StatusCode, Json<RentalStarted>), ServerError> {
    let start = state
        .engine
        .start_rental(reservation_id, &user.username)
        .await?;
    let status = if start.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(RentalStarted {
            reservation: convert::reservation_view(&start.reservation),
            rental: convert::rental_view(&start.rental),
            created: start.created,
        }),
    ))
}

pub async fn get(
    Extension(_user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RentalView>, ServerError> {
    let rental = state.engine.rental(id).await?;
    Ok(Json(convert::rental_view(&rental)))
}

pub async fn extend(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RentalExtend>,
) -> Result<Json<RentalView>, ServerError> {
    let rental = state
        .engine
        .extend_rental(
            id,
            convert::utc(payload.new_end),
            payload.extra_minor,
            &user.username,
        )
        .await?;
    Ok(Json(convert::rental_view(&rental)))
}

pub async fn terminate(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    payload: Option<Json<RentalTerminate>>,
) -> Result<Json<Termination>, ServerError> {
    let actual_end = payload
        .and_then(|Json(payload)| payload.actual_end)
        .map(convert::utc);
    let termination = state
        .engine
        .terminate_rental(id, actual_end, &user.username)
        .await?;
    Ok(Json(convert::termination_view(&termination)))
}

/// Re-issues a contract left pending at start.
pub async fn contract(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RentalView>, ServerError> {
    let rental = state.engine.retry_contract(id, &user.username).await?;
    Ok(Json(convert::rental_view(&rental)))
}
