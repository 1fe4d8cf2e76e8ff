//! Reservation API endpoints.

use api_types::reservation::{
    ReservationList, ReservationListResponse, ReservationNew, ReservationUpdate, ReservationView,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use engine::{Booking, ClientRef, InternalBooking, ReservationEdit, ReservationStatus};
use uuid::Uuid;

use crate::{ServerError, convert, server::ServerState, user};

pub async fn create(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<ReservationNew>,
) -> Result<(StatusCode, Json<ReservationView>), ServerError> {
    let client = match (payload.client_id, payload.client) {
        (Some(client_id), None) => ClientRef::Registered { client_id },
        (None, Some(inline)) => ClientRef::Inline(convert::inline_client(inline)),
        _ => {
            return Err(ServerError::Generic(
                "exactly one of client_id and client is required".to_string(),
            ));
        }
    };
    let mut booking = InternalBooking::new(
        payload.vehicle_id,
        client,
        convert::utc(payload.period_start),
        convert::utc(payload.period_end),
        convert::rates(payload.rates),
    );
    if let Some(total) = payload.total_minor {
        booking = booking.total(total);
    }
    if let Some(method) = payload.payment_method {
        booking = booking.payment_method(convert::method(method));
    }
    if let Some(upfront) = payload.upfront_minor {
        booking = booking.upfront(upfront);
    }

    let reservation = state
        .engine
        .create_reservation(Booking::Internal(booking), &user.username)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(convert::reservation_view(&reservation)),
    ))
}

pub async fn list(
    Extension(_user): Extension<user::Model>,
    State(state): State<ServerState>,
    Query(query): Query<ReservationList>,
) -> Result<Json<ReservationListResponse>, ServerError> {
    let status = query
        .status
        .as_deref()
        .map(ReservationStatus::try_from)
        .transpose()?;
    let reservations = state.engine.reservations(status).await?;
    Ok(Json(ReservationListResponse {
        reservations: reservations.iter().map(convert::reservation_view).collect(),
    }))
}

pub async fn get(
    Extension(_user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationView>, ServerError> {
    let reservation = state.engine.reservation(id).await?;
    Ok(Json(convert::reservation_view(&reservation)))
}

pub async fn update(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReservationUpdate>,
) -> Result<Json<ReservationView>, ServerError> {
    let mut edit = ReservationEdit::new();
    if let Some(vehicle_id) = payload.vehicle_id {
        edit = edit.vehicle_id(vehicle_id);
    }
    if let Some(start) = payload.period_start {
        edit = edit.period_start(convert::utc(start));
    }
    if let Some(end) = payload.period_end {
        edit = edit.period_end(convert::utc(end));
    }
    if let Some(rates) = payload.rates {
        edit = edit.rates(convert::rates(rates));
    }
    if let Some(total) = payload.total_minor {
        edit = edit.total(total);
    }
    if let Some(method) = payload.payment_method {
        edit = edit.payment_method(convert::method(method));
    }

    let reservation = state
        .engine
        .edit_reservation(id, edit, &user.username)
        .await?;
    Ok(Json(convert::reservation_view(&reservation)))
}

pub async fn accept(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationView>, ServerError> {
    let reservation = state.engine.accept_reservation(id, &user.username).await?;
    Ok(Json(convert::reservation_view(&reservation)))
}

pub async fn reject(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationView>, ServerError> {
    let reservation = state.engine.reject_reservation(id, &user.username).await?;
    Ok(Json(convert::reservation_view(&reservation)))
}

pub async fn end(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<api_types::rental::Termination>, ServerError> {
    let termination = state.engine.end_reservation(id, &user.username).await?;
    Ok(Json(convert::termination_view(&termination)))
}
