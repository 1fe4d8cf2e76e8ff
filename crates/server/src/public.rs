//! Unauthenticated booking surface of the public site.

use api_types::{
    reservation::{PublicReservationCreated, PublicReservationNew},
    vehicle::{AvailabilityResponse, BookedPeriodView},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::TypedHeader;
use engine::{Booking, PublicBooking};
use uuid::Uuid;

use crate::{
    ServerError, convert,
    server::{ForwardedFor, ServerState},
};

/// Admission key used when the caller address is unknown.
const UNKNOWN_CALLER: &str = "unknown";

pub async fn reservation_new(
    forwarded: Option<TypedHeader<ForwardedFor>>,
    State(state): State<ServerState>,
    Json(payload): Json<PublicReservationNew>,
) -> Result<(StatusCode, Json<PublicReservationCreated>), ServerError> {
    let caller = forwarded
        .map(|TypedHeader(ForwardedFor(addr))| addr)
        .unwrap_or_else(|| UNKNOWN_CALLER.to_string());
    let mut booking = PublicBooking::new(
        payload.vehicle_id,
        convert::inline_client(payload.client),
        convert::utc(payload.period_start),
        convert::utc(payload.period_end),
        convert::rates(payload.rates),
        caller,
    );
    if let Some(total) = payload.total_minor {
        booking = booking.total(total);
    }

    let reservation = state
        .engine
        .create_reservation(Booking::Public(booking), engine::PUBLIC_ACTOR)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(PublicReservationCreated {
            id: reservation.id,
            status: reservation.status.as_str().to_string(),
            total_estimated_minor: reservation.total_estimated_minor,
        }),
    ))
}

pub async fn availability(
    State(state): State<ServerState>,
    Path(vehicle_id): Path<Uuid>,
) -> Result<Json<AvailabilityResponse>, ServerError> {
    let booked = state.engine.vehicle_availability(vehicle_id).await?;
    Ok(Json(AvailabilityResponse {
        vehicle_id,
        booked: booked
            .into_iter()
            .map(|period| BookedPeriodView {
                period_start: period.period_start,
                period_end: period.period_end,
                status: period.status.as_str().to_string(),
            })
            .collect(),
    }))
}
