//! Vehicles and clients.

use api_types::{
    client::{ClientNew, ClientView},
    ledger::ReconcileResponse,
    vehicle::{MaintenanceUpdate, VehicleNew, VehicleView},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{ServerError, convert, server::ServerState, user};

pub async fn vehicle_new(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<VehicleNew>,
) -> Result<(StatusCode, Json<VehicleView>), ServerError> {
    let vehicle = state
        .engine
        .new_vehicle(&payload.make, &payload.model, &payload.plate, &user.username)
        .await?;
    Ok((StatusCode::CREATED, Json(convert::vehicle_view(&vehicle))))
}

pub async fn vehicle_list(
    Extension(_user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<VehicleView>>, ServerError> {
    let vehicles = state.engine.vehicles().await?;
    Ok(Json(vehicles.iter().map(convert::vehicle_view).collect()))
}

pub async fn vehicle_maintenance(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MaintenanceUpdate>,
) -> Result<Json<VehicleView>, ServerError> {
    let vehicle = state
        .engine
        .set_vehicle_maintenance(id, payload.in_maintenance, &user.username)
        .await?;
    Ok(Json(convert::vehicle_view(&vehicle)))
}

pub async fn client_new(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<ClientNew>,
) -> Result<(StatusCode, Json<ClientView>), ServerError> {
    let client = state
        .engine
        .new_client(
            convert::client_kind(payload.kind),
            payload.first_name.as_deref(),
            &payload.last_name,
            &payload.phone,
            &user.username,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(convert::client_view(&client))))
}

pub async fn client_get(
    Extension(_user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ClientView>, ServerError> {
    let client = state.engine.client(id).await?;
    Ok(Json(convert::client_view(&client)))
}

/// Recomputes every cached total from the ledger.
pub async fn reconcile(
    Extension(_user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<ReconcileResponse>, ServerError> {
    let report = state.engine.reconcile_all_ledger_caches().await?;
    Ok(Json(ReconcileResponse {
        checked: report.checked,
        corrected_reservations: report.corrected_reservations,
        corrected_rentals: report.corrected_rentals,
        drifted_totals: report.drifted_totals,
    }))
}
