//! Payment ledger endpoints.

use api_types::payment::{PaymentListResponse, PaymentNew, PaymentReceipt, PaymentStatusUpdate};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{PaymentStatusChange, PaymentTarget, RecordPayment};
use uuid::Uuid;

use crate::{ServerError, convert, server::ServerState, user};

fn record_command(target: PaymentTarget, payload: PaymentNew) -> RecordPayment {
    let mut command = RecordPayment::new(target, payload.amount_minor)
        .method(convert::method(payload.method))
        .category(convert::category(payload.category));
    if payload.pending {
        command = command.pending();
    }
    if let Some(reference) = payload.reference {
        command = command.reference(reference);
    }
    if let Some(note) = payload.note {
        command = command.note(note);
    }
    command
}

async fn record(
    state: &ServerState,
    user: &user::Model,
    target: PaymentTarget,
    payload: PaymentNew,
) -> Result<(StatusCode, Json<PaymentReceipt>), ServerError> {
    let receipt = state
        .engine
        .record_payment(record_command(target, payload), &user.username)
        .await?;
    Ok((StatusCode::CREATED, Json(convert::receipt_view(&receipt))))
}

pub async fn reservation_new(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PaymentNew>,
) -> Result<(StatusCode, Json<PaymentReceipt>), ServerError> {
    record(&state, &user, PaymentTarget::Reservation(id), payload).await
}

pub async fn rental_new(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PaymentNew>,
) -> Result<(StatusCode, Json<PaymentReceipt>), ServerError> {
    record(&state, &user, PaymentTarget::Rental(id), payload).await
}

pub async fn reservation_list(
    Extension(_user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentListResponse>, ServerError> {
    let target = PaymentTarget::Reservation(id);
    let payments = state.engine.payments(target).await?;
    let totals = state.engine.ledger_totals(target).await?;
    Ok(Json(PaymentListResponse {
        payments: payments.iter().map(convert::payment_view).collect(),
        totals: convert::totals_view(&totals),
    }))
}

pub async fn status_update(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PaymentStatusUpdate>,
) -> Result<Json<PaymentReceipt>, ServerError> {
    let mut change = PaymentStatusChange::new(id, convert::payment_status(payload.status));
    if let Some(amount) = payload.amount_minor {
        change = change.amount(amount);
    }
    if let Some(method) = payload.method {
        change = change.method(convert::method(method));
    }
    let receipt = state
        .engine
        .set_payment_status(change, &user.username)
        .await?;
    Ok(Json(convert::receipt_view(&receipt)))
}

pub async fn complete(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentReceipt>, ServerError> {
    let receipt = state
        .engine
        .complete_pending_payment(id, &user.username)
        .await?;
    Ok(Json(convert::receipt_view(&receipt)))
}

pub async fn void(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentReceipt>, ServerError> {
    let receipt = state
        .engine
        .void_pending_payment(id, &user.username)
        .await?;
    Ok(Json(convert::receipt_view(&receipt)))
}
