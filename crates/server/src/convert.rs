//! Mapping between engine values and their wire representation.

use api_types::{
    client::{self as api_client, ClientView},
    payment::{self as api_payment, LedgerTotalsView, PaymentView},
    rental::{ExtensionView, RentalView},
    reservation::{self as api_reservation, ReservationView},
    vehicle::VehicleView,
};
use chrono::{DateTime, FixedOffset, Utc};

pub(crate) fn utc(value: DateTime<FixedOffset>) -> DateTime<Utc> {
    value.with_timezone(&Utc)
}

pub(crate) fn method(value: api_payment::PaymentMethod) -> engine::PaymentMethod {
    match value {
        api_payment::PaymentMethod::Cash => engine::PaymentMethod::Cash,
        api_payment::PaymentMethod::Card => engine::PaymentMethod::Card,
        api_payment::PaymentMethod::Transfer => engine::PaymentMethod::Transfer,
        api_payment::PaymentMethod::Cheque => engine::PaymentMethod::Cheque,
    }
}

fn method_view(value: engine::PaymentMethod) -> api_payment::PaymentMethod {
    match value {
        engine::PaymentMethod::Cash => api_payment::PaymentMethod::Cash,
        engine::PaymentMethod::Card => api_payment::PaymentMethod::Card,
        engine::PaymentMethod::Transfer => api_payment::PaymentMethod::Transfer,
        engine::PaymentMethod::Cheque => api_payment::PaymentMethod::Cheque,
    }
}

pub(crate) fn category(value: api_payment::PaymentCategory) -> engine::PaymentCategory {
    match value {
        api_payment::PaymentCategory::Rental => engine::PaymentCategory::Rental,
        api_payment::PaymentCategory::Deposit => engine::PaymentCategory::Deposit,
        api_payment::PaymentCategory::Supplement => engine::PaymentCategory::Supplement,
        api_payment::PaymentCategory::Other => engine::PaymentCategory::Other,
    }
}

fn category_view(value: engine::PaymentCategory) -> api_payment::PaymentCategory {
    match value {
        engine::PaymentCategory::Rental => api_payment::PaymentCategory::Rental,
        engine::PaymentCategory::Deposit => api_payment::PaymentCategory::Deposit,
        engine::PaymentCategory::Supplement => api_payment::PaymentCategory::Supplement,
        engine::PaymentCategory::Other => api_payment::PaymentCategory::Other,
    }
}

pub(crate) fn payment_status(value: api_payment::PaymentStatus) -> engine::PaymentStatus {
    match value {
        api_payment::PaymentStatus::Unpaid => engine::PaymentStatus::Unpaid,
        api_payment::PaymentStatus::Partial => engine::PaymentStatus::Partial,
        api_payment::PaymentStatus::Paid => engine::PaymentStatus::Paid,
    }
}

fn payment_status_view(value: engine::PaymentStatus) -> api_payment::PaymentStatus {
    match value {
        engine::PaymentStatus::Unpaid => api_payment::PaymentStatus::Unpaid,
        engine::PaymentStatus::Partial => api_payment::PaymentStatus::Partial,
        engine::PaymentStatus::Paid => api_payment::PaymentStatus::Paid,
    }
}

pub(crate) fn client_kind(value: api_client::ClientKind) -> engine::ClientKind {
    match value {
        api_client::ClientKind::Individual => engine::ClientKind::Individual,
        api_client::ClientKind::Company => engine::ClientKind::Company,
    }
}

pub(crate) fn rates(value: api_reservation::Rates) -> engine::Rates {
    engine::Rates {
        per_day_minor: value.per_day_minor,
        per_week_minor: value.per_week_minor,
        per_month_minor: value.per_month_minor,
    }
}

pub(crate) fn inline_client(value: api_client::InlineClient) -> engine::InlineClient {
    engine::InlineClient::new(value.first_name, value.last_name, value.phone)
}

pub(crate) fn vehicle_view(vehicle: &engine::Vehicle) -> VehicleView {
    VehicleView {
        id: vehicle.id,
        make: vehicle.make.clone(),
        model: vehicle.model.clone(),
        plate: vehicle.plate.clone(),
        status: vehicle.status.as_str().to_string(),
    }
}

pub(crate) fn client_view(client: &engine::Client) -> ClientView {
    ClientView {
        id: client.id,
        kind: match client.kind {
            engine::ClientKind::Individual => api_client::ClientKind::Individual,
            engine::ClientKind::Company => api_client::ClientKind::Company,
        },
        first_name: client.first_name.clone(),
        last_name: client.last_name.clone(),
        phone: client.phone.clone(),
    }
}

pub(crate) fn reservation_view(reservation: &engine::Reservation) -> ReservationView {
    let client = reservation
        .inline_client()
        .map(|inline| api_client::InlineClient {
            first_name: inline.first_name.clone(),
            last_name: inline.last_name.clone(),
            phone: inline.phone.clone(),
        });
    ReservationView {
        id: reservation.id,
        vehicle_id: reservation.vehicle_id,
        client_id: reservation.client_id(),
        client,
        period_start: reservation.period_start,
        period_end: reservation.period_end,
        rates: api_reservation::Rates {
            per_day_minor: reservation.rates.per_day_minor,
            per_week_minor: reservation.rates.per_week_minor,
            per_month_minor: reservation.rates.per_month_minor,
        },
        total_estimated_minor: reservation.total_estimated_minor,
        status: reservation.status.as_str().to_string(),
        payment_status: payment_status_view(reservation.payment_status),
        amount_paid_minor: reservation.amount_paid_minor,
        amount_remaining_minor: reservation.amount_remaining_minor,
        payment_method: method_view(reservation.payment_method),
        channel: reservation.channel.as_str().to_string(),
        rental_id: reservation.rental_id,
        created_at: reservation.created_at,
        updated_at: reservation.updated_at,
    }
}

pub(crate) fn rental_view(rental: &engine::Rental) -> RentalView {
    RentalView {
        id: rental.id,
        reservation_id: rental.reservation_id,
        vehicle_id: rental.vehicle_id,
        client_id: rental.client_id,
        status: rental.status.as_str().to_string(),
        period_start: rental.period_start,
        planned_end: rental.planned_end,
        actual_end: rental.actual_end,
        extensions: rental
            .extensions
            .iter()
            .map(|extension| ExtensionView {
                new_end: extension.new_end,
                extra_amount_minor: extension.extra_amount_minor,
                created_at: extension.created_at,
            })
            .collect(),
        total_amount_minor: rental.total_amount_minor,
        amount_paid_minor: rental.amount_paid_minor,
        amount_remaining_minor: rental.amount_remaining_minor,
        payment_status: payment_status_view(rental.payment_status),
        contract_status: rental.contract_status.as_str().to_string(),
        contract_url: rental.contract_url.clone(),
    }
}

pub(crate) fn payment_view(payment: &engine::Payment) -> PaymentView {
    PaymentView {
        id: payment.id,
        reservation_id: payment.reservation_id,
        rental_id: payment.rental_id,
        amount_minor: payment.amount_minor,
        method: method_view(payment.method),
        status: payment.status.as_str().to_string(),
        category: category_view(payment.category),
        reference: payment.reference.clone(),
        note: payment.note.clone(),
        created_at: payment.created_at,
    }
}

pub(crate) fn totals_view(totals: &engine::LedgerTotals) -> LedgerTotalsView {
    LedgerTotalsView {
        total_minor: totals.total_minor,
        paid_minor: totals.paid_minor,
        pending_minor: totals.pending_minor,
        remaining_minor: totals.remaining_minor,
        status: payment_status_view(totals.status),
    }
}

pub(crate) fn receipt_view(receipt: &engine::PaymentReceipt) -> api_payment::PaymentReceipt {
    api_payment::PaymentReceipt {
        payment: receipt.payment.as_ref().map(payment_view),
        totals: totals_view(&receipt.totals),
        reservation: reservation_view(&receipt.reservation),
        rental: receipt.rental.as_ref().map(rental_view),
    }
}

pub(crate) fn termination_view(termination: &engine::Termination) -> api_types::rental::Termination {
    api_types::rental::Termination {
        reservation: termination.reservation.as_ref().map(reservation_view),
        rental: termination.rental.as_ref().map(rental_view),
        changed: termination.changed,
    }
}
