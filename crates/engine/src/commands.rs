//! Command structs for engine operations.
//!
//! These types group parameters for write operations (booking, editing,
//! collecting payments), keeping call sites readable and avoiding long
//! argument lists.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    ClientRef, InlineClient, PaymentCategory, PaymentMethod, PaymentStatus, PaymentTarget, Rates,
};

/// A booking request, dispatched on its channel.
#[derive(Clone, Debug)]
pub enum Booking {
    Internal(InternalBooking),
    Public(PublicBooking),
}

/// Booking entered by an agent.
#[derive(Clone, Debug)]
pub struct InternalBooking {
    pub vehicle_id: Uuid,
    pub client: ClientRef,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub rates: Rates,
    pub total_minor: Option<i64>,
    pub payment_method: PaymentMethod,
    /// Amount collected at the counter when booking.
    pub upfront_minor: Option<i64>,
}

impl InternalBooking {
    #[must_use]
    pub fn new(
        vehicle_id: Uuid,
        client: ClientRef,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        rates: Rates,
    ) -> Self {
        Self {
            vehicle_id,
            client,
            period_start,
            period_end,
            rates,
            total_minor: None,
            payment_method: PaymentMethod::default(),
            upfront_minor: None,
        }
    }

    #[must_use]
    pub fn for_client(
        vehicle_id: Uuid,
        client_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        rates: Rates,
    ) -> Self {
        Self::new(
            vehicle_id,
            ClientRef::Registered { client_id },
            period_start,
            period_end,
            rates,
        )
    }

    #[must_use]
    pub fn total(mut self, total_minor: i64) -> Self {
        self.total_minor = Some(total_minor);
        self
    }

    #[must_use]
    pub fn payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = method;
        self
    }

    #[must_use]
    pub fn upfront(mut self, amount_minor: i64) -> Self {
        self.upfront_minor = Some(amount_minor);
        self
    }
}

/// Booking submitted through the public form.
#[derive(Clone, Debug)]
pub struct PublicBooking {
    pub vehicle_id: Uuid,
    pub client: InlineClient,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub rates: Rates,
    pub total_minor: Option<i64>,
    /// Caller address, used as the admission key.
    pub caller: String,
}

impl PublicBooking {
    #[must_use]
    pub fn new(
        vehicle_id: Uuid,
        client: InlineClient,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        rates: Rates,
        caller: impl Into<String>,
    ) -> Self {
        Self {
            vehicle_id,
            client,
            period_start,
            period_end,
            rates,
            total_minor: None,
            caller: caller.into(),
        }
    }

    #[must_use]
    pub fn total(mut self, total_minor: i64) -> Self {
        self.total_minor = Some(total_minor);
        self
    }
}

/// Partial update of a pending or confirmed reservation.
#[derive(Clone, Debug, Default)]
pub struct ReservationEdit {
    pub vehicle_id: Option<Uuid>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub rates: Option<Rates>,
    pub total_minor: Option<i64>,
    pub payment_method: Option<PaymentMethod>,
}

impl ReservationEdit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn vehicle_id(mut self, vehicle_id: Uuid) -> Self {
        self.vehicle_id = Some(vehicle_id);
        self
    }

    #[must_use]
    pub fn period_start(mut self, start: DateTime<Utc>) -> Self {
        self.period_start = Some(start);
        self
    }

    #[must_use]
    pub fn period_end(mut self, end: DateTime<Utc>) -> Self {
        self.period_end = Some(end);
        self
    }

    #[must_use]
    pub fn rates(mut self, rates: Rates) -> Self {
        self.rates = Some(rates);
        self
    }

    #[must_use]
    pub fn total(mut self, total_minor: i64) -> Self {
        self.total_minor = Some(total_minor);
        self
    }

    #[must_use]
    pub fn payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }
}

/// Collect money against a reservation or a rental.
#[derive(Clone, Debug)]
pub struct RecordPayment {
    pub target: PaymentTarget,
    pub amount_minor: i64,
    pub method: PaymentMethod,
    pub category: PaymentCategory,
    /// Record as `pending` (collection started, not settled yet).
    pub pending: bool,
    pub reference: Option<String>,
    pub note: Option<String>,
}

impl RecordPayment {
    #[must_use]
    pub fn new(target: PaymentTarget, amount_minor: i64) -> Self {
        Self {
            target,
            amount_minor,
            method: PaymentMethod::default(),
            category: PaymentCategory::default(),
            pending: false,
            reference: None,
            note: None,
        }
    }

    #[must_use]
    pub fn method(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn category(mut self, category: PaymentCategory) -> Self {
        self.category = category;
        self
    }

    #[must_use]
    pub fn pending(mut self) -> Self {
        self.pending = true;
        self
    }

    #[must_use]
    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Agent-facing "mark as paid / partial / unpaid" on a reservation.
#[derive(Clone, Debug)]
pub struct PaymentStatusChange {
    pub reservation_id: Uuid,
    pub status: PaymentStatus,
    /// Required for `partial`; defaults to the collectable remainder for
    /// `paid`; ignored for `unpaid`.
    pub amount_minor: Option<i64>,
    pub method: Option<PaymentMethod>,
}

impl PaymentStatusChange {
    #[must_use]
    pub fn new(reservation_id: Uuid, status: PaymentStatus) -> Self {
        Self {
            reservation_id,
            status,
            amount_minor: None,
            method: None,
        }
    }

    #[must_use]
    pub fn amount(mut self, amount_minor: i64) -> Self {
        self.amount_minor = Some(amount_minor);
        self
    }

    #[must_use]
    pub fn method(mut self, method: PaymentMethod) -> Self {
        self.method = Some(method);
        self
    }
}
