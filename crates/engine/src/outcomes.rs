//! Values returned by engine transitions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{LedgerTotals, Payment, Rental, Reservation};

/// Result of `start_rental`. `created` is `false` when the rental already
/// existed and was returned as is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalStart {
    pub reservation: Reservation,
    pub rental: Rental,
    pub created: bool,
}

/// Result of ending a reservation or terminating a rental. `changed` is
/// `false` for a repeated termination, which writes nothing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Termination {
    pub reservation: Option<Reservation>,
    pub rental: Option<Rental>,
    pub changed: bool,
}

/// A ledger write and the refreshed records it touched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    /// `None` when the change did not move money (e.g. marking `unpaid`).
    pub payment: Option<Payment>,
    /// Totals of the target the caller addressed.
    pub totals: LedgerTotals,
    pub reservation: Reservation,
    pub rental: Option<Rental>,
}

/// Cached totals found out of line with the ledger and corrected.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub checked: usize,
    pub corrected_reservations: Vec<Uuid>,
    pub corrected_rentals: Vec<Uuid>,
    /// Rentals whose amount due differed from the start estimate plus
    /// extensions.
    pub drifted_totals: Vec<Uuid>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.corrected_reservations.is_empty()
            && self.corrected_rentals.is_empty()
            && self.drifted_totals.is_empty()
    }

    pub(crate) fn merge(&mut self, other: ReconcileReport) {
        self.checked += other.checked;
        self.corrected_reservations
            .extend(other.corrected_reservations);
        self.corrected_rentals.extend(other.corrected_rentals);
        self.drifted_totals.extend(other.drifted_totals);
    }
}

/// One booked period of a vehicle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedPeriod {
    pub reservation_id: Uuid,
    pub period_start: chrono::DateTime<chrono::Utc>,
    pub period_end: chrono::DateTime<chrono::Utc>,
    pub status: crate::ReservationStatus,
}
