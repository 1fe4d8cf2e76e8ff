use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod vehicle {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct VehicleNew {
        pub make: String,
        pub model: String,
        pub plate: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct VehicleView {
        pub id: Uuid,
        pub make: String,
        pub model: String,
        pub plate: String,
        /// `available`, `reserved`, `rented` or `in_maintenance`.
        pub status: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MaintenanceUpdate {
        pub in_maintenance: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BookedPeriodView {
        pub period_start: DateTime<Utc>,
        pub period_end: DateTime<Utc>,
        pub status: String,
    }

    /// Public availability of a vehicle: the periods it is already booked
    /// for. Reservation ids are not exposed.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct AvailabilityResponse {
        pub vehicle_id: Uuid,
        pub booked: Vec<BookedPeriodView>,
    }
}

pub mod client {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ClientKind {
        #[default]
        Individual,
        Company,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ClientNew {
        #[serde(default)]
        pub kind: ClientKind,
        pub first_name: Option<String>,
        pub last_name: String,
        pub phone: String,
    }

    /// Name and phone captured with a booking, before the client is
    /// registered.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct InlineClient {
        pub first_name: String,
        pub last_name: String,
        pub phone: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ClientView {
        pub id: Uuid,
        pub kind: ClientKind,
        pub first_name: Option<String>,
        pub last_name: String,
        pub phone: String,
    }
}

pub mod payment {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum PaymentMethod {
        #[default]
        Cash,
        Card,
        Transfer,
        Cheque,
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum PaymentCategory {
        #[default]
        Rental,
        Deposit,
        Supplement,
        Other,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum PaymentStatus {
        Unpaid,
        Partial,
        Paid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PaymentNew {
        pub amount_minor: i64,
        #[serde(default)]
        pub method: PaymentMethod,
        #[serde(default)]
        pub category: PaymentCategory,
        /// Record the payment as `pending` until it is completed.
        #[serde(default)]
        pub pending: bool,
        pub reference: Option<String>,
        pub note: Option<String>,
    }

    /// Agent-facing "mark as paid / partial / unpaid".
    #[derive(Debug, Serialize, Deserialize)]
    pub struct PaymentStatusUpdate {
        pub status: PaymentStatus,
        /// Required for `partial`; defaults to the remainder for `paid`.
        pub amount_minor: Option<i64>,
        pub method: Option<PaymentMethod>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PaymentView {
        pub id: Uuid,
        pub reservation_id: Option<Uuid>,
        pub rental_id: Option<Uuid>,
        pub amount_minor: i64,
        pub method: PaymentMethod,
        /// `completed`, `pending` or `voided`.
        pub status: String,
        pub category: PaymentCategory,
        pub reference: Option<String>,
        pub note: Option<String>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LedgerTotalsView {
        pub total_minor: i64,
        pub paid_minor: i64,
        pub pending_minor: i64,
        pub remaining_minor: i64,
        pub status: PaymentStatus,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PaymentListResponse {
        pub payments: Vec<PaymentView>,
        pub totals: LedgerTotalsView,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PaymentReceipt {
        pub payment: Option<PaymentView>,
        pub totals: LedgerTotalsView,
        pub reservation: super::reservation::ReservationView,
        pub rental: Option<super::rental::RentalView>,
    }
}

pub mod reservation {
    use super::*;
    use crate::{client::InlineClient, payment::PaymentMethod, payment::PaymentStatus};

    /// Price list of a booking, in minor units.
    #[derive(Clone, Copy, Debug, Serialize, Deserialize)]
    pub struct Rates {
        pub per_day_minor: i64,
        pub per_week_minor: Option<i64>,
        pub per_month_minor: Option<i64>,
    }

    /// Booking created by an agent. Either `client_id` or `client` is set.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReservationNew {
        pub vehicle_id: Uuid,
        pub client_id: Option<Uuid>,
        pub client: Option<InlineClient>,
        pub period_start: DateTime<FixedOffset>,
        pub period_end: DateTime<FixedOffset>,
        pub rates: Rates,
        /// Overrides the computed price.
        pub total_minor: Option<i64>,
        pub payment_method: Option<PaymentMethod>,
        /// Collected right away, as a completed payment.
        pub upfront_minor: Option<i64>,
    }

    /// Booking request from the public site.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct PublicReservationNew {
        pub vehicle_id: Uuid,
        pub client: InlineClient,
        pub period_start: DateTime<FixedOffset>,
        pub period_end: DateTime<FixedOffset>,
        pub rates: Rates,
        pub total_minor: Option<i64>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ReservationUpdate {
        pub vehicle_id: Option<Uuid>,
        pub period_start: Option<DateTime<FixedOffset>>,
        pub period_end: Option<DateTime<FixedOffset>>,
        pub rates: Option<Rates>,
        pub total_minor: Option<i64>,
        pub payment_method: Option<PaymentMethod>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ReservationList {
        /// `pending`, `confirmed`, `active`, `completed` or `cancelled`.
        pub status: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReservationView {
        pub id: Uuid,
        pub vehicle_id: Uuid,
        pub client_id: Option<Uuid>,
        pub client: Option<InlineClient>,
        pub period_start: DateTime<Utc>,
        pub period_end: DateTime<Utc>,
        pub rates: Rates,
        pub total_estimated_minor: i64,
        pub status: String,
        pub payment_status: PaymentStatus,
        pub amount_paid_minor: i64,
        pub amount_remaining_minor: i64,
        pub payment_method: PaymentMethod,
        pub channel: String,
        pub rental_id: Option<Uuid>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    /// Acknowledgement returned to the public site.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct PublicReservationCreated {
        pub id: Uuid,
        pub status: String,
        pub total_estimated_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReservationListResponse {
        pub reservations: Vec<ReservationView>,
    }
}

pub mod rental {
    use super::*;
    use crate::{payment::PaymentStatus, reservation::ReservationView};

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RentalExtend {
        pub new_end: DateTime<FixedOffset>,
        #[serde(default)]
        pub extra_minor: i64,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct RentalTerminate {
        pub actual_end: Option<DateTime<FixedOffset>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExtensionView {
        pub new_end: DateTime<Utc>,
        pub extra_amount_minor: i64,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RentalView {
        pub id: Uuid,
        pub reservation_id: Uuid,
        pub vehicle_id: Uuid,
        pub client_id: Uuid,
        pub status: String,
        pub period_start: DateTime<Utc>,
        pub planned_end: DateTime<Utc>,
        pub actual_end: Option<DateTime<Utc>>,
        pub extensions: Vec<ExtensionView>,
        pub total_amount_minor: i64,
        pub amount_paid_minor: i64,
        pub amount_remaining_minor: i64,
        pub payment_status: PaymentStatus,
        /// `generated` or `pending`.
        pub contract_status: String,
        pub contract_url: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RentalStarted {
        pub reservation: ReservationView,
        pub rental: RentalView,
        /// `false` when the rental already existed.
        pub created: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Termination {
        pub reservation: Option<ReservationView>,
        pub rental: Option<RentalView>,
        /// `false` when the rental was already completed.
        pub changed: bool,
    }
}

pub mod ledger {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReconcileResponse {
        pub checked: usize,
        pub corrected_reservations: Vec<Uuid>,
        pub corrected_rentals: Vec<Uuid>,
        pub drifted_totals: Vec<Uuid>,
    }
}
