//! Payment ledger primitives.
//!
//! A `Payment` is an append-only money movement attached to a reservation, a
//! rental, or both once the rental exists. Paid and remaining amounts are
//! always derived from the `completed` rows; the cached copies on
//! reservations and rentals are refreshed from [`LedgerTotals`].

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, MoneyCents, ResultEngine,
    util::{parse_optional_uuid, parse_uuid},
};

/// What a payment is collected against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PaymentTarget {
    Reservation(Uuid),
    Rental(Uuid),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Transfer,
    Cheque,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Transfer => "transfer",
            Self::Cheque => "cheque",
        }
    }
}

impl TryFrom<&str> for PaymentMethod {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "cash" => Ok(Self::Cash),
            "card" => Ok(Self::Card),
            "transfer" => Ok(Self::Transfer),
            "cheque" => Ok(Self::Cheque),
            other => Err(EngineError::InvalidInput(format!(
                "invalid payment method: {other}"
            ))),
        }
    }
}

/// Lifecycle of a single ledger row. Only `pending` rows ever change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRecordStatus {
    Completed,
    Pending,
    Voided,
}

impl PaymentRecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Pending => "pending",
            Self::Voided => "voided",
        }
    }
}

impl TryFrom<&str> for PaymentRecordStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "completed" => Ok(Self::Completed),
            "pending" => Ok(Self::Pending),
            "voided" => Ok(Self::Voided),
            other => Err(EngineError::InvalidInput(format!(
                "invalid payment status: {other}"
            ))),
        }
    }
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

impl PaymentCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rental => "rental",
            Self::Deposit => "deposit",
            Self::Supplement => "supplement",
            Self::Other => "other",
        }
    }
}

impl TryFrom<&str> for PaymentCategory {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "rental" => Ok(Self::Rental),
            "deposit" => Ok(Self::Deposit),
            "supplement" => Ok(Self::Supplement),
            "other" => Ok(Self::Other),
            other => Err(EngineError::InvalidInput(format!(
                "invalid payment category: {other}"
            ))),
        }
    }
}

/// Aggregate collection status shared by reservations and rentals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Partial => "partial",
            Self::Paid => "paid",
        }
    }

    /// Derives the status from a total and the amount collected so far.
    ///
    /// A zero total with nothing collected stays `unpaid`.
    pub fn derive(total_minor: i64, paid_minor: i64) -> Self {
        let remaining = total_minor - paid_minor;
        if remaining <= 0 && (total_minor > 0 || paid_minor > 0) {
            Self::Paid
        } else if paid_minor > 0 {
            Self::Partial
        } else {
            Self::Unpaid
        }
    }
}

impl TryFrom<&str> for PaymentStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "unpaid" => Ok(Self::Unpaid),
            "partial" => Ok(Self::Partial),
            "paid" => Ok(Self::Paid),
            other => Err(EngineError::InvalidInput(format!(
                "invalid payment status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub reservation_id: Option<Uuid>,
    pub rental_id: Option<Uuid>,
    pub amount_minor: i64,
    pub method: PaymentMethod,
    pub status: PaymentRecordStatus,
    pub category: PaymentCategory,
    pub reference: Option<String>,
    pub note: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn new(
        reservation_id: Option<Uuid>,
        rental_id: Option<Uuid>,
        amount_minor: i64,
        method: PaymentMethod,
        status: PaymentRecordStatus,
        category: PaymentCategory,
    ) -> ResultEngine<Self> {
        if amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(
                "amount_minor must be > 0".to_string(),
            ));
        }
        if reservation_id.is_none() && rental_id.is_none() {
            return Err(EngineError::InvalidInput(
                "payment must reference a reservation or a rental".to_string(),
            ));
        }
        if status == PaymentRecordStatus::Voided {
            return Err(EngineError::InvalidInput(
                "payments cannot be recorded as voided".to_string(),
            ));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            reservation_id,
            rental_id,
            amount_minor,
            method,
            status,
            category,
            reference: None,
            note: None,
            created_by: None,
            created_at: now,
            settled_at: (status == PaymentRecordStatus::Completed).then_some(now),
        })
    }

    pub fn is_completed(&self) -> bool {
        self.status == PaymentRecordStatus::Completed
    }

    pub fn is_pending(&self) -> bool {
        self.status == PaymentRecordStatus::Pending
    }

    /// Settles a pending payment.
    pub fn complete(&mut self, at: DateTime<Utc>) -> ResultEngine<()> {
        self.ensure_pending("complete")?;
        self.status = PaymentRecordStatus::Completed;
        self.settled_at = Some(at);
        Ok(())
    }

    /// Cancels a pending payment. Completed payments are immutable.
    pub fn void(&mut self, at: DateTime<Utc>) -> ResultEngine<()> {
        self.ensure_pending("void")?;
        self.status = PaymentRecordStatus::Voided;
        self.settled_at = Some(at);
        Ok(())
    }

    fn ensure_pending(&self, action: &'static str) -> ResultEngine<()> {
        if !self.is_pending() {
            return Err(EngineError::precondition(
                "payment",
                self.id,
                action,
                PaymentRecordStatus::Pending.as_str(),
                self.status.as_str(),
            ));
        }
        Ok(())
    }
}

/// Ledger view of one payment target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub total_minor: i64,
    /// Sum of `completed` payments.
    pub paid_minor: i64,
    /// Sum of `pending` payments, not yet counted as paid.
    pub pending_minor: i64,
    pub remaining_minor: i64,
    pub status: PaymentStatus,
}

impl LedgerTotals {
    /// Folds the payments of a target against its total.
    pub fn compute<'a>(
        total_minor: i64,
        payments: impl IntoIterator<Item = &'a Payment>,
    ) -> ResultEngine<Self> {
        let mut paid = MoneyCents::ZERO;
        let mut pending = MoneyCents::ZERO;
        for payment in payments {
            match payment.status {
                PaymentRecordStatus::Completed => {
                    paid = paid.try_add(MoneyCents::new(payment.amount_minor))?;
                }
                PaymentRecordStatus::Pending => {
                    pending = pending.try_add(MoneyCents::new(payment.amount_minor))?;
                }
                PaymentRecordStatus::Voided => {}
            }
        }
        let paid_minor = paid.cents();
        Ok(Self {
            total_minor,
            paid_minor,
            pending_minor: pending.cents(),
            remaining_minor: total_minor - paid_minor,
            status: PaymentStatus::derive(total_minor, paid_minor),
        })
    }

    /// Amount that can still be collected without exceeding the total,
    /// counting pending collections as already spoken for.
    pub fn collectable_minor(&self) -> i64 {
        (self.remaining_minor - self.pending_minor).max(0)
    }

    pub(crate) fn ensure_fits(&self, amount_minor: i64, label: &str) -> ResultEngine<()> {
        if amount_minor > self.collectable_minor() {
            return Err(EngineError::OverpaymentAttempt(format!(
                "{amount_minor} exceeds the {} still collectable on {label}",
                self.collectable_minor()
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub reservation_id: Option<String>,
    pub rental_id: Option<String>,
    pub amount_minor: i64,
    pub method: String,
    pub status: String,
    pub category: String,
    pub reference: Option<String>,
    pub note: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTimeUtc,
    pub settled_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Payment> for ActiveModel {
    fn from(payment: &Payment) -> Self {
        Self {
            id: ActiveValue::Set(payment.id.to_string()),
            reservation_id: ActiveValue::Set(payment.reservation_id.map(|id| id.to_string())),
            rental_id: ActiveValue::Set(payment.rental_id.map(|id| id.to_string())),
            amount_minor: ActiveValue::Set(payment.amount_minor),
            method: ActiveValue::Set(payment.method.as_str().to_string()),
            status: ActiveValue::Set(payment.status.as_str().to_string()),
            category: ActiveValue::Set(payment.category.as_str().to_string()),
            reference: ActiveValue::Set(payment.reference.clone()),
            note: ActiveValue::Set(payment.note.clone()),
            created_by: ActiveValue::Set(payment.created_by.clone()),
            created_at: ActiveValue::Set(payment.created_at),
            settled_at: ActiveValue::Set(payment.settled_at),
        }
    }
}

impl TryFrom<Model> for Payment {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "payment")?,
            reservation_id: parse_optional_uuid(model.reservation_id.as_deref(), "reservation")?,
            rental_id: parse_optional_uuid(model.rental_id.as_deref(), "rental")?,
            amount_minor: model.amount_minor,
            method: PaymentMethod::try_from(model.method.as_str())?,
            status: PaymentRecordStatus::try_from(model.status.as_str())?,
            category: PaymentCategory::try_from(model.category.as_str())?,
            reference: model.reference,
            note: model.note,
            created_by: model.created_by,
            created_at: model.created_at,
            settled_at: model.settled_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(amount: i64, status: PaymentRecordStatus) -> Payment {
        Payment::new(
            Some(Uuid::new_v4()),
            None,
            amount,
            PaymentMethod::Cash,
            status,
            PaymentCategory::Rental,
        )
        .unwrap()
    }

    #[test]
    fn status_derivation() {
        assert_eq!(PaymentStatus::derive(90_000, 0), PaymentStatus::Unpaid);
        assert_eq!(PaymentStatus::derive(90_000, 30_000), PaymentStatus::Partial);
        assert_eq!(PaymentStatus::derive(90_000, 90_000), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::derive(0, 0), PaymentStatus::Unpaid);
    }

    #[test]
    fn totals_count_only_completed_payments_as_paid() {
        let rows = [
            payment(30_000, PaymentRecordStatus::Completed),
            payment(20_000, PaymentRecordStatus::Pending),
            payment(10_000, PaymentRecordStatus::Completed),
        ];
        let totals = LedgerTotals::compute(90_000, &rows).unwrap();
        assert_eq!(totals.paid_minor, 40_000);
        assert_eq!(totals.pending_minor, 20_000);
        assert_eq!(totals.remaining_minor, 50_000);
        assert_eq!(totals.paid_minor + totals.remaining_minor, totals.total_minor);
        assert_eq!(totals.collectable_minor(), 30_000);
        assert_eq!(totals.status, PaymentStatus::Partial);
        assert!(totals.ensure_fits(30_000, "reservation").is_ok());
        assert!(matches!(
            totals.ensure_fits(30_001, "reservation"),
            Err(EngineError::OverpaymentAttempt(_))
        ));
    }

    #[test]
    fn new_payment_rejects_non_positive_amounts() {
        let err = Payment::new(
            Some(Uuid::new_v4()),
            None,
            0,
            PaymentMethod::Card,
            PaymentRecordStatus::Completed,
            PaymentCategory::Rental,
        )
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidAmount("amount_minor must be > 0".to_string())
        );
    }

    #[test]
    fn only_pending_payments_change() {
        let mut pending = payment(5_000, PaymentRecordStatus::Pending);
        assert!(pending.is_pending());
        pending.complete(Utc::now()).unwrap();
        assert!(pending.is_completed());
        assert!(!pending.is_pending());
        assert!(matches!(
            pending.void(Utc::now()),
            Err(EngineError::PreconditionFailed { .. })
        ));
    }
}
