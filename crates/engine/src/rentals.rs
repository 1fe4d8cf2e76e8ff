//! Rental (the "location" contract) created when a confirmed reservation
//! starts.
//!
//! A rental is `active` until it is terminated. Extensions push the planned
//! end and raise the total; termination is reported as
//! [`EngineError::AlreadyCompleted`] on repeat so the engine can treat it as
//! a no-op.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, LedgerTotals, PaymentStatus, Reservation, ResultEngine,
    rental_extensions::RentalExtension,
    util::parse_uuid,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    Active,
    Completed,
    Cancelled,
}

impl RentalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl TryFrom<&str> for RentalStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(EngineError::InvalidInput(format!(
                "invalid rental status: {other}"
            ))),
        }
    }
}

/// Whether the signed-contract document exists yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Generated,
    Pending,
}

impl ContractStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Pending => "pending",
        }
    }
}

impl TryFrom<&str> for ContractStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "generated" => Ok(Self::Generated),
            "pending" => Ok(Self::Pending),
            other => Err(EngineError::InvalidInput(format!(
                "invalid contract status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rental {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub vehicle_id: Uuid,
    pub client_id: Uuid,
    pub status: RentalStatus,
    pub period_start: DateTime<Utc>,
    pub planned_end: DateTime<Utc>,
    pub actual_end: Option<DateTime<Utc>>,
    pub extensions: Vec<RentalExtension>,
    /// Reservation estimate when the rental started.
    pub base_amount_minor: i64,
    /// `base_amount_minor` plus every extension.
    pub total_amount_minor: i64,
    pub amount_paid_minor: i64,
    pub amount_remaining_minor: i64,
    pub payment_status: PaymentStatus,
    pub contract_status: ContractStatus,
    pub contract_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl Rental {
    /// Opens a rental for a reservation that is about to start. The
    /// reservation must already have a registered client.
    pub fn open(reservation: &Reservation) -> ResultEngine<Self> {
        let client_id = reservation.client_id().ok_or_else(|| {
            EngineError::MissingClient(format!(
                "reservation {} has no registered client",
                reservation.id
            ))
        })?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            reservation_id: reservation.id,
            vehicle_id: reservation.vehicle_id,
            client_id,
            status: RentalStatus::Active,
            period_start: reservation.period_start,
            planned_end: reservation.period_end,
            actual_end: None,
            extensions: Vec::new(),
            base_amount_minor: reservation.total_estimated_minor,
            total_amount_minor: reservation.total_estimated_minor,
            amount_paid_minor: 0,
            amount_remaining_minor: reservation.total_estimated_minor,
            payment_status: PaymentStatus::Unpaid,
            contract_status: ContractStatus::Pending,
            contract_url: None,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// What `total_amount_minor` must be given the start estimate and the
    /// extension history.
    pub fn expected_total_minor(&self) -> i64 {
        self.extensions
            .iter()
            .fold(self.base_amount_minor, |total, e| {
                total.saturating_add(e.extra_amount_minor)
            })
    }

    fn ensure_status(&self, action: &'static str, expected: RentalStatus) -> ResultEngine<()> {
        if self.status != expected {
            return Err(EngineError::precondition(
                "rental",
                self.id,
                action,
                expected.as_str(),
                self.status.as_str(),
            ));
        }
        Ok(())
    }

    /// Pushes the planned end to `new_end` and adds `extra_minor` to the
    /// total.
    pub fn extend(
        &mut self,
        new_end: DateTime<Utc>,
        extra_minor: i64,
    ) -> ResultEngine<RentalExtension> {
        self.ensure_status("extend", RentalStatus::Active)?;
        if extra_minor < 0 {
            return Err(EngineError::InvalidAmount(
                "extension amount must be >= 0".to_string(),
            ));
        }
        if new_end <= self.planned_end {
            return Err(EngineError::InvalidPeriod(format!(
                "new end {new_end} must be after the planned end {}",
                self.planned_end
            )));
        }
        let total = self
            .total_amount_minor
            .checked_add(extra_minor)
            .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))?;

        let extension = RentalExtension::new(self.id, new_end, extra_minor);
        self.planned_end = new_end;
        self.total_amount_minor = total;
        self.amount_remaining_minor = total - self.amount_paid_minor;
        self.extensions.push(extension.clone());
        self.touch();
        Ok(extension)
    }

    /// active → completed. A second call fails with `AlreadyCompleted`.
    pub fn terminate(&mut self, actual_end: DateTime<Utc>) -> ResultEngine<()> {
        match self.status {
            RentalStatus::Completed => Err(EngineError::AlreadyCompleted(format!(
                "rental {} already completed",
                self.id
            ))),
            RentalStatus::Cancelled => Err(EngineError::precondition(
                "rental",
                self.id,
                "terminate",
                RentalStatus::Active.as_str(),
                self.status.as_str(),
            )),
            RentalStatus::Active => {
                self.status = RentalStatus::Completed;
                self.actual_end = Some(actual_end);
                self.touch();
                Ok(())
            }
        }
    }

    /// `TargetClosed` when the rental no longer takes payments.
    pub fn ensure_collectable(&self) -> ResultEngine<()> {
        if self.status == RentalStatus::Cancelled {
            return Err(EngineError::TargetClosed(format!(
                "rental {} is cancelled",
                self.id
            )));
        }
        Ok(())
    }

    pub fn attach_contract(&mut self, url: String) {
        self.contract_status = ContractStatus::Generated;
        self.contract_url = Some(url);
        self.touch();
    }

    pub fn apply_totals(&mut self, totals: &LedgerTotals) {
        self.amount_paid_minor = totals.paid_minor;
        self.amount_remaining_minor = totals.remaining_minor;
        self.payment_status = totals.status;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "rentals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub reservation_id: String,
    pub vehicle_id: String,
    pub client_id: String,
    pub status: String,
    pub period_start: DateTimeUtc,
    pub planned_end: DateTimeUtc,
    pub actual_end: Option<DateTimeUtc>,
    pub base_amount_minor: i64,
    pub total_amount_minor: i64,
    pub amount_paid_minor: i64,
    pub amount_remaining_minor: i64,
    pub payment_status: String,
    pub contract_status: String,
    pub contract_url: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub version: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::rental_extensions::Entity")]
    Extensions,
}

impl Related<super::rental_extensions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Extensions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Rental> for ActiveModel {
    fn from(rental: &Rental) -> Self {
        Self {
            id: ActiveValue::Set(rental.id.to_string()),
            reservation_id: ActiveValue::Set(rental.reservation_id.to_string()),
            vehicle_id: ActiveValue::Set(rental.vehicle_id.to_string()),
            client_id: ActiveValue::Set(rental.client_id.to_string()),
            status: ActiveValue::Set(rental.status.as_str().to_string()),
            period_start: ActiveValue::Set(rental.period_start),
            planned_end: ActiveValue::Set(rental.planned_end),
            actual_end: ActiveValue::Set(rental.actual_end),
            base_amount_minor: ActiveValue::Set(rental.base_amount_minor),
            total_amount_minor: ActiveValue::Set(rental.total_amount_minor),
            amount_paid_minor: ActiveValue::Set(rental.amount_paid_minor),
            amount_remaining_minor: ActiveValue::Set(rental.amount_remaining_minor),
            payment_status: ActiveValue::Set(rental.payment_status.as_str().to_string()),
            contract_status: ActiveValue::Set(rental.contract_status.as_str().to_string()),
            contract_url: ActiveValue::Set(rental.contract_url.clone()),
            created_at: ActiveValue::Set(rental.created_at),
            updated_at: ActiveValue::Set(rental.updated_at),
            version: ActiveValue::Set(rental.version),
        }
    }
}

/// Builds a rental from its row and its extension rows (any order).
impl TryFrom<(Model, Vec<super::rental_extensions::Model>)> for Rental {
    type Error = EngineError;

    fn try_from(
        (model, extension_models): (Model, Vec<super::rental_extensions::Model>),
    ) -> ResultEngine<Self> {
        let mut extensions = extension_models
            .into_iter()
            .map(RentalExtension::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;
        extensions.sort_by_key(|e| (e.created_at, e.new_end));

        Ok(Self {
            id: parse_uuid(&model.id, "rental")?,
            reservation_id: parse_uuid(&model.reservation_id, "reservation")?,
            vehicle_id: parse_uuid(&model.vehicle_id, "vehicle")?,
            client_id: parse_uuid(&model.client_id, "client")?,
            status: RentalStatus::try_from(model.status.as_str())?,
            period_start: model.period_start,
            planned_end: model.planned_end,
            actual_end: model.actual_end,
            extensions,
            base_amount_minor: model.base_amount_minor,
            total_amount_minor: model.total_amount_minor,
            amount_paid_minor: model.amount_paid_minor,
            amount_remaining_minor: model.amount_remaining_minor,
            payment_status: PaymentStatus::try_from(model.payment_status.as_str())?,
            contract_status: ContractStatus::try_from(model.contract_status.as_str())?,
            contract_url: model.contract_url,
            created_at: model.created_at,
            updated_at: model.updated_at,
            version: model.version,
        })
    }
}
