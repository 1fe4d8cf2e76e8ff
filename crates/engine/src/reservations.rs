//! Reservation state machine.
//!
//! ```text
//! pending --accept--> confirmed --start--> active --end--> completed
//!    |                    |
//!    +------reject--------+----> cancelled
//! ```
//!
//! Transitions here are pure: they validate the current status and mutate the
//! value. Persisting the change and its side effects on the rental, the
//! vehicle and the ledger is the job of the engine.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, InlineClient, LedgerTotals, PaymentMethod, PaymentStatus, Rates, ResultEngine,
    commands::ReservationEdit,
    pricing,
    util::{ensure_period, parse_optional_uuid, parse_uuid},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Active,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl TryFrom<&str> for ReservationStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(EngineError::InvalidInput(format!(
                "invalid reservation status: {other}"
            ))),
        }
    }
}

/// Where the booking request came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Internal,
    Public,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Public => "public",
        }
    }
}

impl TryFrom<&str> for Channel {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "internal" => Ok(Self::Internal),
            "public" => Ok(Self::Public),
            other => Err(EngineError::InvalidInput(format!("invalid channel: {other}"))),
        }
    }
}

/// Who the reservation is for: a registered client, or the identity typed
/// into the public form. Never both.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientRef {
    Registered { client_id: Uuid },
    Inline(InlineClient),
}

/// Events of the reservation state table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReservationEvent {
    Accept,
    Reject,
    Start,
    End,
    Edit,
    CollectPayment,
}

impl ReservationEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Start => "start",
            Self::End => "end",
            Self::Edit => "edit",
            Self::CollectPayment => "collect payment on",
        }
    }

    /// Statuses from which the event is allowed.
    pub fn allowed_from(self) -> &'static [ReservationStatus] {
        use ReservationStatus::*;
        match self {
            Self::Accept => &[Pending],
            Self::Reject => &[Pending, Confirmed],
            Self::Start => &[Confirmed],
            Self::End => &[Active],
            Self::Edit => &[Pending, Confirmed],
            Self::CollectPayment => &[Pending, Confirmed, Active],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub client: ClientRef,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub rates: Rates,
    pub total_estimated_minor: i64,
    pub status: ReservationStatus,
    pub payment_status: PaymentStatus,
    pub amount_paid_minor: i64,
    pub amount_remaining_minor: i64,
    pub payment_method: PaymentMethod,
    pub channel: Channel,
    pub rental_id: Option<Uuid>,
    pub contract_url: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl Reservation {
    /// Builds a pending, unpaid reservation and prices it.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vehicle_id: Uuid,
        client: ClientRef,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        rates: Rates,
        explicit_total_minor: Option<i64>,
        payment_method: PaymentMethod,
        channel: Channel,
    ) -> ResultEngine<Self> {
        ensure_period(period_start, period_end)?;
        let quote = pricing::quote(&rates, period_start, period_end, explicit_total_minor)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            vehicle_id,
            client,
            period_start,
            period_end,
            rates,
            total_estimated_minor: quote.total_minor,
            status: ReservationStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            amount_paid_minor: 0,
            amount_remaining_minor: quote.total_minor,
            payment_method,
            channel,
            rental_id: None,
            contract_url: None,
            created_by: None,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Short reference printed on receipts, e.g. `RES-A1B2C3`.
    pub fn reference(&self) -> String {
        let id = self.id.simple().to_string();
        format!("RES-{}", id[id.len().saturating_sub(6)..].to_uppercase())
    }

    pub fn client_id(&self) -> Option<Uuid> {
        match &self.client {
            ClientRef::Registered { client_id } => Some(*client_id),
            ClientRef::Inline(_) => None,
        }
    }

    pub fn inline_client(&self) -> Option<&InlineClient> {
        match &self.client {
            ClientRef::Inline(inline) => Some(inline),
            ClientRef::Registered { .. } => None,
        }
    }

    /// Checks the event against the state table.
    pub fn ensure_can(&self, event: ReservationEvent) -> ResultEngine<()> {
        let allowed = event.allowed_from();
        if allowed.contains(&self.status) {
            return Ok(());
        }
        let expected = allowed
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" or ");
        Err(EngineError::precondition(
            "reservation",
            self.id,
            event.as_str(),
            expected,
            self.status.as_str(),
        ))
    }

    /// `TargetClosed` when the reservation no longer takes payments.
    pub fn ensure_collectable(&self) -> ResultEngine<()> {
        if self.ensure_can(ReservationEvent::CollectPayment).is_err() {
            return Err(EngineError::TargetClosed(format!(
                "reservation {} is {}",
                self.id,
                self.status.as_str()
            )));
        }
        Ok(())
    }

    /// pending → confirmed, binding the registered client.
    pub fn accept(&mut self, client_id: Uuid) -> ResultEngine<()> {
        self.ensure_can(ReservationEvent::Accept)?;
        self.client = ClientRef::Registered { client_id };
        self.status = ReservationStatus::Confirmed;
        self.touch();
        Ok(())
    }

    /// pending|confirmed → cancelled.
    pub fn reject(&mut self) -> ResultEngine<()> {
        self.ensure_can(ReservationEvent::Reject)?;
        self.status = ReservationStatus::Cancelled;
        self.touch();
        Ok(())
    }

    /// confirmed → active, stamping the rental created for it.
    pub fn start(&mut self, rental_id: Uuid) -> ResultEngine<()> {
        self.ensure_can(ReservationEvent::Start)?;
        if self.client_id().is_none() {
            return Err(EngineError::MissingClient(format!(
                "reservation {} has no registered client",
                self.id
            )));
        }
        self.rental_id = Some(rental_id);
        self.status = ReservationStatus::Active;
        self.touch();
        Ok(())
    }

    /// active → completed.
    pub fn end(&mut self) -> ResultEngine<()> {
        self.ensure_can(ReservationEvent::End)?;
        self.status = ReservationStatus::Completed;
        self.touch();
        Ok(())
    }

    /// Applies an edit and reprices. Returns the previous vehicle when the
    /// edit moved the booking to another vehicle.
    pub fn edit(&mut self, edit: &ReservationEdit) -> ResultEngine<Option<Uuid>> {
        self.ensure_can(ReservationEvent::Edit)?;

        let period_start = edit.period_start.unwrap_or(self.period_start);
        let period_end = edit.period_end.unwrap_or(self.period_end);
        let rates = edit.rates.unwrap_or(self.rates);
        ensure_period(period_start, period_end)?;

        let repriced = edit.period_start.is_some()
            || edit.period_end.is_some()
            || edit.rates.is_some()
            || edit.total_minor.is_some();
        let total = if repriced {
            pricing::quote(&rates, period_start, period_end, edit.total_minor)?.total_minor
        } else {
            self.total_estimated_minor
        };
        if total < self.amount_paid_minor {
            return Err(EngineError::InvalidAmount(format!(
                "total {total} is below the {} already collected",
                self.amount_paid_minor
            )));
        }

        let previous_vehicle = edit
            .vehicle_id
            .filter(|id| *id != self.vehicle_id)
            .map(|id| std::mem::replace(&mut self.vehicle_id, id));

        self.period_start = period_start;
        self.period_end = period_end;
        self.rates = rates;
        self.total_estimated_minor = total;
        self.amount_remaining_minor = total - self.amount_paid_minor;
        self.payment_status = PaymentStatus::derive(total, self.amount_paid_minor);
        if let Some(method) = edit.payment_method {
            self.payment_method = method;
        }
        self.touch();
        Ok(previous_vehicle)
    }

    /// Mirrors a rental extension: the booking now ends later and costs more.
    pub fn extend(&mut self, new_end: DateTime<Utc>, extra_minor: i64) {
        self.period_end = new_end;
        self.total_estimated_minor += extra_minor;
        self.amount_remaining_minor = self.total_estimated_minor - self.amount_paid_minor;
        self.touch();
    }

    /// Overwrites the cached collection fields with ledger-derived totals.
    pub fn apply_totals(&mut self, totals: &LedgerTotals) {
        self.amount_paid_minor = totals.paid_minor;
        self.amount_remaining_minor = totals.remaining_minor;
        self.payment_status = totals.status;
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "reservations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub vehicle_id: String,
    pub client_id: Option<String>,
    pub inline_first_name: Option<String>,
    pub inline_last_name: Option<String>,
    pub inline_phone: Option<String>,
    pub period_start: DateTimeUtc,
    pub period_end: DateTimeUtc,
    pub per_day_minor: i64,
    pub per_week_minor: Option<i64>,
    pub per_month_minor: Option<i64>,
    pub total_estimated_minor: i64,
    pub status: String,
    pub payment_status: String,
    pub amount_paid_minor: i64,
    pub amount_remaining_minor: i64,
    pub payment_method: String,
    pub channel: String,
    pub rental_id: Option<String>,
    pub contract_url: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub version: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Reservation> for ActiveModel {
    fn from(r: &Reservation) -> Self {
        let inline = r.inline_client();
        Self {
            id: ActiveValue::Set(r.id.to_string()),
            vehicle_id: ActiveValue::Set(r.vehicle_id.to_string()),
            client_id: ActiveValue::Set(r.client_id().map(|id| id.to_string())),
            inline_first_name: ActiveValue::Set(inline.map(|c| c.first_name.clone())),
            inline_last_name: ActiveValue::Set(inline.map(|c| c.last_name.clone())),
            inline_phone: ActiveValue::Set(inline.map(|c| c.phone.clone())),
            period_start: ActiveValue::Set(r.period_start),
            period_end: ActiveValue::Set(r.period_end),
            per_day_minor: ActiveValue::Set(r.rates.per_day_minor),
            per_week_minor: ActiveValue::Set(r.rates.per_week_minor),
            per_month_minor: ActiveValue::Set(r.rates.per_month_minor),
            total_estimated_minor: ActiveValue::Set(r.total_estimated_minor),
            status: ActiveValue::Set(r.status.as_str().to_string()),
            payment_status: ActiveValue::Set(r.payment_status.as_str().to_string()),
            amount_paid_minor: ActiveValue::Set(r.amount_paid_minor),
            amount_remaining_minor: ActiveValue::Set(r.amount_remaining_minor),
            payment_method: ActiveValue::Set(r.payment_method.as_str().to_string()),
            channel: ActiveValue::Set(r.channel.as_str().to_string()),
            rental_id: ActiveValue::Set(r.rental_id.map(|id| id.to_string())),
            contract_url: ActiveValue::Set(r.contract_url.clone()),
            created_by: ActiveValue::Set(r.created_by.clone()),
            created_at: ActiveValue::Set(r.created_at),
            updated_at: ActiveValue::Set(r.updated_at),
            version: ActiveValue::Set(r.version),
        }
    }
}

impl TryFrom<Model> for Reservation {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        let client = match (
            model.client_id.as_deref(),
            model.inline_first_name,
            model.inline_last_name,
            model.inline_phone,
        ) {
            (Some(id), _, _, _) => ClientRef::Registered {
                client_id: parse_uuid(id, "client")?,
            },
            (None, Some(first_name), Some(last_name), Some(phone)) => {
                ClientRef::Inline(InlineClient {
                    first_name,
                    last_name,
                    phone,
                })
            }
            _ => {
                return Err(EngineError::MissingClient(format!(
                    "reservation {} has neither a client nor inline client data",
                    model.id
                )));
            }
        };

        Ok(Self {
            id: parse_uuid(&model.id, "reservation")?,
            vehicle_id: parse_uuid(&model.vehicle_id, "vehicle")?,
            client,
            period_start: model.period_start,
            period_end: model.period_end,
            rates: Rates {
                per_day_minor: model.per_day_minor,
                per_week_minor: model.per_week_minor,
                per_month_minor: model.per_month_minor,
            },
            total_estimated_minor: model.total_estimated_minor,
            status: ReservationStatus::try_from(model.status.as_str())?,
            payment_status: PaymentStatus::try_from(model.payment_status.as_str())?,
            amount_paid_minor: model.amount_paid_minor,
            amount_remaining_minor: model.amount_remaining_minor,
            payment_method: PaymentMethod::try_from(model.payment_method.as_str())?,
            channel: Channel::try_from(model.channel.as_str())?,
            rental_id: parse_optional_uuid(model.rental_id.as_deref(), "rental")?,
            contract_url: model.contract_url,
            created_by: model.created_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
            version: model.version,
        })
    }
}
