//! Fleet vehicles and their coarse availability status.
//!
//! The status is a projection of the reservation and rental lifecycle: only
//! the engine writes it, as the last step of a transition.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Available,
    Reserved,
    Rented,
    InMaintenance,
}

impl VehicleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Reserved => "reserved",
            Self::Rented => "rented",
            Self::InMaintenance => "in_maintenance",
        }
    }
}

impl TryFrom<&str> for VehicleStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "available" => Ok(Self::Available),
            "reserved" => Ok(Self::Reserved),
            "rented" => Ok(Self::Rented),
            "in_maintenance" => Ok(Self::InMaintenance),
            other => Err(EngineError::InvalidInput(format!(
                "invalid vehicle status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub make: String,
    pub model: String,
    pub plate: String,
    pub status: VehicleStatus,
    pub created_at: DateTime<Utc>,
    pub version: i64,
}

impl Vehicle {
    pub fn new(make: String, model: String, plate: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            make,
            model,
            plate,
            status: VehicleStatus::Available,
            created_at: Utc::now(),
            version: 0,
        }
    }

    /// Human label used on contracts and in logs, e.g. `"Dacia Logan"`.
    pub fn label(&self) -> String {
        format!("{} {}", self.make, self.model)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "vehicles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub make: String,
    pub model: String,
    #[sea_orm(unique)]
    pub plate: String,
    pub status: String,
    pub created_at: DateTimeUtc,
    pub version: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Vehicle> for ActiveModel {
    fn from(vehicle: &Vehicle) -> Self {
        Self {
            id: ActiveValue::Set(vehicle.id.to_string()),
            make: ActiveValue::Set(vehicle.make.clone()),
            model: ActiveValue::Set(vehicle.model.clone()),
            plate: ActiveValue::Set(vehicle.plate.clone()),
            status: ActiveValue::Set(vehicle.status.as_str().to_string()),
            created_at: ActiveValue::Set(vehicle.created_at),
            version: ActiveValue::Set(vehicle.version),
        }
    }
}

impl TryFrom<Model> for Vehicle {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "vehicle")?,
            make: model.make,
            model: model.model,
            plate: model.plate,
            status: VehicleStatus::try_from(model.status.as_str())?,
            created_at: model.created_at,
            version: model.version,
        })
    }
}
