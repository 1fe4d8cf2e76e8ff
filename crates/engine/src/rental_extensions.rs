//! Extension history of a rental.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalExtension {
    pub id: Uuid,
    pub rental_id: Uuid,
    pub new_end: DateTime<Utc>,
    pub extra_amount_minor: i64,
    pub created_at: DateTime<Utc>,
}

impl RentalExtension {
    pub(crate) fn new(rental_id: Uuid, new_end: DateTime<Utc>, extra_amount_minor: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            rental_id,
            new_end,
            extra_amount_minor,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "rental_extensions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub rental_id: String,
    pub new_end: DateTimeUtc,
    pub extra_amount_minor: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::rentals::Entity",
        from = "Column::RentalId",
        to = "super::rentals::Column::Id"
    )]
    Rentals,
}

impl Related<super::rentals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rentals.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&RentalExtension> for ActiveModel {
    fn from(ext: &RentalExtension) -> Self {
        Self {
            id: ActiveValue::Set(ext.id.to_string()),
            rental_id: ActiveValue::Set(ext.rental_id.to_string()),
            new_end: ActiveValue::Set(ext.new_end),
            extra_amount_minor: ActiveValue::Set(ext.extra_amount_minor),
            created_at: ActiveValue::Set(ext.created_at),
        }
    }
}

impl TryFrom<Model> for RentalExtension {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "extension")?,
            rental_id: parse_uuid(&model.rental_id, "rental")?,
            new_end: model.new_end,
            extra_amount_minor: model.extra_amount_minor,
            created_at: model.created_at,
        })
    }
}
