//! Agency clients.
//!
//! Public booking requests carry the requester's identity inline
//! ([`InlineClient`]); a registered [`Client`] is found or created from it
//! when the agency accepts the request.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine,
    util::{normalize_phone, optional_text, parse_uuid, required_text},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    Individual,
    Company,
}

impl ClientKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Company => "company",
        }
    }
}

impl TryFrom<&str> for ClientKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "individual" => Ok(Self::Individual),
            "company" => Ok(Self::Company),
            other => Err(EngineError::InvalidInput(format!(
                "invalid client kind: {other}"
            ))),
        }
    }
}

/// Identity typed into the public booking form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineClient {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

impl InlineClient {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone: phone.into(),
        }
    }

    /// Normalized copy; fails with [`EngineError::MissingClient`] when a
    /// field is blank.
    pub(crate) fn normalized(&self) -> ResultEngine<Self> {
        let missing = |err: EngineError| EngineError::MissingClient(err.to_string());
        let phone = normalize_phone(&self.phone);
        if phone.is_empty() {
            return Err(EngineError::MissingClient(
                "phone must not be empty".to_string(),
            ));
        }
        Ok(Self {
            first_name: required_text(&self.first_name, "first name").map_err(missing)?,
            last_name: required_text(&self.last_name, "last name").map_err(missing)?,
            phone,
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub kind: ClientKind,
    pub first_name: Option<String>,
    pub last_name: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn new(
        kind: ClientKind,
        first_name: Option<&str>,
        last_name: &str,
        phone: &str,
    ) -> ResultEngine<Self> {
        let phone = normalize_phone(phone);
        if phone.is_empty() {
            return Err(EngineError::InvalidInput(
                "phone must not be empty".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            kind,
            first_name: optional_text(first_name),
            last_name: required_text(last_name, "last name")?,
            phone,
            created_at: Utc::now(),
        })
    }

    pub(crate) fn from_inline(inline: &InlineClient) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: ClientKind::Individual,
            first_name: Some(inline.first_name.clone()),
            last_name: inline.last_name.clone(),
            phone: inline.phone.clone(),
            created_at: Utc::now(),
        }
    }

    pub fn full_name(&self) -> String {
        match &self.first_name {
            Some(first) => format!("{first} {}", self.last_name),
            None => self.last_name.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "clients")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub kind: String,
    pub first_name: Option<String>,
    pub last_name: String,
    pub phone: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Client> for ActiveModel {
    fn from(client: &Client) -> Self {
        Self {
            id: ActiveValue::Set(client.id.to_string()),
            kind: ActiveValue::Set(client.kind.as_str().to_string()),
            first_name: ActiveValue::Set(client.first_name.clone()),
            last_name: ActiveValue::Set(client.last_name.clone()),
            phone: ActiveValue::Set(client.phone.clone()),
            created_at: ActiveValue::Set(client.created_at),
        }
    }
}

impl TryFrom<Model> for Client {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "client")?,
            kind: ClientKind::try_from(model.kind.as_str())?,
            first_name: model.first_name,
            last_name: model.last_name,
            phone: model.phone,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_client_requires_every_field() {
        let blank_phone = InlineClient::new("Amal", "Bennani", "  ");
        assert!(matches!(
            blank_phone.normalized(),
            Err(EngineError::MissingClient(_))
        ));

        let ok = InlineClient::new(" Amal ", "Bennani", "06 12 34 56 78")
            .normalized()
            .unwrap();
        assert_eq!(ok.first_name, "Amal");
        assert_eq!(ok.phone, "0612345678");
    }

    #[test]
    fn company_clients_may_omit_first_name() {
        let client = Client::new(ClientKind::Company, None, "Atlas Tours", "0522000000").unwrap();
        assert_eq!(client.full_name(), "Atlas Tours");
    }
}
