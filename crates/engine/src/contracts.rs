//! Rental contract documents.
//!
//! The engine only needs bytes to hand to a [`BlobStore`]; the layout belongs
//! to the renderer. [`PlainTextContractRenderer`] is the built-in one.
//!
//! [`BlobStore`]: crate::BlobStore

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, ResultEngine};

/// Everything printed on a contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractData {
    pub rental_id: Uuid,
    pub reservation_id: Uuid,
    pub client_name: String,
    pub client_phone: String,
    pub vehicle_label: String,
    pub plate: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub amount: MoneyCents,
}

impl ContractData {
    /// File name for the stored document, e.g. `contract-a1b2c3.txt`.
    pub fn file_name(&self, extension: &str) -> String {
        let id = self.reservation_id.simple().to_string();
        let short = &id[id.len().saturating_sub(6)..];
        format!("contract-{short}.{extension}")
    }
}

pub trait ContractRenderer: Send + Sync {
    fn render(&self, data: &ContractData) -> ResultEngine<Vec<u8>>;

    fn content_type(&self) -> &'static str;

    fn file_extension(&self) -> &'static str;
}

const CLAUSES: [&str; 4] = [
    "Insurance included according to the policy in force.",
    "Fuel level on return identical to departure.",
    "Late returns are billed per started hour.",
    "Traffic offences are the renter's responsibility.",
];

#[derive(Clone, Debug)]
pub struct PlainTextContractRenderer {
    agency: String,
    currency: String,
}

impl PlainTextContractRenderer {
    pub fn new(agency: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            agency: agency.into(),
            currency: currency.into(),
        }
    }
}

impl Default for PlainTextContractRenderer {
    fn default() -> Self {
        Self::new("AutoRent", "MAD")
    }
}

impl ContractRenderer for PlainTextContractRenderer {
    fn render(&self, data: &ContractData) -> ResultEngine<Vec<u8>> {
        let mut out = String::new();
        let fmt_err = |_| EngineError::Collaborator("failed to render contract".to_string());

        writeln!(out, "{}", self.agency).map_err(fmt_err)?;
        writeln!(out, "Rental contract {}", data.rental_id).map_err(fmt_err)?;
        writeln!(out).map_err(fmt_err)?;
        writeln!(out, "Client: {} ({})", data.client_name, data.client_phone).map_err(fmt_err)?;
        writeln!(out, "Vehicle: {} ({})", data.vehicle_label, data.plate).map_err(fmt_err)?;
        writeln!(
            out,
            "Period: {} - {}",
            data.period_start.format("%Y-%m-%d %H:%M"),
            data.period_end.format("%Y-%m-%d %H:%M")
        )
        .map_err(fmt_err)?;
        writeln!(out, "Amount: {}", data.amount.with_currency(&self.currency)).map_err(fmt_err)?;
        writeln!(out).map_err(fmt_err)?;
        writeln!(out, "Main clauses:").map_err(fmt_err)?;
        for clause in CLAUSES {
            writeln!(out, "- {clause}").map_err(fmt_err)?;
        }
        writeln!(out).map_err(fmt_err)?;
        writeln!(out, "Client: ________________________").map_err(fmt_err)?;
        writeln!(out, "Agency: ________________________").map_err(fmt_err)?;

        Ok(out.into_bytes())
    }

    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn file_extension(&self) -> &'static str {
        "txt"
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn renders_parties_and_amount() {
        let start = Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).unwrap();
        let data = ContractData {
            rental_id: Uuid::new_v4(),
            reservation_id: Uuid::new_v4(),
            client_name: "Amal Bennani".to_string(),
            client_phone: "0612345678".to_string(),
            vehicle_label: "Dacia Logan".to_string(),
            plate: "12345-A-6".to_string(),
            period_start: start,
            period_end: start + Duration::days(3),
            amount: MoneyCents::new(90_000),
        };
        let text = String::from_utf8(PlainTextContractRenderer::default().render(&data).unwrap())
            .unwrap();
        assert!(text.contains("Client: Amal Bennani (0612345678)"));
        assert!(text.contains("Vehicle: Dacia Logan (12345-A-6)"));
        assert!(text.contains("Amount: 900.00 MAD"));

        let name = data.file_name("txt");
        assert!(name.starts_with("contract-"));
        assert_eq!(name.len(), "contract-".len() + 6 + ".txt".len());
    }

    #[test]
    fn contract_data_carries_the_amount_in_minor_units() {
        let start = Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).unwrap();
        let data = ContractData {
            rental_id: Uuid::new_v4(),
            reservation_id: Uuid::new_v4(),
            client_name: "Amal Bennani".to_string(),
            client_phone: "0612345678".to_string(),
            vehicle_label: "Dacia Logan".to_string(),
            plate: "12345-A-6".to_string(),
            period_start: start,
            period_end: start + Duration::days(3),
            amount: MoneyCents::new(90_000),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["amount"], serde_json::json!(90_000));

        let back: ContractData = serde_json::from_value(json).unwrap();
        assert_eq!(back, data);
    }
}
