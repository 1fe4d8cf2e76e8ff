//! Handles settings for the application. Configuration is read from
//! `settings.toml` in the working directory and overridden by `AUTOLOC__*`
//! environment variables (e.g. `AUTOLOC__SERVER__PORT=8080`).
//!
//! See `settings.example.toml` for the configuration.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditTarget {
    Database,
    Log,
}

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
    pub audit: AuditTarget,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
}

/// Where generated contracts are written.
#[derive(Debug, Deserialize)]
pub struct Storage {
    pub root: String,
}

/// Admission of unauthenticated booking requests, per caller address.
/// `max_requests = 0` turns the limit off.
#[derive(Debug, Deserialize)]
pub struct Public {
    pub max_requests: u32,
    pub window_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Contract {
    pub agency: String,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct Reconcile {
    pub interval_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub server: Option<Server>,
    pub storage: Option<Storage>,
    pub public: Option<Public>,
    pub contract: Option<Contract>,
    pub reconcile: Option<Reconcile>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("app.level", "info")?
            .set_default("app.audit", "database")?
            .add_source(File::with_name("settings").required(false))
            .add_source(
                Environment::with_prefix("AUTOLOC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}
