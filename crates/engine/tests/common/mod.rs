#![allow(dead_code)]

use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    Booking, ClientKind, Engine, EngineBuilder, InternalBooking, LedgerTotals, Rates, Reservation,
};
use migration::MigratorTrait;
use uuid::Uuid;

pub const AGENT: &str = "alice";

pub async fn connect() -> DatabaseConnection {
    seeded("sqlite::memory:").await
}

async fn seeded(url: &str) -> DatabaseConnection {
    let db = Database::connect(url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO users (username, password) VALUES (?, ?)",
        vec![AGENT.into(), "password".into()],
    ))
    .await
    .unwrap();
    db
}

pub async fn engine_with(configure: impl FnOnce(EngineBuilder) -> EngineBuilder) -> (Engine, DatabaseConnection) {
    let db = connect().await;
    let engine = configure(Engine::builder().database(db.clone()))
        .build()
        .await
        .unwrap();
    (engine, db)
}

pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    engine_with(|builder| builder).await
}

/// Two engines on one database file, as two server processes would run.
/// The file lives under `target/test_dbs`.
pub async fn engines_sharing_file() -> (Engine, Engine, PathBuf) {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();
    let path = root.join(format!("autoloc_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let first = seeded(&url).await;
    let second = Database::connect(&url).await.unwrap();
    let a = Engine::builder().database(first).build().await.unwrap();
    let b = Engine::builder().database(second).build().await.unwrap();
    (a, b, path)
}

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
}

pub async fn vehicle(engine: &Engine, plate: &str) -> Uuid {
    engine
        .new_vehicle("Dacia", "Logan", plate, AGENT)
        .await
        .unwrap()
        .id
}

pub async fn client(engine: &Engine) -> Uuid {
    engine
        .new_client(ClientKind::Individual, Some("Sara"), "Alaoui", "0600000000", AGENT)
        .await
        .unwrap()
        .id
}

/// Three days at 100 per day.
pub fn three_days(vehicle_id: Uuid, client_id: Uuid) -> InternalBooking {
    InternalBooking::for_client(vehicle_id, client_id, at(1, 10), at(4, 10), Rates::daily(100))
}

pub async fn confirmed(engine: &Engine, booking: InternalBooking) -> Reservation {
    let reservation = engine
        .create_reservation(Booking::Internal(booking), AGENT)
        .await
        .unwrap();
    engine
        .accept_reservation(reservation.id, AGENT)
        .await
        .unwrap()
}

pub fn assert_balanced(totals: &LedgerTotals) {
    assert_eq!(
        totals.paid_minor + totals.remaining_minor,
        totals.total_minor,
        "{totals:?}"
    );
}
