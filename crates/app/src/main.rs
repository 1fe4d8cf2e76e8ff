use std::{sync::Arc, time::Duration};

use engine::{
    Engine, FixedWindowLimiter, LocalBlobStore, PlainTextContractRenderer, TracingAuditSink,
    Unlimited,
};
use migration::{Migrator, MigratorTrait};
use settings::{AuditTarget, Database, Settings};

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "autoloc={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let Some(server) = settings.server.as_ref() else {
        tracing::warn!("no server settings found, nothing to run");
        return Ok(());
    };

    tracing::info!("Found server settings...");
    let db = parse_database(&server.database).await?;
    let engine = Arc::new(build_engine(&settings, db.clone()).await?);

    let bind = server.bind.clone().unwrap_or_else(|| "127.0.0.1".to_string());
    let addr = format!("{}:{}", bind, server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server_engine = engine.clone();
    tasks.spawn(async move {
        if let Err(err) = server::run_with_listener(server_engine, db, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    if let Some(reconcile) = settings.reconcile.as_ref() {
        let period = Duration::from_secs(reconcile.interval_secs.max(1));
        let engine = engine.clone();
        tasks.spawn(async move {
            tracing::info!(every_secs = period.as_secs(), "ledger reconciliation scheduled");
            let mut ticker = tokio::time::interval(period);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match engine.reconcile_all_ledger_caches().await {
                    Ok(report) if !report.is_clean() => tracing::warn!(
                        reservations = report.corrected_reservations.len(),
                        rentals = report.corrected_rentals.len(),
                        drifted = report.drifted_totals.len(),
                        "reconciliation corrected cached totals"
                    ),
                    Ok(_) => {}
                    Err(err) => tracing::error!("reconciliation failed: {err}"),
                }
            }
        });
    }

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn build_engine(
    settings: &Settings,
    db: sea_orm::DatabaseConnection,
) -> Result<Engine, Box<dyn std::error::Error + Send + Sync>> {
    let mut builder = Engine::builder().database(db);
    if let Some(storage) = settings.storage.as_ref() {
        builder = builder.blob_store(LocalBlobStore::new(&storage.root));
    } else {
        tracing::warn!("no storage settings, contracts are kept in memory only");
    }
    match settings.public.as_ref() {
        Some(public) if public.max_requests == 0 => {
            tracing::warn!("public booking requests are not rate limited");
            builder = builder.admission(Unlimited);
        }
        Some(public) => {
            builder = builder.admission(FixedWindowLimiter::new(
                public.max_requests,
                Duration::from_secs(public.window_secs),
            ));
        }
        None => {}
    }
    if let AuditTarget::Log = settings.app.audit {
        builder = builder.audit_sink(TracingAuditSink);
    }
    if let Some(contract) = settings.contract.as_ref() {
        builder = builder.contracts(PlainTextContractRenderer::new(
            &contract.agency,
            &contract.currency,
        ));
    }
    Ok(builder.build().await?)
}

async fn parse_database(
    config: &Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
