use std::{fmt, sync::Arc};

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::{
    AdmissionGate, AuditEntry, AuditSink, BlobStore, ContractRenderer, DatabaseAuditSink,
    EngineError, FixedWindowLimiter, MemoryBlobStore, PlainTextContractRenderer, ResultEngine,
    locks::{EntityLocks, LockKey, TransitionGuard},
};

mod access;
mod clients;
mod payments;
mod reconcile;
mod rentals;
mod reservations;
mod vehicles;

pub use reservations::PUBLIC_ACTOR;

/// Attempts of a transition that keeps losing optimistic version checks.
pub(crate) const MAX_CONFLICT_ATTEMPTS: u32 = 3;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
/// The write lock is taken first, so concurrent transitions from other processes queue.
/// An early `return` from the block ends the block, not the caller, and still commits.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: crate::ResultEngine<_> = async {
            crate::ops::access::claim_writer(&$tx).await?;
            $body
        }
        .await;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                $tx.rollback().await?;
                Err(err)
            }
        }
    }};
}

/// Re-run a transition while it fails with [`EngineError::Conflict`], up to
/// [`MAX_CONFLICT_ATTEMPTS`] times.
macro_rules! retry_on_conflict {
    ($op:expr) => {{
        let mut attempt = 1;
        loop {
            match $op {
                Err(crate::EngineError::Conflict(reason))
                    if attempt < crate::ops::MAX_CONFLICT_ATTEMPTS =>
                {
                    tracing::warn!(attempt, %reason, "write conflict, retrying transition");
                    attempt += 1;
                }
                other => break other,
            }
        }
    }};
}

pub(crate) use retry_on_conflict;
pub(crate) use with_tx;

pub struct Engine {
    database: DatabaseConnection,
    locks: EntityLocks,
    contracts: Arc<dyn ContractRenderer>,
    blobs: Arc<dyn BlobStore>,
    audit: Arc<dyn AuditSink>,
    admission: Arc<dyn AdmissionGate>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Takes the single-writer locks of a reservation and of its vehicle,
    /// plus any `extra_vehicles` the transition will touch.
    async fn lock_transition(
        &self,
        reservation_id: Uuid,
        extra_vehicles: &[Uuid],
    ) -> ResultEngine<TransitionGuard> {
        let mut guard = TransitionGuard::default();
        guard.push(
            self.locks
                .acquire(LockKey::Reservation(reservation_id))
                .await,
        );

        // Read after locking: the vehicle can only change under this lock.
        let reservation = access::load_reservation(&self.database, reservation_id).await?;
        let mut vehicles = vec![reservation.vehicle_id];
        vehicles.extend_from_slice(extra_vehicles);
        vehicles.sort();
        vehicles.dedup();
        for vehicle_id in vehicles {
            guard.push(self.locks.acquire(LockKey::Vehicle(vehicle_id)).await);
        }
        Ok(guard)
    }

    /// Hands entries to the audit sink. A failing sink is logged, never
    /// propagated: the transition already committed.
    async fn record_audit(&self, entries: Vec<AuditEntry>) {
        for entry in entries {
            let action = entry.action.clone();
            let entity_id = entry.entity_id.clone();
            if let Err(err) = self.audit.record(entry).await {
                tracing::error!(%action, %entity_id, "failed to record audit entry: {err}");
            }
        }
    }

    /// Logs a failed transition. Storage failures are logged loudly: the
    /// transaction rolled back, but collaborators may have run.
    fn flag_failure(&self, transition: &str, entity_id: Uuid, err: &EngineError) {
        match err {
            EngineError::Database(_) | EngineError::Collaborator(_) => tracing::error!(
                transition,
                %entity_id,
                "transition failed and was rolled back, reconcile ledger caches if in doubt: {err}"
            ),
            EngineError::Conflict(_) => {
                tracing::warn!(transition, %entity_id, "transition gave up after conflicts: {err}")
            }
            err if err.is_validation() => {
                tracing::debug!(transition, %entity_id, "input rejected: {err}")
            }
            _ => tracing::debug!(transition, %entity_id, "transition refused: {err}"),
        }
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    contracts: Option<Arc<dyn ContractRenderer>>,
    blobs: Option<Arc<dyn BlobStore>>,
    audit: Option<Arc<dyn AuditSink>>,
    admission: Option<Arc<dyn AdmissionGate>>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Contract renderer, [`PlainTextContractRenderer`] by default.
    pub fn contracts(mut self, renderer: impl ContractRenderer + 'static) -> EngineBuilder {
        self.contracts = Some(Arc::new(renderer));
        self
    }

    /// Where contracts are stored, [`MemoryBlobStore`] by default.
    pub fn blob_store(mut self, store: impl BlobStore + 'static) -> EngineBuilder {
        self.blobs = Some(Arc::new(store));
        self
    }

    /// Audit sink, [`DatabaseAuditSink`] on the engine database by default.
    pub fn audit_sink(mut self, sink: impl AuditSink + 'static) -> EngineBuilder {
        self.audit = Some(Arc::new(sink));
        self
    }

    /// Admission gate of the public channel, a [`FixedWindowLimiter`] with
    /// its default allowance by default.
    pub fn admission(mut self, gate: impl AdmissionGate + 'static) -> EngineBuilder {
        self.admission = Some(Arc::new(gate));
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let audit = match self.audit {
            Some(audit) => audit,
            None => Arc::new(DatabaseAuditSink::new(self.database.clone())),
        };
        Ok(Engine {
            locks: EntityLocks::default(),
            contracts: self
                .contracts
                .unwrap_or_else(|| Arc::new(PlainTextContractRenderer::default())),
            blobs: self
                .blobs
                .unwrap_or_else(|| Arc::new(MemoryBlobStore::default())),
            audit,
            admission: self
                .admission
                .unwrap_or_else(|| Arc::new(FixedWindowLimiter::default())),
            database: self.database,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    async fn conflicting(calls: &Cell<u32>, conflicts: u32) -> ResultEngine<u32> {
        calls.set(calls.get() + 1);
        if calls.get() <= conflicts {
            return Err(EngineError::Conflict(format!("stale read {}", calls.get())));
        }
        Ok(calls.get())
    }

    #[tokio::test]
    async fn conflicts_are_retried_with_a_fresh_attempt() {
        let calls = Cell::new(0);
        let result = retry_on_conflict!(conflicting(&calls, 2).await);
        assert_eq!(result, Ok(3));
        assert_eq!(calls.get(), MAX_CONFLICT_ATTEMPTS);
    }

    #[tokio::test]
    async fn retries_stop_after_the_last_attempt() {
        let calls = Cell::new(0);
        let result = retry_on_conflict!(conflicting(&calls, u32::MAX).await);
        assert_eq!(
            result,
            Err(EngineError::Conflict(format!("stale read {MAX_CONFLICT_ATTEMPTS}")))
        );
        assert_eq!(calls.get(), MAX_CONFLICT_ATTEMPTS);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: ResultEngine<u32> = retry_on_conflict!(async {
            calls.set(calls.get() + 1);
            Err(EngineError::InvalidAmount("amount must be > 0".to_string()))
        }
        .await);
        assert!(matches!(result, Err(EngineError::InvalidAmount(_))));
        assert_eq!(calls.get(), 1);
    }
}
