use sea_orm::{QueryOrder, QuerySelect, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{ReconcileReport, ResultEngine, reservations, util::parse_uuid};

use super::{Engine, access, retry_on_conflict, with_tx};

impl Engine {
    /// Recomputes the cached totals of a reservation and of its rental from
    /// the ledger, rewriting whichever disagrees.
    pub async fn reconcile_ledger_caches(
        &self,
        reservation_id: Uuid,
    ) -> ResultEngine<ReconcileReport> {
        let _guard = self.lock_transition(reservation_id, &[]).await?;
        let report = retry_on_conflict!(self.reconcile_once(reservation_id).await)
            .inspect_err(|err| self.flag_failure("ledger:reconcile", reservation_id, err))?;
        if !report.is_clean() {
            tracing::warn!(
                %reservation_id,
                reservations = report.corrected_reservations.len(),
                rentals = report.corrected_rentals.len(),
                drifted = report.drifted_totals.len(),
                "cached totals disagreed with the ledger and were rewritten"
            );
        }
        Ok(report)
    }

    async fn reconcile_once(&self, reservation_id: Uuid) -> ResultEngine<ReconcileReport> {
        with_tx!(self, |db_tx| {
            let mut report = ReconcileReport::default();
            let mut reservation = access::load_reservation(&db_tx, reservation_id).await?;
            let cached_reservation = reservation.clone();
            let mut rental = access::live_rental_for(&db_tx, reservation_id).await?;
            let cached_rental = rental.clone();

            // The amount due follows the start estimate and the extensions.
            if let Some(rental) = rental.as_mut() {
                let expected = rental.expected_total_minor();
                if rental.total_amount_minor != expected
                    || reservation.total_estimated_minor != expected
                {
                    tracing::warn!(
                        rental_id = %rental.id,
                        rental_total = rental.total_amount_minor,
                        reservation_total = reservation.total_estimated_minor,
                        expected,
                        "amount due drifted from the start estimate plus extensions"
                    );
                    rental.total_amount_minor = expected;
                    reservation.total_estimated_minor = expected;
                    report.drifted_totals.push(rental.id);
                }
            }

            access::refresh_totals(&db_tx, &mut reservation, rental.as_mut()).await?;
            report.checked += 1;
            if reservation != cached_reservation {
                access::save_reservation(&db_tx, &mut reservation).await?;
                report.corrected_reservations.push(reservation.id);
            }
            if let (Some(mut rental), Some(cached)) = (rental, cached_rental) {
                report.checked += 1;
                if rental != cached {
                    access::save_rental(&db_tx, &mut rental).await?;
                    report.corrected_rentals.push(rental.id);
                }
            }
            Ok(report)
        })
    }

    /// [`Engine::reconcile_ledger_caches`] over every reservation. One
    /// reservation failing is logged and does not stop the sweep.
    pub async fn reconcile_all_ledger_caches(&self) -> ResultEngine<ReconcileReport> {
        let ids: Vec<String> = reservations::Entity::find()
            .select_only()
            .column(reservations::Column::Id)
            .order_by_asc(reservations::Column::CreatedAt)
            .into_tuple()
            .all(&self.database)
            .await?;

        let mut report = ReconcileReport::default();
        for id in ids {
            let reservation_id = parse_uuid(&id, "reservation")?;
            match self.reconcile_ledger_caches(reservation_id).await {
                Ok(partial) => report.merge(partial),
                Err(err) => tracing::error!(%reservation_id, "reconcile failed: {err}"),
            }
        }
        tracing::info!(
            checked = report.checked,
            clean = report.is_clean(),
            "ledger caches reconciled"
        );
        Ok(report)
    }
}
