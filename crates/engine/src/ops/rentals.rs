use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseTransaction, TransactionTrait};
use uuid::Uuid;

use crate::{
    AuditEntry, ContractData, ContractStatus, EngineError, Rental, RentalStart, RentalStatus,
    Reservation, ReservationEvent, ReservationStatus, ResultEngine, Termination,
    rental_extensions, rentals,
};

use super::{Engine, access, retry_on_conflict, with_tx};

impl Engine {
    /// confirmed → active. Opens the rental, moves the reservation's payments
    /// onto it, issues the contract and marks the vehicle rented.
    ///
    /// Starting an already started reservation returns the existing rental
    /// with `created == false` and writes nothing.
    pub async fn start_rental(&self, reservation_id: Uuid, actor: &str) -> ResultEngine<RentalStart> {
        let _guard = self.lock_transition(reservation_id, &[]).await?;
        let (start, audit) = retry_on_conflict!(self.start_once(reservation_id, actor).await)
            .inspect_err(|err| self.flag_failure("rental:start", reservation_id, err))?;
        if start.created {
            tracing::info!(
                %reservation_id,
                rental_id = %start.rental.id,
                contract = start.rental.contract_status.as_str(),
                "rental started"
            );
        }
        self.record_audit(audit).await;
        Ok(start)
    }

    async fn start_once(
        &self,
        reservation_id: Uuid,
        actor: &str,
    ) -> ResultEngine<(RentalStart, Vec<AuditEntry>)> {
        with_tx!(self, |db_tx| {
            let mut reservation = access::load_reservation(&db_tx, reservation_id).await?;
            if let Some(rental) = access::live_rental_for(&db_tx, reservation_id).await?
                && rental.status == RentalStatus::Active
            {
                return Ok((
                    RentalStart {
                        reservation,
                        rental,
                        created: false,
                    },
                    Vec::new(),
                ));
            }
            reservation.ensure_can(ReservationEvent::Start)?;
            let before = reservation.clone();
            let mut audit = Vec::new();

            if reservation.client_id().is_none() {
                let (client, created) = self.resolve_inline_client(&db_tx, &reservation).await?;
                if created {
                    audit.push(AuditEntry::new(
                        actor,
                        "client:create:auto",
                        "client",
                        client.id,
                        None,
                        Some(&client),
                    ));
                }
                reservation.client = crate::ClientRef::Registered {
                    client_id: client.id,
                };
            }

            let mut rental = Rental::open(&reservation)?;
            reservation.start(rental.id)?;
            // Claim the reservation before the rental row exists.
            access::save_reservation(&db_tx, &mut reservation).await?;
            rentals::ActiveModel::from(&rental).insert(&db_tx).await?;
            let linked = access::link_payments_to_rental(&db_tx, reservation_id, rental.id).await?;
            tracing::debug!(rental_id = %rental.id, linked, "payments moved onto rental");

            match self.issue_contract(&db_tx, &reservation, &rental).await {
                Ok(url) => {
                    reservation.contract_url = Some(url.clone());
                    rental.attach_contract(url);
                }
                Err(err) => tracing::warn!(
                    rental_id = %rental.id,
                    "contract left pending: {err}"
                ),
            }

            access::refresh_totals(&db_tx, &mut reservation, Some(&mut rental)).await?;
            access::save_rental(&db_tx, &mut rental).await?;
            access::save_reservation(&db_tx, &mut reservation).await?;
            access::sync_vehicle_status(&db_tx, reservation.vehicle_id).await?;

            audit.push(AuditEntry::new(
                actor,
                "rental:start",
                "rental",
                rental.id,
                None,
                Some(&rental),
            ));
            audit.push(AuditEntry::new(
                actor,
                "reservation:start",
                "reservation",
                reservation.id,
                Some(&before),
                Some(&reservation),
            ));
            Ok((
                RentalStart {
                    reservation,
                    rental,
                    created: true,
                },
                audit,
            ))
        })
    }

    /// Renders the contract and hands it to the blob store, returning the
    /// locator of the stored document.
    async fn issue_contract(
        &self,
        db_tx: &DatabaseTransaction,
        reservation: &Reservation,
        rental: &Rental,
    ) -> ResultEngine<String> {
        let client = access::load_client(db_tx, rental.client_id).await?;
        let vehicle = access::load_vehicle(db_tx, rental.vehicle_id).await?;
        let data = ContractData {
            rental_id: rental.id,
            reservation_id: reservation.id,
            client_name: client.full_name(),
            client_phone: client.phone.clone(),
            vehicle_label: vehicle.label(),
            plate: vehicle.plate.clone(),
            period_start: rental.period_start,
            period_end: rental.planned_end,
            amount: rental.total_amount_minor.into(),
        };
        let bytes = self.contracts.render(&data)?;
        let name = data.file_name(self.contracts.file_extension());
        self.blobs
            .store(&name, bytes, self.contracts.content_type())
            .await
    }

    /// Re-issues the contract of a rental whose contract is still pending.
    /// A rental with a generated contract is returned unchanged.
    pub async fn retry_contract(&self, rental_id: Uuid, actor: &str) -> ResultEngine<Rental> {
        let reservation_id = access::load_rental(&self.database, rental_id)
            .await?
            .reservation_id;
        let _guard = self.lock_transition(reservation_id, &[]).await?;
        let (rental, audit) = retry_on_conflict!(self.retry_contract_once(rental_id, actor).await)
            .inspect_err(|err| self.flag_failure("rental:contract", rental_id, err))?;
        self.record_audit(audit).await;
        Ok(rental)
    }

    async fn retry_contract_once(
        &self,
        rental_id: Uuid,
        actor: &str,
    ) -> ResultEngine<(Rental, Vec<AuditEntry>)> {
        with_tx!(self, |db_tx| {
            let mut rental = access::load_rental(&db_tx, rental_id).await?;
            if rental.contract_status == ContractStatus::Generated {
                return Ok((rental, Vec::new()));
            }
            let mut reservation = access::load_reservation(&db_tx, rental.reservation_id).await?;
            let url = self.issue_contract(&db_tx, &reservation, &rental).await?;
            let before = rental.clone();
            reservation.contract_url = Some(url.clone());
            rental.attach_contract(url);
            access::save_rental(&db_tx, &mut rental).await?;
            access::save_reservation(&db_tx, &mut reservation).await?;

            let audit = vec![AuditEntry::new(
                actor,
                "rental:contract",
                "rental",
                rental.id,
                Some(&before),
                Some(&rental),
            )];
            Ok((rental, audit))
        })
    }

    /// Pushes the planned end of an active rental and adds `extra_minor` to
    /// what is due. The reservation follows.
    pub async fn extend_rental(
        &self,
        rental_id: Uuid,
        new_end: DateTime<Utc>,
        extra_minor: i64,
        actor: &str,
    ) -> ResultEngine<Rental> {
        let reservation_id = access::load_rental(&self.database, rental_id)
            .await?
            .reservation_id;
        let _guard = self.lock_transition(reservation_id, &[]).await?;
        let (rental, audit) = retry_on_conflict!(
            self.extend_once(rental_id, new_end, extra_minor, actor)
                .await
        )
        .inspect_err(|err| self.flag_failure("rental:extend", rental_id, err))?;
        self.record_audit(audit).await;
        Ok(rental)
    }

    async fn extend_once(
        &self,
        rental_id: Uuid,
        new_end: DateTime<Utc>,
        extra_minor: i64,
        actor: &str,
    ) -> ResultEngine<(Rental, Vec<AuditEntry>)> {
        with_tx!(self, |db_tx| {
            let mut rental = access::load_rental(&db_tx, rental_id).await?;
            let mut reservation = access::load_reservation(&db_tx, rental.reservation_id).await?;
            let before = rental.clone();

            let extension = rental.extend(new_end, extra_minor)?;
            rental_extensions::ActiveModel::from(&extension)
                .insert(&db_tx)
                .await?;
            reservation.extend(new_end, extra_minor);

            access::refresh_totals(&db_tx, &mut reservation, Some(&mut rental)).await?;
            access::save_rental(&db_tx, &mut rental).await?;
            access::save_reservation(&db_tx, &mut reservation).await?;

            let audit = vec![AuditEntry::new(
                actor,
                "rental:extend",
                "rental",
                rental.id,
                Some(&before),
                Some(&rental),
            )];
            Ok((rental, audit))
        })
    }

    /// active → completed for the rental, ending its reservation and
    /// releasing the vehicle. Terminating a completed rental is a no-op
    /// reported with `changed == false`.
    pub async fn terminate_rental(
        &self,
        rental_id: Uuid,
        actual_end: Option<DateTime<Utc>>,
        actor: &str,
    ) -> ResultEngine<Termination> {
        let reservation_id = access::load_rental(&self.database, rental_id)
            .await?
            .reservation_id;
        let _guard = self.lock_transition(reservation_id, &[]).await?;
        let actual_end = actual_end.unwrap_or_else(Utc::now);
        let (termination, audit) =
            retry_on_conflict!(self.terminate_once(rental_id, actual_end, actor).await)
                .inspect_err(|err| self.flag_failure("rental:terminate", rental_id, err))?;
        self.record_audit(audit).await;
        Ok(termination)
    }

    async fn terminate_once(
        &self,
        rental_id: Uuid,
        actual_end: DateTime<Utc>,
        actor: &str,
    ) -> ResultEngine<(Termination, Vec<AuditEntry>)> {
        with_tx!(self, |db_tx| {
            let mut rental = access::load_rental(&db_tx, rental_id).await?;
            let mut reservation = access::load_reservation(&db_tx, rental.reservation_id).await?;
            let before = rental.clone();

            match rental.terminate(actual_end) {
                Err(EngineError::AlreadyCompleted(reason)) => {
                    tracing::debug!(%rental_id, %reason, "termination repeated");
                    return Ok((
                        Termination {
                            reservation: Some(reservation),
                            rental: Some(rental),
                            changed: false,
                        },
                        Vec::new(),
                    ));
                }
                other => other?,
            }
            access::save_rental(&db_tx, &mut rental).await?;

            let mut audit = vec![AuditEntry::new(
                actor,
                "rental:terminate",
                "rental",
                rental.id,
                Some(&before),
                Some(&rental),
            )];
            if reservation.status == ReservationStatus::Active {
                let reservation_before = reservation.clone();
                reservation.end()?;
                access::save_reservation(&db_tx, &mut reservation).await?;
                audit.push(AuditEntry::new(
                    actor,
                    "reservation:end",
                    "reservation",
                    reservation.id,
                    Some(&reservation_before),
                    Some(&reservation),
                ));
            }
            access::sync_vehicle_status(&db_tx, rental.vehicle_id).await?;

            Ok((
                Termination {
                    reservation: Some(reservation),
                    rental: Some(rental),
                    changed: true,
                },
                audit,
            ))
        })
    }

    pub async fn rental(&self, rental_id: Uuid) -> ResultEngine<Rental> {
        access::load_rental(&self.database, rental_id).await
    }

    /// The live rental of a reservation, `None` before it started.
    pub async fn rental_for_reservation(&self, reservation_id: Uuid) -> ResultEngine<Option<Rental>> {
        access::live_rental_for(&self.database, reservation_id).await
    }
}
