use chrono::Utc;
use sea_orm::{ActiveModelTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    AuditEntry, Booking, Channel, ClientRef, EngineError, InternalBooking, Payment,
    PaymentCategory, PaymentMethod, PaymentRecordStatus, PublicBooking, RentalStatus, Reservation,
    ReservationEdit, ReservationEvent, ReservationStatus, ResultEngine, Termination, reservations,
};

use super::{Engine, access, retry_on_conflict, with_tx};

/// Actor recorded for unauthenticated bookings.
pub const PUBLIC_ACTOR: &str = "public";

impl Engine {
    /// Records a booking request. The vehicle status is not touched: a
    /// request does not hold the vehicle until it is accepted.
    ///
    /// Public requests go through the admission gate first and fail with
    /// [`EngineError::TooManyRequests`] before anything is read or written.
    pub async fn create_reservation(
        &self,
        booking: Booking,
        actor: &str,
    ) -> ResultEngine<Reservation> {
        let (vehicle_id, result) = match booking {
            Booking::Internal(booking) => (booking.vehicle_id, self.create_internal(booking, actor).await),
            Booking::Public(booking) => (booking.vehicle_id, self.create_public(booking).await),
        };
        let (reservation, audit) =
            result.inspect_err(|err| self.flag_failure("reservation:create", vehicle_id, err))?;
        tracing::info!(
            reservation_id = %reservation.id,
            channel = reservation.channel.as_str(),
            total = reservation.total_estimated_minor,
            "reservation created"
        );
        self.record_audit(audit).await;
        Ok(reservation)
    }

    async fn create_public(
        &self,
        booking: PublicBooking,
    ) -> ResultEngine<(Reservation, Vec<AuditEntry>)> {
        if !self.admission.admit(&booking.caller) {
            tracing::warn!(caller = %booking.caller, "public booking refused by admission gate");
            return Err(EngineError::TooManyRequests(booking.caller));
        }

        let client = booking.client.normalized()?;
        let reservation = Reservation::new(
            booking.vehicle_id,
            ClientRef::Inline(client),
            booking.period_start,
            booking.period_end,
            booking.rates,
            booking.total_minor,
            PaymentMethod::default(),
            Channel::Public,
        )?;

        with_tx!(self, |db_tx| {
            access::load_vehicle(&db_tx, reservation.vehicle_id).await?;
            reservations::ActiveModel::from(&reservation)
                .insert(&db_tx)
                .await?;
            Ok::<_, EngineError>(())
        })?;

        let audit = vec![AuditEntry::new(
            PUBLIC_ACTOR,
            "reservation:create:public",
            "reservation",
            reservation.id,
            None,
            Some(&reservation),
        )];
        Ok((reservation, audit))
    }

    async fn create_internal(
        &self,
        booking: InternalBooking,
        actor: &str,
    ) -> ResultEngine<(Reservation, Vec<AuditEntry>)> {
        let client = match booking.client {
            ClientRef::Inline(inline) => ClientRef::Inline(inline.normalized()?),
            registered => registered,
        };
        if let Some(amount) = booking.upfront_minor
            && amount <= 0
        {
            return Err(EngineError::InvalidAmount(
                "upfront amount must be > 0".to_string(),
            ));
        }
        let mut reservation = Reservation::new(
            booking.vehicle_id,
            client,
            booking.period_start,
            booking.period_end,
            booking.rates,
            booking.total_minor,
            booking.payment_method,
            Channel::Internal,
        )?;
        reservation.created_by = Some(actor.to_string());

        let upfront = with_tx!(self, |db_tx| {
            access::load_vehicle(&db_tx, reservation.vehicle_id).await?;
            if let Some(client_id) = reservation.client_id() {
                access::load_client(&db_tx, client_id).await?;
            }
            reservations::ActiveModel::from(&reservation)
                .insert(&db_tx)
                .await?;

            match booking.upfront_minor {
                Some(amount) => {
                    access::reservation_totals(&db_tx, &reservation)
                        .await?
                        .ensure_fits(amount, "reservation")?;
                    let mut payment = Payment::new(
                        Some(reservation.id),
                        None,
                        amount,
                        booking.payment_method,
                        PaymentRecordStatus::Completed,
                        PaymentCategory::Rental,
                    )?;
                    payment.created_by = Some(actor.to_string());
                    payment.reference = Some(reservation.reference());
                    payment.note = Some("upfront payment".to_string());
                    access::insert_payment(&db_tx, &payment).await?;
                    access::refresh_totals(&db_tx, &mut reservation, None).await?;
                    access::save_reservation(&db_tx, &mut reservation).await?;
                    Ok::<_, EngineError>(Some(payment))
                }
                None => Ok(None),
            }
        })?;

        let mut audit = vec![AuditEntry::new(
            actor,
            "reservation:create",
            "reservation",
            reservation.id,
            None,
            Some(&reservation),
        )];
        if let Some(payment) = upfront {
            audit.push(AuditEntry::new(
                actor,
                "payment:create",
                "payment",
                payment.id,
                None,
                Some(&payment),
            ));
        }
        Ok((reservation, audit))
    }

    /// pending → confirmed. An inline client is resolved to a registered one
    /// (found by exact identity or created) and the vehicle is reserved.
    pub async fn accept_reservation(
        &self,
        reservation_id: Uuid,
        actor: &str,
    ) -> ResultEngine<Reservation> {
        let _guard = self.lock_transition(reservation_id, &[]).await?;
        let (reservation, audit) =
            retry_on_conflict!(self.accept_once(reservation_id, actor).await)
                .inspect_err(|err| self.flag_failure("reservation:accept", reservation_id, err))?;
        self.record_audit(audit).await;
        Ok(reservation)
    }

    async fn accept_once(
        &self,
        reservation_id: Uuid,
        actor: &str,
    ) -> ResultEngine<(Reservation, Vec<AuditEntry>)> {
        with_tx!(self, |db_tx| {
            let mut reservation = access::load_reservation(&db_tx, reservation_id).await?;
            reservation.ensure_can(ReservationEvent::Accept)?;
            let before = reservation.clone();
            let mut audit = Vec::new();

            let client_id = match reservation.client_id() {
                Some(client_id) => client_id,
                None => {
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
                    client.id
                }
            };

            reservation.accept(client_id)?;
            access::save_reservation(&db_tx, &mut reservation).await?;
            access::sync_vehicle_status(&db_tx, reservation.vehicle_id).await?;

            audit.push(AuditEntry::new(
                actor,
                "reservation:accept",
                "reservation",
                reservation.id,
                Some(&before),
                Some(&reservation),
            ));
            Ok((reservation, audit))
        })
    }

    pub(super) async fn resolve_inline_client(
        &self,
        db_tx: &sea_orm::DatabaseTransaction,
        reservation: &Reservation,
    ) -> ResultEngine<(crate::Client, bool)> {
        let inline = reservation.inline_client().ok_or_else(|| {
            EngineError::MissingClient(format!("reservation {} has no client", reservation.id))
        })?;
        self.find_or_create_client(db_tx, inline).await
    }

    /// pending|confirmed → cancelled; the vehicle is released.
    pub async fn reject_reservation(
        &self,
        reservation_id: Uuid,
        actor: &str,
    ) -> ResultEngine<Reservation> {
        let _guard = self.lock_transition(reservation_id, &[]).await?;
        let (reservation, audit) =
            retry_on_conflict!(self.reject_once(reservation_id, actor).await)
                .inspect_err(|err| self.flag_failure("reservation:reject", reservation_id, err))?;
        self.record_audit(audit).await;
        Ok(reservation)
    }

    async fn reject_once(
        &self,
        reservation_id: Uuid,
        actor: &str,
    ) -> ResultEngine<(Reservation, Vec<AuditEntry>)> {
        with_tx!(self, |db_tx| {
            let mut reservation = access::load_reservation(&db_tx, reservation_id).await?;
            let before = reservation.clone();
            reservation.reject()?;
            access::save_reservation(&db_tx, &mut reservation).await?;
            access::sync_vehicle_status(&db_tx, reservation.vehicle_id).await?;

            let audit = vec![AuditEntry::new(
                actor,
                "reservation:reject",
                "reservation",
                reservation.id,
                Some(&before),
                Some(&reservation),
            )];
            Ok((reservation, audit))
        })
    }

    /// active → completed. The rental, if still active, is terminated now and
    /// the vehicle released.
    pub async fn end_reservation(
        &self,
        reservation_id: Uuid,
        actor: &str,
    ) -> ResultEngine<Termination> {
        let _guard = self.lock_transition(reservation_id, &[]).await?;
        let (termination, audit) =
            retry_on_conflict!(self.end_once(reservation_id, actor).await)
                .inspect_err(|err| self.flag_failure("reservation:end", reservation_id, err))?;
        self.record_audit(audit).await;
        Ok(termination)
    }

    async fn end_once(
        &self,
        reservation_id: Uuid,
        actor: &str,
    ) -> ResultEngine<(Termination, Vec<AuditEntry>)> {
        with_tx!(self, |db_tx| {
            let mut reservation = access::load_reservation(&db_tx, reservation_id).await?;
            let before = reservation.clone();
            reservation.end()?;
            let mut audit = Vec::new();

            let mut rental = access::live_rental_for(&db_tx, reservation_id).await?;
            if let Some(rental) = rental.as_mut()
                && rental.status == RentalStatus::Active
            {
                let rental_before = rental.clone();
                rental.terminate(Utc::now())?;
                access::save_rental(&db_tx, rental).await?;
                audit.push(AuditEntry::new(
                    actor,
                    "rental:end",
                    "rental",
                    rental.id,
                    Some(&rental_before),
                    Some(&*rental),
                ));
            }

            access::save_reservation(&db_tx, &mut reservation).await?;
            access::sync_vehicle_status(&db_tx, reservation.vehicle_id).await?;

            audit.push(AuditEntry::new(
                actor,
                "reservation:end",
                "reservation",
                reservation.id,
                Some(&before),
                Some(&reservation),
            ));
            Ok((
                Termination {
                    reservation: Some(reservation),
                    rental,
                    changed: true,
                },
                audit,
            ))
        })
    }

    /// Changes period, rates, total, method or vehicle of a pending or
    /// confirmed reservation. The total is repriced and may not drop below
    /// what was already collected.
    pub async fn edit_reservation(
        &self,
        reservation_id: Uuid,
        edit: ReservationEdit,
        actor: &str,
    ) -> ResultEngine<Reservation> {
        let extra: Vec<Uuid> = edit.vehicle_id.into_iter().collect();
        let _guard = self.lock_transition(reservation_id, &extra).await?;
        let (reservation, audit) =
            retry_on_conflict!(self.edit_once(reservation_id, &edit, actor).await)
                .inspect_err(|err| self.flag_failure("reservation:edit", reservation_id, err))?;
        self.record_audit(audit).await;
        Ok(reservation)
    }

    async fn edit_once(
        &self,
        reservation_id: Uuid,
        edit: &ReservationEdit,
        actor: &str,
    ) -> ResultEngine<(Reservation, Vec<AuditEntry>)> {
        with_tx!(self, |db_tx| {
            let mut reservation = access::load_reservation(&db_tx, reservation_id).await?;
            let before = reservation.clone();
            if let Some(vehicle_id) = edit.vehicle_id {
                access::load_vehicle(&db_tx, vehicle_id).await?;
            }

            access::refresh_totals(&db_tx, &mut reservation, None).await?;
            let previous_vehicle = reservation.edit(edit)?;
            access::save_reservation(&db_tx, &mut reservation).await?;

            if let Some(previous) = previous_vehicle {
                access::sync_vehicle_status(&db_tx, previous).await?;
                access::sync_vehicle_status(&db_tx, reservation.vehicle_id).await?;
            }

            let audit = vec![AuditEntry::new(
                actor,
                "reservation:update",
                "reservation",
                reservation.id,
                Some(&before),
                Some(&reservation),
            )];
            Ok((reservation, audit))
        })
    }

    pub async fn reservation(&self, reservation_id: Uuid) -> ResultEngine<Reservation> {
        access::load_reservation(&self.database, reservation_id).await
    }

    /// Reservations, newest first, optionally filtered by status.
    pub async fn reservations(
        &self,
        status: Option<ReservationStatus>,
    ) -> ResultEngine<Vec<Reservation>> {
        let mut query = reservations::Entity::find();
        if let Some(status) = status {
            query = query.filter(reservations::Column::Status.eq(status.as_str()));
        }
        query
            .order_by_desc(reservations::Column::CreatedAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Reservation::try_from)
            .collect()
    }
}
