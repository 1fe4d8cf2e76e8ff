use chrono::Utc;
use sea_orm::{DatabaseTransaction, TransactionTrait};
use uuid::Uuid;

use crate::{
    AuditEntry, EngineError, LedgerTotals, Payment, PaymentCategory, PaymentMethod,
    PaymentReceipt, PaymentRecordStatus, PaymentStatus, PaymentStatusChange, PaymentTarget,
    RecordPayment, Rental, Reservation, ResultEngine,
};

use super::{Engine, access, retry_on_conflict, with_tx};

/// A payment about to be appended, before its records are known.
struct Collection {
    amount_minor: i64,
    method: PaymentMethod,
    category: PaymentCategory,
    status: PaymentRecordStatus,
    reference: Option<String>,
    note: Option<String>,
}

/// Checks `amount_minor` against both ledgers, appends the payment linked to
/// every record it concerns and refreshes the cached totals.
async fn append_payment(
    db_tx: &DatabaseTransaction,
    reservation: &mut Reservation,
    rental: Option<&mut Rental>,
    collection: Collection,
    actor: &str,
) -> ResultEngine<Payment> {
    if collection.amount_minor <= 0 {
        return Err(EngineError::InvalidAmount(
            "amount_minor must be > 0".to_string(),
        ));
    }
    access::reservation_totals(db_tx, reservation)
        .await?
        .ensure_fits(collection.amount_minor, "reservation")?;
    if let Some(rental) = rental.as_deref() {
        access::rental_totals(db_tx, rental)
            .await?
            .ensure_fits(collection.amount_minor, "rental")?;
    }

    let mut payment = Payment::new(
        Some(reservation.id),
        rental.as_deref().map(|rental| rental.id),
        collection.amount_minor,
        collection.method,
        collection.status,
        collection.category,
    )?;
    payment.reference = collection.reference;
    payment.note = collection.note;
    payment.created_by = Some(actor.to_string());
    access::insert_payment(db_tx, &payment).await?;

    match rental {
        Some(rental) => {
            access::refresh_totals(db_tx, reservation, Some(&mut *rental)).await?;
            access::save_rental(db_tx, rental).await?;
        }
        None => access::refresh_totals(db_tx, reservation, None).await?,
    }
    access::save_reservation(db_tx, reservation).await?;
    Ok(payment)
}

async fn totals_of(
    db_tx: &DatabaseTransaction,
    target: PaymentTarget,
    reservation: &Reservation,
    rental: Option<&Rental>,
) -> ResultEngine<LedgerTotals> {
    match (target, rental) {
        (PaymentTarget::Rental(_), Some(rental)) => access::rental_totals(db_tx, rental).await,
        _ => access::reservation_totals(db_tx, reservation).await,
    }
}

fn payment_audit(actor: &str, action: &str, before: Option<&Payment>, after: &Payment) -> AuditEntry {
    AuditEntry::new(actor, action, "payment", after.id, before, Some(after))
}

impl Engine {
    /// Reservation a payment target belongs to, which is the lock the
    /// collection runs under.
    async fn reservation_of(&self, target: PaymentTarget) -> ResultEngine<Uuid> {
        match target {
            PaymentTarget::Reservation(id) => Ok(id),
            PaymentTarget::Rental(id) => Ok(access::load_rental(&self.database, id)
                .await?
                .reservation_id),
        }
    }

    /// Appends a payment to the ledger of a reservation or a rental.
    ///
    /// Once a rental exists the payment is linked to both records, so the
    /// two ledgers stay in step. Fails with `OverpaymentAttempt` when the
    /// amount exceeds what is still collectable on either of them.
    pub async fn record_payment(
        &self,
        command: RecordPayment,
        actor: &str,
    ) -> ResultEngine<PaymentReceipt> {
        let reservation_id = self.reservation_of(command.target).await?;
        let _guard = self.lock_transition(reservation_id, &[]).await?;
        let (receipt, audit) = retry_on_conflict!(self.record_once(&command, reservation_id, actor).await)
            .inspect_err(|err| self.flag_failure("payment:create", reservation_id, err))?;
        self.record_audit(audit).await;
        Ok(receipt)
    }

    async fn record_once(
        &self,
        command: &RecordPayment,
        reservation_id: Uuid,
        actor: &str,
    ) -> ResultEngine<(PaymentReceipt, Vec<AuditEntry>)> {
        with_tx!(self, |db_tx| {
            let mut reservation = access::load_reservation(&db_tx, reservation_id).await?;
            let mut rental = match command.target {
                PaymentTarget::Reservation(_) => {
                    reservation.ensure_collectable()?;
                    access::live_rental_for(&db_tx, reservation_id).await?
                }
                PaymentTarget::Rental(rental_id) => {
                    let rental = access::load_rental(&db_tx, rental_id).await?;
                    rental.ensure_collectable()?;
                    Some(rental)
                }
            };

            let status = if command.pending {
                PaymentRecordStatus::Pending
            } else {
                PaymentRecordStatus::Completed
            };
            let payment = append_payment(
                &db_tx,
                &mut reservation,
                rental.as_mut(),
                Collection {
                    amount_minor: command.amount_minor,
                    method: command.method,
                    category: command.category,
                    status,
                    reference: command.reference.clone(),
                    note: command.note.clone(),
                },
                actor,
            )
            .await?;
            let totals = totals_of(&db_tx, command.target, &reservation, rental.as_ref()).await?;

            tracing::info!(
                payment_id = %payment.id,
                %reservation_id,
                amount = payment.amount_minor,
                status = payment.status.as_str(),
                "payment recorded"
            );
            let audit = vec![payment_audit(actor, "payment:create", None, &payment)];
            Ok((
                PaymentReceipt {
                    payment: Some(payment),
                    totals,
                    reservation,
                    rental,
                },
                audit,
            ))
        })
    }

    /// Agent-facing status change on a reservation, turned into ledger
    /// writes: `paid` collects the remainder (or the given amount), `partial`
    /// collects the given amount, `unpaid` only succeeds while nothing has
    /// been collected.
    pub async fn set_payment_status(
        &self,
        change: PaymentStatusChange,
        actor: &str,
    ) -> ResultEngine<PaymentReceipt> {
        let reservation_id = change.reservation_id;
        let _guard = self.lock_transition(reservation_id, &[]).await?;
        let (receipt, audit) = retry_on_conflict!(self.set_status_once(&change, actor).await)
            .inspect_err(|err| self.flag_failure("payment:status", reservation_id, err))?;
        self.record_audit(audit).await;
        Ok(receipt)
    }

    async fn set_status_once(
        &self,
        change: &PaymentStatusChange,
        actor: &str,
    ) -> ResultEngine<(PaymentReceipt, Vec<AuditEntry>)> {
        with_tx!(self, |db_tx| {
            let mut reservation = access::load_reservation(&db_tx, change.reservation_id).await?;
            reservation.ensure_collectable()?;
            let before = reservation.clone();
            let mut rental = access::live_rental_for(&db_tx, reservation.id).await?;
            let totals = access::reservation_totals(&db_tx, &reservation).await?;
            if let Some(method) = change.method {
                reservation.payment_method = method;
            }

            let amount_minor = match change.status {
                PaymentStatus::Unpaid => {
                    if totals.paid_minor > 0 || totals.pending_minor > 0 {
                        return Err(EngineError::precondition(
                            "reservation",
                            reservation.id,
                            "mark unpaid",
                            "no payment recorded",
                            format!("{} collected", totals.paid_minor + totals.pending_minor),
                        ));
                    }
                    None
                }
                PaymentStatus::Paid => {
                    let amount = change.amount_minor.unwrap_or(totals.collectable_minor());
                    if amount <= 0 {
                        return Err(EngineError::InvalidAmount(format!(
                            "nothing left to collect on reservation {}",
                            reservation.id
                        )));
                    }
                    Some(amount)
                }
                PaymentStatus::Partial => match change.amount_minor {
                    Some(amount) if amount > 0 => Some(amount),
                    _ => {
                        return Err(EngineError::InvalidAmount(
                            "a partial payment needs an amount > 0".to_string(),
                        ));
                    }
                },
            };

            let mut audit = Vec::new();
            let payment = match amount_minor {
                Some(amount_minor) => {
                    let first = totals.paid_minor == 0 && totals.pending_minor == 0;
                    let (category, reference) = if first {
                        (PaymentCategory::Rental, reservation.reference())
                    } else {
                        (
                            PaymentCategory::Supplement,
                            format!("{}-CPL", reservation.reference()),
                        )
                    };
                    let note = match change.status {
                        PaymentStatus::Paid => "reservation payment (settlement)",
                        _ => "reservation payment (deposit)",
                    };
                    let method = reservation.payment_method;
                    let payment = append_payment(
                        &db_tx,
                        &mut reservation,
                        rental.as_mut(),
                        Collection {
                            amount_minor,
                            method,
                            category,
                            status: PaymentRecordStatus::Completed,
                            reference: Some(reference),
                            note: Some(note.to_string()),
                        },
                        actor,
                    )
                    .await?;
                    audit.push(payment_audit(actor, "payment:create", None, &payment));
                    Some(payment)
                }
                None => {
                    access::refresh_totals(&db_tx, &mut reservation, None).await?;
                    access::save_reservation(&db_tx, &mut reservation).await?;
                    None
                }
            };

            audit.push(AuditEntry::new(
                actor,
                "reservation:payment-status",
                "reservation",
                reservation.id,
                Some(&before),
                Some(&reservation),
            ));
            let totals = access::reservation_totals(&db_tx, &reservation).await?;
            Ok((
                PaymentReceipt {
                    payment,
                    totals,
                    reservation,
                    rental,
                },
                audit,
            ))
        })
    }

    /// Settles a pending payment. Allowed on a closed target: the collection
    /// started while it was open.
    pub async fn complete_pending_payment(
        &self,
        payment_id: Uuid,
        actor: &str,
    ) -> ResultEngine<PaymentReceipt> {
        self.settle(payment_id, PaymentRecordStatus::Completed, actor)
            .await
    }

    /// Cancels a pending payment; it no longer counts against the remainder.
    pub async fn void_pending_payment(
        &self,
        payment_id: Uuid,
        actor: &str,
    ) -> ResultEngine<PaymentReceipt> {
        self.settle(payment_id, PaymentRecordStatus::Voided, actor)
            .await
    }

    async fn settle(
        &self,
        payment_id: Uuid,
        outcome: PaymentRecordStatus,
        actor: &str,
    ) -> ResultEngine<PaymentReceipt> {
        let payment = access::load_payment(&self.database, payment_id).await?;
        let reservation_id = match (payment.reservation_id, payment.rental_id) {
            (Some(reservation_id), _) => reservation_id,
            (None, Some(rental_id)) => self.reservation_of(PaymentTarget::Rental(rental_id)).await?,
            (None, None) => {
                return Err(EngineError::InvalidInput(format!(
                    "payment {payment_id} has no target"
                )));
            }
        };
        let _guard = self.lock_transition(reservation_id, &[]).await?;
        let (receipt, audit) =
            retry_on_conflict!(self.settle_once(payment_id, reservation_id, outcome, actor).await)
                .inspect_err(|err| self.flag_failure("payment:settle", payment_id, err))?;
        self.record_audit(audit).await;
        Ok(receipt)
    }

    async fn settle_once(
        &self,
        payment_id: Uuid,
        reservation_id: Uuid,
        outcome: PaymentRecordStatus,
        actor: &str,
    ) -> ResultEngine<(PaymentReceipt, Vec<AuditEntry>)> {
        with_tx!(self, |db_tx| {
            let mut payment = access::load_payment(&db_tx, payment_id).await?;
            let mut reservation = access::load_reservation(&db_tx, reservation_id).await?;
            let mut rental = match payment.rental_id {
                Some(rental_id) => Some(access::load_rental(&db_tx, rental_id).await?),
                None => None,
            };
            let before = payment.clone();
            let now = Utc::now();

            match outcome {
                PaymentRecordStatus::Completed => {
                    let mut ledgers = vec![access::reservation_totals(&db_tx, &reservation).await?];
                    if let Some(rental) = rental.as_ref() {
                        ledgers.push(access::rental_totals(&db_tx, rental).await?);
                    }
                    for totals in ledgers {
                        // the payment itself is part of the pending sum
                        let room = totals.remaining_minor - (totals.pending_minor - payment.amount_minor);
                        if payment.amount_minor > room {
                            return Err(EngineError::OverpaymentAttempt(format!(
                                "payment {payment_id} of {} exceeds the {room} still due",
                                payment.amount_minor
                            )));
                        }
                    }
                    payment.complete(now)?;
                }
                _ => payment.void(now)?,
            }
            access::settle_payment(&db_tx, &payment).await?;

            access::refresh_totals(&db_tx, &mut reservation, rental.as_mut()).await?;
            if let Some(rental) = rental.as_mut() {
                access::save_rental(&db_tx, rental).await?;
            }
            access::save_reservation(&db_tx, &mut reservation).await?;

            let target = match payment.rental_id {
                Some(rental_id) => PaymentTarget::Rental(rental_id),
                None => PaymentTarget::Reservation(reservation_id),
            };
            let totals = totals_of(&db_tx, target, &reservation, rental.as_ref()).await?;
            let action = match payment.status {
                PaymentRecordStatus::Completed => "payment:complete",
                _ => "payment:void",
            };
            let audit = vec![payment_audit(actor, action, Some(&before), &payment)];
            Ok((
                PaymentReceipt {
                    payment: Some(payment),
                    totals,
                    reservation,
                    rental,
                },
                audit,
            ))
        })
    }

    /// Ledger-derived totals of a target. Reads only.
    pub async fn ledger_totals(&self, target: PaymentTarget) -> ResultEngine<LedgerTotals> {
        match target {
            PaymentTarget::Reservation(id) => {
                let reservation = access::load_reservation(&self.database, id).await?;
                access::reservation_totals(&self.database, &reservation).await
            }
            PaymentTarget::Rental(id) => {
                let rental = access::load_rental(&self.database, id).await?;
                access::rental_totals(&self.database, &rental).await
            }
        }
    }

    /// Payments of a target, oldest first.
    pub async fn payments(&self, target: PaymentTarget) -> ResultEngine<Vec<Payment>> {
        match target {
            PaymentTarget::Reservation(id) => {
                access::load_reservation(&self.database, id).await?;
            }
            PaymentTarget::Rental(id) => {
                access::load_rental(&self.database, id).await?;
            }
        }
        access::payments_of(&self.database, target).await
    }
}
