mod common;

use sea_orm::{ConnectionTrait, Statement};

use common::{AGENT, assert_balanced, at, client, confirmed, engine_with_db, three_days, vehicle};
use engine::{
    Booking, EngineError, PaymentCategory, PaymentMethod, PaymentRecordStatus, PaymentStatus,
    PaymentStatusChange, PaymentTarget, RecordPayment,
};

#[tokio::test]
async fn rental_payments_and_extension_settle_the_balance() {
    let (engine, _db) = engine_with_db().await;
    let vehicle_id = vehicle(&engine, "LG-1").await;
    let client_id = client(&engine).await;
    let reservation = confirmed(&engine, three_days(vehicle_id, client_id)).await;
    let rental = engine
        .start_rental(reservation.id, AGENT)
        .await
        .unwrap()
        .rental;
    let target = PaymentTarget::Rental(rental.id);

    let receipt = engine
        .record_payment(RecordPayment::new(target, 150), AGENT)
        .await
        .unwrap();
    assert_eq!(receipt.totals.paid_minor, 150);
    assert_eq!(receipt.totals.remaining_minor, 150);
    assert_eq!(receipt.totals.status, PaymentStatus::Partial);
    assert_eq!(receipt.reservation.payment_status, PaymentStatus::Partial);
    assert_balanced(&receipt.totals);

    let rental = engine
        .extend_rental(rental.id, at(5, 10), 50, AGENT)
        .await
        .unwrap();
    assert_eq!(rental.planned_end, at(5, 10));
    assert_eq!(rental.total_amount_minor, 350);
    assert_eq!(rental.amount_remaining_minor, 200);
    assert_eq!(rental.extensions.len(), 1);
    let totals = engine.ledger_totals(target).await.unwrap();
    assert_eq!(totals.total_minor, 350);
    assert_balanced(&totals);
    let stored = engine.reservation(reservation.id).await.unwrap();
    assert_eq!(stored.period_end, at(5, 10));
    assert_eq!(stored.total_estimated_minor, 350);

    let receipt = engine
        .record_payment(
            RecordPayment::new(target, 200)
                .method(PaymentMethod::Card)
                .category(PaymentCategory::Supplement),
            AGENT,
        )
        .await
        .unwrap();
    assert_eq!(receipt.totals.paid_minor, 350);
    assert_eq!(receipt.totals.remaining_minor, 0);
    assert_eq!(receipt.totals.status, PaymentStatus::Paid);
    assert_eq!(receipt.reservation.amount_paid_minor, 350);
    assert_eq!(receipt.reservation.payment_status, PaymentStatus::Paid);

    let err = engine
        .record_payment(RecordPayment::new(target, 1), AGENT)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::OverpaymentAttempt(_)), "{err}");

    let err = engine
        .extend_rental(rental.id, at(4, 10), 10, AGENT)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidPeriod(_)), "{err}");
}

#[tokio::test]
async fn upfront_payment_follows_the_booking_onto_the_rental() {
    let (engine, _db) = engine_with_db().await;
    let vehicle_id = vehicle(&engine, "LG-2").await;
    let client_id = client(&engine).await;

    let reservation = confirmed(&engine, three_days(vehicle_id, client_id).upfront(100)).await;
    assert_eq!(reservation.amount_paid_minor, 100);
    assert_eq!(reservation.amount_remaining_minor, 200);
    assert_eq!(reservation.payment_status, PaymentStatus::Partial);

    let start = engine.start_rental(reservation.id, AGENT).await.unwrap();
    assert_eq!(start.rental.amount_paid_minor, 100);
    assert_eq!(start.rental.payment_status, PaymentStatus::Partial);

    let payments = engine
        .payments(PaymentTarget::Rental(start.rental.id))
        .await
        .unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].reservation_id, Some(reservation.id));
    assert_eq!(payments[0].rental_id, Some(start.rental.id));
    assert_eq!(payments[0].category, PaymentCategory::Rental);
    assert_eq!(payments[0].created_by.as_deref(), Some(AGENT));
    assert_eq!(payments[0].reference, Some(reservation.reference()));
}

#[tokio::test]
async fn invalid_or_excessive_amounts_write_nothing() {
    let (engine, _db) = engine_with_db().await;
    let vehicle_id = vehicle(&engine, "LG-3").await;
    let client_id = client(&engine).await;
    let reservation = confirmed(&engine, three_days(vehicle_id, client_id)).await;
    let target = PaymentTarget::Reservation(reservation.id);

    let err = engine
        .record_payment(RecordPayment::new(target, 0), AGENT)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)), "{err}");

    let err = engine
        .record_payment(RecordPayment::new(target, 400), AGENT)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::OverpaymentAttempt(_)), "{err}");

    assert!(engine.payments(target).await.unwrap().is_empty());
    let stored = engine.reservation(reservation.id).await.unwrap();
    assert_eq!(stored.amount_paid_minor, 0);
    assert_eq!(stored.amount_remaining_minor, 300);
    assert_eq!(stored.version, reservation.version);
}

#[tokio::test]
async fn cancelled_reservation_takes_no_payment() {
    let (engine, _db) = engine_with_db().await;
    let vehicle_id = vehicle(&engine, "LG-4").await;
    let client_id = client(&engine).await;
    let reservation = confirmed(&engine, three_days(vehicle_id, client_id)).await;
    engine
        .reject_reservation(reservation.id, AGENT)
        .await
        .unwrap();

    let err = engine
        .record_payment(
            RecordPayment::new(PaymentTarget::Reservation(reservation.id), 100),
            AGENT,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::TargetClosed(_)), "{err}");

    let err = engine
        .set_payment_status(
            PaymentStatusChange::new(reservation.id, PaymentStatus::Paid),
            AGENT,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::TargetClosed(_)), "{err}");
}

#[tokio::test]
async fn completed_rental_still_collects_the_balance() {
    let (engine, _db) = engine_with_db().await;
    let vehicle_id = vehicle(&engine, "LG-5").await;
    let client_id = client(&engine).await;
    let reservation = confirmed(&engine, three_days(vehicle_id, client_id)).await;
    let rental = engine
        .start_rental(reservation.id, AGENT)
        .await
        .unwrap()
        .rental;
    engine
        .terminate_rental(rental.id, None, AGENT)
        .await
        .unwrap();

    let receipt = engine
        .record_payment(RecordPayment::new(PaymentTarget::Rental(rental.id), 300), AGENT)
        .await
        .unwrap();
    assert_eq!(receipt.totals.status, PaymentStatus::Paid);
    assert_eq!(receipt.rental.unwrap().payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn pending_collections_count_against_the_remainder() {
    let (engine, _db) = engine_with_db().await;
    let vehicle_id = vehicle(&engine, "LG-6").await;
    let client_id = client(&engine).await;
    let reservation = confirmed(&engine, three_days(vehicle_id, client_id)).await;
    let target = PaymentTarget::Reservation(reservation.id);

    let transfer = engine
        .record_payment(
            RecordPayment::new(target, 200)
                .method(PaymentMethod::Transfer)
                .reference("VIR-2026-0042")
                .pending(),
            AGENT,
        )
        .await
        .unwrap();
    let transfer = transfer.payment.unwrap();
    assert_eq!(transfer.status, PaymentRecordStatus::Pending);
    let totals = engine.ledger_totals(target).await.unwrap();
    assert_eq!(totals.paid_minor, 0);
    assert_eq!(totals.pending_minor, 200);
    assert_eq!(totals.status, PaymentStatus::Unpaid);

    // only 100 is left once the pending transfer is spoken for
    let err = engine
        .record_payment(RecordPayment::new(target, 150), AGENT)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::OverpaymentAttempt(_)), "{err}");

    let cheque = engine
        .record_payment(RecordPayment::new(target, 100).pending(), AGENT)
        .await
        .unwrap()
        .payment
        .unwrap();

    let receipt = engine
        .complete_pending_payment(transfer.id, AGENT)
        .await
        .unwrap();
    assert_eq!(receipt.totals.paid_minor, 200);
    assert_eq!(receipt.totals.pending_minor, 100);
    assert_eq!(receipt.reservation.payment_status, PaymentStatus::Partial);
    assert_balanced(&receipt.totals);

    let receipt = engine.void_pending_payment(cheque.id, AGENT).await.unwrap();
    assert_eq!(receipt.payment.unwrap().status, PaymentRecordStatus::Voided);
    assert_eq!(receipt.totals.pending_minor, 0);
    assert_eq!(receipt.totals.remaining_minor, 100);

    // settled payments cannot be settled again
    assert!(engine.void_pending_payment(transfer.id, AGENT).await.is_err());
    assert!(engine.complete_pending_payment(cheque.id, AGENT).await.is_err());
}

#[tokio::test]
async fn pending_collection_settles_after_cancellation() {
    let (engine, _db) = engine_with_db().await;
    let vehicle_id = vehicle(&engine, "LG-9").await;
    let client_id = client(&engine).await;
    let reservation = confirmed(&engine, three_days(vehicle_id, client_id)).await;
    let payment = engine
        .record_payment(
            RecordPayment::new(PaymentTarget::Reservation(reservation.id), 100).pending(),
            AGENT,
        )
        .await
        .unwrap()
        .payment
        .unwrap();
    engine
        .reject_reservation(reservation.id, AGENT)
        .await
        .unwrap();

    let receipt = engine
        .complete_pending_payment(payment.id, AGENT)
        .await
        .unwrap();
    assert_eq!(receipt.reservation.status, engine::ReservationStatus::Cancelled);
    assert_eq!(receipt.totals.paid_minor, 100);
    assert_eq!(receipt.reservation.amount_paid_minor, 100);

    let err = engine
        .void_pending_payment(payment.id, AGENT)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PreconditionFailed { .. }), "{err}");
}

#[tokio::test]
async fn payment_status_shortcuts() {
    let (engine, _db) = engine_with_db().await;
    let vehicle_id = vehicle(&engine, "LG-7").await;
    let client_id = client(&engine).await;
    let reservation = confirmed(&engine, three_days(vehicle_id, client_id)).await;

    let receipt = engine
        .set_payment_status(
            PaymentStatusChange::new(reservation.id, PaymentStatus::Unpaid)
                .method(PaymentMethod::Card),
            AGENT,
        )
        .await
        .unwrap();
    assert!(receipt.payment.is_none());
    assert_eq!(receipt.reservation.payment_method, PaymentMethod::Card);

    let err = engine
        .set_payment_status(
            PaymentStatusChange::new(reservation.id, PaymentStatus::Partial),
            AGENT,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)), "{err}");

    let receipt = engine
        .set_payment_status(
            PaymentStatusChange::new(reservation.id, PaymentStatus::Partial).amount(120),
            AGENT,
        )
        .await
        .unwrap();
    let payment = receipt.payment.unwrap();
    assert_eq!(payment.category, PaymentCategory::Rental);
    assert_eq!(payment.method, PaymentMethod::Card);
    assert_eq!(payment.reference, Some(reservation.reference()));
    assert_eq!(payment.note.as_deref(), Some("reservation payment (deposit)"));
    assert_eq!(receipt.totals.status, PaymentStatus::Partial);

    let receipt = engine
        .set_payment_status(
            PaymentStatusChange::new(reservation.id, PaymentStatus::Paid),
            AGENT,
        )
        .await
        .unwrap();
    let payment = receipt.payment.unwrap();
    assert_eq!(payment.amount_minor, 180);
    assert_eq!(payment.category, PaymentCategory::Supplement);
    assert_eq!(
        payment.reference,
        Some(format!("{}-CPL", reservation.reference()))
    );
    assert_eq!(payment.note.as_deref(), Some("reservation payment (settlement)"));
    assert_eq!(receipt.totals.status, PaymentStatus::Paid);

    let err = engine
        .set_payment_status(
            PaymentStatusChange::new(reservation.id, PaymentStatus::Unpaid),
            AGENT,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PreconditionFailed { .. }), "{err}");

    let err = engine
        .set_payment_status(
            PaymentStatusChange::new(reservation.id, PaymentStatus::Paid),
            AGENT,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)), "{err}");
}

#[tokio::test]
async fn reconcile_rewrites_drifted_caches() {
    let (engine, db) = engine_with_db().await;
    let vehicle_id = vehicle(&engine, "LG-8").await;
    let client_id = client(&engine).await;
    let reservation = confirmed(&engine, three_days(vehicle_id, client_id).upfront(100)).await;
    let rental = engine
        .start_rental(reservation.id, AGENT)
        .await
        .unwrap()
        .rental;
    let untouched = engine
        .create_reservation(Booking::Internal(three_days(vehicle_id, client_id)), AGENT)
        .await
        .unwrap();

    let report = engine.reconcile_all_ledger_caches().await.unwrap();
    assert!(report.is_clean(), "{report:?}");

    let backend = db.get_database_backend();
    for sql in [
        "UPDATE reservations SET amount_paid_minor = 0, amount_remaining_minor = 300, payment_status = 'unpaid' WHERE id = ?",
        "UPDATE rentals SET amount_paid_minor = 300, amount_remaining_minor = 0, payment_status = 'paid' WHERE reservation_id = ?",
    ] {
        db.execute(Statement::from_sql_and_values(
            backend,
            sql,
            vec![reservation.id.to_string().into()],
        ))
        .await
        .unwrap();
    }

    let report = engine.reconcile_all_ledger_caches().await.unwrap();
    assert_eq!(report.checked, 3);
    assert_eq!(report.corrected_reservations, vec![reservation.id]);
    assert_eq!(report.corrected_rentals, vec![rental.id]);

    let stored = engine.reservation(reservation.id).await.unwrap();
    assert_eq!(stored.amount_paid_minor, 100);
    assert_eq!(stored.amount_remaining_minor, 200);
    assert_eq!(stored.payment_status, PaymentStatus::Partial);
    let stored = engine.rental(rental.id).await.unwrap();
    assert_eq!(stored.amount_paid_minor, 100);
    assert_eq!(stored.payment_status, PaymentStatus::Partial);

    let report = engine.reconcile_ledger_caches(untouched.id).await.unwrap();
    assert_eq!(report.checked, 1);
    assert!(report.is_clean());
}

#[tokio::test]
async fn reconcile_rebuilds_the_amount_due_from_extensions() {
    let (engine, db) = engine_with_db().await;
    let vehicle_id = vehicle(&engine, "LG-9").await;
    let client_id = client(&engine).await;
    let reservation = confirmed(&engine, three_days(vehicle_id, client_id)).await;
    let rental = engine
        .start_rental(reservation.id, AGENT)
        .await
        .unwrap()
        .rental;
    let rental = engine
        .extend_rental(rental.id, at(5, 10), 100, AGENT)
        .await
        .unwrap();
    assert_eq!(rental.base_amount_minor, 300);
    assert_eq!(rental.total_amount_minor, 400);

    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE rentals SET total_amount_minor = 999, amount_remaining_minor = 999 WHERE id = ?",
        vec![rental.id.to_string().into()],
    ))
    .await
    .unwrap();

    let report = engine.reconcile_ledger_caches(reservation.id).await.unwrap();
    assert_eq!(report.drifted_totals, vec![rental.id]);
    assert_eq!(report.corrected_rentals, vec![rental.id]);
    assert!(report.corrected_reservations.is_empty(), "{report:?}");

    let stored = engine.rental(rental.id).await.unwrap();
    assert_eq!(stored.total_amount_minor, 400);
    assert_eq!(stored.amount_remaining_minor, 400);
    assert_eq!(
        engine.reservation(reservation.id).await.unwrap().total_estimated_minor,
        400
    );

    let report = engine.reconcile_ledger_caches(reservation.id).await.unwrap();
    assert!(report.is_clean(), "{report:?}");
}
