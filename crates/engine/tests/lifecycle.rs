mod common;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, Statement};

use common::{
    AGENT, at, client, confirmed, engine_with, engine_with_db, engines_sharing_file, three_days,
    vehicle,
};
use engine::{
    BlobStore, Booking, ContractStatus, EngineError, FixedWindowLimiter, InlineClient,
    InternalBooking, PUBLIC_ACTOR, PublicBooking, Rates, RentalStatus, ReservationEdit,
    ReservationStatus, VehicleStatus,
};

type StoreResult = Result<String, EngineError>;

/// Blob store that fails while `failing` is set.
#[derive(Clone, Default)]
struct FlakyStore {
    failing: Arc<AtomicBool>,
}

#[async_trait]
impl BlobStore for FlakyStore {
    async fn store(&self, name: &str, _bytes: Vec<u8>, _content_type: &str) -> StoreResult {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EngineError::Collaborator("storage offline".to_string()));
        }
        Ok(format!("flaky://{name}"))
    }
}

#[tokio::test]
async fn vehicle_follows_the_reservation_lifecycle() {
    let (engine, _db) = engine_with_db().await;
    let vehicle_id = vehicle(&engine, "12345-a-6").await;
    let client_id = client(&engine).await;

    let reservation = engine
        .create_reservation(Booking::Internal(three_days(vehicle_id, client_id)), AGENT)
        .await
        .unwrap();
    assert_eq!(reservation.status, ReservationStatus::Pending);
    assert_eq!(reservation.total_estimated_minor, 300);
    assert_eq!(reservation.created_by.as_deref(), Some(AGENT));
    assert_eq!(
        engine.vehicle(vehicle_id).await.unwrap().status,
        VehicleStatus::Available
    );

    let accepted = engine.accept_reservation(reservation.id, AGENT).await.unwrap();
    assert_eq!(accepted.status, ReservationStatus::Confirmed);
    assert_eq!(
        engine.vehicle(vehicle_id).await.unwrap().status,
        VehicleStatus::Reserved
    );

    let start = engine.start_rental(reservation.id, AGENT).await.unwrap();
    assert!(start.created);
    assert_eq!(start.reservation.status, ReservationStatus::Active);
    assert_eq!(start.reservation.rental_id, Some(start.rental.id));
    assert_eq!(start.rental.status, RentalStatus::Active);
    assert_eq!(start.rental.total_amount_minor, 300);
    assert_eq!(start.rental.contract_status, ContractStatus::Generated);
    assert!(start.rental.contract_url.is_some());
    assert_eq!(start.reservation.contract_url, start.rental.contract_url);
    assert_eq!(
        engine.vehicle(vehicle_id).await.unwrap().status,
        VehicleStatus::Rented
    );

    let ended = engine
        .terminate_rental(start.rental.id, Some(at(4, 9)), AGENT)
        .await
        .unwrap();
    assert!(ended.changed);
    let rental = ended.rental.unwrap();
    assert_eq!(rental.status, RentalStatus::Completed);
    assert_eq!(rental.actual_end, Some(at(4, 9)));
    assert_eq!(ended.reservation.unwrap().status, ReservationStatus::Completed);
    assert_eq!(
        engine.vehicle(vehicle_id).await.unwrap().status,
        VehicleStatus::Available
    );
}

#[tokio::test]
async fn start_and_terminate_are_idempotent() {
    let (engine, _db) = engine_with_db().await;
    let vehicle_id = vehicle(&engine, "AB-1").await;
    let client_id = client(&engine).await;
    let reservation = confirmed(&engine, three_days(vehicle_id, client_id)).await;

    let first = engine.start_rental(reservation.id, AGENT).await.unwrap();
    let second = engine.start_rental(reservation.id, AGENT).await.unwrap();
    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.rental.id, second.rental.id);

    let ended = engine
        .terminate_rental(first.rental.id, Some(at(3, 18)), AGENT)
        .await
        .unwrap();
    assert!(ended.changed);
    let again = engine
        .terminate_rental(first.rental.id, None, AGENT)
        .await
        .unwrap();
    assert!(!again.changed);
    assert_eq!(again.rental.unwrap().actual_end, Some(at(3, 18)));

    // the reservation is completed now, there is nothing left to end
    let err = engine
        .end_reservation(reservation.id, AGENT)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PreconditionFailed { .. }), "{err}");
}

#[tokio::test]
async fn concurrent_starts_open_a_single_rental() {
    let (engine, db) = engine_with_db().await;
    let vehicle_id = vehicle(&engine, "AB-2").await;
    let client_id = client(&engine).await;
    let reservation = confirmed(&engine, three_days(vehicle_id, client_id)).await;

    let (a, b) = tokio::join!(
        engine.start_rental(reservation.id, AGENT),
        engine.start_rental(reservation.id, "bob"),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.rental.id, b.rental.id);
    assert!(a.created ^ b.created);

    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_sql_and_values(
            backend,
            "SELECT COUNT(*) AS n FROM rentals WHERE reservation_id = ?",
            vec![reservation.id.to_string().into()],
        ))
        .await
        .unwrap()
        .unwrap();
    let count: i64 = row.try_get("", "n").unwrap();
    assert_eq!(count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn starts_from_two_processes_open_a_single_rental() {
    let (a, b, path) = engines_sharing_file().await;
    let client_id = client(&a).await;

    for round in 0..5 {
        let vehicle_id = vehicle(&a, &format!("FILE-{round}")).await;
        let reservation = confirmed(&a, three_days(vehicle_id, client_id)).await;

        let (first, second) = tokio::join!(
            a.start_rental(reservation.id, AGENT),
            b.start_rental(reservation.id, "bob"),
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_eq!(first.rental.id, second.rental.id, "round {round}");
        assert!(first.created ^ second.created, "round {round}");

        let stored = b.reservation(reservation.id).await.unwrap();
        assert_eq!(stored.status, ReservationStatus::Active);
        assert_eq!(stored.rental_id, Some(first.rental.id));
        let vehicle = a.vehicle(vehicle_id).await.unwrap();
        assert_eq!(vehicle.status, VehicleStatus::Rented);
    }

    drop((a, b));
    let _ = std::fs::remove_file(path);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn accept_and_reject_from_two_processes_agree() {
    let (a, b, path) = engines_sharing_file().await;
    let vehicle_id = vehicle(&a, "FILE-AR").await;
    let client_id = client(&a).await;
    let reservation = a
        .create_reservation(Booking::Internal(three_days(vehicle_id, client_id)), AGENT)
        .await
        .unwrap();

    let (accepted, rejected) = tokio::join!(
        a.accept_reservation(reservation.id, AGENT),
        b.reject_reservation(reservation.id, "bob"),
    );
    rejected.unwrap();
    if let Err(err) = accepted {
        assert!(matches!(err, EngineError::PreconditionFailed { .. }), "{err}");
    }

    let stored = a.reservation(reservation.id).await.unwrap();
    assert_eq!(stored.status, ReservationStatus::Cancelled);
    let vehicle = b.vehicle(vehicle_id).await.unwrap();
    assert_eq!(vehicle.status, VehicleStatus::Available);

    drop((a, b));
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn accept_and_reject_race_has_one_winner() {
    let (engine, _db) = engine_with_db().await;
    let vehicle_id = vehicle(&engine, "AB-3").await;
    let client_id = client(&engine).await;
    let reservation = engine
        .create_reservation(Booking::Internal(three_days(vehicle_id, client_id)), AGENT)
        .await
        .unwrap();

    let (accepted, rejected) = tokio::join!(
        engine.accept_reservation(reservation.id, AGENT),
        engine.reject_reservation(reservation.id, "bob"),
    );

    let stored = engine.reservation(reservation.id).await.unwrap();
    let vehicle = engine.vehicle(vehicle_id).await.unwrap();
    match (accepted, rejected) {
        (Ok(_), Ok(_)) => {
            // reject also applies to a confirmed reservation
            assert_eq!(stored.status, ReservationStatus::Cancelled);
            assert_eq!(vehicle.status, VehicleStatus::Available);
        }
        (Ok(_), Err(err)) => panic!("reject of a confirmed reservation failed: {err}"),
        (Err(err), Ok(_)) => {
            assert!(matches!(err, EngineError::PreconditionFailed { .. }), "{err}");
            assert_eq!(stored.status, ReservationStatus::Cancelled);
            assert_eq!(vehicle.status, VehicleStatus::Available);
        }
        (Err(a), Err(b)) => panic!("both transitions failed: {a} / {b}"),
    }
}

#[tokio::test]
async fn wrong_state_is_reported_with_the_persisted_status() {
    let (engine, _db) = engine_with_db().await;
    let vehicle_id = vehicle(&engine, "AB-4").await;
    let client_id = client(&engine).await;
    let reservation = engine
        .create_reservation(Booking::Internal(three_days(vehicle_id, client_id)), AGENT)
        .await
        .unwrap();

    let err = engine
        .start_rental(reservation.id, AGENT)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::PreconditionFailed {
            entity: "reservation",
            id: reservation.id.to_string(),
            action: "start",
            expected: "confirmed".to_string(),
            actual: "pending".to_string(),
        }
    );
    assert!(
        engine
            .rental_for_reservation(reservation.id)
            .await
            .unwrap()
            .is_none()
    );

    engine
        .reject_reservation(reservation.id, AGENT)
        .await
        .unwrap();
    let err = engine
        .accept_reservation(reservation.id, AGENT)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PreconditionFailed { .. }), "{err}");

    let err = engine
        .accept_reservation(uuid::Uuid::new_v4(), AGENT)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)), "{err}");
}

#[tokio::test]
async fn bookings_are_validated_before_any_write() {
    let (engine, _db) = engine_with_db().await;
    let vehicle_id = vehicle(&engine, "AB-5").await;
    let client_id = client(&engine).await;

    let backwards =
        InternalBooking::for_client(vehicle_id, client_id, at(4, 10), at(4, 10), Rates::daily(100));
    let err = engine
        .create_reservation(Booking::Internal(backwards), AGENT)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidPeriod(_)), "{err}");

    let nameless = PublicBooking::new(
        vehicle_id,
        InlineClient::new("  ", "Idrissi", "0611223344"),
        at(1, 10),
        at(2, 10),
        Rates::daily(100),
        "203.0.113.7",
    );
    let err = engine
        .create_reservation(Booking::Public(nameless), PUBLIC_ACTOR)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingClient(_)), "{err}");

    let err = engine
        .create_reservation(
            Booking::Internal(three_days(vehicle_id, client_id).upfront(0)),
            AGENT,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)), "{err}");

    assert!(engine.reservations(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn public_requests_are_rate_limited_and_clients_created_on_accept() {
    let (engine, _db) = engine_with(|builder| {
        builder.admission(FixedWindowLimiter::new(2, std::time::Duration::from_secs(60)))
    })
    .await;
    let vehicle_id = vehicle(&engine, "AB-6").await;
    let request = |phone: &str| {
        PublicBooking::new(
            vehicle_id,
            InlineClient::new("Yassine", "Idrissi", phone),
            at(10, 9),
            at(12, 9),
            Rates::daily(250),
            "203.0.113.7",
        )
    };

    let first = engine
        .create_reservation(Booking::Public(request("0611 22 33 44")), PUBLIC_ACTOR)
        .await
        .unwrap();
    let second = engine
        .create_reservation(Booking::Public(request("0611223344")), PUBLIC_ACTOR)
        .await
        .unwrap();
    let err = engine
        .create_reservation(Booking::Public(request("0611223344")), PUBLIC_ACTOR)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::TooManyRequests("203.0.113.7".to_string()));
    assert_eq!(engine.reservations(None).await.unwrap().len(), 2);

    assert_eq!(first.status, ReservationStatus::Pending);
    assert_eq!(first.total_estimated_minor, 500);
    assert!(first.client_id().is_none());
    assert_eq!(first.inline_client().unwrap().phone, "0611223344");
    // a request does not hold the vehicle
    assert_eq!(
        engine.vehicle(vehicle_id).await.unwrap().status,
        VehicleStatus::Available
    );

    let first = engine.accept_reservation(first.id, AGENT).await.unwrap();
    let second = engine.accept_reservation(second.id, AGENT).await.unwrap();
    let client_id = first.client_id().unwrap();
    assert_eq!(second.client_id(), Some(client_id));
    let client = engine.client(client_id).await.unwrap();
    assert_eq!(client.full_name(), "Yassine Idrissi");
}

#[tokio::test]
async fn internal_inline_client_is_registered_when_the_rental_starts() {
    let (engine, _db) = engine_with_db().await;
    let vehicle_id = vehicle(&engine, "AB-7").await;
    let booking = InternalBooking::new(
        vehicle_id,
        engine::ClientRef::Inline(InlineClient::new("Omar", "Benali", "0700000000")),
        at(1, 10),
        at(2, 10),
        Rates::daily(100),
    );
    let reservation = engine
        .create_reservation(Booking::Internal(booking), AGENT)
        .await
        .unwrap();
    let reservation = engine.accept_reservation(reservation.id, AGENT).await.unwrap();
    let client_id = reservation.client_id().unwrap();

    let start = engine.start_rental(reservation.id, AGENT).await.unwrap();
    assert_eq!(start.rental.client_id, client_id);
}

#[tokio::test]
async fn failed_contract_stays_pending_until_retried() {
    let store = FlakyStore::default();
    store.failing.store(true, Ordering::SeqCst);
    let (engine, _db) = engine_with({
        let store = store.clone();
        move |builder| builder.blob_store(store)
    })
    .await;
    let vehicle_id = vehicle(&engine, "AB-8").await;
    let client_id = client(&engine).await;
    let reservation = confirmed(&engine, three_days(vehicle_id, client_id)).await;

    let start = engine.start_rental(reservation.id, AGENT).await.unwrap();
    assert!(start.created);
    assert_eq!(start.rental.contract_status, ContractStatus::Pending);
    assert_eq!(start.rental.contract_url, None);
    assert_eq!(start.reservation.contract_url, None);

    let err = engine
        .retry_contract(start.rental.id, AGENT)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Collaborator(_)), "{err}");

    store.failing.store(false, Ordering::SeqCst);
    let rental = engine.retry_contract(start.rental.id, AGENT).await.unwrap();
    assert_eq!(rental.contract_status, ContractStatus::Generated);
    let url = rental.contract_url.clone().unwrap();
    assert!(url.starts_with("flaky://"), "{url}");
    let stored = engine.reservation(reservation.id).await.unwrap();
    assert_eq!(stored.contract_url.as_deref(), Some(url.as_str()));

    // a generated contract is not issued twice
    let again = engine.retry_contract(start.rental.id, AGENT).await.unwrap();
    assert_eq!(again.contract_url, Some(url));
}

#[tokio::test]
async fn edits_move_the_booking_between_vehicles() {
    let (engine, _db) = engine_with_db().await;
    let first_vehicle = vehicle(&engine, "AB-9").await;
    let second_vehicle = vehicle(&engine, "AB-10").await;
    let client_id = client(&engine).await;
    let reservation = confirmed(&engine, three_days(first_vehicle, client_id)).await;

    let edited = engine
        .edit_reservation(
            reservation.id,
            ReservationEdit::new()
                .vehicle_id(second_vehicle)
                .period_end(at(6, 10)),
            AGENT,
        )
        .await
        .unwrap();
    assert_eq!(edited.vehicle_id, second_vehicle);
    assert_eq!(edited.total_estimated_minor, 500);
    assert_eq!(edited.amount_remaining_minor, 500);
    assert_eq!(
        engine.vehicle(first_vehicle).await.unwrap().status,
        VehicleStatus::Available
    );
    assert_eq!(
        engine.vehicle(second_vehicle).await.unwrap().status,
        VehicleStatus::Reserved
    );
}

#[tokio::test]
async fn maintenance_survives_a_cancelled_booking() {
    let (engine, _db) = engine_with_db().await;
    let vehicle_id = vehicle(&engine, "AB-11").await;
    let client_id = client(&engine).await;
    let reservation = engine
        .create_reservation(Booking::Internal(three_days(vehicle_id, client_id)), AGENT)
        .await
        .unwrap();

    let vehicle = engine
        .set_vehicle_maintenance(vehicle_id, true, AGENT)
        .await
        .unwrap();
    assert_eq!(vehicle.status, VehicleStatus::InMaintenance);

    engine
        .reject_reservation(reservation.id, AGENT)
        .await
        .unwrap();
    assert_eq!(
        engine.vehicle(vehicle_id).await.unwrap().status,
        VehicleStatus::InMaintenance
    );

    let vehicle = engine
        .set_vehicle_maintenance(vehicle_id, false, AGENT)
        .await
        .unwrap();
    assert_eq!(vehicle.status, VehicleStatus::Available);

    let availability = engine.vehicle_availability(vehicle_id).await.unwrap();
    assert!(availability.is_empty());
}

#[tokio::test]
async fn transitions_leave_an_audit_trail() {
    let (engine, db) = engine_with_db().await;
    let vehicle_id = vehicle(&engine, "AB-12").await;
    let client_id = client(&engine).await;
    let reservation = confirmed(&engine, three_days(vehicle_id, client_id)).await;

    let backend = db.get_database_backend();
    let rows = db
        .query_all(Statement::from_sql_and_values(
            backend,
            "SELECT action, actor FROM audit_logs WHERE entity_id = ? ORDER BY created_at",
            vec![reservation.id.to_string().into()],
        ))
        .await
        .unwrap();
    let actions: Vec<(String, String)> = rows
        .iter()
        .map(|row| {
            (
                row.try_get("", "action").unwrap(),
                row.try_get("", "actor").unwrap(),
            )
        })
        .collect();
    assert_eq!(
        actions,
        vec![
            ("reservation:create".to_string(), AGENT.to_string()),
            ("reservation:accept".to_string(), AGENT.to_string()),
        ]
    );
}
