//! Row access shared by the transitions: loading aggregates, versioned saves
//! and ledger folds. Everything takes the connection explicitly so the same
//! helpers run inside a transition's transaction or on the plain pool.

use sea_orm::{
    ActiveModelTrait, ActiveValue, ConnectionTrait, DatabaseTransaction, DbBackend, QueryFilter,
    QueryOrder, prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    Client, EngineError, LedgerTotals, Payment, PaymentTarget, Rental, RentalStatus, Reservation,
    ReservationStatus, ResultEngine, Vehicle, VehicleStatus, clients, payments, rental_extensions, rentals,
    reservations, vehicles,
};

/// Generates a `load_*` function returning the domain value or `NotFound`.
macro_rules! impl_load {
    ($fn_name:ident, $ty:ty, $module:ident, $label:literal) => {
        pub(super) async fn $fn_name<C: ConnectionTrait>(db: &C, id: Uuid) -> ResultEngine<$ty> {
            let model = $module::Entity::find_by_id(id.to_string())
                .one(db)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("{} {id}", $label)))?;
            <$ty>::try_from(model)
        }
    };
}

/// Generates a `save_*` function doing a version-checked update. A row whose
/// version moved since it was read yields [`EngineError::Conflict`].
macro_rules! impl_versioned_save {
    ($fn_name:ident, $ty:ty, $module:ident, $label:literal) => {
        pub(super) async fn $fn_name(db: &DatabaseTransaction, value: &mut $ty) -> ResultEngine<()> {
            let expected = value.version;
            let mut model = $module::ActiveModel::from(&*value);
            model.id = ActiveValue::NotSet;
            model.version = ActiveValue::Set(expected + 1);
            let result = $module::Entity::update_many()
                .set(model)
                .filter($module::Column::Id.eq(value.id.to_string()))
                .filter($module::Column::Version.eq(expected))
                .exec(db)
                .await?;
            if result.rows_affected == 0 {
                return Err(EngineError::Conflict(format!(
                    "{} {} changed since version {expected}",
                    $label, value.id
                )));
            }
            value.version = expected + 1;
            Ok(())
        }
    };
}

/// Takes the SQLite write lock before the transition reads anything. A
/// writer in another process is then waited for (busy timeout) instead of
/// failing the lock upgrade of a deferred transaction.
pub(super) async fn claim_writer(db: &DatabaseTransaction) -> ResultEngine<()> {
    if db.get_database_backend() == DbBackend::Sqlite {
        db.execute_unprepared("UPDATE vehicles SET version = version WHERE 0")
            .await?;
    }
    Ok(())
}

impl_load!(load_reservation, Reservation, reservations, "reservation");
impl_load!(load_vehicle, Vehicle, vehicles, "vehicle");
impl_load!(load_client, Client, clients, "client");

impl_versioned_save!(save_reservation, Reservation, reservations, "reservation");
impl_versioned_save!(save_rental, Rental, rentals, "rental");
impl_versioned_save!(save_vehicle, Vehicle, vehicles, "vehicle");

async fn rental_from_model<C: ConnectionTrait>(db: &C, model: rentals::Model) -> ResultEngine<Rental> {
    let extensions = rental_extensions::Entity::find()
        .filter(rental_extensions::Column::RentalId.eq(model.id.clone()))
        .all(db)
        .await?;
    Rental::try_from((model, extensions))
}

pub(super) async fn load_rental<C: ConnectionTrait>(db: &C, id: Uuid) -> ResultEngine<Rental> {
    let model = rentals::Entity::find_by_id(id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("rental {id}")))?;
    rental_from_model(db, model).await
}

/// The non-cancelled rental of a reservation, if it was started.
pub(super) async fn live_rental_for<C: ConnectionTrait>(
    db: &C,
    reservation_id: Uuid,
) -> ResultEngine<Option<Rental>> {
    let model = rentals::Entity::find()
        .filter(rentals::Column::ReservationId.eq(reservation_id.to_string()))
        .filter(rentals::Column::Status.ne(RentalStatus::Cancelled.as_str()))
        .one(db)
        .await?;
    match model {
        Some(model) => Ok(Some(rental_from_model(db, model).await?)),
        None => Ok(None),
    }
}

pub(super) async fn load_payment<C: ConnectionTrait>(db: &C, id: Uuid) -> ResultEngine<Payment> {
    let model = payments::Entity::find_by_id(id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("payment {id}")))?;
    Payment::try_from(model)
}

/// Payments of a target, oldest first.
pub(super) async fn payments_of<C: ConnectionTrait>(
    db: &C,
    target: PaymentTarget,
) -> ResultEngine<Vec<Payment>> {
    let query = match target {
        PaymentTarget::Reservation(id) => payments::Entity::find()
            .filter(payments::Column::ReservationId.eq(id.to_string())),
        PaymentTarget::Rental(id) => {
            payments::Entity::find().filter(payments::Column::RentalId.eq(id.to_string()))
        }
    };
    query
        .order_by_asc(payments::Column::CreatedAt)
        .order_by_asc(payments::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(Payment::try_from)
        .collect()
}

pub(super) async fn insert_payment(db: &DatabaseTransaction, payment: &Payment) -> ResultEngine<()> {
    payments::ActiveModel::from(payment).insert(db).await?;
    Ok(())
}

/// Persists the one allowed change of a payment row: settling a pending one.
pub(super) async fn settle_payment(db: &DatabaseTransaction, payment: &Payment) -> ResultEngine<()> {
    let result = payments::Entity::update_many()
        .col_expr(payments::Column::Status, Expr::value(payment.status.as_str()))
        .col_expr(payments::Column::SettledAt, Expr::value(payment.settled_at))
        .filter(payments::Column::Id.eq(payment.id.to_string()))
        .filter(payments::Column::Status.eq(crate::PaymentRecordStatus::Pending.as_str()))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(EngineError::Conflict(format!(
            "payment {} is no longer pending",
            payment.id
        )));
    }
    Ok(())
}

/// Points every reservation payment not yet linked to a rental at `rental_id`.
pub(super) async fn link_payments_to_rental(
    db: &DatabaseTransaction,
    reservation_id: Uuid,
    rental_id: Uuid,
) -> ResultEngine<u64> {
    let result = payments::Entity::update_many()
        .col_expr(payments::Column::RentalId, Expr::value(rental_id.to_string()))
        .filter(payments::Column::ReservationId.eq(reservation_id.to_string()))
        .filter(payments::Column::RentalId.is_null())
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub(super) async fn reservation_totals<C: ConnectionTrait>(
    db: &C,
    reservation: &Reservation,
) -> ResultEngine<LedgerTotals> {
    let payments = payments_of(db, PaymentTarget::Reservation(reservation.id)).await?;
    LedgerTotals::compute(reservation.total_estimated_minor, &payments)
}

pub(super) async fn rental_totals<C: ConnectionTrait>(
    db: &C,
    rental: &Rental,
) -> ResultEngine<LedgerTotals> {
    let payments = payments_of(db, PaymentTarget::Rental(rental.id)).await?;
    LedgerTotals::compute(rental.total_amount_minor, &payments)
}

/// Recomputes the cached collection fields of both records from the ledger.
/// Callers save the records afterwards.
pub(super) async fn refresh_totals<C: ConnectionTrait>(
    db: &C,
    reservation: &mut Reservation,
    rental: Option<&mut Rental>,
) -> ResultEngine<()> {
    let totals = reservation_totals(db, reservation).await?;
    reservation.apply_totals(&totals);
    if let Some(rental) = rental {
        let totals = rental_totals(db, rental).await?;
        rental.apply_totals(&totals);
    }
    Ok(())
}

/// Availability projection write. No business validation: the caller is the
/// transition that decided the status.
pub(super) async fn set_vehicle_status(
    db: &DatabaseTransaction,
    vehicle_id: Uuid,
    status: VehicleStatus,
) -> ResultEngine<Vehicle> {
    let mut vehicle = load_vehicle(db, vehicle_id).await?;
    if vehicle.status != status {
        vehicle.status = status;
        save_vehicle(db, &mut vehicle).await?;
    }
    Ok(vehicle)
}

/// Projects the vehicle status from the live bookings of the vehicle: rented
/// while a rental is active, reserved while a reservation is confirmed,
/// otherwise available (a vehicle in maintenance stays there).
pub(super) async fn sync_vehicle_status(
    db: &DatabaseTransaction,
    vehicle_id: Uuid,
) -> ResultEngine<Vehicle> {
    let current = load_vehicle(db, vehicle_id).await?;
    let active_rentals = rentals::Entity::find()
        .filter(rentals::Column::VehicleId.eq(vehicle_id.to_string()))
        .filter(rentals::Column::Status.eq(RentalStatus::Active.as_str()))
        .count(db)
        .await?;
    let status = if active_rentals > 0 {
        VehicleStatus::Rented
    } else {
        let confirmed = reservations::Entity::find()
            .filter(reservations::Column::VehicleId.eq(vehicle_id.to_string()))
            .filter(reservations::Column::Status.eq(ReservationStatus::Confirmed.as_str()))
            .count(db)
            .await?;
        match (confirmed, current.status) {
            (n, _) if n > 0 => VehicleStatus::Reserved,
            (_, VehicleStatus::InMaintenance) => VehicleStatus::InMaintenance,
            _ => VehicleStatus::Available,
        }
    };
    if status != current.status {
        tracing::debug!(%vehicle_id, from = current.status.as_str(), to = status.as_str(), "vehicle status");
    }
    set_vehicle_status(db, vehicle_id, status).await
}
