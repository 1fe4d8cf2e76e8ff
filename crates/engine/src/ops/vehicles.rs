use sea_orm::{ActiveModelTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    AuditEntry, BookedPeriod, EngineError, Reservation, ReservationStatus, ResultEngine, Vehicle,
    VehicleStatus, locks::LockKey, reservations, util::required_text, vehicles,
};

use super::{Engine, access, retry_on_conflict, with_tx};

impl Engine {
    /// Registers a vehicle. New vehicles are `available`.
    pub async fn new_vehicle(
        &self,
        make: &str,
        model: &str,
        plate: &str,
        actor: &str,
    ) -> ResultEngine<Vehicle> {
        let vehicle = Vehicle::new(
            required_text(make, "make")?,
            required_text(model, "model")?,
            required_text(plate, "plate")?.to_uppercase(),
        );
        let duplicate = vehicles::Entity::find()
            .filter(vehicles::Column::Plate.eq(vehicle.plate.clone()))
            .one(&self.database)
            .await?;
        if duplicate.is_some() {
            return Err(EngineError::InvalidInput(format!(
                "plate {} already registered",
                vehicle.plate
            )));
        }
        vehicles::ActiveModel::from(&vehicle)
            .insert(&self.database)
            .await?;
        self.record_audit(vec![AuditEntry::new(
            actor,
            "vehicle:create",
            "vehicle",
            vehicle.id,
            None,
            Some(&vehicle),
        )])
        .await;
        Ok(vehicle)
    }

    pub async fn vehicle(&self, vehicle_id: Uuid) -> ResultEngine<Vehicle> {
        access::load_vehicle(&self.database, vehicle_id).await
    }

    pub async fn vehicles(&self) -> ResultEngine<Vec<Vehicle>> {
        vehicles::Entity::find()
            .order_by_asc(vehicles::Column::Plate)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Vehicle::try_from)
            .collect()
    }

    /// Periods the vehicle is booked for, i.e. its non-cancelled
    /// reservations, ordered by start.
    pub async fn vehicle_availability(&self, vehicle_id: Uuid) -> ResultEngine<Vec<BookedPeriod>> {
        access::load_vehicle(&self.database, vehicle_id).await?;
        reservations::Entity::find()
            .filter(reservations::Column::VehicleId.eq(vehicle_id.to_string()))
            .filter(reservations::Column::Status.ne(ReservationStatus::Cancelled.as_str()))
            .order_by_asc(reservations::Column::PeriodStart)
            .all(&self.database)
            .await?
            .into_iter()
            .map(|model| {
                let reservation = Reservation::try_from(model)?;
                Ok(BookedPeriod {
                    reservation_id: reservation.id,
                    period_start: reservation.period_start,
                    period_end: reservation.period_end,
                    status: reservation.status,
                })
            })
            .collect()
    }

    /// Takes an available vehicle out of service, or puts a vehicle in
    /// maintenance back in service.
    pub async fn set_vehicle_maintenance(
        &self,
        vehicle_id: Uuid,
        in_maintenance: bool,
        actor: &str,
    ) -> ResultEngine<Vehicle> {
        let _guard = self.locks.acquire(LockKey::Vehicle(vehicle_id)).await;
        let (before, after) =
            retry_on_conflict!(self.set_maintenance_once(vehicle_id, in_maintenance).await)
                .inspect_err(|err| self.flag_failure("vehicle:maintenance", vehicle_id, err))?;
        self.record_audit(vec![AuditEntry::new(
            actor,
            "vehicle:maintenance",
            "vehicle",
            vehicle_id,
            Some(&before),
            Some(&after),
        )])
        .await;
        Ok(after)
    }

    async fn set_maintenance_once(
        &self,
        vehicle_id: Uuid,
        in_maintenance: bool,
    ) -> ResultEngine<(Vehicle, Vehicle)> {
        with_tx!(self, |db_tx| {
            let before = access::load_vehicle(&db_tx, vehicle_id).await?;
            let (from, to) = if in_maintenance {
                (VehicleStatus::Available, VehicleStatus::InMaintenance)
            } else {
                (VehicleStatus::InMaintenance, VehicleStatus::Available)
            };
            if before.status != from {
                return Err(EngineError::precondition(
                    "vehicle",
                    vehicle_id,
                    "change maintenance of",
                    from.as_str(),
                    before.status.as_str(),
                ));
            }
            let after = access::set_vehicle_status(&db_tx, vehicle_id, to).await?;
            Ok((before, after))
        })
    }
}
