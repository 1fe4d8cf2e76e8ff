//! Initial schema of the rental agency:
//!
//! - `users`: agents allowed on the internal API
//! - `vehicles`: the fleet and its availability status
//! - `clients`: registered renters
//! - `reservations`: booking requests and their lifecycle
//! - `rentals`: the active rental opened when a reservation starts
//! - `rental_extensions`: history of rental extensions
//! - `payments`: the append-only payment ledger
//! - `audit_logs`: who changed what

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Users {
    Table,
    Username,
    Password,
}

#[derive(Iden)]
enum Vehicles {
    Table,
    Id,
    Make,
    Model,
    Plate,
    Status,
    CreatedAt,
    Version,
}

#[derive(Iden)]
enum Clients {
    Table,
    Id,
    Kind,
    FirstName,
    LastName,
    Phone,
    CreatedAt,
}

#[derive(Iden)]
enum Reservations {
    Table,
    Id,
    VehicleId,
    ClientId,
    InlineFirstName,
    InlineLastName,
    InlinePhone,
    PeriodStart,
    PeriodEnd,
    PerDayMinor,
    PerWeekMinor,
    PerMonthMinor,
    TotalEstimatedMinor,
    Status,
    PaymentStatus,
    AmountPaidMinor,
    AmountRemainingMinor,
    PaymentMethod,
    Channel,
    RentalId,
    ContractUrl,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
    Version,
}

#[derive(Iden)]
enum Rentals {
    Table,
    Id,
    ReservationId,
    VehicleId,
    ClientId,
    Status,
    PeriodStart,
    PlannedEnd,
    ActualEnd,
    BaseAmountMinor,
    TotalAmountMinor,
    AmountPaidMinor,
    AmountRemainingMinor,
    PaymentStatus,
    ContractStatus,
    ContractUrl,
    CreatedAt,
    UpdatedAt,
    Version,
}

#[derive(Iden)]
enum RentalExtensions {
    Table,
    Id,
    RentalId,
    NewEnd,
    ExtraAmountMinor,
    CreatedAt,
}

#[derive(Iden)]
enum Payments {
    Table,
    Id,
    ReservationId,
    RentalId,
    AmountMinor,
    Method,
    Status,
    Category,
    Reference,
    Note,
    CreatedBy,
    CreatedAt,
    SettledAt,
}

#[derive(Iden)]
enum AuditLogs {
    Table,
    Id,
    Actor,
    Action,
    EntityType,
    EntityId,
    Before,
    After,
    CreatedAt,
}

/// At most one rental per reservation that is not cancelled.
const UNIQUE_LIVE_RENTAL: &str = "CREATE UNIQUE INDEX IF NOT EXISTS \"idx-rentals-live-reservation\" \
     ON rentals (reservation_id) WHERE status <> 'cancelled'";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Password).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Vehicles::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Vehicles::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Vehicles::Make).string().not_null())
                    .col(ColumnDef::new(Vehicles::Model).string().not_null())
                    .col(
                        ColumnDef::new(Vehicles::Plate)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Vehicles::Status)
                            .string()
                            .not_null()
                            .default("available"),
                    )
                    .col(ColumnDef::new(Vehicles::CreatedAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(Vehicles::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Clients::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Clients::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Clients::Kind).string().not_null())
                    .col(ColumnDef::new(Clients::FirstName).string())
                    .col(ColumnDef::new(Clients::LastName).string().not_null())
                    .col(ColumnDef::new(Clients::Phone).string().not_null())
                    .col(ColumnDef::new(Clients::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-clients-identity")
                    .table(Clients::Table)
                    .col(Clients::LastName)
                    .col(Clients::Phone)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Reservations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Reservations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Reservations::VehicleId).string().not_null())
                    .col(ColumnDef::new(Reservations::ClientId).string())
                    .col(ColumnDef::new(Reservations::InlineFirstName).string())
                    .col(ColumnDef::new(Reservations::InlineLastName).string())
                    .col(ColumnDef::new(Reservations::InlinePhone).string())
                    .col(
                        ColumnDef::new(Reservations::PeriodStart)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Reservations::PeriodEnd).timestamp().not_null())
                    .col(
                        ColumnDef::new(Reservations::PerDayMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Reservations::PerWeekMinor).big_integer())
                    .col(ColumnDef::new(Reservations::PerMonthMinor).big_integer())
                    .col(
                        ColumnDef::new(Reservations::TotalEstimatedMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Reservations::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Reservations::PaymentStatus)
                            .string()
                            .not_null()
                            .default("unpaid"),
                    )
                    .col(
                        ColumnDef::new(Reservations::AmountPaidMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Reservations::AmountRemainingMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Reservations::PaymentMethod)
                            .string()
                            .not_null()
                            .default("cash"),
                    )
                    .col(ColumnDef::new(Reservations::Channel).string().not_null())
                    .col(ColumnDef::new(Reservations::RentalId).string())
                    .col(ColumnDef::new(Reservations::ContractUrl).string())
                    .col(ColumnDef::new(Reservations::CreatedBy).string())
                    .col(ColumnDef::new(Reservations::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Reservations::UpdatedAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(Reservations::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-reservations-vehicle_id")
                            .from(Reservations::Table, Reservations::VehicleId)
                            .to(Vehicles::Table, Vehicles::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-reservations-client_id")
                            .from(Reservations::Table, Reservations::ClientId)
                            .to(Clients::Table, Clients::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-reservations-vehicle_id-status")
                    .table(Reservations::Table)
                    .col(Reservations::VehicleId)
                    .col(Reservations::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Rentals::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Rentals::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Rentals::ReservationId).string().not_null())
                    .col(ColumnDef::new(Rentals::VehicleId).string().not_null())
                    .col(ColumnDef::new(Rentals::ClientId).string().not_null())
                    .col(
                        ColumnDef::new(Rentals::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(Rentals::PeriodStart).timestamp().not_null())
                    .col(ColumnDef::new(Rentals::PlannedEnd).timestamp().not_null())
                    .col(ColumnDef::new(Rentals::ActualEnd).timestamp())
                    .col(
                        ColumnDef::new(Rentals::BaseAmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Rentals::TotalAmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Rentals::AmountPaidMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Rentals::AmountRemainingMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Rentals::PaymentStatus)
                            .string()
                            .not_null()
                            .default("unpaid"),
                    )
                    .col(
                        ColumnDef::new(Rentals::ContractStatus)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Rentals::ContractUrl).string())
                    .col(ColumnDef::new(Rentals::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Rentals::UpdatedAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(Rentals::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-rentals-reservation_id")
                            .from(Rentals::Table, Rentals::ReservationId)
                            .to(Reservations::Table, Reservations::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-rentals-vehicle_id")
                            .from(Rentals::Table, Rentals::VehicleId)
                            .to(Vehicles::Table, Vehicles::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-rentals-client_id")
                            .from(Rentals::Table, Rentals::ClientId)
                            .to(Clients::Table, Clients::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(UNIQUE_LIVE_RENTAL)
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RentalExtensions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RentalExtensions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RentalExtensions::RentalId).string().not_null())
                    .col(ColumnDef::new(RentalExtensions::NewEnd).timestamp().not_null())
                    .col(
                        ColumnDef::new(RentalExtensions::ExtraAmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RentalExtensions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-rental_extensions-rental_id")
                            .from(RentalExtensions::Table, RentalExtensions::RentalId)
                            .to(Rentals::Table, Rentals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Payments::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Payments::ReservationId).string())
                    .col(ColumnDef::new(Payments::RentalId).string())
                    .col(
                        ColumnDef::new(Payments::AmountMinor)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(Payments::AmountMinor).gt(0)),
                    )
                    .col(ColumnDef::new(Payments::Method).string().not_null())
                    .col(ColumnDef::new(Payments::Status).string().not_null())
                    .col(ColumnDef::new(Payments::Category).string().not_null())
                    .col(ColumnDef::new(Payments::Reference).string())
                    .col(ColumnDef::new(Payments::Note).string())
                    .col(ColumnDef::new(Payments::CreatedBy).string())
                    .col(ColumnDef::new(Payments::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Payments::SettledAt).timestamp())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-payments-reservation_id")
                            .from(Payments::Table, Payments::ReservationId)
                            .to(Reservations::Table, Reservations::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-payments-rental_id")
                            .from(Payments::Table, Payments::RentalId)
                            .to(Rentals::Table, Rentals::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-payments-reservation_id")
                    .table(Payments::Table)
                    .col(Payments::ReservationId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-payments-rental_id")
                    .table(Payments::Table)
                    .col(Payments::RentalId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AuditLogs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AuditLogs::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(AuditLogs::Actor).string().not_null())
                    .col(ColumnDef::new(AuditLogs::Action).string().not_null())
                    .col(ColumnDef::new(AuditLogs::EntityType).string().not_null())
                    .col(ColumnDef::new(AuditLogs::EntityId).string().not_null())
                    .col(ColumnDef::new(AuditLogs::Before).text())
                    .col(ColumnDef::new(AuditLogs::After).text())
                    .col(ColumnDef::new(AuditLogs::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-audit_logs-entity")
                    .table(AuditLogs::Table)
                    .col(AuditLogs::EntityType)
                    .col(AuditLogs::EntityId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RentalExtensions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Rentals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Reservations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Clients::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Vehicles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
