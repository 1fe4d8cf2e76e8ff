//! Lifecycle engine of a single-agency vehicle rental business.
//!
//! A booking moves from a request to a confirmed reservation, an active
//! rental and finally a completion or cancellation. Each step is one
//! [`Engine`] method that keeps the reservation, the rental, the vehicle
//! availability and the payment ledger consistent with each other.

pub use admission::{AdmissionGate, FixedWindowLimiter, Unlimited};
pub use audit::{AuditEntry, AuditSink, DatabaseAuditSink, TracingAuditSink};
pub use clients::{Client, ClientKind, InlineClient};
pub use commands::{
    Booking, InternalBooking, PaymentStatusChange, PublicBooking, RecordPayment, ReservationEdit,
};
pub use contracts::{ContractData, ContractRenderer, PlainTextContractRenderer};
pub use error::EngineError;
pub use money::MoneyCents;
pub use ops::{Engine, EngineBuilder, PUBLIC_ACTOR};
pub use outcomes::{BookedPeriod, PaymentReceipt, ReconcileReport, RentalStart, Termination};
pub use payments::{
    LedgerTotals, Payment, PaymentCategory, PaymentMethod, PaymentRecordStatus, PaymentStatus,
    PaymentTarget,
};
pub use pricing::{Quote, Rates, billable_days, quote};
pub use rental_extensions::RentalExtension;
pub use rentals::{ContractStatus, Rental, RentalStatus};
pub use reservations::{Channel, ClientRef, Reservation, ReservationEvent, ReservationStatus};
pub use storage::{BlobStore, LocalBlobStore, MemoryBlobStore};
pub use vehicles::{Vehicle, VehicleStatus};

mod admission;
mod audit;
mod clients;
mod commands;
mod contracts;
mod error;
mod locks;
mod money;
mod ops;
mod outcomes;
mod payments;
mod pricing;
mod rental_extensions;
mod rentals;
mod reservations;
mod storage;
mod util;
mod vehicles;

type ResultEngine<T> = Result<T, EngineError>;
