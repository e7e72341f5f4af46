//! Vehicle levy accrual and route-compliance engine.
//!
//! One scan flows one direction: coordinate → LGA → route verdict → ledger
//! mutation → verdict summary. Payment confirmations flow straight into the
//! wallet ledger, bypassing geometry and route evaluation.

pub mod domain;
pub mod geometry;
pub mod registry;
pub mod repository;
pub mod route;
pub mod router;
pub mod service;
pub mod tariff;
pub mod wallet;

#[cfg(test)]
mod tests;

pub use domain::{
    ComplianceVerdict, DeclaredRoute, GeoPoint, Lga, LgaId, RouteIntegrityError, RouteStop,
    ScanEvent, Vehicle, VehicleCategory, VehicleId, VehicleStatus, Waiver,
};
pub use geometry::{resolve_lga, BoundaryError, BoundaryRing, LgaBoundary};
pub use registry::{LgaRegistry, TariffSource, TariffSourceError};
pub use repository::{
    AuditError, AuditRecord, AuditSink, RepositoryError, VehicleDirectory, WalletStore,
};
pub use route::{evaluate_route, RouteCheckReason, RoutePolicy, RouteVerdict};
pub use router::levy_router;
pub use service::{AccrualRunSummary, LevyService, LevyServiceError};
pub use tariff::{ChargePolicy, TariffImportError, TariffTable};
pub use wallet::schedule::{project_due_date, ProjectionError};
pub use wallet::{
    AccrualOutcome, LedgerEntryKey, LedgerMutation, LedgerStream, MutationOutcome,
    PaymentReceipt, StreamAmounts, StreamBalance, Wallet, WalletStatusView,
};
