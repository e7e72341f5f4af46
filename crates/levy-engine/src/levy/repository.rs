use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{LgaId, Vehicle, VehicleId};
use super::wallet::{LedgerMutation, MutationOutcome, Wallet};

/// Read access to the registration system's vehicle records.
pub trait VehicleDirectory: Send + Sync {
    fn fetch(&self, id: &VehicleId) -> Result<Option<Vehicle>, RepositoryError>;

    /// Active fleet enumeration for scheduled accrual runs.
    fn active(&self) -> Result<Vec<Vehicle>, RepositoryError>;
}

/// Wallet persistence with per-vehicle atomic read-modify-write.
///
/// `mutate` serializes concurrent mutations for one vehicle and reports
/// contention beyond the store's bounded acquisition deadline as
/// `LockTimeout` — distinct from any not-found condition so callers can
/// retry. Operations on different vehicles proceed independently.
pub trait WalletStore: Send + Sync {
    fn create(&self, wallet: Wallet) -> Result<(), RepositoryError>;

    fn fetch(&self, id: &VehicleId) -> Result<Option<Wallet>, RepositoryError>;

    fn mutate(
        &self,
        id: &VehicleId,
        mutation: LedgerMutation,
    ) -> Result<(Wallet, MutationOutcome), RepositoryError>;
}

/// Error enumeration for persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("per-vehicle lock not acquired within the deadline")]
    LockTimeout,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// One line of the append-only scan audit trail — the only record of why a
/// vehicle was charged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub recorded_at: DateTime<Utc>,
    pub vehicle_id: VehicleId,
    pub lga_id: Option<LgaId>,
    pub latitude: f64,
    pub longitude: f64,
    pub on_route: bool,
    pub extra_charge: u64,
    pub waived: bool,
}

/// Append-only audit sink. Every scan evaluation lands here regardless of
/// outcome.
pub trait AuditSink: Send + Sync {
    fn append(&self, record: AuditRecord) -> Result<(), AuditError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}
