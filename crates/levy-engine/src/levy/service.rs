use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    ComplianceVerdict, LgaId, ScanEvent, VehicleCategory, VehicleId,
};
use super::geometry::resolve_lga;
use super::registry::{LgaRegistry, TariffSourceError};
use super::repository::{
    AuditError, AuditRecord, AuditSink, RepositoryError, VehicleDirectory, WalletStore,
};
use super::route::{evaluate_route, RoutePolicy};
use super::tariff::ChargePolicy;
use super::wallet::schedule::{self, ProjectionError};
use super::wallet::{
    LedgerMutation, LedgerStream, MutationOutcome, Wallet, WalletStatusView,
};

/// Orchestrates the geometry resolver, route evaluator, and wallet ledger
/// behind the persistence and audit seams.
pub struct LevyService<V, W, A> {
    vehicles: Arc<V>,
    wallets: Arc<W>,
    audit: Arc<A>,
    registry: Arc<LgaRegistry>,
    route_policy: RoutePolicy,
    charges: ChargePolicy,
}

impl<V, W, A> LevyService<V, W, A>
where
    V: VehicleDirectory + 'static,
    W: WalletStore + 'static,
    A: AuditSink + 'static,
{
    pub fn new(
        vehicles: Arc<V>,
        wallets: Arc<W>,
        audit: Arc<A>,
        registry: Arc<LgaRegistry>,
        route_policy: RoutePolicy,
        charges: ChargePolicy,
    ) -> Self {
        Self {
            vehicles,
            wallets,
            audit,
            registry,
            route_policy,
            charges,
        }
    }

    pub fn registry(&self) -> &LgaRegistry {
        &self.registry
    }

    /// Create the vehicle's wallet at registration, all streams zero.
    pub fn register_wallet(&self, vehicle_id: &VehicleId) -> Result<Wallet, LevyServiceError> {
        let wallet = Wallet::new(vehicle_id.clone());
        self.wallets
            .create(wallet.clone())
            .map_err(LevyServiceError::Repository)?;
        Ok(wallet)
    }

    /// Evaluate one scan: resolve jurisdiction, judge route adherence, post
    /// any surcharge, and append the audit line.
    ///
    /// An active waiver short-circuits before any geometry work. Every
    /// invocation is audited regardless of outcome; an audit failure
    /// surfaces distinctly so the caller retries, and the surcharge entry
    /// key keeps the retry from double-charging.
    pub fn handle_scan(&self, scan: ScanEvent) -> Result<ComplianceVerdict, LevyServiceError> {
        if !scan.point.is_finite() {
            return Err(LevyServiceError::InvalidCoordinates {
                latitude: scan.point.latitude,
                longitude: scan.point.longitude,
            });
        }

        let vehicle = self
            .vehicles
            .fetch(&scan.vehicle_id)
            .map_err(LevyServiceError::Repository)?
            .ok_or_else(|| LevyServiceError::VehicleNotFound(scan.vehicle_id.clone()))?;

        let scan_day = scan.recorded_at.date_naive();
        if vehicle.active_waiver_on(scan_day).is_some() {
            let verdict = ComplianceVerdict {
                vehicle_id: vehicle.id.clone(),
                detected_lga: None,
                on_route: true,
                extra_charge: 0,
                waived: true,
            };
            self.append_audit(&scan, &verdict)?;
            info!(vehicle = %vehicle.id, "scan short-circuited by active waiver");
            return Ok(verdict);
        }

        let candidates = self.registry.candidates(&vehicle.state);
        let detected =
            resolve_lga(&scan.point, &candidates, Some(&vehicle.registered_lga));
        let detected_id: Option<LgaId> = detected.map(|lga| lga.id.clone());

        let route_verdict = evaluate_route(
            vehicle.declared_route.as_ref(),
            detected_id.as_ref(),
            &self.route_policy,
        );

        let extra_charge = if route_verdict.on_route {
            0
        } else {
            let mutation = LedgerMutation::Surcharge {
                amount: self.charges.off_route_surcharge,
                at: scan.recorded_at,
            };
            let (_, outcome) = self
                .wallets
                .mutate(&vehicle.id, mutation)
                .map_err(|err| wallet_error(&vehicle.id, err))?;
            match outcome {
                MutationOutcome::Surcharged(accrual) => accrual.charged(),
                _ => 0,
            }
        };

        let verdict = ComplianceVerdict {
            vehicle_id: vehicle.id.clone(),
            detected_lga: detected_id,
            on_route: route_verdict.on_route,
            extra_charge,
            waived: false,
        };
        self.append_audit(&scan, &verdict)?;

        info!(
            vehicle = %verdict.vehicle_id,
            lga = verdict.detected_lga.as_ref().map(|id| id.0.as_str()),
            on_route = verdict.on_route,
            extra_charge = verdict.extra_charge,
            reason = ?route_verdict.reason,
            "scan evaluated"
        );
        Ok(verdict)
    }

    /// Confirmed payment from the external feed. Bypasses geometry and
    /// route evaluation entirely.
    pub fn apply_payment(
        &self,
        vehicle_id: &VehicleId,
        stream: LedgerStream,
        amount: u64,
    ) -> Result<Wallet, LevyServiceError> {
        if amount == 0 {
            return Err(LevyServiceError::InvalidAmount);
        }

        let (wallet, outcome) = self
            .wallets
            .mutate(vehicle_id, LedgerMutation::Payment { stream, amount })
            .map_err(|err| wallet_error(vehicle_id, err))?;

        if let MutationOutcome::Paid(receipt) = outcome {
            info!(
                vehicle = %vehicle_id,
                stream = stream.label(),
                cleared_owing = receipt.cleared_owing,
                credited_balance = receipt.credited_balance,
                "payment applied"
            );
        }
        Ok(wallet)
    }

    /// Project the operational stream's next due date from the registered
    /// LGA's rate for the vehicle's category.
    pub fn next_payment_date(
        &self,
        vehicle_id: &VehicleId,
        today: NaiveDate,
    ) -> Result<NaiveDate, LevyServiceError> {
        let vehicle = self
            .vehicles
            .fetch(vehicle_id)
            .map_err(LevyServiceError::Repository)?
            .ok_or_else(|| LevyServiceError::VehicleNotFound(vehicle_id.clone()))?;
        let wallet = self
            .wallets
            .fetch(vehicle_id)
            .map_err(|err| wallet_error(vehicle_id, err))?
            .ok_or_else(|| LevyServiceError::VehicleNotFound(vehicle_id.clone()))?;

        let rate = self
            .registry
            .daily_rate(&vehicle.registered_lga, vehicle.category)?;

        let operational = wallet.stream(LedgerStream::Operational);
        schedule::project_due_date(today, operational.balance, operational.owing, rate).map_err(
            |err| match err {
                ProjectionError::RateNotConfigured => LevyServiceError::RateNotConfigured {
                    lga: vehicle.registered_lga.clone(),
                    category: vehicle.category,
                },
                other => LevyServiceError::Projection(other),
            },
        )
    }

    /// Wallet standing for display: clear/owing per the operational stream,
    /// waived short-circuiting both.
    pub fn wallet_status(
        &self,
        vehicle_id: &VehicleId,
        today: NaiveDate,
    ) -> Result<WalletStatusView, LevyServiceError> {
        let vehicle = self
            .vehicles
            .fetch(vehicle_id)
            .map_err(LevyServiceError::Repository)?
            .ok_or_else(|| LevyServiceError::VehicleNotFound(vehicle_id.clone()))?;
        let wallet = self
            .wallets
            .fetch(vehicle_id)
            .map_err(|err| wallet_error(vehicle_id, err))?
            .ok_or_else(|| LevyServiceError::VehicleNotFound(vehicle_id.clone()))?;

        let waived = vehicle.active_waiver_on(today).is_some();
        Ok(wallet.status_view(vehicle.status, waived))
    }

    /// Scheduled daily tick over the active fleet.
    ///
    /// Safe to re-run for a period: applied entry keys make the repeat a
    /// no-op. Waived vehicles are frozen, and a missing rate is surfaced in
    /// the summary rather than silently accruing zero.
    pub fn run_daily_accrual(
        &self,
        period: NaiveDate,
    ) -> Result<AccrualRunSummary, LevyServiceError> {
        let fleet = self
            .vehicles
            .active()
            .map_err(LevyServiceError::Repository)?;

        let mut summary = AccrualRunSummary::new(period);
        for vehicle in fleet {
            if vehicle.active_waiver_on(period).is_some() {
                summary.frozen += 1;
                continue;
            }

            let rate = self
                .registry
                .daily_rate(&vehicle.registered_lga, vehicle.category)?;
            let Some(rate) = rate.filter(|rate| *rate > 0) else {
                warn!(
                    vehicle = %vehicle.id,
                    category = vehicle.category.label(),
                    lga = %vehicle.registered_lga,
                    "no operational rate configured; vehicle skipped"
                );
                summary.unconfigured.push(vehicle.id.clone());
                continue;
            };

            let operational = LedgerMutation::Accrue {
                stream: LedgerStream::Operational,
                amount: rate,
                period,
            };
            self.wallets
                .mutate(&vehicle.id, operational)
                .map_err(|err| wallet_error(&vehicle.id, err))?;

            if self.charges.device_fee_daily > 0 {
                let device = LedgerMutation::Accrue {
                    stream: LedgerStream::DeviceMaintenance,
                    amount: self.charges.device_fee_daily,
                    period,
                };
                self.wallets
                    .mutate(&vehicle.id, device)
                    .map_err(|err| wallet_error(&vehicle.id, err))?;
            }

            summary.assessed += 1;
        }

        info!(
            period = %summary.period,
            assessed = summary.assessed,
            frozen = summary.frozen,
            unconfigured = summary.unconfigured.len(),
            "daily accrual run complete"
        );
        Ok(summary)
    }

    fn append_audit(
        &self,
        scan: &ScanEvent,
        verdict: &ComplianceVerdict,
    ) -> Result<(), LevyServiceError> {
        self.audit
            .append(AuditRecord {
                recorded_at: scan.recorded_at,
                vehicle_id: verdict.vehicle_id.clone(),
                lga_id: verdict.detected_lga.clone(),
                latitude: scan.point.latitude,
                longitude: scan.point.longitude,
                on_route: verdict.on_route,
                extra_charge: verdict.extra_charge,
                waived: verdict.waived,
            })
            .map_err(LevyServiceError::Audit)
    }
}

fn wallet_error(vehicle_id: &VehicleId, err: RepositoryError) -> LevyServiceError {
    match err {
        RepositoryError::LockTimeout => LevyServiceError::WalletContention(vehicle_id.clone()),
        RepositoryError::NotFound => LevyServiceError::VehicleNotFound(vehicle_id.clone()),
        other => LevyServiceError::Repository(other),
    }
}

/// Outcome counts for one scheduled accrual run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccrualRunSummary {
    pub period: NaiveDate,
    pub assessed: u32,
    pub frozen: u32,
    pub unconfigured: Vec<VehicleId>,
}

impl AccrualRunSummary {
    fn new(period: NaiveDate) -> Self {
        Self {
            period,
            assessed: 0,
            frozen: 0,
            unconfigured: Vec::new(),
        }
    }
}

/// Error raised by the orchestrator, preserving the failure taxonomy the
/// audit and retry logic depends on.
#[derive(Debug, thiserror::Error)]
pub enum LevyServiceError {
    #[error("vehicle {0} is not registered")]
    VehicleNotFound(VehicleId),
    #[error("scan coordinates ({latitude}, {longitude}) are not finite")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
    #[error("payment amount must be greater than zero")]
    InvalidAmount,
    #[error("wallet for vehicle {0} is contended; retry")]
    WalletContention(VehicleId),
    #[error("no daily rate configured for {category} vehicles in {lga}")]
    RateNotConfigured {
        lga: LgaId,
        category: VehicleCategory,
    },
    #[error(transparent)]
    Projection(ProjectionError),
    #[error(transparent)]
    Repository(RepositoryError),
    #[error(transparent)]
    Audit(AuditError),
    #[error(transparent)]
    Tariff(#[from] TariffSourceError),
}
