//! End-to-end specifications for wallet accrual, payment application, and
//! due-date projection, driven through the public service facade.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;

use levy_engine::levy::{
    AuditError, AuditRecord, AuditSink, ChargePolicy, LedgerMutation, LedgerStream, LgaId,
    LgaRegistry, LevyService, MutationOutcome, RepositoryError, RoutePolicy, TariffSource,
    TariffSourceError, TariffTable, Vehicle, VehicleCategory, VehicleDirectory, VehicleId,
    VehicleStatus, Waiver, Wallet, WalletStore,
};

fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn car(id: &str) -> Vehicle {
    Vehicle {
        id: VehicleId(id.to_string()),
        plate: format!("LAG-{id}"),
        category: VehicleCategory::Car,
        status: VehicleStatus::Active,
        state: "Lagos".to_string(),
        registered_lga: LgaId("ikorodu".to_string()),
        declared_route: None,
        waiver: None,
    }
}

struct FixedTariffs(TariffTable);

impl TariffSource for FixedTariffs {
    fn load(&self) -> Result<TariffTable, TariffSourceError> {
        Ok(self.0.clone())
    }
}

#[derive(Default, Clone)]
struct FleetDirectory {
    vehicles: Arc<Mutex<HashMap<VehicleId, Vehicle>>>,
}

impl FleetDirectory {
    fn insert(&self, vehicle: Vehicle) {
        let mut guard = self.vehicles.lock().expect("fleet mutex poisoned");
        guard.insert(vehicle.id.clone(), vehicle);
    }
}

impl VehicleDirectory for FleetDirectory {
    fn fetch(&self, id: &VehicleId) -> Result<Option<Vehicle>, RepositoryError> {
        let guard = self.vehicles.lock().expect("fleet mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn active(&self) -> Result<Vec<Vehicle>, RepositoryError> {
        let guard = self.vehicles.lock().expect("fleet mutex poisoned");
        let mut fleet: Vec<Vehicle> = guard
            .values()
            .filter(|vehicle| vehicle.status == VehicleStatus::Active)
            .cloned()
            .collect();
        fleet.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(fleet)
    }
}

#[derive(Default, Clone)]
struct LedgerStore {
    wallets: Arc<Mutex<HashMap<VehicleId, Wallet>>>,
}

impl WalletStore for LedgerStore {
    fn create(&self, wallet: Wallet) -> Result<(), RepositoryError> {
        let mut guard = self.wallets.lock().expect("ledger mutex poisoned");
        if guard.contains_key(wallet.vehicle_id()) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(wallet.vehicle_id().clone(), wallet);
        Ok(())
    }

    fn fetch(&self, id: &VehicleId) -> Result<Option<Wallet>, RepositoryError> {
        let guard = self.wallets.lock().expect("ledger mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn mutate(
        &self,
        id: &VehicleId,
        mutation: LedgerMutation,
    ) -> Result<(Wallet, MutationOutcome), RepositoryError> {
        let mut guard = self.wallets.lock().expect("ledger mutex poisoned");
        let wallet = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        let outcome = wallet.apply(mutation);
        Ok((wallet.clone(), outcome))
    }
}

#[derive(Default)]
struct NullTrail;

impl AuditSink for NullTrail {
    fn append(&self, _record: AuditRecord) -> Result<(), AuditError> {
        Ok(())
    }
}

type WorkflowService = LevyService<FleetDirectory, LedgerStore, NullTrail>;

fn build_service(device_fee_daily: u64) -> (Arc<WorkflowService>, Arc<FleetDirectory>) {
    let mut tariffs = TariffTable::new();
    tariffs.set_rate(LgaId("ikorodu".to_string()), VehicleCategory::Car, 500);

    let registry = LgaRegistry::new(
        Arc::new(FixedTariffs(tariffs)),
        Duration::from_secs(300),
    );

    let vehicles = Arc::new(FleetDirectory::default());
    let service = Arc::new(LevyService::new(
        vehicles.clone(),
        Arc::new(LedgerStore::default()),
        Arc::new(NullTrail),
        Arc::new(registry),
        RoutePolicy::default(),
        ChargePolicy {
            off_route_surcharge: 2_000,
            device_fee_daily,
        },
    ));
    (service, vehicles)
}

#[test]
fn prefunded_wallet_projects_six_days_of_cover() {
    let (service, vehicles) = build_service(0);
    vehicles.insert(car("veh-301"));
    let id = VehicleId("veh-301".to_string());
    service.register_wallet(&id).expect("wallet registered");

    service
        .apply_payment(&id, LedgerStream::Operational, 3_000)
        .expect("prefund");

    let due = service
        .next_payment_date(&id, day(2026, 5, 1))
        .expect("rate configured");
    assert_eq!(due, day(2026, 5, 7));
}

#[test]
fn owing_wallet_is_due_immediately() {
    let (service, vehicles) = build_service(0);
    vehicles.insert(car("veh-302"));
    let id = VehicleId("veh-302".to_string());
    service.register_wallet(&id).expect("wallet registered");

    service
        .run_daily_accrual(day(2026, 5, 1))
        .expect("tick runs");
    service
        .apply_payment(&id, LedgerStream::Operational, 10_000)
        .expect("payment");
    service
        .run_daily_accrual(day(2026, 5, 2))
        .expect("tick runs");

    // 10,000 cleared the 500 debt and banked 9,500; day two consumed 500.
    let view = service
        .wallet_status(&id, day(2026, 5, 2))
        .expect("status reads");
    assert!(view.clear);
    assert_eq!(view.balances.operational, 9_000);

    // Force debt and the projection collapses to "now".
    for offset in 3..25 {
        service
            .run_daily_accrual(day(2026, 5, offset))
            .expect("tick runs");
    }
    let view = service
        .wallet_status(&id, day(2026, 5, 24))
        .expect("status reads");
    assert!(!view.clear);
    assert!(view.owings.operational > 0);

    let due = service
        .next_payment_date(&id, day(2026, 5, 24))
        .expect("rate configured");
    assert_eq!(due, day(2026, 5, 24));
}

#[test]
fn accrual_run_is_idempotent_per_period_across_streams() {
    let (service, vehicles) = build_service(50);
    vehicles.insert(car("veh-303"));
    let id = VehicleId("veh-303".to_string());
    service.register_wallet(&id).expect("wallet registered");

    service
        .run_daily_accrual(day(2026, 5, 1))
        .expect("first tick");
    service
        .run_daily_accrual(day(2026, 5, 1))
        .expect("retried tick");

    let view = service
        .wallet_status(&id, day(2026, 5, 1))
        .expect("status reads");
    assert_eq!(view.owings.operational, 500);
    assert_eq!(view.owings.device_maintenance, 50);
}

#[test]
fn payment_order_clears_debt_before_banking_credit() {
    let (service, vehicles) = build_service(0);
    vehicles.insert(car("veh-304"));
    let id = VehicleId("veh-304".to_string());
    service.register_wallet(&id).expect("wallet registered");

    service
        .run_daily_accrual(day(2026, 5, 1))
        .expect("tick runs");
    service
        .run_daily_accrual(day(2026, 5, 2))
        .expect("tick runs");

    let wallet = service
        .apply_payment(&id, LedgerStream::Operational, 1_200)
        .expect("payment lands");

    let operational = wallet.stream(LedgerStream::Operational);
    assert_eq!(operational.owing, 0);
    assert_eq!(operational.balance, 200);
}

#[test]
fn waiver_freezes_the_ledger_for_its_whole_window() {
    let (service, vehicles) = build_service(50);
    let mut shielded = car("veh-305");
    shielded.waiver = Some(Waiver {
        reason: "fleet audit".to_string(),
        starts_on: day(2026, 5, 1),
        ends_on: Some(day(2026, 5, 10)),
    });
    vehicles.insert(shielded);
    let id = VehicleId("veh-305".to_string());
    service.register_wallet(&id).expect("wallet registered");

    for offset in 1..=10 {
        service
            .run_daily_accrual(day(2026, 5, offset))
            .expect("tick runs");
    }
    let view = service
        .wallet_status(&id, day(2026, 5, 10))
        .expect("status reads");
    assert!(view.waived);
    assert_eq!(view.owings.operational, 0);
    assert_eq!(view.owings.device_maintenance, 0);

    // First tick past the window accrues again.
    service
        .run_daily_accrual(day(2026, 5, 11))
        .expect("tick runs");
    let view = service
        .wallet_status(&id, day(2026, 5, 11))
        .expect("status reads");
    assert!(!view.waived);
    assert_eq!(view.owings.operational, 500);
}
