use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::levy::domain::{
    DeclaredRoute, GeoPoint, Lga, LgaId, RouteStop, ScanEvent, Vehicle, VehicleCategory,
    VehicleId, VehicleStatus, Waiver,
};
use crate::levy::geometry::{BoundaryRing, LgaBoundary};
use crate::levy::registry::{LgaRegistry, TariffSource, TariffSourceError};
use crate::levy::repository::{
    AuditError, AuditRecord, AuditSink, RepositoryError, VehicleDirectory, WalletStore,
};
use crate::levy::route::RoutePolicy;
use crate::levy::service::LevyService;
use crate::levy::tariff::{ChargePolicy, TariffTable};
use crate::levy::wallet::{LedgerMutation, MutationOutcome, Wallet};

pub(super) const STATE: &str = "Lagos";

pub(super) fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn square_ring(
    lon_min: f64,
    lat_min: f64,
    lon_max: f64,
    lat_max: f64,
) -> BoundaryRing {
    BoundaryRing::new(vec![
        GeoPoint::new(lon_min, lat_min),
        GeoPoint::new(lon_max, lat_min),
        GeoPoint::new(lon_max, lat_max),
        GeoPoint::new(lon_min, lat_max),
    ])
    .expect("valid square ring")
}

pub(super) fn square_lga(id: &str, lon_min: f64, lat_min: f64, side: f64) -> Lga {
    Lga {
        id: LgaId(id.to_string()),
        name: id.to_string(),
        state: STATE.to_string(),
        boundary: LgaBoundary::single(square_ring(
            lon_min,
            lat_min,
            lon_min + side,
            lat_min + side,
        )),
    }
}

/// Three disjoint unit squares along the 6.0 latitude band.
pub(super) fn lagos_lgas() -> Vec<Lga> {
    vec![
        square_lga("ikorodu", 3.0, 6.0, 0.5),
        square_lga("epe", 3.6, 6.0, 0.5),
        square_lga("badagry", 2.2, 6.0, 0.5),
    ]
}

pub(super) fn inside(lga: &str) -> GeoPoint {
    match lga {
        "ikorodu" => GeoPoint::new(3.25, 6.25),
        "epe" => GeoPoint::new(3.85, 6.25),
        "badagry" => GeoPoint::new(2.45, 6.25),
        other => panic!("no fixture point for {other}"),
    }
}

pub(super) fn declared_route(lgas: &[&str]) -> DeclaredRoute {
    let stops = lgas
        .iter()
        .enumerate()
        .map(|(index, lga)| RouteStop {
            order: index as u32 + 1,
            lga: LgaId(lga.to_string()),
        })
        .collect();
    DeclaredRoute::new(stops).expect("valid route fixture")
}

pub(super) fn vehicle(id: &str, route: Option<DeclaredRoute>) -> Vehicle {
    Vehicle {
        id: VehicleId(id.to_string()),
        plate: format!("LAG-{id}"),
        category: VehicleCategory::Car,
        status: VehicleStatus::Active,
        state: STATE.to_string(),
        registered_lga: LgaId("ikorodu".to_string()),
        declared_route: route,
        waiver: None,
    }
}

pub(super) fn waived_vehicle(id: &str, from: NaiveDate, until: Option<NaiveDate>) -> Vehicle {
    let mut vehicle = vehicle(id, None);
    vehicle.waiver = Some(Waiver {
        reason: "court order".to_string(),
        starts_on: from,
        ends_on: until,
    });
    vehicle
}

pub(super) fn scan(vehicle_id: &str, point: GeoPoint, recorded_at: DateTime<Utc>) -> ScanEvent {
    ScanEvent {
        vehicle_id: VehicleId(vehicle_id.to_string()),
        point,
        recorded_at,
    }
}

pub(super) fn charge_policy() -> ChargePolicy {
    ChargePolicy {
        off_route_surcharge: 2_000,
        device_fee_daily: 50,
    }
}

/// Car levy is 500/day in every fixture LGA; tricycles 100/day.
pub(super) fn tariff_table() -> TariffTable {
    let mut table = TariffTable::new();
    for lga in ["ikorodu", "epe", "badagry"] {
        table.set_rate(LgaId(lga.to_string()), VehicleCategory::Car, 500);
        table.set_rate(LgaId(lga.to_string()), VehicleCategory::Tricycle, 100);
    }
    table
}

pub(super) struct StaticTariffSource {
    table: TariffTable,
}

impl StaticTariffSource {
    pub(super) fn new(table: TariffTable) -> Self {
        Self { table }
    }
}

impl TariffSource for StaticTariffSource {
    fn load(&self) -> Result<TariffTable, TariffSourceError> {
        Ok(self.table.clone())
    }
}

pub(super) fn registry() -> Arc<LgaRegistry> {
    let registry = LgaRegistry::new(
        Arc::new(StaticTariffSource::new(tariff_table())),
        Duration::from_secs(300),
    );
    registry.replace_state(STATE, lagos_lgas());
    Arc::new(registry)
}

#[derive(Default, Clone)]
pub(super) struct MemoryVehicleDirectory {
    vehicles: Arc<Mutex<HashMap<VehicleId, Vehicle>>>,
}

impl MemoryVehicleDirectory {
    pub(super) fn insert(&self, vehicle: Vehicle) {
        let mut guard = self.vehicles.lock().expect("directory mutex poisoned");
        guard.insert(vehicle.id.clone(), vehicle);
    }
}

impl VehicleDirectory for MemoryVehicleDirectory {
    fn fetch(&self, id: &VehicleId) -> Result<Option<Vehicle>, RepositoryError> {
        let guard = self.vehicles.lock().expect("directory mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn active(&self) -> Result<Vec<Vehicle>, RepositoryError> {
        let guard = self.vehicles.lock().expect("directory mutex poisoned");
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
pub(super) struct MemoryWalletStore {
    wallets: Arc<Mutex<HashMap<VehicleId, Wallet>>>,
}

impl MemoryWalletStore {
    pub(super) fn seed(&self, wallet: Wallet) {
        let mut guard = self.wallets.lock().expect("wallet mutex poisoned");
        guard.insert(wallet.vehicle_id().clone(), wallet);
    }

    pub(super) fn snapshot(&self, id: &VehicleId) -> Wallet {
        let guard = self.wallets.lock().expect("wallet mutex poisoned");
        guard.get(id).cloned().expect("wallet seeded")
    }
}

impl WalletStore for MemoryWalletStore {
    fn create(&self, wallet: Wallet) -> Result<(), RepositoryError> {
        let mut guard = self.wallets.lock().expect("wallet mutex poisoned");
        if guard.contains_key(wallet.vehicle_id()) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(wallet.vehicle_id().clone(), wallet);
        Ok(())
    }

    fn fetch(&self, id: &VehicleId) -> Result<Option<Wallet>, RepositoryError> {
        let guard = self.wallets.lock().expect("wallet mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn mutate(
        &self,
        id: &VehicleId,
        mutation: LedgerMutation,
    ) -> Result<(Wallet, MutationOutcome), RepositoryError> {
        let mut guard = self.wallets.lock().expect("wallet mutex poisoned");
        let wallet = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        let outcome = wallet.apply(mutation);
        Ok((wallet.clone(), outcome))
    }
}

/// Wallet store whose per-vehicle lock never becomes available.
pub(super) struct ContendedWalletStore;

impl WalletStore for ContendedWalletStore {
    fn create(&self, _wallet: Wallet) -> Result<(), RepositoryError> {
        Err(RepositoryError::LockTimeout)
    }

    fn fetch(&self, _id: &VehicleId) -> Result<Option<Wallet>, RepositoryError> {
        Err(RepositoryError::LockTimeout)
    }

    fn mutate(
        &self,
        _id: &VehicleId,
        _mutation: LedgerMutation,
    ) -> Result<(Wallet, MutationOutcome), RepositoryError> {
        Err(RepositoryError::LockTimeout)
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryAuditLog {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemoryAuditLog {
    pub(super) fn entries(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, record: AuditRecord) -> Result<(), AuditError> {
        let mut guard = self.records.lock().expect("audit mutex poisoned");
        guard.push(record);
        Ok(())
    }
}

/// Audit sink standing in for an unreachable trail store.
pub(super) struct UnreachableAuditSink;

impl AuditSink for UnreachableAuditSink {
    fn append(&self, _record: AuditRecord) -> Result<(), AuditError> {
        Err(AuditError::Unavailable("trail store offline".to_string()))
    }
}

pub(super) type TestService = LevyService<MemoryVehicleDirectory, MemoryWalletStore, MemoryAuditLog>;

pub(super) fn build_service() -> (
    Arc<TestService>,
    Arc<MemoryVehicleDirectory>,
    Arc<MemoryWalletStore>,
    Arc<MemoryAuditLog>,
) {
    let vehicles = Arc::new(MemoryVehicleDirectory::default());
    let wallets = Arc::new(MemoryWalletStore::default());
    let audit = Arc::new(MemoryAuditLog::default());
    let service = Arc::new(LevyService::new(
        vehicles.clone(),
        wallets.clone(),
        audit.clone(),
        registry(),
        RoutePolicy::default(),
        charge_policy(),
    ));
    (service, vehicles, wallets, audit)
}
