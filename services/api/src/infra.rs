use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::fs::File;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, RwLock, TryLockError};
use std::time::Instant;

use levy_engine::config::LevySettings;
use levy_engine::error::AppError;
use levy_engine::levy::{
    AuditError, AuditRecord, AuditSink, BoundaryRing, ChargePolicy, DeclaredRoute, GeoPoint,
    LedgerMutation, Lga, LgaBoundary, LgaId, LgaRegistry, LevyService, MutationOutcome,
    RepositoryError, RoutePolicy, RouteStop, TariffSource, TariffSourceError, TariffTable,
    Vehicle, VehicleCategory, VehicleDirectory, VehicleId, VehicleStatus, Wallet, WalletStore,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryVehicleDirectory {
    vehicles: Arc<Mutex<HashMap<VehicleId, Vehicle>>>,
}

impl InMemoryVehicleDirectory {
    pub(crate) fn insert(&self, vehicle: Vehicle) {
        let mut guard = self.vehicles.lock().expect("directory mutex poisoned");
        guard.insert(vehicle.id.clone(), vehicle);
    }
}

impl VehicleDirectory for InMemoryVehicleDirectory {
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

/// Wallet store holding one lock per vehicle so mutations on different
/// vehicles never serialize against each other. Acquisition is bounded by
/// the configured deadline and reported as `LockTimeout` past it.
pub(crate) struct InMemoryWalletStore {
    wallets: RwLock<HashMap<VehicleId, Arc<Mutex<Wallet>>>>,
    lock_timeout: std::time::Duration,
}

impl InMemoryWalletStore {
    pub(crate) fn new(lock_timeout: std::time::Duration) -> Self {
        Self {
            wallets: RwLock::new(HashMap::new()),
            lock_timeout,
        }
    }

    fn entry(&self, id: &VehicleId) -> Result<Arc<Mutex<Wallet>>, RepositoryError> {
        let guard = self.wallets.read().expect("wallet map lock poisoned");
        guard.get(id).cloned().ok_or(RepositoryError::NotFound)
    }

    fn acquire<T>(
        &self,
        entry: &Arc<Mutex<Wallet>>,
        apply: impl FnOnce(&mut Wallet) -> T,
    ) -> Result<T, RepositoryError> {
        let deadline = Instant::now() + self.lock_timeout;
        loop {
            match entry.try_lock() {
                Ok(mut wallet) => return Ok(apply(&mut wallet)),
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(RepositoryError::LockTimeout);
                    }
                    std::thread::yield_now();
                }
                Err(TryLockError::Poisoned(_)) => {
                    return Err(RepositoryError::Unavailable(
                        "wallet lock poisoned".to_string(),
                    ));
                }
            }
        }
    }
}

impl WalletStore for InMemoryWalletStore {
    fn create(&self, wallet: Wallet) -> Result<(), RepositoryError> {
        let mut guard = self.wallets.write().expect("wallet map lock poisoned");
        if guard.contains_key(wallet.vehicle_id()) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(wallet.vehicle_id().clone(), Arc::new(Mutex::new(wallet)));
        Ok(())
    }

    fn fetch(&self, id: &VehicleId) -> Result<Option<Wallet>, RepositoryError> {
        let entry = match self.entry(id) {
            Ok(entry) => entry,
            Err(RepositoryError::NotFound) => return Ok(None),
            Err(other) => return Err(other),
        };
        self.acquire(&entry, |wallet| wallet.clone()).map(Some)
    }

    fn mutate(
        &self,
        id: &VehicleId,
        mutation: LedgerMutation,
    ) -> Result<(Wallet, MutationOutcome), RepositoryError> {
        let entry = self.entry(id)?;
        self.acquire(&entry, |wallet| {
            let outcome = wallet.apply(mutation);
            (wallet.clone(), outcome)
        })
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAuditLog {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl InMemoryAuditLog {
    pub(crate) fn entries(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditSink for InMemoryAuditLog {
    fn append(&self, record: AuditRecord) -> Result<(), AuditError> {
        let mut guard = self.records.lock().expect("audit mutex poisoned");
        guard.push(record);
        Ok(())
    }
}

/// Tariff source backed by a table loaded once at startup; the registry's
/// TTL cache sits in front of it.
pub(crate) struct LoadedTariffSource {
    table: TariffTable,
}

impl LoadedTariffSource {
    pub(crate) fn new(table: TariffTable) -> Self {
        Self { table }
    }
}

impl TariffSource for LoadedTariffSource {
    fn load(&self) -> Result<TariffTable, TariffSourceError> {
        Ok(self.table.clone())
    }
}

pub(crate) fn load_tariff_table(settings: &LevySettings) -> Result<TariffTable, AppError> {
    match &settings.tariff_csv {
        Some(path) => {
            let file = File::open(path)?;
            Ok(TariffTable::from_reader(file)?)
        }
        None => Ok(default_tariff_table()),
    }
}

/// Built-in fallback schedule covering every category in the seeded LGAs.
pub(crate) fn default_tariff_table() -> TariffTable {
    let mut table = TariffTable::new();
    let rates = [
        (VehicleCategory::Tricycle, 100),
        (VehicleCategory::Motorcycle, 100),
        (VehicleCategory::Car, 500),
        (VehicleCategory::IntraStateBus, 700),
        (VehicleCategory::InterStateBus, 1_000),
        (VehicleCategory::Truck, 1_500),
        (VehicleCategory::Trailer, 2_000),
        (VehicleCategory::Tanker, 2_500),
    ];
    for lga in ["ikorodu", "epe", "badagry"] {
        for (category, rate) in rates {
            table.set_rate(LgaId(lga.to_string()), category, rate);
        }
    }
    table
}

fn boundary(vertices: &[(f64, f64)]) -> LgaBoundary {
    let ring = BoundaryRing::new(
        vertices
            .iter()
            .map(|(lon, lat)| GeoPoint::new(*lon, *lat))
            .collect(),
    )
    .expect("seed gazette ring is valid");
    LgaBoundary::single(ring)
}

/// Simplified boundary polygons for three Lagos-state LGAs.
pub(crate) fn lagos_gazette() -> Vec<Lga> {
    vec![
        Lga {
            id: LgaId("ikorodu".to_string()),
            name: "Ikorodu".to_string(),
            state: "Lagos".to_string(),
            boundary: boundary(&[
                (3.43, 6.55),
                (3.62, 6.55),
                (3.64, 6.66),
                (3.52, 6.72),
                (3.42, 6.64),
            ]),
        },
        Lga {
            id: LgaId("epe".to_string()),
            name: "Epe".to_string(),
            state: "Lagos".to_string(),
            boundary: boundary(&[
                (3.88, 6.48),
                (4.12, 6.48),
                (4.14, 6.62),
                (3.96, 6.68),
                (3.86, 6.58),
            ]),
        },
        Lga {
            id: LgaId("badagry".to_string()),
            name: "Badagry".to_string(),
            state: "Lagos".to_string(),
            boundary: boundary(&[
                (2.82, 6.36),
                (3.06, 6.38),
                (3.04, 6.52),
                (2.88, 6.54),
                (2.80, 6.44),
            ]),
        },
    ]
}

pub(crate) type EngineService =
    LevyService<InMemoryVehicleDirectory, InMemoryWalletStore, InMemoryAuditLog>;

pub(crate) struct EngineWorld {
    pub(crate) service: Arc<EngineService>,
    pub(crate) vehicles: Arc<InMemoryVehicleDirectory>,
    pub(crate) audit: Arc<InMemoryAuditLog>,
}

pub(crate) fn build_engine(settings: &LevySettings) -> Result<EngineWorld, AppError> {
    let tariffs = load_tariff_table(settings)?;
    let registry = Arc::new(LgaRegistry::new(
        Arc::new(LoadedTariffSource::new(tariffs)),
        settings.fee_cache_ttl,
    ));
    registry.replace_state("Lagos", lagos_gazette());

    let vehicles = Arc::new(InMemoryVehicleDirectory::default());
    let wallets = Arc::new(InMemoryWalletStore::new(settings.wallet_lock_timeout));
    let audit = Arc::new(InMemoryAuditLog::default());
    let service = Arc::new(LevyService::new(
        vehicles.clone(),
        wallets,
        audit.clone(),
        registry,
        RoutePolicy::default(),
        ChargePolicy {
            off_route_surcharge: settings.off_route_surcharge,
            device_fee_daily: settings.device_fee_daily,
        },
    ));

    Ok(EngineWorld {
        service,
        vehicles,
        audit,
    })
}

fn declared(lgas: &[&str]) -> DeclaredRoute {
    let stops = lgas
        .iter()
        .enumerate()
        .map(|(index, lga)| RouteStop {
            order: index as u32 + 1,
            lga: LgaId(lga.to_string()),
        })
        .collect();
    DeclaredRoute::new(stops).expect("seed route is valid")
}

/// Register a small fleet so the in-memory service is usable immediately.
pub(crate) fn seed_demo_fleet(world: &EngineWorld) -> Result<(), AppError> {
    let fleet = vec![
        Vehicle {
            id: VehicleId("veh-0001".to_string()),
            plate: "LAG-412-KJA".to_string(),
            category: VehicleCategory::IntraStateBus,
            status: VehicleStatus::Active,
            state: "Lagos".to_string(),
            registered_lga: LgaId("ikorodu".to_string()),
            declared_route: Some(declared(&["ikorodu", "epe"])),
            waiver: None,
        },
        Vehicle {
            id: VehicleId("veh-0002".to_string()),
            plate: "LAG-078-EPE".to_string(),
            category: VehicleCategory::Motorcycle,
            status: VehicleStatus::Active,
            state: "Lagos".to_string(),
            registered_lga: LgaId("epe".to_string()),
            declared_route: None,
            waiver: None,
        },
        Vehicle {
            id: VehicleId("veh-0003".to_string()),
            plate: "LAG-555-BDG".to_string(),
            category: VehicleCategory::Truck,
            status: VehicleStatus::Active,
            state: "Lagos".to_string(),
            registered_lga: LgaId("badagry".to_string()),
            declared_route: Some(declared(&["badagry", "ikorodu"])),
            waiver: None,
        },
    ];

    for vehicle in fleet {
        let id = vehicle.id.clone();
        world.vehicles.insert(vehicle);
        world.service.register_wallet(&id)?;
    }
    Ok(())
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
