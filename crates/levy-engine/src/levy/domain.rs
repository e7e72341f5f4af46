use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::geometry::LgaBoundary;

/// Identifier wrapper for registered vehicles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleId(pub String);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for Local Government Areas.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LgaId(pub String);

impl fmt::Display for LgaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed fleet taxonomy driving the gazette fee schedules.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum VehicleCategory {
    Tricycle,
    Motorcycle,
    Car,
    IntraStateBus,
    InterStateBus,
    Truck,
    Trailer,
    Tanker,
}

impl VehicleCategory {
    pub const ALL: [VehicleCategory; 8] = [
        VehicleCategory::Tricycle,
        VehicleCategory::Motorcycle,
        VehicleCategory::Car,
        VehicleCategory::IntraStateBus,
        VehicleCategory::InterStateBus,
        VehicleCategory::Truck,
        VehicleCategory::Trailer,
        VehicleCategory::Tanker,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            VehicleCategory::Tricycle => "tricycle",
            VehicleCategory::Motorcycle => "motorcycle",
            VehicleCategory::Car => "car",
            VehicleCategory::IntraStateBus => "intra_state_bus",
            VehicleCategory::InterStateBus => "inter_state_bus",
            VehicleCategory::Truck => "truck",
            VehicleCategory::Trailer => "trailer",
            VehicleCategory::Tanker => "tanker",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.label() == normalized)
    }
}

impl fmt::Display for VehicleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Administrative lifecycle state owned by the registration system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Active,
    Inactive,
    Suspended,
    Cleared,
    Owing,
}

impl VehicleStatus {
    pub const fn label(self) -> &'static str {
        match self {
            VehicleStatus::Active => "active",
            VehicleStatus::Inactive => "inactive",
            VehicleStatus::Suspended => "suspended",
            VehicleStatus::Cleared => "cleared",
            VehicleStatus::Owing => "owing",
        }
    }
}

/// A WGS84 coordinate in decimal degrees.
///
/// No geodesic correction is applied anywhere in the engine; LGA extents are
/// small enough that flat-plane containment holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.longitude.is_finite() && self.latitude.is_finite()
    }
}

/// A Local Government Area: jurisdiction identity plus boundary geometry.
///
/// Daily fee rates live in the tariff table, not here; a gazette update
/// never touches boundary data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lga {
    pub id: LgaId,
    pub name: String,
    pub state: String,
    pub boundary: LgaBoundary,
}

/// One stop in a vehicle's declared route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStop {
    pub order: u32,
    pub lga: LgaId,
}

/// Integrity violations rejected when a declared route is registered.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteIntegrityError {
    #[error("declared route must contain at least one stop")]
    Empty,
    #[error("LGA {0} appears more than once in the declared route")]
    DuplicateLga(LgaId),
    #[error("route order must be contiguous from 1 (expected {expected}, found {found})")]
    NonContiguousOrder { expected: u32, found: u32 },
}

/// An ordered, vehicle-specific sequence of LGAs.
///
/// Order indices are contiguous starting at 1 and no LGA appears twice; both
/// are enforced at construction so the evaluator never revalidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredRoute {
    stops: Vec<RouteStop>,
}

impl DeclaredRoute {
    pub fn new(mut stops: Vec<RouteStop>) -> Result<Self, RouteIntegrityError> {
        if stops.is_empty() {
            return Err(RouteIntegrityError::Empty);
        }

        stops.sort_by_key(|stop| stop.order);

        let mut seen = BTreeSet::new();
        for (index, stop) in stops.iter().enumerate() {
            let expected = index as u32 + 1;
            if stop.order != expected {
                return Err(RouteIntegrityError::NonContiguousOrder {
                    expected,
                    found: stop.order,
                });
            }
            if !seen.insert(stop.lga.clone()) {
                return Err(RouteIntegrityError::DuplicateLga(stop.lga.clone()));
            }
        }

        Ok(Self { stops })
    }

    pub fn stops(&self) -> &[RouteStop] {
        &self.stops
    }

    /// Membership test used for single-scan evaluation; order is only for
    /// route display and management.
    pub fn includes(&self, lga: &LgaId) -> bool {
        self.stops.iter().any(|stop| &stop.lga == lga)
    }
}

/// Administrative suspension of accrual and compliance enforcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waiver {
    pub reason: String,
    pub starts_on: NaiveDate,
    pub ends_on: Option<NaiveDate>,
}

impl Waiver {
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        if day < self.starts_on {
            return false;
        }
        match self.ends_on {
            Some(end) => day <= end,
            None => true,
        }
    }
}

/// The registration system's view of a vehicle, as read by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub plate: String,
    pub category: VehicleCategory,
    pub status: VehicleStatus,
    pub state: String,
    pub registered_lga: LgaId,
    pub declared_route: Option<DeclaredRoute>,
    pub waiver: Option<Waiver>,
}

impl Vehicle {
    pub fn active_waiver_on(&self, day: NaiveDate) -> Option<&Waiver> {
        self.waiver
            .as_ref()
            .filter(|waiver| waiver.is_active_on(day))
    }
}

/// A timestamped field reading for one vehicle. Ephemeral input; persisted
/// only through the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub vehicle_id: VehicleId,
    pub point: GeoPoint,
    pub recorded_at: DateTime<Utc>,
}

/// Outcome of one scan evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceVerdict {
    pub vehicle_id: VehicleId,
    pub detected_lga: Option<LgaId>,
    pub on_route: bool,
    pub extra_charge: u64,
    pub waived: bool,
}
