use serde::{Deserialize, Serialize};

use super::domain::{DeclaredRoute, LgaId};

/// Named policy branches for the two permissive defaults.
///
/// Both default to `true` to match current enforcement practice: a vehicle
/// with no declared route cannot violate one, and a reading outside every
/// known jurisdiction cannot be penalized for missing boundary data. Each
/// branch can be toggled and tested independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePolicy {
    pub missing_route_is_compliant: bool,
    pub unknown_jurisdiction_is_compliant: bool,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self {
            missing_route_is_compliant: true,
            unknown_jurisdiction_is_compliant: true,
        }
    }
}

/// Why a scan was judged on- or off-route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteCheckReason {
    NoDeclaredRoute,
    OutsideKnownJurisdictions,
    DeclaredStop,
    OffRoute,
}

/// Adherence verdict for a single scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteVerdict {
    pub on_route: bool,
    pub reason: RouteCheckReason,
}

/// Judge a detected LGA against the vehicle's declared route.
///
/// Membership only; stop order is not consulted for single-scan evaluation.
pub fn evaluate_route(
    route: Option<&DeclaredRoute>,
    detected: Option<&LgaId>,
    policy: &RoutePolicy,
) -> RouteVerdict {
    let Some(route) = route else {
        return RouteVerdict {
            on_route: policy.missing_route_is_compliant,
            reason: RouteCheckReason::NoDeclaredRoute,
        };
    };

    let Some(lga) = detected else {
        return RouteVerdict {
            on_route: policy.unknown_jurisdiction_is_compliant,
            reason: RouteCheckReason::OutsideKnownJurisdictions,
        };
    };

    if route.includes(lga) {
        RouteVerdict {
            on_route: true,
            reason: RouteCheckReason::DeclaredStop,
        }
    } else {
        RouteVerdict {
            on_route: false,
            reason: RouteCheckReason::OffRoute,
        }
    }
}
