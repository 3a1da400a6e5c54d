//! Derived location queries.
//!
//! A unit worn in an EVA suit or carried by a person or robot has no
//! location of its own: the queries look through to its carrier until they
//! reach a unit with a concrete state.

use crate::collaborators::GarageLookup;
use crate::components::{LocationState, Placement, UnitId, UnitKind};
use crate::error::{LocationError, LocationResult};
use crate::garage::vehicle_at_garage;
use crate::registry::UnitRegistry;

/// Follow pass-through states up the chain and test the first concrete one.
fn resolve_through(
    registry: &UnitRegistry,
    unit: UnitId,
    bound: usize,
    test: impl Fn(LocationState) -> bool,
) -> LocationResult<bool> {
    let mut current = unit;
    for _ in 0..=bound {
        let placement = registry.component::<Placement>(current)?;
        if !placement.state.is_pass_through() {
            return Ok(test(placement.state));
        }
        current = carrier(registry, current, placement)?;
    }
    Err(LocationError::invariant(format!(
        "location of {} did not resolve within {} carriers",
        unit, bound
    )))
}

fn carrier(registry: &UnitRegistry, unit: UnitId, placement: Placement) -> LocationResult<UnitId> {
    match placement.container {
        Some(container) if registry.contains(container) => Ok(container),
        Some(container) => Err(LocationError::invariant(format!(
            "{} is {} but its carrier {} is gone",
            unit, placement.state, container
        ))),
        None => Err(LocationError::invariant(format!(
            "{} is {} but has no carrier",
            unit, placement.state
        ))),
    }
}

/// Inside a settlement or a vehicle, directly or via its carrier.
pub fn is_inside(registry: &UnitRegistry, unit: UnitId, bound: usize) -> LocationResult<bool> {
    resolve_through(registry, unit, bound, |s| s.is_inside())
}

/// On the open surface or in a settlement's vicinity.
pub fn is_outside(registry: &UnitRegistry, unit: UnitId, bound: usize) -> LocationResult<bool> {
    resolve_through(registry, unit, bound, |s| s.is_outside())
}

pub fn is_in_vehicle(registry: &UnitRegistry, unit: UnitId, bound: usize) -> LocationResult<bool> {
    resolve_through(registry, unit, bound, |s| s == LocationState::InsideVehicle)
}

pub fn is_in_settlement(registry: &UnitRegistry, unit: UnitId, bound: usize) -> LocationResult<bool> {
    resolve_through(registry, unit, bound, |s| {
        s == LocationState::InsideSettlement
    })
}

/// Inside a vehicle that is parked in a garage building.
///
/// Only EVA suits are looked through; a unit carried by a person in a
/// garaged vehicle does not count. The garage lookup is trusted only while
/// the vehicle still stands in the garage's settlement.
pub fn is_in_vehicle_in_garage(
    registry: &UnitRegistry,
    garages: &dyn GarageLookup,
    unit: UnitId,
    bound: usize,
) -> LocationResult<bool> {
    let mut current = unit;
    for _ in 0..=bound {
        let placement = registry.component::<Placement>(current)?;
        if placement.state == LocationState::InsideEvaSuit {
            current = carrier(registry, current, placement)?;
            continue;
        }
        return match placement.container {
            Some(container) if registry.contains(container) => {
                if registry.kind(container)? != UnitKind::Vehicle {
                    return Ok(false);
                }
                match garages.garage_of(container) {
                    Some(building) => vehicle_at_garage(registry, container, building),
                    None => Ok(false),
                }
            }
            _ => Ok(false),
        };
    }
    Err(LocationError::invariant(format!(
        "location of {} did not resolve within {} suits",
        unit, bound
    )))
}
