//! Vehicle garages: which building each parked vehicle sits in.
//!
//! Parking is bookkeeping owned by buildings, separate from the containment
//! graph: a garaged vehicle is still contained by its settlement, and
//! `is_in_vehicle_in_garage` asks this registry about it. A parked vehicle
//! only counts as garaged while it shares its garage's settlement; call
//! [`GarageRegistry::release_departed`] after moves to drop stale entries.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collaborators::GarageLookup;
use crate::components::{Placement, UnitId, UnitKind};
use crate::error::{LocationError, LocationResult};
use crate::registry::UnitRegistry;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GarageError {
    #[error("building {0} has no garage")]
    UnknownGarage(UnitId),
    #[error("garage {0} is full")]
    GarageFull(UnitId),
    #[error("vehicle {vehicle} is already parked in {garage}")]
    AlreadyParked { vehicle: UnitId, garage: UnitId },
    #[error("unit {0} is not a vehicle")]
    NotAVehicle(UnitId),
    #[error("vehicle {vehicle} is not in the settlement of garage {garage}")]
    NotAtGarage { vehicle: UnitId, garage: UnitId },
    #[error(transparent)]
    Location(#[from] LocationError),
}

/// Whether `vehicle` sits directly in the settlement that holds `building`.
pub fn vehicle_at_garage(
    registry: &UnitRegistry,
    vehicle: UnitId,
    building: UnitId,
) -> LocationResult<bool> {
    if !registry.contains(building) {
        return Ok(false);
    }
    let Some(settlement) = registry.component::<Placement>(vehicle)?.container else {
        return Ok(false);
    };
    if !registry.contains(settlement) || registry.kind(settlement)? != UnitKind::Settlement {
        return Ok(false);
    }
    Ok(registry.component::<Placement>(building)?.container == Some(settlement))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Garage {
    capacity: usize,
    vehicles: Vec<UnitId>,
}

/// Garage buildings and the vehicles parked in them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GarageRegistry {
    garages: BTreeMap<UnitId, Garage>,
    /// vehicle → garage building
    parked: HashMap<UnitId, UnitId>,
}

impl GarageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `building` a garage holding up to `capacity` vehicles.
    /// Re-declaring keeps parked vehicles and updates the capacity.
    pub fn add_garage(&mut self, building: UnitId, capacity: usize) {
        self.garages
            .entry(building)
            .and_modify(|g| g.capacity = capacity)
            .or_insert(Garage {
                capacity,
                vehicles: Vec::new(),
            });
    }

    /// Park a vehicle that stands in the garage's settlement.
    pub fn park(
        &mut self,
        registry: &UnitRegistry,
        vehicle: UnitId,
        building: UnitId,
    ) -> Result<(), GarageError> {
        if let Some(&garage) = self.parked.get(&vehicle) {
            return Err(GarageError::AlreadyParked { vehicle, garage });
        }
        if registry.kind(vehicle)? != UnitKind::Vehicle {
            return Err(GarageError::NotAVehicle(vehicle));
        }
        let garage = self
            .garages
            .get_mut(&building)
            .ok_or(GarageError::UnknownGarage(building))?;
        if !vehicle_at_garage(registry, vehicle, building)? {
            return Err(GarageError::NotAtGarage {
                vehicle,
                garage: building,
            });
        }
        if garage.vehicles.len() >= garage.capacity {
            return Err(GarageError::GarageFull(building));
        }
        garage.vehicles.push(vehicle);
        self.parked.insert(vehicle, building);
        log::debug!("vehicle {} parked in garage {}", vehicle, building);
        Ok(())
    }

    /// Take a vehicle out of its garage. Returns the garage it left.
    pub fn unpark(&mut self, vehicle: UnitId) -> Option<UnitId> {
        let building = self.parked.remove(&vehicle)?;
        if let Some(garage) = self.garages.get_mut(&building) {
            garage.vehicles.retain(|v| *v != vehicle);
        }
        log::debug!("vehicle {} left garage {}", vehicle, building);
        Some(building)
    }

    /// Unpark every vehicle that was removed or has left its garage's
    /// settlement. Returns them in ascending id order.
    pub fn release_departed(&mut self, registry: &UnitRegistry) -> Vec<UnitId> {
        let mut departed: Vec<UnitId> = self
            .parked
            .iter()
            .filter(|&(&vehicle, &building)| {
                !registry.contains(vehicle)
                    || !vehicle_at_garage(registry, vehicle, building).unwrap_or(false)
            })
            .map(|(&vehicle, _)| vehicle)
            .collect();
        departed.sort();
        for &vehicle in &departed {
            self.unpark(vehicle);
        }
        departed
    }

    pub fn parked_in(&self, building: UnitId) -> &[UnitId] {
        self.garages
            .get(&building)
            .map(|g| g.vehicles.as_slice())
            .unwrap_or(&[])
    }

    pub fn free_slots(&self, building: UnitId) -> Option<usize> {
        self.garages
            .get(&building)
            .map(|g| g.capacity.saturating_sub(g.vehicles.len()))
    }

    pub fn garage_count(&self) -> usize {
        self.garages.len()
    }
}

impl GarageLookup for GarageRegistry {
    fn garage_of(&self, vehicle: UnitId) -> Option<UnitId> {
        self.parked.get(&vehicle).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Coordinates, LocationState, UnitLabel};

    struct Site {
        registry: UnitRegistry,
        base: UnitId,
        garage: UnitId,
        rover: UnitId,
        luv: UnitId,
    }

    fn place(registry: &mut UnitRegistry, kind: UnitKind, container: UnitId, state: LocationState) -> UnitId {
        registry
            .register(
                kind,
                UnitLabel::new(kind.label()),
                Coordinates::default(),
                Placement {
                    container: Some(container),
                    state,
                },
            )
            .unwrap()
    }

    fn site() -> Site {
        let mut registry = UnitRegistry::with_surface("Mars");
        let base = place(&mut registry, UnitKind::Settlement, UnitId::SURFACE, LocationState::OutsideOnSurface);
        let garage = place(&mut registry, UnitKind::Building, base, LocationState::InsideSettlement);
        let rover = place(&mut registry, UnitKind::Vehicle, base, LocationState::InsideSettlement);
        let luv = place(&mut registry, UnitKind::Vehicle, base, LocationState::InsideSettlement);
        Site {
            registry,
            base,
            garage,
            rover,
            luv,
        }
    }

    #[test]
    fn test_park_and_unpark() {
        let s = site();
        let mut garages = GarageRegistry::new();
        garages.add_garage(s.garage, 2);
        garages.park(&s.registry, s.rover, s.garage).unwrap();

        assert_eq!(garages.garage_of(s.rover), Some(s.garage));
        assert_eq!(garages.parked_in(s.garage), &[s.rover]);
        assert_eq!(garages.free_slots(s.garage), Some(1));

        assert_eq!(garages.unpark(s.rover), Some(s.garage));
        assert_eq!(garages.garage_of(s.rover), None);
        assert!(garages.parked_in(s.garage).is_empty());
        assert_eq!(garages.unpark(s.rover), None);
    }

    #[test]
    fn test_capacity_enforced() {
        let s = site();
        let mut garages = GarageRegistry::new();
        garages.add_garage(s.garage, 1);
        garages.park(&s.registry, s.rover, s.garage).unwrap();
        assert_eq!(
            garages.park(&s.registry, s.luv, s.garage),
            Err(GarageError::GarageFull(s.garage))
        );
    }

    #[test]
    fn test_park_errors() {
        let s = site();
        let mut garages = GarageRegistry::new();
        assert_eq!(
            garages.park(&s.registry, s.rover, s.garage),
            Err(GarageError::UnknownGarage(s.garage))
        );
        garages.add_garage(s.garage, 4);
        assert_eq!(
            garages.park(&s.registry, s.base, s.garage),
            Err(GarageError::NotAVehicle(s.base))
        );
        assert_eq!(
            garages.park(&s.registry, UnitId(2999), s.garage),
            Err(GarageError::Location(LocationError::NotFound(UnitId(2999))))
        );
        garages.park(&s.registry, s.rover, s.garage).unwrap();
        assert_eq!(
            garages.park(&s.registry, s.rover, s.garage),
            Err(GarageError::AlreadyParked {
                vehicle: s.rover,
                garage: s.garage
            })
        );
    }

    #[test]
    fn test_vehicle_outside_settlement_cannot_park() {
        let mut s = site();
        let mut garages = GarageRegistry::new();
        garages.add_garage(s.garage, 2);
        s.registry
            .replace(
                s.rover,
                Placement {
                    container: Some(UnitId::SURFACE),
                    state: LocationState::OutsideOnSurface,
                },
            )
            .unwrap();
        assert_eq!(
            garages.park(&s.registry, s.rover, s.garage),
            Err(GarageError::NotAtGarage {
                vehicle: s.rover,
                garage: s.garage
            })
        );
        assert_eq!(garages.garage_of(s.rover), None);
    }

    #[test]
    fn test_release_departed() {
        let mut s = site();
        let mut garages = GarageRegistry::new();
        garages.add_garage(s.garage, 2);
        garages.park(&s.registry, s.rover, s.garage).unwrap();
        garages.park(&s.registry, s.luv, s.garage).unwrap();
        assert!(garages.release_departed(&s.registry).is_empty());

        s.registry
            .replace(
                s.rover,
                Placement {
                    container: Some(UnitId::SURFACE),
                    state: LocationState::OutsideOnSurface,
                },
            )
            .unwrap();
        assert!(!vehicle_at_garage(&s.registry, s.rover, s.garage).unwrap());
        assert_eq!(garages.release_departed(&s.registry), vec![s.rover]);
        assert_eq!(garages.garage_of(s.rover), None);
        assert_eq!(garages.parked_in(s.garage), &[s.luv]);
    }

    #[test]
    fn test_redeclare_keeps_vehicles() {
        let s = site();
        let mut garages = GarageRegistry::new();
        garages.add_garage(s.garage, 1);
        garages.park(&s.registry, s.rover, s.garage).unwrap();
        garages.add_garage(s.garage, 3);
        assert_eq!(garages.free_slots(s.garage), Some(2));
        assert_eq!(garages.garage_count(), 1);
    }
}
