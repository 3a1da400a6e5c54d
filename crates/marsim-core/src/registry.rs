//! Unit registry: stable ids over a `hecs` world.
//!
//! Each unit kind hands out ids from its own range (see
//! [`crate::constants::ids`]). Ids are never reused, even after a unit is
//! removed.

use std::collections::HashMap;

use hecs::{Component, ComponentError, Entity, QueryOneError, World};
use serde::{Deserialize, Serialize};

use crate::components::*;
use crate::error::{LocationError, LocationResult};

/// All components of one unit, as a plain value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub identity: UnitIdentity,
    pub label: UnitLabel,
    pub coordinates: Coordinates,
    pub placement: Placement,
    pub mass: BaseMass,
    pub home: HomeSettlement,
}

/// Owns every unit entity and resolves ids back to them.
pub struct UnitRegistry {
    world: World,
    index: HashMap<UnitId, Entity>,
    /// range start → next id to hand out
    next_ids: HashMap<u32, u32>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            index: HashMap::new(),
            next_ids: HashMap::new(),
        }
    }

    /// Registry holding only the surface unit.
    pub fn with_surface(name: impl Into<String>) -> Self {
        let mut registry = Self::new();
        registry.spawn(UnitRecord {
            identity: UnitIdentity {
                id: UnitId::SURFACE,
                kind: UnitKind::Surface,
            },
            label: UnitLabel::new(name),
            coordinates: Coordinates::default(),
            placement: Placement {
                container: None,
                state: LocationState::OutsideOnSurface,
            },
            mass: BaseMass::default(),
            home: HomeSettlement::default(),
        });
        let start = UnitKind::Surface.first_id();
        registry.next_ids.insert(start, UnitId::SURFACE.raw() + 1);
        registry
    }

    /// Register a new unit, assigning the next id in its kind's range.
    pub fn register(
        &mut self,
        kind: UnitKind,
        label: UnitLabel,
        coordinates: Coordinates,
        placement: Placement,
    ) -> LocationResult<UnitId> {
        let id = self.allocate_id(kind)?;
        self.spawn(UnitRecord {
            identity: UnitIdentity { id, kind },
            label,
            coordinates,
            placement,
            mass: BaseMass::default(),
            home: HomeSettlement::default(),
        });
        Ok(id)
    }

    /// Insert a unit whose id was assigned elsewhere (the surface, or a
    /// loaded save). Counters move past the id so it is never handed out.
    pub(crate) fn insert_record(&mut self, record: UnitRecord) -> LocationResult<()> {
        let id = record.identity.id;
        let kind = record.identity.kind;
        if self.index.contains_key(&id) {
            return Err(LocationError::InvariantViolation(format!(
                "unit {} registered twice",
                id
            )));
        }
        if id.raw() < kind.first_id() || id.raw() >= kind.id_ceiling() {
            return Err(LocationError::InvariantViolation(format!(
                "id {} outside the {} range",
                id, kind
            )));
        }
        let next = self.next_ids.entry(kind.first_id()).or_insert(kind.first_id());
        if *next <= id.raw() {
            *next = id.raw() + 1;
        }
        self.spawn(record);
        Ok(())
    }

    fn allocate_id(&mut self, kind: UnitKind) -> LocationResult<UnitId> {
        let next = self.next_ids.entry(kind.first_id()).or_insert(kind.first_id());
        if *next >= kind.id_ceiling() {
            return Err(LocationError::IdRangeExhausted(kind));
        }
        let id = UnitId(*next);
        *next += 1;
        Ok(id)
    }

    fn spawn(&mut self, record: UnitRecord) {
        let id = record.identity.id;
        let entity = self.world.spawn((
            record.identity,
            record.label,
            record.coordinates,
            record.placement,
            record.mass,
            record.home,
        ));
        self.index.insert(id, entity);
    }

    /// Resolve an id to its entity.
    pub fn resolve(&self, id: UnitId) -> LocationResult<Entity> {
        self.index
            .get(&id)
            .copied()
            .ok_or(LocationError::NotFound(id))
    }

    pub fn contains(&self, id: UnitId) -> bool {
        self.index.contains_key(&id)
    }

    /// Remove a unit, returning its last state. Refused while anything is
    /// still inside it.
    pub fn remove(&mut self, id: UnitId) -> LocationResult<UnitRecord> {
        let record = self.record(id)?;
        if !self.children_of(id).is_empty() {
            return Err(LocationError::StillContainsUnits(id));
        }
        let entity = self.resolve(id)?;
        self.world
            .despawn(entity)
            .map_err(|_| LocationError::NotFound(id))?;
        self.index.remove(&id);
        Ok(record)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// All registered ids, ascending.
    pub fn ids(&self) -> Vec<UnitId> {
        let mut ids: Vec<UnitId> = self.index.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Ids of one kind, ascending. Equipment matches on the exact type.
    pub fn ids_of_kind(&self, kind: UnitKind) -> Vec<UnitId> {
        let mut ids: Vec<UnitId> = self
            .world
            .query::<&UnitIdentity>()
            .iter()
            .filter(|(_, identity)| identity.kind == kind)
            .map(|(_, identity)| identity.id)
            .collect();
        ids.sort();
        ids
    }

    pub fn kind(&self, id: UnitId) -> LocationResult<UnitKind> {
        Ok(self.component::<UnitIdentity>(id)?.kind)
    }

    /// Copy a component out of a unit.
    pub fn component<T: Component + Copy>(&self, id: UnitId) -> LocationResult<T> {
        let entity = self.resolve(id)?;
        self.world
            .get::<&T>(entity)
            .map(|c| *c)
            .map_err(|e| component_error::<T>(id, e))
    }

    /// Clone a component out of a unit.
    pub fn component_cloned<T: Component + Clone>(&self, id: UnitId) -> LocationResult<T> {
        let entity = self.resolve(id)?;
        self.world
            .get::<&T>(entity)
            .map(|c| (*c).clone())
            .map_err(|e| component_error::<T>(id, e))
    }

    /// Overwrite a component, returning the previous value.
    pub fn replace<T: Component>(&mut self, id: UnitId, value: T) -> LocationResult<T> {
        let entity = self.resolve(id)?;
        let mut slot = self
            .world
            .get::<&mut T>(entity)
            .map_err(|e| component_error::<T>(id, e))?;
        Ok(std::mem::replace(&mut *slot, value))
    }

    /// Write position and placement together. Returns the previous values.
    pub fn place(
        &mut self,
        id: UnitId,
        coordinates: Coordinates,
        placement: Placement,
    ) -> LocationResult<(Coordinates, Placement)> {
        let entity = self.resolve(id)?;
        let (coords, slot) = self
            .world
            .query_one_mut::<(&mut Coordinates, &mut Placement)>(entity)
            .map_err(|e| match e {
                QueryOneError::NoSuchEntity => LocationError::NotFound(id),
                QueryOneError::Unsatisfied => LocationError::invariant(format!(
                    "unit {} is missing its position components",
                    id
                )),
            })?;
        let previous = (*coords, *slot);
        *coords = coordinates;
        *slot = placement;
        Ok(previous)
    }

    /// Full snapshot of one unit.
    pub fn record(&self, id: UnitId) -> LocationResult<UnitRecord> {
        Ok(UnitRecord {
            identity: self.component(id)?,
            label: self.component_cloned(id)?,
            coordinates: self.component(id)?,
            placement: self.component(id)?,
            mass: self.component(id)?,
            home: self.component(id)?,
        })
    }

    /// Units whose container is `container`, ascending.
    pub fn children_of(&self, container: UnitId) -> Vec<UnitId> {
        let mut ids: Vec<UnitId> = self
            .world
            .query::<(&UnitIdentity, &Placement)>()
            .iter()
            .filter(|(_, (_, placement))| placement.container == Some(container))
            .map(|(_, (identity, _))| identity.id)
            .collect();
        ids.sort();
        ids
    }

    /// Next id each range would hand out, for persistence.
    pub(crate) fn counters(&self) -> Vec<(u32, u32)> {
        let mut counters: Vec<(u32, u32)> = self.next_ids.iter().map(|(k, v)| (*k, *v)).collect();
        counters.sort();
        counters
    }

    pub(crate) fn restore_counters(&mut self, counters: &[(u32, u32)]) {
        for &(start, next) in counters {
            let slot = self.next_ids.entry(start).or_insert(start);
            if *slot < next {
                *slot = next;
            }
        }
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn component_error<T>(id: UnitId, err: ComponentError) -> LocationError {
    match err {
        ComponentError::NoSuchEntity => LocationError::NotFound(id),
        ComponentError::MissingComponent(_) => LocationError::invariant(format!(
            "unit {} has no {} component",
            id,
            std::any::type_name::<T>()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placed(state: LocationState) -> Placement {
        Placement {
            container: Some(UnitId::SURFACE),
            state,
        }
    }

    #[test]
    fn test_ids_follow_kind_ranges() {
        let mut registry = UnitRegistry::new();
        let s = registry
            .register(
                UnitKind::Settlement,
                UnitLabel::new("Schiaparelli Point"),
                Coordinates::default(),
                placed(LocationState::OutsideOnSurface),
            )
            .unwrap();
        let p1 = registry
            .register(
                UnitKind::Person,
                UnitLabel::new("Ada"),
                Coordinates::default(),
                placed(LocationState::InsideSettlement),
            )
            .unwrap();
        let p2 = registry
            .register(
                UnitKind::Person,
                UnitLabel::new("Grace"),
                Coordinates::default(),
                placed(LocationState::InsideSettlement),
            )
            .unwrap();
        let suit = registry
            .register(
                UnitKind::Equipment(EquipmentType::EvaSuit),
                UnitLabel::new("Suit 1"),
                Coordinates::default(),
                placed(LocationState::InsideSettlement),
            )
            .unwrap();
        let bag = registry
            .register(
                UnitKind::Equipment(EquipmentType::Bag),
                UnitLabel::new("Bag 1"),
                Coordinates::default(),
                placed(LocationState::InsideSettlement),
            )
            .unwrap();

        assert_eq!(s, UnitId(1));
        assert_eq!(p1, UnitId(2500));
        assert_eq!(p2, UnitId(2501));
        assert_eq!(suit, UnitId(4050));
        assert_eq!(bag, UnitId(4051));
    }

    #[test]
    fn test_ids_not_reused_after_remove() {
        let mut registry = UnitRegistry::new();
        let label = UnitLabel::new("Rover");
        let v1 = registry
            .register(
                UnitKind::Vehicle,
                label.clone(),
                Coordinates::default(),
                placed(LocationState::OutsideOnSurface),
            )
            .unwrap();
        registry.remove(v1).unwrap();
        let v2 = registry
            .register(
                UnitKind::Vehicle,
                label,
                Coordinates::default(),
                placed(LocationState::OutsideOnSurface),
            )
            .unwrap();
        assert_ne!(v1, v2);
        assert!(!registry.contains(v1));
        assert_eq!(registry.resolve(v1), Err(LocationError::NotFound(v1)));
    }

    #[test]
    fn test_range_exhaustion() {
        let mut registry = UnitRegistry::new();
        // Settlement range holds ids 1..20.
        for _ in 1..20 {
            registry
                .register(
                    UnitKind::Settlement,
                    UnitLabel::new("S"),
                    Coordinates::default(),
                    placed(LocationState::OutsideOnSurface),
                )
                .unwrap();
        }
        let err = registry
            .register(
                UnitKind::Settlement,
                UnitLabel::new("S"),
                Coordinates::default(),
                placed(LocationState::OutsideOnSurface),
            )
            .unwrap_err();
        assert_eq!(err, LocationError::IdRangeExhausted(UnitKind::Settlement));
    }

    #[test]
    fn test_insert_record_bumps_counter() {
        let mut registry = UnitRegistry::new();
        registry
            .insert_record(UnitRecord {
                identity: UnitIdentity {
                    id: UnitId(2060),
                    kind: UnitKind::Vehicle,
                },
                label: UnitLabel::new("Loaded"),
                coordinates: Coordinates::default(),
                placement: placed(LocationState::OutsideOnSurface),
                mass: BaseMass(1200.0),
                home: HomeSettlement(None),
            })
            .unwrap();
        let next = registry
            .register(
                UnitKind::Vehicle,
                UnitLabel::new("New"),
                Coordinates::default(),
                placed(LocationState::OutsideOnSurface),
            )
            .unwrap();
        assert_eq!(next, UnitId(2061));
        assert_eq!(registry.component::<BaseMass>(UnitId(2060)).unwrap().0, 1200.0);
    }

    #[test]
    fn test_replace_and_children() {
        let mut registry = UnitRegistry::new();
        let s = registry
            .register(
                UnitKind::Settlement,
                UnitLabel::new("Base"),
                Coordinates::default(),
                placed(LocationState::OutsideOnSurface),
            )
            .unwrap();
        let p = registry
            .register(
                UnitKind::Person,
                UnitLabel::new("Ada"),
                Coordinates::default(),
                placed(LocationState::OutsideOnSurface),
            )
            .unwrap();
        let old = registry
            .replace(
                p,
                Placement {
                    container: Some(s),
                    state: LocationState::InsideSettlement,
                },
            )
            .unwrap();
        assert_eq!(old.container, Some(UnitId::SURFACE));
        assert_eq!(registry.children_of(s), vec![p]);
        assert_eq!(registry.ids_of_kind(UnitKind::Person), vec![p]);
        assert_eq!(registry.kind(s).unwrap(), UnitKind::Settlement);
    }

    #[test]
    fn test_remove_refused_while_occupied() {
        let mut registry = UnitRegistry::with_surface("Mars");
        let rover = registry
            .register(
                UnitKind::Vehicle,
                UnitLabel::new("Rover"),
                Coordinates::default(),
                placed(LocationState::OutsideOnSurface),
            )
            .unwrap();
        assert_eq!(
            registry.remove(UnitId::SURFACE),
            Err(LocationError::StillContainsUnits(UnitId::SURFACE))
        );
        registry.remove(rover).unwrap();
        assert_eq!(registry.ids(), vec![UnitId::SURFACE]);
        assert_eq!(registry.kind(UnitId::SURFACE).unwrap(), UnitKind::Surface);
    }
}
