//! Containment graph: who is inside whom.
//!
//! Every unit has at most one container. The surface (id 0) has none and is
//! the root of every chain. Walks up the chain are bounded; running past the
//! bound means the graph is no longer a forest and is reported as an
//! invariant violation.
//!
//! Moving a unit is one atomic step over the registry: cycle check,
//! coordinate slaving, reclassification and the write of the new edge all
//! happen before any event is handed back to the caller for delivery.

use crate::classifier::classify;
use crate::collaborators::VicinityOracle;
use crate::components::*;
use crate::error::{LocationError, LocationResult};
use crate::events::{UnitEvent, UnitEventKind};
use crate::registry::UnitRegistry;

/// Direct container of `unit` (`None` = unknown, or the surface itself).
pub fn container_of(registry: &UnitRegistry, unit: UnitId) -> LocationResult<Option<UnitId>> {
    Ok(registry.component::<Placement>(unit)?.container)
}

/// Placement of a unit reached while walking a chain. A container id that
/// does not resolve means the edge set is corrupt.
fn chain_placement(registry: &UnitRegistry, from: UnitId, link: UnitId) -> LocationResult<Placement> {
    registry.component::<Placement>(link).map_err(|e| match e {
        LocationError::NotFound(_) => LocationError::invariant(format!(
            "unit {} is contained by missing unit {}",
            from, link
        )),
        other => other,
    })
}

/// Outermost container of `unit` below the surface.
///
/// Returns the surface when the unit sits directly on it, `None` when the
/// unit's container is unknown (or the unit is the surface).
pub fn top_container(
    registry: &UnitRegistry,
    unit: UnitId,
    bound: usize,
) -> LocationResult<Option<UnitId>> {
    let Some(mut top) = container_of(registry, unit)? else {
        return Ok(None);
    };
    if top.is_surface() {
        return Ok(Some(top));
    }
    for _ in 0..bound {
        match chain_placement(registry, unit, top)?.container {
            None => return Ok(Some(top)),
            Some(parent) if parent.is_surface() => return Ok(Some(top)),
            Some(parent) => top = parent,
        }
    }
    Err(LocationError::invariant(format!(
        "container chain above {} is longer than {} links",
        unit, bound
    )))
}

/// Whether `ancestor` appears anywhere above `unit`.
pub fn is_descendant_of(
    registry: &UnitRegistry,
    unit: UnitId,
    ancestor: UnitId,
    bound: usize,
) -> LocationResult<bool> {
    let mut current = container_of(registry, unit)?;
    for _ in 0..bound {
        match current {
            None => return Ok(false),
            Some(c) if c == ancestor => return Ok(true),
            Some(c) => current = chain_placement(registry, unit, c)?.container,
        }
    }
    Err(LocationError::invariant(format!(
        "container chain above {} is longer than {} links",
        unit, bound
    )))
}

/// Nearest container above `unit` whose kind satisfies `wanted`.
pub fn nearest_enclosing(
    registry: &UnitRegistry,
    unit: UnitId,
    bound: usize,
    wanted: impl Fn(UnitKind) -> bool,
) -> LocationResult<Option<UnitId>> {
    let mut current = container_of(registry, unit)?;
    for _ in 0..bound {
        let Some(c) = current else {
            return Ok(None);
        };
        if wanted(registry.kind(c)?) {
            return Ok(Some(c));
        }
        current = chain_placement(registry, unit, c)?.container;
    }
    Err(LocationError::invariant(format!(
        "container chain above {} is longer than {} links",
        unit, bound
    )))
}

/// Every unit below `root`, breadth first.
pub fn descendants(registry: &UnitRegistry, root: UnitId, bound: usize) -> LocationResult<Vec<UnitId>> {
    let mut found = Vec::new();
    let mut frontier = registry.children_of(root);
    while let Some(unit) = frontier.pop() {
        if found.len() >= bound {
            return Err(LocationError::invariant(format!(
                "more than {} units below {}",
                bound, root
            )));
        }
        found.push(unit);
        frontier.extend(registry.children_of(unit));
    }
    Ok(found)
}

/// Move `unit` into `target` and return the events describing the change.
///
/// `target` of `None`, or an id that does not resolve, leaves the unit with
/// an unknown container and `Unknown` state; it keeps the position of the
/// container it left. Units inside `unit` follow it.
pub fn apply_container_change(
    registry: &mut UnitRegistry,
    vicinity: &dyn VicinityOracle,
    unit: UnitId,
    target: Option<UnitId>,
    bound: usize,
) -> LocationResult<Vec<UnitEvent>> {
    if unit.is_surface() {
        return Err(LocationError::SurfaceIsRoot);
    }
    let identity = registry.component::<UnitIdentity>(unit)?;
    let old_placement = registry.component::<Placement>(unit)?;
    let old_coordinates = registry.component::<Coordinates>(unit)?;

    let resolved = match target {
        Some(container) if !registry.contains(container) => {
            log::warn!(
                "{} {} placed into unregistered unit {}; location unknown",
                identity.kind,
                unit,
                container
            );
            None
        }
        Some(container) => {
            if container == unit || is_descendant_of(registry, container, unit, bound)? {
                return Err(LocationError::CyclicContainment { unit, container });
            }
            Some((container, registry.kind(container)?))
        }
        None => None,
    };

    let coordinates = match resolved {
        Some((container, _)) if !container.is_surface() => {
            registry.component::<Coordinates>(container)?
        }
        Some(_) => old_coordinates,
        None => match old_placement.container {
            Some(previous) if !previous.is_surface() && registry.contains(previous) => {
                registry.component::<Coordinates>(previous)?
            }
            _ => old_coordinates,
        },
    };

    let old_kind = match old_placement.container {
        Some(previous) if registry.contains(previous) => Some(registry.kind(previous)?),
        _ => None,
    };
    let state = classify(
        identity.kind,
        old_kind,
        resolved.map(|(_, kind)| kind),
        vicinity.is_in_settlement_vicinity(coordinates),
    );
    let placement = Placement {
        container: resolved.map(|(container, _)| container),
        state,
    };

    registry.place(unit, coordinates, placement)?;
    log::debug!(
        "{} {} moved {:?} -> {:?}: {} -> {}",
        identity.kind,
        unit,
        old_placement.container,
        placement.container,
        old_placement.state,
        placement.state
    );

    let mut events = moved(unit, old_coordinates, coordinates);
    events.push(UnitEvent::new(
        unit,
        UnitEventKind::ContainerChanged(placement.container),
    ));
    if old_placement.state != placement.state {
        events.push(UnitEvent::new(
            unit,
            UnitEventKind::LocationStateChanged {
                from: old_placement.state,
                to: placement.state,
            },
        ));
    }
    if coordinates != old_coordinates {
        events.extend(follow_container(registry, vicinity, unit, bound)?);
    }
    Ok(events)
}

/// Set the position of a unit that is not inside another unit, then
/// reclassify it and drag along everything it holds.
pub fn apply_coordinates(
    registry: &mut UnitRegistry,
    vicinity: &dyn VicinityOracle,
    unit: UnitId,
    coordinates: Coordinates,
    bound: usize,
) -> LocationResult<Vec<UnitEvent>> {
    let placement = registry.component::<Placement>(unit)?;
    if matches!(placement.container, Some(c) if !c.is_surface()) {
        return Err(LocationError::CoordinatesSlaved(unit));
    }
    let mut events = reposition(registry, vicinity, unit, coordinates)?;
    // Units lying on the surface keep their own positions.
    if !unit.is_surface() {
        events.extend(follow_container(registry, vicinity, unit, bound)?);
    }
    Ok(events)
}

/// Recompute the state of every unit from its current container. Used when
/// the set of settlements changes.
pub fn reclassify_all(
    registry: &mut UnitRegistry,
    vicinity: &dyn VicinityOracle,
) -> LocationResult<Vec<UnitEvent>> {
    let mut events = Vec::new();
    for unit in registry.ids() {
        let coordinates = registry.component::<Coordinates>(unit)?;
        events.extend(reposition(registry, vicinity, unit, coordinates)?);
    }
    Ok(events)
}

/// Copy `root`'s position down to everything it holds.
fn follow_container(
    registry: &mut UnitRegistry,
    vicinity: &dyn VicinityOracle,
    root: UnitId,
    bound: usize,
) -> LocationResult<Vec<UnitEvent>> {
    // Slaved all the way down, so every descendant takes the root's position.
    let coordinates = registry.component::<Coordinates>(root)?;
    let mut events = Vec::new();
    for unit in descendants(registry, root, bound)? {
        events.extend(reposition(registry, vicinity, unit, coordinates)?);
    }
    Ok(events)
}

/// Write new coordinates for one unit and re-derive its state from its
/// unchanged container.
fn reposition(
    registry: &mut UnitRegistry,
    vicinity: &dyn VicinityOracle,
    unit: UnitId,
    coordinates: Coordinates,
) -> LocationResult<Vec<UnitEvent>> {
    let identity = registry.component::<UnitIdentity>(unit)?;
    let old_placement = registry.component::<Placement>(unit)?;
    let old_coordinates = registry.component::<Coordinates>(unit)?;
    let container_kind = match old_placement.container {
        Some(c) => Some(registry.kind(c)?),
        None => None,
    };
    let state = classify(
        identity.kind,
        container_kind,
        container_kind,
        vicinity.is_in_settlement_vicinity(coordinates),
    );
    let placement = Placement {
        state,
        ..old_placement
    };
    registry.place(unit, coordinates, placement)?;

    let mut events = moved(unit, old_coordinates, coordinates);
    if old_placement.state != state {
        log::debug!(
            "{} {} reclassified: {} -> {}",
            identity.kind,
            unit,
            old_placement.state,
            state
        );
        events.push(UnitEvent::new(
            unit,
            UnitEventKind::LocationStateChanged {
                from: old_placement.state,
                to: state,
            },
        ));
    }
    Ok(events)
}

fn moved(unit: UnitId, from: Coordinates, to: Coordinates) -> Vec<UnitEvent> {
    if from == to {
        Vec::new()
    } else {
        vec![UnitEvent::new(unit, UnitEventKind::CoordinatesChanged(to))]
    }
}

/// Audit one unit: its state must match what the classifier derives from
/// its container and position, and a contained unit must share its
/// container's position.
pub fn check_unit(
    registry: &UnitRegistry,
    vicinity: &dyn VicinityOracle,
    unit: UnitId,
    bound: usize,
) -> LocationResult<()> {
    let identity = registry.component::<UnitIdentity>(unit)?;
    let placement = registry.component::<Placement>(unit)?;
    let coordinates = registry.component::<Coordinates>(unit)?;

    if unit.is_surface() != (identity.kind == UnitKind::Surface) {
        return Err(LocationError::invariant(format!(
            "unit {} has kind {} but the surface id is reserved",
            unit, identity.kind
        )));
    }
    if unit.is_surface() && placement.container.is_some() {
        return Err(LocationError::invariant("the surface has a container"));
    }

    let container_kind = match placement.container {
        Some(c) => Some(
            chain_placement(registry, unit, c)
                .and_then(|_| registry.kind(c))?,
        ),
        None => None,
    };
    let expected = classify(
        identity.kind,
        container_kind,
        container_kind,
        vicinity.is_in_settlement_vicinity(coordinates),
    );
    if expected != placement.state {
        return Err(LocationError::invariant(format!(
            "unit {} is tagged {} but its container implies {}",
            unit, placement.state, expected
        )));
    }

    if let Some(container) = placement.container.filter(|c| !c.is_surface()) {
        let container_coordinates = registry.component::<Coordinates>(container)?;
        if container_coordinates != coordinates {
            return Err(LocationError::invariant(format!(
                "unit {} is not at the position of its container {}",
                unit, container
            )));
        }
    }

    // Terminates only if the chain above is acyclic.
    top_container(registry, unit, bound)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{Nowhere, SettlementSites};

    struct Fixture {
        registry: UnitRegistry,
        settlement: UnitId,
        person: UnitId,
        suit: UnitId,
        rover: UnitId,
    }

    fn add(registry: &mut UnitRegistry, kind: UnitKind, name: &str, at: Coordinates) -> UnitId {
        registry
            .register(
                kind,
                UnitLabel::new(name),
                at,
                Placement {
                    container: None,
                    state: LocationState::default_for(kind),
                },
            )
            .unwrap()
    }

    fn fixture() -> Fixture {
        let mut registry = UnitRegistry::with_surface("Mars");
        let base = Coordinates::new(10.0, 20.0);
        let settlement = add(&mut registry, UnitKind::Settlement, "Base", base);
        let person = add(&mut registry, UnitKind::Person, "Ada", Coordinates::default());
        let suit = add(
            &mut registry,
            UnitKind::Equipment(EquipmentType::EvaSuit),
            "Suit",
            Coordinates::default(),
        );
        let rover = add(&mut registry, UnitKind::Vehicle, "Rover", Coordinates::default());

        let bound = registry.len() + 1;
        apply_container_change(&mut registry, &Nowhere, settlement, Some(UnitId::SURFACE), bound).unwrap();
        apply_container_change(&mut registry, &Nowhere, person, Some(settlement), bound).unwrap();
        apply_container_change(&mut registry, &Nowhere, suit, Some(settlement), bound).unwrap();
        apply_container_change(&mut registry, &Nowhere, rover, Some(settlement), bound).unwrap();

        Fixture {
            registry,
            settlement,
            person,
            suit,
            rover,
        }
    }

    fn state(registry: &UnitRegistry, unit: UnitId) -> LocationState {
        registry.component::<Placement>(unit).unwrap().state
    }

    #[test]
    fn test_move_into_suit() {
        let mut f = fixture();
        let events = apply_container_change(&mut f.registry, &Nowhere, f.person, Some(f.suit), 10).unwrap();
        assert_eq!(state(&f.registry, f.person), LocationState::InsideEvaSuit);
        assert_eq!(container_of(&f.registry, f.person).unwrap(), Some(f.suit));
        assert!(events.contains(&UnitEvent::new(
            f.person,
            UnitEventKind::ContainerChanged(Some(f.suit))
        )));
        assert!(events.contains(&UnitEvent::new(
            f.person,
            UnitEventKind::LocationStateChanged {
                from: LocationState::InsideSettlement,
                to: LocationState::InsideEvaSuit,
            }
        )));
    }

    #[test]
    fn test_cycle_rejected_and_graph_unchanged() {
        let mut f = fixture();
        apply_container_change(&mut f.registry, &Nowhere, f.person, Some(f.suit), 10).unwrap();

        let before = f.registry.record(f.suit).unwrap();
        let err = apply_container_change(&mut f.registry, &Nowhere, f.suit, Some(f.person), 10).unwrap_err();
        assert_eq!(
            err,
            LocationError::CyclicContainment {
                unit: f.suit,
                container: f.person
            }
        );
        assert_eq!(f.registry.record(f.suit).unwrap(), before);

        let err = apply_container_change(&mut f.registry, &Nowhere, f.person, Some(f.person), 10).unwrap_err();
        assert!(matches!(err, LocationError::CyclicContainment { .. }));
    }

    #[test]
    fn test_top_container() {
        let mut f = fixture();
        apply_container_change(&mut f.registry, &Nowhere, f.person, Some(f.suit), 10).unwrap();
        assert_eq!(top_container(&f.registry, f.person, 10).unwrap(), Some(f.settlement));
        assert_eq!(
            top_container(&f.registry, f.settlement, 10).unwrap(),
            Some(UnitId::SURFACE)
        );
        assert_eq!(top_container(&f.registry, UnitId::SURFACE, 10).unwrap(), None);
    }

    #[test]
    fn test_detach_keeps_last_position() {
        let mut f = fixture();
        let base = f.registry.component::<Coordinates>(f.settlement).unwrap();
        apply_container_change(&mut f.registry, &Nowhere, f.person, None, 10).unwrap();
        assert_eq!(state(&f.registry, f.person), LocationState::Unknown);
        assert_eq!(container_of(&f.registry, f.person).unwrap(), None);
        assert_eq!(f.registry.component::<Coordinates>(f.person).unwrap(), base);
    }

    #[test]
    fn test_unregistered_target_is_unknown() {
        let mut f = fixture();
        apply_container_change(&mut f.registry, &Nowhere, f.person, Some(UnitId(9999)), 10).unwrap();
        assert_eq!(container_of(&f.registry, f.person).unwrap(), None);
        assert_eq!(state(&f.registry, f.person), LocationState::Unknown);
    }

    #[test]
    fn test_surface_cannot_move() {
        let mut f = fixture();
        let err =
            apply_container_change(&mut f.registry, &Nowhere, UnitId::SURFACE, Some(f.settlement), 10)
                .unwrap_err();
        assert_eq!(err, LocationError::SurfaceIsRoot);
    }

    #[test]
    fn test_contents_follow_vehicle() {
        let mut f = fixture();
        apply_container_change(&mut f.registry, &Nowhere, f.person, Some(f.rover), 10).unwrap();
        apply_container_change(&mut f.registry, &Nowhere, f.suit, Some(f.person), 10).unwrap();
        apply_container_change(&mut f.registry, &Nowhere, f.rover, Some(UnitId::SURFACE), 10).unwrap();

        let far = Coordinates::new(-30.0, 100.0);
        let events = apply_coordinates(&mut f.registry, &Nowhere, f.rover, far, 10).unwrap();

        assert_eq!(f.registry.component::<Coordinates>(f.person).unwrap(), far);
        assert_eq!(f.registry.component::<Coordinates>(f.suit).unwrap(), far);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e.kind, UnitEventKind::CoordinatesChanged(_)))
                .count(),
            3
        );
        for unit in [f.rover, f.person, f.suit] {
            check_unit(&f.registry, &Nowhere, unit, 10).unwrap();
        }
    }

    #[test]
    fn test_contained_unit_coordinates_are_slaved() {
        let mut f = fixture();
        let err = apply_coordinates(&mut f.registry, &Nowhere, f.person, Coordinates::new(1.0, 1.0), 10)
            .unwrap_err();
        assert_eq!(err, LocationError::CoordinatesSlaved(f.person));
    }

    #[test]
    fn test_walking_out_of_vicinity_reclassifies() {
        let mut f = fixture();
        let base = f.registry.component::<Coordinates>(f.settlement).unwrap();
        let sites = SettlementSites::new(1.0).with_site(f.settlement, base);

        apply_container_change(&mut f.registry, &sites, f.person, Some(UnitId::SURFACE), 10).unwrap();
        assert_eq!(
            state(&f.registry, f.person),
            LocationState::OutsideSettlementVicinity
        );

        let far = Coordinates::new(base.latitude + 1.0, base.longitude);
        let events = apply_coordinates(&mut f.registry, &sites, f.person, far, 10).unwrap();
        assert_eq!(state(&f.registry, f.person), LocationState::OutsideOnSurface);
        assert!(events.iter().any(|e| matches!(
            e.kind,
            UnitEventKind::LocationStateChanged {
                to: LocationState::OutsideOnSurface,
                ..
            }
        )));
    }

    #[test]
    fn test_nearest_enclosing_and_descendants() {
        let mut f = fixture();
        apply_container_change(&mut f.registry, &Nowhere, f.person, Some(f.rover), 10).unwrap();
        apply_container_change(&mut f.registry, &Nowhere, f.suit, Some(f.person), 10).unwrap();

        let vehicle = nearest_enclosing(&f.registry, f.suit, 10, |k| k == UnitKind::Vehicle).unwrap();
        assert_eq!(vehicle, Some(f.rover));
        let settlement =
            nearest_enclosing(&f.registry, f.suit, 10, |k| k == UnitKind::Settlement).unwrap();
        assert_eq!(settlement, Some(f.settlement));

        let mut below = descendants(&f.registry, f.rover, 10).unwrap();
        below.sort();
        assert_eq!(below, vec![f.person, f.suit]);
        assert!(is_descendant_of(&f.registry, f.suit, f.settlement, 10).unwrap());
        assert!(!is_descendant_of(&f.registry, f.settlement, f.suit, 10).unwrap());
    }

    #[test]
    fn test_bound_exceeded_is_invariant_violation() {
        let mut f = fixture();
        apply_container_change(&mut f.registry, &Nowhere, f.person, Some(f.suit), 10).unwrap();
        // person → suit → settlement → surface needs more than one link
        let err = top_container(&f.registry, f.person, 1).unwrap_err();
        assert!(matches!(err, LocationError::InvariantViolation(_)));
    }
}
