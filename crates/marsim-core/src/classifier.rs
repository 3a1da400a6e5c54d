//! Location-state classification.
//!
//! The state a unit ends up in depends only on the kind of its *new*
//! container:
//!
//! | New container | State |
//! |---------------|-------|
//! | EVA suit | `InsideEvaSuit` |
//! | Settlement | `InsideSettlement` |
//! | Vehicle | `InsideVehicle` |
//! | Person or robot | `OnAPersonOrRobot` |
//! | anything else | `OutsideSettlementVicinity` if near a settlement, else `OutsideOnSurface` |
//! | none | `Unknown` |
//!
//! Three unit kinds ignore the table: the surface is always outside, a
//! settlement sits on the surface, and a placed building is always part of
//! its settlement.

use crate::components::{LocationState, UnitKind};

/// Compute the location state of a unit of `entity_kind` moving into a
/// container of `new_container` kind.
///
/// The old container kind is accepted for callers that track transitions but
/// has no influence on the result.
pub fn classify(
    entity_kind: UnitKind,
    _old_container: Option<UnitKind>,
    new_container: Option<UnitKind>,
    near_settlement: bool,
) -> LocationState {
    if entity_kind == UnitKind::Surface {
        return LocationState::OutsideOnSurface;
    }
    let Some(container) = new_container else {
        return LocationState::Unknown;
    };

    match entity_kind {
        UnitKind::Settlement => return LocationState::OutsideOnSurface,
        UnitKind::Building => return LocationState::InsideSettlement,
        _ => {}
    }

    container_rule(container).unwrap_or(if near_settlement {
        LocationState::OutsideSettlementVicinity
    } else {
        LocationState::OutsideOnSurface
    })
}

/// Direct mapping from container kind, if one applies.
fn container_rule(container: UnitKind) -> Option<LocationState> {
    match container {
        kind if kind.is_eva_suit() => Some(LocationState::InsideEvaSuit),
        UnitKind::Settlement => Some(LocationState::InsideSettlement),
        UnitKind::Vehicle => Some(LocationState::InsideVehicle),
        UnitKind::Person | UnitKind::Robot => Some(LocationState::OnAPersonOrRobot),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::EquipmentType;
    use rstest::rstest;

    const SUIT: UnitKind = UnitKind::Equipment(EquipmentType::EvaSuit);
    const BAG: UnitKind = UnitKind::Equipment(EquipmentType::Bag);

    #[rstest]
    #[case::suit(SUIT, LocationState::InsideEvaSuit)]
    #[case::settlement(UnitKind::Settlement, LocationState::InsideSettlement)]
    #[case::vehicle(UnitKind::Vehicle, LocationState::InsideVehicle)]
    #[case::person(UnitKind::Person, LocationState::OnAPersonOrRobot)]
    #[case::robot(UnitKind::Robot, LocationState::OnAPersonOrRobot)]
    fn container_table(#[case] container: UnitKind, #[case] expected: LocationState) {
        for entity in [UnitKind::Person, UnitKind::Robot, BAG, SUIT, UnitKind::Vehicle] {
            assert_eq!(
                classify(entity, None, Some(container), false),
                expected,
                "{entity:?} into {container:?}"
            );
            assert_eq!(classify(entity, None, Some(container), true), expected);
        }
    }

    #[rstest]
    #[case::surface_far(UnitKind::Surface, false, LocationState::OutsideOnSurface)]
    #[case::surface_near(UnitKind::Surface, true, LocationState::OutsideSettlementVicinity)]
    #[case::building(UnitKind::Building, false, LocationState::OutsideOnSurface)]
    #[case::plain_equipment(BAG, true, LocationState::OutsideSettlementVicinity)]
    fn fallback_uses_vicinity(
        #[case] container: UnitKind,
        #[case] near: bool,
        #[case] expected: LocationState,
    ) {
        assert_eq!(classify(UnitKind::Person, None, Some(container), near), expected);
    }

    #[test]
    fn test_no_container_is_unknown() {
        for entity in [
            UnitKind::Person,
            UnitKind::Vehicle,
            UnitKind::Building,
            UnitKind::Settlement,
            SUIT,
        ] {
            assert_eq!(classify(entity, None, None, true), LocationState::Unknown);
        }
    }

    #[test]
    fn test_old_container_is_ignored() {
        let olds = [None, Some(UnitKind::Vehicle), Some(UnitKind::Settlement), Some(SUIT)];
        for old in olds {
            assert_eq!(
                classify(UnitKind::Vehicle, old, Some(UnitKind::Surface), true),
                LocationState::OutsideSettlementVicinity
            );
        }
    }

    #[test]
    fn test_fixed_kinds() {
        assert_eq!(
            classify(UnitKind::Surface, None, None, true),
            LocationState::OutsideOnSurface
        );
        assert_eq!(
            classify(UnitKind::Settlement, None, Some(UnitKind::Surface), true),
            LocationState::OutsideOnSurface
        );
        assert_eq!(
            classify(UnitKind::Building, None, Some(UnitKind::Settlement), false),
            LocationState::InsideSettlement
        );
    }
}
