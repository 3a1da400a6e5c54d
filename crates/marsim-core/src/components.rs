//! Component definitions for colony units.
//!
//! Every unit is a `hecs` entity carrying the components below. They are
//! pure data; the containment rules live in [`crate::containment`] and
//! [`crate::classifier`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{ids, mars};

/// Stable identifier of a unit. Never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

impl UnitId {
    /// The planet surface.
    pub const SURFACE: Self = Self(ids::MARS_SURFACE);

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_surface(self) -> bool {
        self == Self::SURFACE
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kinds of carried equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquipmentType {
    EvaSuit,
    Bag,
    Barrel,
    GasCanister,
    SpecimenBox,
}

/// Closed set of unit kinds. Fixed for a unit's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    Person,
    Robot,
    Equipment(EquipmentType),
    Vehicle,
    Building,
    Settlement,
    Surface,
}

impl UnitKind {
    /// First id of this kind's range.
    pub fn first_id(&self) -> u32 {
        match self {
            UnitKind::Surface => ids::MARS_SURFACE,
            UnitKind::Settlement => ids::FIRST_SETTLEMENT,
            UnitKind::Building => ids::FIRST_BUILDING,
            UnitKind::Vehicle => ids::FIRST_VEHICLE,
            UnitKind::Person => ids::FIRST_PERSON,
            UnitKind::Robot => ids::FIRST_ROBOT,
            UnitKind::Equipment(_) => ids::FIRST_EQUIPMENT,
        }
    }

    /// Exclusive upper bound of this kind's range.
    pub fn id_ceiling(&self) -> u32 {
        match self {
            UnitKind::Surface => ids::FIRST_SETTLEMENT,
            UnitKind::Settlement => ids::FIRST_BUILDING,
            UnitKind::Building => ids::FIRST_VEHICLE,
            UnitKind::Vehicle => ids::FIRST_PERSON,
            UnitKind::Person => ids::FIRST_ROBOT,
            UnitKind::Robot => ids::FIRST_EQUIPMENT,
            UnitKind::Equipment(_) => u32::MAX,
        }
    }

    pub fn is_eva_suit(&self) -> bool {
        matches!(self, UnitKind::Equipment(EquipmentType::EvaSuit))
    }

    /// People and robots carry whatever they hold.
    pub fn is_carrier(&self) -> bool {
        matches!(self, UnitKind::Person | UnitKind::Robot)
    }

    pub fn label(&self) -> &'static str {
        match self {
            UnitKind::Person => "person",
            UnitKind::Robot => "robot",
            UnitKind::Equipment(EquipmentType::EvaSuit) => "EVA suit",
            UnitKind::Equipment(_) => "equipment",
            UnitKind::Vehicle => "vehicle",
            UnitKind::Building => "building",
            UnitKind::Settlement => "settlement",
            UnitKind::Surface => "surface",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Geographic position in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance in kilometres on a Mars-radius sphere.
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        mars::RADIUS_KM * c
    }
}

/// Where a unit is, as seen by the rest of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationState {
    InsideSettlement,
    InsideVehicle,
    InsideEvaSuit,
    OnAPersonOrRobot,
    OutsideOnSurface,
    OutsideSettlementVicinity,
    Unknown,
}

impl LocationState {
    /// Tag a freshly created unit starts with, before it is placed.
    pub fn default_for(kind: UnitKind) -> Self {
        match kind {
            UnitKind::Person | UnitKind::Robot | UnitKind::Equipment(_) | UnitKind::Building => {
                LocationState::InsideSettlement
            }
            UnitKind::Vehicle | UnitKind::Settlement | UnitKind::Surface => {
                LocationState::OutsideOnSurface
            }
        }
    }

    /// Worn or carried: predicates defer to the container.
    pub fn is_pass_through(&self) -> bool {
        matches!(
            self,
            LocationState::InsideEvaSuit | LocationState::OnAPersonOrRobot
        )
    }

    pub fn is_inside(&self) -> bool {
        matches!(
            self,
            LocationState::InsideSettlement | LocationState::InsideVehicle
        )
    }

    pub fn is_outside(&self) -> bool {
        matches!(
            self,
            LocationState::OutsideOnSurface | LocationState::OutsideSettlementVicinity
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            LocationState::InsideSettlement => "inside a settlement",
            LocationState::InsideVehicle => "inside a vehicle",
            LocationState::InsideEvaSuit => "inside an EVA suit",
            LocationState::OnAPersonOrRobot => "carried by a person or robot",
            LocationState::OutsideOnSurface => "outside on the surface",
            LocationState::OutsideSettlementVicinity => "outside in a settlement vicinity",
            LocationState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for LocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Identity component: id and kind never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitIdentity {
    pub id: UnitId,
    pub kind: UnitKind,
}

/// Display name and description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitLabel {
    pub name: String,
    pub description: String,
}

impl UnitLabel {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
        }
    }
}

/// Container edge and the state tag derived from it.
///
/// Both live in one component so no reader can see one updated without the
/// other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// `None` is the unknown sentinel (and the Surface's own value).
    pub container: Option<UnitId>,
    pub state: LocationState,
}

/// Mass of the unit itself, excluding anything it holds (kg).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseMass(pub f64);

/// Settlement the unit belongs to, independent of where it currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeSettlement(pub Option<UnitId>);
