//! Unit containment and location-state model for a Mars colony simulation.
//!
//! Every simulated unit (person, robot, equipment, vehicle, building,
//! settlement, and the surface itself) sits inside at most one other unit.
//! This crate keeps that containment forest, derives each unit's location
//! state from it, answers location queries and notifies listeners of
//! changes. Scheduling, AI and rendering live elsewhere and reach the model
//! through [`colony::ColonyModel`] and the traits in [`collaborators`].
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`classifier`] | Location state from entity kind and container kind |
//! | [`collaborators`] | Vicinity and garage lookups supplied by the caller |
//! | [`colony`] | `ColonyModel`, the entry point tying everything together |
//! | [`components`] | Unit ids, kinds, states and ECS components |
//! | [`config`] | `LocationConfig` loaded from JSON |
//! | [`constants`] | Per-kind id ranges, Mars radius, name limits |
//! | [`containment`] | Bounded container-chain walks and atomic moves |
//! | [`error`] | `LocationError`, `ListenerFault` |
//! | [`events`] | Listener bus with fault isolation, deferred move queue |
//! | [`garage`] | Garage buildings and parked vehicles |
//! | [`logging`] | `env_logger` setup |
//! | [`naming`] | Shortened display names, name ordering |
//! | [`persistence`] | bincode save/load |
//! | [`predicates`] | `is_inside`, `is_outside` and friends |
//! | [`registry`] | Stable ids over a `hecs` world |

pub mod classifier;
pub mod collaborators;
pub mod colony;
pub mod components;
pub mod config;
pub mod constants;
pub mod containment;
pub mod error;
pub mod events;
pub mod garage;
pub mod logging;
pub mod naming;
pub mod persistence;
pub mod predicates;
pub mod registry;

/// Commonly used items.
pub mod prelude {
    pub use crate::collaborators::{
        Collaborators, GarageLookup, Nowhere, SettlementSites, VicinityOracle,
    };
    pub use crate::colony::{ColonyModel, TickReport};
    pub use crate::components::{
        Coordinates, EquipmentType, LocationState, UnitId, UnitKind,
    };
    pub use crate::config::LocationConfig;
    pub use crate::error::{ListenerFault, LocationError, LocationResult};
    pub use crate::events::{ListenerId, MoveQueue, UnitEvent, UnitEventKind};
    pub use crate::garage::{GarageError, GarageRegistry};
    pub use crate::persistence::{load_colony, save_colony, SaveError};
}
