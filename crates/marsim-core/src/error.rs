//! Error types for the containment model.

use thiserror::Error;

use crate::components::{UnitId, UnitKind};

/// Failures of registry, containment and predicate operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    /// The id does not name a live unit.
    #[error("unit {0} not found")]
    NotFound(UnitId),

    /// The move would make a unit (transitively) contain itself. The graph is
    /// left unchanged.
    #[error("placing {unit} into {container} would create a containment cycle")]
    CyclicContainment { unit: UnitId, container: UnitId },

    /// A structural guarantee did not hold. Fatal for the current operation.
    #[error("containment invariant violated: {0}")]
    InvariantViolation(String),

    /// The surface is the root and cannot be placed into anything.
    #[error("the surface cannot be moved")]
    SurfaceIsRoot,

    #[error("no ids left for kind {0}")]
    IdRangeExhausted(UnitKind),

    /// Removal refused while other units are still inside.
    #[error("unit {0} still contains other units")]
    StillContainsUnits(UnitId),

    /// Contained units follow their container and cannot be positioned
    /// directly.
    #[error("unit {0} is inside another unit; its coordinates follow the container")]
    CoordinatesSlaved(UnitId),

    #[error("unit {unit} is not a {expected}")]
    WrongKind { unit: UnitId, expected: UnitKind },
}

impl LocationError {
    /// Build an `InvariantViolation`, logging it as it is raised.
    pub fn invariant(message: impl Into<String>) -> Self {
        let message = message.into();
        log::error!("containment invariant violated: {}", message);
        LocationError::InvariantViolation(message)
    }
}

/// Error a listener reports back from a notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("listener fault: {0}")]
pub struct ListenerFault(pub String);

impl ListenerFault {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

pub type LocationResult<T> = Result<T, LocationError>;
