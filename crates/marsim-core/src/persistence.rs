//! Save/load of the containment graph.
//!
//! Uses bincode over plain unit records. Listeners and queued moves are
//! runtime wiring and are not saved; a loaded model is audited before it is
//! handed back.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::colony::ColonyModel;
use crate::collaborators::Collaborators;
use crate::config::LocationConfig;
use crate::error::LocationError;
use crate::registry::UnitRecord;

/// Version number for save file format (increment when format changes)
pub const SAVE_VERSION: u32 = 1;

/// Serializable snapshot of a colony.
#[derive(Debug, Serialize, Deserialize)]
pub struct SaveData {
    pub version: u32,
    pub config: LocationConfig,
    /// Next id per kind range, so ids of removed units stay retired.
    pub counters: Vec<(u32, u32)>,
    pub units: Vec<UnitRecord>,
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("saved colony is inconsistent: {0}")]
    Invalid(#[from] LocationError),
}

/// Write the whole colony to `writer`.
pub fn save_colony<W: Write>(writer: W, colony: &ColonyModel) -> Result<(), SaveError> {
    let save_data = SaveData {
        version: SAVE_VERSION,
        config: colony.config().clone(),
        counters: colony.counters(),
        units: colony.records()?,
    };
    bincode::serialize_into(writer, &save_data)?;
    log::info!("saved colony with {} units", save_data.units.len());
    Ok(())
}

/// Read a colony back and check it against the given collaborators.
pub fn load_colony<R: Read>(reader: R, collab: &Collaborators) -> Result<ColonyModel, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }

    let count = save_data.units.len();
    let colony = ColonyModel::from_records(save_data.config, save_data.units, &save_data.counters)?;
    colony.check_invariants(collab)?;
    log::info!("loaded colony with {} units", count);
    Ok(colony)
}
