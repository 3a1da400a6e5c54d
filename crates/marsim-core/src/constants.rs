//! Colony constants: unit id ranges and physical parameters.
//!
//! Ids are plain `u32` values. Every unit kind draws from its own range so an
//! id alone tells which kind of unit it names.

pub mod ids {
    /// The planet surface. Root of every containment chain.
    pub const MARS_SURFACE: u32 = 0;
    pub const FIRST_SETTLEMENT: u32 = 1;
    pub const FIRST_BUILDING: u32 = 20;
    pub const FIRST_VEHICLE: u32 = 2050;
    pub const FIRST_PERSON: u32 = 2500;
    pub const FIRST_ROBOT: u32 = 3550;
    pub const FIRST_EQUIPMENT: u32 = 4050;
}

pub mod mars {
    /// Mean volumetric radius of Mars in kilometres.
    pub const RADIUS_KM: f64 = 3389.5;
}

/// Names longer than this are candidates for shortening.
pub const SHORT_NAME_THRESHOLD: usize = 20;
/// A clipped name part keeps at most this many characters.
pub const SHORT_NAME_PART: usize = 10;

#[cfg(test)]
mod tests {
    use super::ids::*;

    #[test]
    fn test_ranges_are_ordered() {
        let starts = [
            MARS_SURFACE,
            FIRST_SETTLEMENT,
            FIRST_BUILDING,
            FIRST_VEHICLE,
            FIRST_PERSON,
            FIRST_ROBOT,
            FIRST_EQUIPMENT,
        ];
        assert!(starts.windows(2).all(|w| w[0] < w[1]));
    }
}
