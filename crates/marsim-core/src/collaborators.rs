//! Services the containment model consults but does not own.
//!
//! Callers pass them in explicitly through [`Collaborators`] on every
//! operation that needs them.

use crate::components::{Coordinates, UnitId};

/// Answers whether a coordinate lies within any settlement's vicinity.
pub trait VicinityOracle {
    fn is_in_settlement_vicinity(&self, coordinates: Coordinates) -> bool;
}

/// Answers which building (if any) a vehicle is parked in.
pub trait GarageLookup {
    fn garage_of(&self, vehicle: UnitId) -> Option<UnitId>;
}

/// Bundle of collaborator references handed to model operations.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub vicinity: &'a dyn VicinityOracle,
    pub garages: &'a dyn GarageLookup,
}

impl<'a> Collaborators<'a> {
    pub fn new(vicinity: &'a dyn VicinityOracle, garages: &'a dyn GarageLookup) -> Self {
        Self { vicinity, garages }
    }
}

/// Settlement positions with a shared vicinity radius.
#[derive(Debug, Clone, Default)]
pub struct SettlementSites {
    sites: Vec<(UnitId, Coordinates)>,
    radius_km: f64,
}

impl SettlementSites {
    pub fn new(radius_km: f64) -> Self {
        Self {
            sites: Vec::new(),
            radius_km,
        }
    }

    pub fn with_site(mut self, settlement: UnitId, coordinates: Coordinates) -> Self {
        self.add_site(settlement, coordinates);
        self
    }

    /// Add or move a settlement site.
    pub fn add_site(&mut self, settlement: UnitId, coordinates: Coordinates) {
        match self.sites.iter_mut().find(|(id, _)| *id == settlement) {
            Some(site) => site.1 = coordinates,
            None => self.sites.push((settlement, coordinates)),
        }
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Closest settlement whose vicinity contains `coordinates`.
    pub fn nearest_within(&self, coordinates: Coordinates) -> Option<UnitId> {
        self.sites
            .iter()
            .map(|(id, site)| (*id, site.distance_km(&coordinates)))
            .filter(|(_, d)| *d <= self.radius_km)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }
}

impl VicinityOracle for SettlementSites {
    fn is_in_settlement_vicinity(&self, coordinates: Coordinates) -> bool {
        self.nearest_within(coordinates).is_some()
    }
}

/// A colony with no settlements and no garages. Useful in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nowhere;

impl VicinityOracle for Nowhere {
    fn is_in_settlement_vicinity(&self, _coordinates: Coordinates) -> bool {
        false
    }
}

impl GarageLookup for Nowhere {
    fn garage_of(&self, _vehicle: UnitId) -> Option<UnitId> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vicinity_radius() {
        let base = Coordinates::new(-4.5, 137.4);
        let sites = SettlementSites::new(1.0).with_site(UnitId(1), base);

        // ~50 m north
        let near = Coordinates::new(-4.5 + 0.05 / 59.158, 137.4);
        // ~3 km north
        let far = Coordinates::new(-4.5 + 3.0 / 59.158, 137.4);

        assert!(sites.is_in_settlement_vicinity(base));
        assert!(sites.is_in_settlement_vicinity(near));
        assert!(!sites.is_in_settlement_vicinity(far));
    }

    #[test]
    fn test_nearest_within_picks_closest() {
        let sites = SettlementSites::new(5.0)
            .with_site(UnitId(1), Coordinates::new(0.0, 0.0))
            .with_site(UnitId(2), Coordinates::new(0.0, 0.05));
        let probe = Coordinates::new(0.0, 0.04);
        assert_eq!(sites.nearest_within(probe), Some(UnitId(2)));
    }

    #[test]
    fn test_add_site_moves_existing() {
        let mut sites = SettlementSites::new(1.0);
        sites.add_site(UnitId(1), Coordinates::new(0.0, 0.0));
        sites.add_site(UnitId(1), Coordinates::new(10.0, 10.0));
        assert_eq!(sites.len(), 1);
        assert!(!sites.is_in_settlement_vicinity(Coordinates::new(0.0, 0.0)));
    }

    #[test]
    fn test_nowhere() {
        assert!(!Nowhere.is_in_settlement_vicinity(Coordinates::default()));
        assert_eq!(Nowhere.garage_of(UnitId(2050)), None);
    }
}
