//! Colony model - main entry point for the containment core.
//!
//! `ColonyModel` owns the unit registry, the listener bus and the deferred
//! move queue. Every mutating call applies its whole change to the registry
//! first and only then hands the resulting events to listeners, together
//! with a read-only view of the model, so no listener ever observes a unit
//! whose container and state disagree.
//!
//! The model is `Send + Sync`. Callers sharing it between threads wrap it in
//! their own lock; listeners must not take that lock, they already hold a
//! view.

use crate::collaborators::{Collaborators, SettlementSites};
use crate::components::*;
use crate::config::LocationConfig;
use crate::containment;
use crate::error::{LocationError, LocationResult};
use crate::events::{
    EventBus, ListenerFaultRecord, ListenerId, MoveQueue, MoveRequest, UnitEvent, UnitEventKind,
    UnitListener,
};
use crate::naming;
use crate::predicates;
use crate::registry::{UnitRecord, UnitRegistry};

/// Name given to the surface unit.
pub const SURFACE_NAME: &str = "Mars";

/// Outcome of draining the deferred move queue.
#[derive(Debug, Default)]
pub struct TickReport {
    pub applied: usize,
    pub rejected: Vec<(MoveRequest, LocationError)>,
}

/// Units, their containment and the listeners watching them.
pub struct ColonyModel {
    registry: UnitRegistry,
    events: EventBus,
    config: LocationConfig,
    moves: MoveQueue,
}

impl std::fmt::Debug for ColonyModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColonyModel")
            .field("config", &self.config)
            .field("moves", &self.moves)
            .finish_non_exhaustive()
    }
}

impl ColonyModel {
    /// Create a model holding only the surface.
    pub fn new(config: LocationConfig) -> Self {
        Self {
            registry: UnitRegistry::with_surface(SURFACE_NAME),
            events: EventBus::new(config.listener_fault_capacity),
            config,
            moves: MoveQueue::new(),
        }
    }

    /// Rebuild a model from saved units. Listeners and queued moves start
    /// empty.
    pub(crate) fn from_records(
        config: LocationConfig,
        records: Vec<UnitRecord>,
        counters: &[(u32, u32)],
    ) -> LocationResult<Self> {
        let mut registry = UnitRegistry::new();
        for record in records {
            registry.insert_record(record)?;
        }
        if registry.kind(UnitId::SURFACE).ok() != Some(UnitKind::Surface) {
            return Err(LocationError::invariant("saved colony has no surface unit"));
        }
        registry.restore_counters(counters);
        Ok(Self {
            registry,
            events: EventBus::new(config.listener_fault_capacity),
            config,
            moves: MoveQueue::new(),
        })
    }

    pub fn config(&self) -> &LocationConfig {
        &self.config
    }

    pub fn registry(&self) -> &UnitRegistry {
        &self.registry
    }

    pub fn unit_count(&self) -> usize {
        self.registry.len()
    }

    /// Every unit as a plain record, ascending by id.
    pub fn records(&self) -> LocationResult<Vec<UnitRecord>> {
        self.registry
            .ids()
            .into_iter()
            .map(|id| self.registry.record(id))
            .collect()
    }

    pub(crate) fn counters(&self) -> Vec<(u32, u32)> {
        self.registry.counters()
    }

    fn bound(&self) -> usize {
        self.config.depth_bound(self.registry.len())
    }

    /// Deliver events with `self` as the listeners' view. The bus is moved
    /// out for the duration, so the view shows no listeners.
    fn publish(&mut self, events: &[UnitEvent]) {
        if events.is_empty() {
            return;
        }
        let mut bus = std::mem::take(&mut self.events);
        bus.notify_all(self, events);
        self.events = bus;
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Create a unit and place it.
    ///
    /// Vehicles and settlements without a container start on the surface;
    /// other kinds without one start with an unknown location. A unit
    /// spawned somewhere inside a settlement takes it as its home.
    pub fn spawn_unit(
        &mut self,
        kind: UnitKind,
        name: impl Into<String>,
        coordinates: Coordinates,
        container: Option<UnitId>,
        collab: &Collaborators,
    ) -> LocationResult<UnitId> {
        if kind == UnitKind::Surface {
            return Err(LocationError::SurfaceIsRoot);
        }
        let label = UnitLabel::new(name);
        let name = label.name.clone();
        let id = self.registry.register(
            kind,
            label,
            coordinates,
            Placement {
                container: None,
                state: LocationState::default_for(kind),
            },
        )?;

        let target = container.or(match kind {
            UnitKind::Vehicle | UnitKind::Settlement => Some(UnitId::SURFACE),
            _ => None,
        });
        let bound = self.bound();
        let placed = containment::apply_container_change(
            &mut self.registry,
            collab.vicinity,
            id,
            target,
            bound,
        )
        .and_then(|_| {
            containment::nearest_enclosing(&self.registry, id, bound, |k| {
                k == UnitKind::Settlement
            })
        });
        let home = match placed {
            Ok(home) => home,
            Err(e) => {
                // Nothing was published for the unit yet.
                if let Err(undo) = self.registry.remove(id) {
                    log::error!("could not roll back spawn of {}: {}", id, undo);
                    return Err(LocationError::invariant(format!(
                        "spawn of {} failed ({}) and left it registered ({})",
                        id, e, undo
                    )));
                }
                return Err(e);
            }
        };
        if home.is_some() {
            self.registry.replace(id, HomeSettlement(home))?;
        }

        let state = self.registry.component::<Placement>(id)?.state;
        log::info!("spawned {} {} '{}' ({})", kind, id, name, state);
        self.publish(&[UnitEvent::new(id, UnitEventKind::Spawned)]);
        Ok(id)
    }

    /// Remove an empty unit. Its per-unit listeners hear `Removed` and are
    /// then dropped.
    pub fn remove_unit(&mut self, unit: UnitId) -> LocationResult<UnitRecord> {
        if unit.is_surface() {
            return Err(LocationError::SurfaceIsRoot);
        }
        let record = self.registry.remove(unit)?;
        log::info!("removed {} {} '{}'", record.identity.kind, unit, record.label.name);
        self.publish(&[UnitEvent::new(unit, UnitEventKind::Removed)]);
        self.events.drop_unit(unit);
        Ok(record)
    }

    // ------------------------------------------------------------------
    // Containment
    // ------------------------------------------------------------------

    /// Move `unit` into `container` (`None` detaches it).
    ///
    /// The container edge, the slaved coordinates and the state tag are all
    /// written before any listener is told.
    pub fn set_container(
        &mut self,
        unit: UnitId,
        container: Option<UnitId>,
        collab: &Collaborators,
    ) -> LocationResult<()> {
        let bound = self.bound();
        let events = containment::apply_container_change(
            &mut self.registry,
            collab.vicinity,
            unit,
            container,
            bound,
        )?;
        self.publish(&events);
        Ok(())
    }

    pub fn container(&self, unit: UnitId) -> LocationResult<Option<UnitId>> {
        containment::container_of(&self.registry, unit)
    }

    /// Outermost container below the surface (see
    /// [`containment::top_container`]).
    pub fn top_container(&self, unit: UnitId) -> LocationResult<Option<UnitId>> {
        containment::top_container(&self.registry, unit, self.bound())
    }

    /// Direct contents, ascending by id.
    pub fn contents_of(&self, container: UnitId) -> LocationResult<Vec<UnitId>> {
        self.registry.resolve(container)?;
        Ok(self.registry.children_of(container))
    }

    pub fn is_descendant_of(&self, unit: UnitId, ancestor: UnitId) -> LocationResult<bool> {
        containment::is_descendant_of(&self.registry, unit, ancestor, self.bound())
    }

    /// Nearest settlement enclosing the unit.
    pub fn settlement_of(&self, unit: UnitId) -> LocationResult<Option<UnitId>> {
        containment::nearest_enclosing(&self.registry, unit, self.bound(), |k| {
            k == UnitKind::Settlement
        })
    }

    /// Nearest vehicle enclosing the unit.
    pub fn vehicle_of(&self, unit: UnitId) -> LocationResult<Option<UnitId>> {
        containment::nearest_enclosing(&self.registry, unit, self.bound(), |k| {
            k == UnitKind::Vehicle
        })
    }

    pub fn home_settlement(&self, unit: UnitId) -> LocationResult<Option<UnitId>> {
        Ok(self.registry.component::<HomeSettlement>(unit)?.0)
    }

    pub fn set_home_settlement(
        &mut self,
        unit: UnitId,
        settlement: Option<UnitId>,
    ) -> LocationResult<()> {
        if let Some(s) = settlement {
            if self.registry.kind(s)? != UnitKind::Settlement {
                return Err(LocationError::WrongKind {
                    unit: s,
                    expected: UnitKind::Settlement,
                });
            }
        }
        self.registry.replace(unit, HomeSettlement(settlement))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    pub fn kind(&self, unit: UnitId) -> LocationResult<UnitKind> {
        self.registry.kind(unit)
    }

    pub fn location_state(&self, unit: UnitId) -> LocationResult<LocationState> {
        Ok(self.registry.component::<Placement>(unit)?.state)
    }

    pub fn coordinates(&self, unit: UnitId) -> LocationResult<Coordinates> {
        self.registry.component::<Coordinates>(unit)
    }

    pub fn name(&self, unit: UnitId) -> LocationResult<String> {
        Ok(self.registry.component_cloned::<UnitLabel>(unit)?.name)
    }

    pub fn description(&self, unit: UnitId) -> LocationResult<String> {
        Ok(self.registry.component_cloned::<UnitLabel>(unit)?.description)
    }

    pub fn base_mass(&self, unit: UnitId) -> LocationResult<f64> {
        Ok(self.registry.component::<BaseMass>(unit)?.0)
    }

    pub fn shortened_name(&self, unit: UnitId) -> LocationResult<String> {
        Ok(naming::shortened_name(&self.name(unit)?))
    }

    /// `units` ordered by display name, ignoring case. Ties keep id order.
    pub fn sorted_by_name(&self, units: &[UnitId]) -> LocationResult<Vec<UnitId>> {
        let mut named = units
            .iter()
            .map(|&id| -> LocationResult<(String, UnitId)> { Ok((self.name(id)?, id)) })
            .collect::<LocationResult<Vec<_>>>()?;
        named.sort_by(|(a, a_id), (b, b_id)| naming::compare_names(a, b).then(a_id.cmp(b_id)));
        Ok(named.into_iter().map(|(_, id)| id).collect())
    }

    pub fn rename(&mut self, unit: UnitId, name: impl Into<String>) -> LocationResult<()> {
        let name = name.into();
        let mut label = self.registry.component_cloned::<UnitLabel>(unit)?;
        if label.name == name {
            return Ok(());
        }
        log::debug!("{} renamed '{}' -> '{}'", unit, label.name, name);
        label.name = name.clone();
        self.registry.replace(unit, label)?;
        self.publish(&[UnitEvent::new(unit, UnitEventKind::NameChanged(name))]);
        Ok(())
    }

    pub fn set_description(
        &mut self,
        unit: UnitId,
        description: impl Into<String>,
    ) -> LocationResult<()> {
        let description = description.into();
        let mut label = self.registry.component_cloned::<UnitLabel>(unit)?;
        if label.description == description {
            return Ok(());
        }
        label.description = description.clone();
        self.registry.replace(unit, label)?;
        self.publish(&[UnitEvent::new(
            unit,
            UnitEventKind::DescriptionChanged(description),
        )]);
        Ok(())
    }

    pub fn set_base_mass(&mut self, unit: UnitId, kg: f64) -> LocationResult<()> {
        let old = self.registry.replace(unit, BaseMass(kg))?;
        if old.0 != kg {
            self.publish(&[UnitEvent::new(unit, UnitEventKind::MassChanged(kg))]);
        }
        Ok(())
    }

    /// Position a unit that is not inside anything. Whatever it holds moves
    /// with it.
    pub fn set_coordinates(
        &mut self,
        unit: UnitId,
        coordinates: Coordinates,
        collab: &Collaborators,
    ) -> LocationResult<()> {
        let bound = self.bound();
        let events = containment::apply_coordinates(
            &mut self.registry,
            collab.vicinity,
            unit,
            coordinates,
            bound,
        )?;
        self.publish(&events);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Predicates
    // ------------------------------------------------------------------

    pub fn is_inside(&self, unit: UnitId) -> LocationResult<bool> {
        predicates::is_inside(&self.registry, unit, self.bound())
    }

    pub fn is_outside(&self, unit: UnitId) -> LocationResult<bool> {
        predicates::is_outside(&self.registry, unit, self.bound())
    }

    pub fn is_in_vehicle(&self, unit: UnitId) -> LocationResult<bool> {
        predicates::is_in_vehicle(&self.registry, unit, self.bound())
    }

    pub fn is_in_settlement(&self, unit: UnitId) -> LocationResult<bool> {
        predicates::is_in_settlement(&self.registry, unit, self.bound())
    }

    pub fn is_in_vehicle_in_garage(
        &self,
        unit: UnitId,
        collab: &Collaborators,
    ) -> LocationResult<bool> {
        predicates::is_in_vehicle_in_garage(&self.registry, collab.garages, unit, self.bound())
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    pub fn subscribe(
        &mut self,
        unit: UnitId,
        listener: impl UnitListener + 'static,
    ) -> LocationResult<ListenerId> {
        self.registry.resolve(unit)?;
        Ok(self.events.subscribe(unit, listener))
    }

    pub fn subscribe_all(&mut self, listener: impl UnitListener + 'static) -> ListenerId {
        self.events.subscribe_all(listener)
    }

    pub fn unsubscribe(&mut self, unit: UnitId, listener: ListenerId) -> bool {
        self.events.unsubscribe(unit, listener)
    }

    pub fn unsubscribe_all(&mut self, listener: ListenerId) -> bool {
        self.events.unsubscribe_all(listener)
    }

    pub fn has_listener(&self, unit: UnitId, listener: ListenerId) -> bool {
        self.events.has_listener(unit, listener)
    }

    pub fn listener_count(&self, unit: UnitId) -> usize {
        self.events.listener_count(unit)
    }

    /// Faults raised by listeners since the last call, oldest first.
    pub fn take_listener_faults(&mut self) -> Vec<ListenerFaultRecord> {
        self.events.take_listener_faults()
    }

    /// Handle listeners use to defer moves to the next tick.
    pub fn move_queue(&self) -> MoveQueue {
        self.moves.clone()
    }

    /// Apply moves queued since the last tick. Moves queued by listeners
    /// while this runs wait for the following tick.
    pub fn time_passing(&mut self, collab: &Collaborators) -> TickReport {
        let mut report = TickReport::default();
        for request in self.moves.drain() {
            match self.set_container(request.unit, request.container, collab) {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    log::warn!(
                        "deferred move of {} into {:?} rejected: {}",
                        request.unit,
                        request.container,
                        e
                    );
                    report.rejected.push((request, e));
                }
            }
        }
        report
    }

    // ------------------------------------------------------------------
    // Whole-model passes
    // ------------------------------------------------------------------

    /// Vicinity oracle built from every registered settlement.
    pub fn settlement_sites(&self) -> LocationResult<SettlementSites> {
        let mut sites = SettlementSites::new(self.config.vicinity_radius_km);
        for id in self.registry.ids_of_kind(UnitKind::Settlement) {
            sites.add_site(id, self.registry.component::<Coordinates>(id)?);
        }
        Ok(sites)
    }

    /// Audit every unit. Returns the first violation found.
    pub fn check_invariants(&self, collab: &Collaborators) -> LocationResult<()> {
        let bound = self.bound();
        for unit in self.registry.ids() {
            containment::check_unit(&self.registry, collab.vicinity, unit, bound)?;
        }
        Ok(())
    }

    /// Re-derive every state tag, e.g. after settlements were added.
    pub fn reclassify_all(&mut self, collab: &Collaborators) -> LocationResult<()> {
        let events = containment::reclassify_all(&mut self.registry, collab.vicinity)?;
        if !events.is_empty() {
            log::info!("reclassified {} units", events.len());
        }
        self.publish(&events);
        Ok(())
    }
}

impl Default for ColonyModel {
    fn default() -> Self {
        Self::new(LocationConfig::default())
    }
}
