//! Unit change notifications.
//!
//! Listeners subscribe to one unit or to every unit. Delivery is
//! synchronous, once per listener per event, in subscription order:
//! per-unit listeners first, then global ones. A listener that fails or
//! panics is recorded and skipped; the rest still receive the event.
//!
//! Listeners are handed a shared `&ColonyModel` alongside each event. The
//! change is fully applied by then, so every query a listener makes sees a
//! consistent model, and a shared borrow cannot start another move. Moves a
//! listener wants to make go through a [`MoveQueue`] and are applied on the
//! next tick. Listeners must read through the view they are given: locking
//! an outer handle around the model from inside a notification blocks
//! forever, since the caller still holds it for the write.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::colony::ColonyModel;
use crate::components::{Coordinates, LocationState, UnitId};
use crate::error::ListenerFault;

/// What changed on a unit.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitEventKind {
    /// Payload is the new container (`None` = unknown).
    ContainerChanged(Option<UnitId>),
    LocationStateChanged {
        from: LocationState,
        to: LocationState,
    },
    CoordinatesChanged(Coordinates),
    NameChanged(String),
    DescriptionChanged(String),
    MassChanged(f64),
    Spawned,
    Removed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitEvent {
    pub unit: UnitId,
    pub kind: UnitEventKind,
}

impl UnitEvent {
    pub fn new(unit: UnitId, kind: UnitEventKind) -> Self {
        Self { unit, kind }
    }
}

/// Receiver of unit events.
///
/// `model` is a read-only view of the colony after the change. While a
/// notification is being delivered the view reports no listeners.
pub trait UnitListener: Send + Sync {
    fn unit_update(&mut self, model: &ColonyModel, event: &UnitEvent) -> Result<(), ListenerFault>;
}

impl<F> UnitListener for F
where
    F: FnMut(&ColonyModel, &UnitEvent) -> Result<(), ListenerFault> + Send + Sync,
{
    fn unit_update(&mut self, model: &ColonyModel, event: &UnitEvent) -> Result<(), ListenerFault> {
        self(model, event)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// A listener failure kept for later inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerFaultRecord {
    pub listener: ListenerId,
    pub event: UnitEvent,
    pub fault: ListenerFault,
}

type Slot = (ListenerId, Box<dyn UnitListener>);

/// Listener registry and dispatcher.
pub struct EventBus {
    per_unit: HashMap<UnitId, Vec<Slot>>,
    global: Vec<Slot>,
    next_id: u64,
    faults: VecDeque<ListenerFaultRecord>,
    fault_capacity: usize,
}

impl EventBus {
    pub fn new(fault_capacity: usize) -> Self {
        Self {
            per_unit: HashMap::new(),
            global: Vec::new(),
            next_id: 0,
            faults: VecDeque::new(),
            fault_capacity,
        }
    }

    fn next_listener_id(&mut self) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Listen to events of one unit.
    pub fn subscribe(&mut self, unit: UnitId, listener: impl UnitListener + 'static) -> ListenerId {
        let id = self.next_listener_id();
        self.per_unit
            .entry(unit)
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    /// Listen to events of every unit.
    pub fn subscribe_all(&mut self, listener: impl UnitListener + 'static) -> ListenerId {
        let id = self.next_listener_id();
        self.global.push((id, Box::new(listener)));
        id
    }

    /// Returns false if the listener was not subscribed to `unit`.
    pub fn unsubscribe(&mut self, unit: UnitId, listener: ListenerId) -> bool {
        let Some(slots) = self.per_unit.get_mut(&unit) else {
            return false;
        };
        let before = slots.len();
        slots.retain(|(id, _)| *id != listener);
        let removed = slots.len() != before;
        if slots.is_empty() {
            self.per_unit.remove(&unit);
        }
        removed
    }

    pub fn unsubscribe_all(&mut self, listener: ListenerId) -> bool {
        let before = self.global.len();
        self.global.retain(|(id, _)| *id != listener);
        self.global.len() != before
    }

    pub fn has_listener(&self, unit: UnitId, listener: ListenerId) -> bool {
        self.per_unit
            .get(&unit)
            .is_some_and(|slots| slots.iter().any(|(id, _)| *id == listener))
    }

    /// Per-unit listeners of `unit` (global listeners not counted).
    pub fn listener_count(&self, unit: UnitId) -> usize {
        self.per_unit.get(&unit).map(|s| s.len()).unwrap_or(0)
    }

    /// Forget every per-unit listener of a removed unit.
    pub fn drop_unit(&mut self, unit: UnitId) {
        self.per_unit.remove(&unit);
    }

    /// Deliver one event. Returns how many listeners accepted it.
    pub fn notify(&mut self, model: &ColonyModel, event: &UnitEvent) -> usize {
        let mut delivered = 0;
        let mut faults = Vec::new();

        let unit_slots = self
            .per_unit
            .get_mut(&event.unit)
            .map(|s| s.iter_mut())
            .into_iter()
            .flatten();
        for (id, listener) in unit_slots.chain(self.global.iter_mut()) {
            match deliver(listener.as_mut(), model, event) {
                Ok(()) => delivered += 1,
                Err(fault) => faults.push(ListenerFaultRecord {
                    listener: *id,
                    event: event.clone(),
                    fault,
                }),
            }
        }

        for record in faults {
            self.record_fault(record);
        }
        delivered
    }

    /// Deliver events in order.
    pub fn notify_all(&mut self, model: &ColonyModel, events: &[UnitEvent]) -> usize {
        events.iter().map(|e| self.notify(model, e)).sum()
    }

    fn record_fault(&mut self, record: ListenerFaultRecord) {
        log::warn!(
            "{} failed on {:?} for unit {}: {}",
            record.listener,
            record.event.kind,
            record.event.unit,
            record.fault
        );
        if self.fault_capacity == 0 {
            return;
        }
        while self.faults.len() >= self.fault_capacity {
            self.faults.pop_front();
        }
        self.faults.push_back(record);
    }

    /// Drain recorded listener faults, oldest first.
    pub fn take_listener_faults(&mut self) -> Vec<ListenerFaultRecord> {
        self.faults.drain(..).collect()
    }

    pub fn fault_count(&self) -> usize {
        self.faults.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

fn deliver(
    listener: &mut dyn UnitListener,
    model: &ColonyModel,
    event: &UnitEvent,
) -> Result<(), ListenerFault> {
    match catch_unwind(AssertUnwindSafe(|| listener.unit_update(model, event))) {
        Ok(result) => result,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "listener panicked".to_string());
            Err(ListenerFault(format!("panic: {}", reason)))
        }
    }
}

/// A move requested from inside a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRequest {
    pub unit: UnitId,
    pub container: Option<UnitId>,
}

/// Cloneable queue of deferred moves. The model drains it on each tick.
#[derive(Debug, Clone, Default)]
pub struct MoveQueue {
    inner: Arc<Mutex<VecDeque<MoveRequest>>>,
}

impl MoveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, unit: UnitId, container: Option<UnitId>) {
        self.lock().push_back(MoveRequest { unit, container });
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Take every queued request, in push order.
    pub fn drain(&self) -> Vec<MoveRequest> {
        self.lock().drain(..).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<MoveRequest>> {
        // A poisoned queue still holds valid requests.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
