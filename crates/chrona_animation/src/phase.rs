//! Phase events
//!
//! Every observable moment of a playable's lifecycle is one [`Phase`]. Each
//! moment fires an "-ing" phase before the playable performs and an "-ed"
//! phase after, so listeners can both prepare for and react to a value.

use crate::playable::Direction;
use slotmap::{new_key_type, SlotMap};

/// The twelve distinguishable lifecycle moments
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Starting,
    Started,
    LoopStarting,
    LoopStarted,
    LoopUpdating,
    LoopUpdated,
    Updating,
    Updated,
    LoopCompleting,
    LoopCompleted,
    Completing,
    Completed,
}

impl Phase {
    pub const ALL: [Phase; 12] = [
        Phase::Starting,
        Phase::Started,
        Phase::LoopStarting,
        Phase::LoopStarted,
        Phase::LoopUpdating,
        Phase::LoopUpdated,
        Phase::Updating,
        Phase::Updated,
        Phase::LoopCompleting,
        Phase::LoopCompleted,
        Phase::Completing,
        Phase::Completed,
    ];

    /// Whether this phase belongs to an update moment
    pub fn is_update(&self) -> bool {
        matches!(
            self,
            Phase::Updating | Phase::Updated | Phase::LoopUpdating | Phase::LoopUpdated
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Starting => "starting",
            Phase::Started => "started",
            Phase::LoopStarting => "loop-starting",
            Phase::LoopStarted => "loop-started",
            Phase::LoopUpdating => "loop-updating",
            Phase::LoopUpdated => "loop-updated",
            Phase::Updating => "updating",
            Phase::Updated => "updated",
            Phase::LoopCompleting => "loop-completing",
            Phase::LoopCompleted => "loop-completed",
            Phase::Completing => "completing",
            Phase::Completed => "completed",
        }
    }
}

/// A phase notification
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhaseEvent {
    pub phase: Phase,
    /// Direction of the traversal that produced the event
    pub direction: Direction,
    /// Loop the moment belongs to
    pub loop_index: u32,
    /// Playable time of the moment, in `[0, duration]`
    pub time: f32,
}

new_key_type! {
    /// Identifier of a registered listener
    pub struct ListenerId;
}

type Callback = Box<dyn FnMut(&PhaseEvent)>;

struct Listener {
    filter: Option<Phase>,
    callback: Callback,
}

/// Ordered listener list of one playable
#[derive(Default)]
pub(crate) struct PhaseListeners {
    entries: SlotMap<ListenerId, Listener>,
    /// Registration order, since slot order is reused after removals
    order: Vec<ListenerId>,
}

impl PhaseListeners {
    pub fn add(&mut self, filter: Option<Phase>, callback: Callback) -> ListenerId {
        let id = self.entries.insert(Listener { filter, callback });
        self.order.push(id);
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let removed = self.entries.remove(id).is_some();
        if removed {
            self.order.retain(|l| *l != id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn dispatch(&mut self, event: &PhaseEvent) {
        for id in &self.order {
            let Some(listener) = self.entries.get_mut(*id) else {
                continue;
            };
            if listener.filter.map_or(true, |phase| phase == event.phase) {
                (listener.callback)(event);
            }
        }
    }
}
