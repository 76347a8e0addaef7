//! Loop-time math
//!
//! A playable's timeline is `loops` back-to-back copies of one loop. Moving
//! the playhead from one time to another crosses a fixed, ordered list of
//! [`Moment`]s; this module works out which, and where each one sits.
//!
//! Boundary attribution: an instant exactly on a loop boundary belongs to the
//! loop being *left behind* when arriving there, and to the loop being
//! *entered* when departing from it. Arriving forward at `2L` completes loop 1;
//! departing forward from `2L` starts loop 2. That is what keeps a loop's
//! completion and the next loop's start distinguishable when they coincide.

use crate::easing::Formula;
use crate::phase::Phase;
use crate::playable::{Direction, LoopType};
use smallvec::SmallVec;

/// Time geometry and value shaping of one playable
#[derive(Clone, Copy, Debug)]
pub(crate) struct Timing {
    pub loop_duration: f32,
    pub loops: u32,
    pub loop_type: LoopType,
    pub formula: Formula,
}

/// A point on the timeline, split into loop and time within the loop
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Position {
    pub loop_index: u32,
    pub looped: f32,
}

/// One observable moment of a traversal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Moment {
    Start,
    LoopStart(u32),
    Update(u32),
    LoopComplete(u32),
    Complete,
}

impl Moment {
    /// Phases fired before and after the playable performs
    pub fn phases(&self) -> (&'static [Phase], &'static [Phase]) {
        match self {
            Moment::Start => (&[Phase::Starting], &[Phase::Started]),
            Moment::LoopStart(_) => (&[Phase::LoopStarting], &[Phase::LoopStarted]),
            Moment::Update(_) => (
                &[Phase::Updating, Phase::LoopUpdating],
                &[Phase::LoopUpdated, Phase::Updated],
            ),
            Moment::LoopComplete(_) => (&[Phase::LoopCompleting], &[Phase::LoopCompleted]),
            Moment::Complete => (&[Phase::Completing], &[Phase::Completed]),
        }
    }

    /// Whether the moment sits on the traversal's far side of its loop
    pub fn is_closing(&self) -> bool {
        matches!(self, Moment::LoopComplete(_) | Moment::Complete)
    }
}

/// Moments crossed by one traversal, plus where the traversal departs from
#[derive(Debug)]
pub(crate) struct Plan {
    pub origin: Position,
    pub moments: SmallVec<[Moment; 8]>,
}

impl Timing {
    pub fn duration(&self) -> f32 {
        self.loop_duration * self.loops as f32
    }

    pub fn loop_start(&self, loop_index: u32) -> f32 {
        self.loop_duration * loop_index as f32
    }

    pub fn time_of(&self, position: Position) -> f32 {
        self.loop_start(position.loop_index) + position.looped
    }

    fn last_loop(&self) -> u32 {
        self.loops.saturating_sub(1)
    }

    /// Loop containing `t`, boundaries attributed to the loop they open.
    /// Returns whether `t` sits exactly on that loop's start.
    fn opening_loop(&self, t: f32) -> (u32, bool) {
        if self.loop_duration <= 0.0 {
            return (0, true);
        }
        let mut k = (t / self.loop_duration).floor().max(0.0) as u32;
        // Division can land a hair under an exact boundary
        if self.loop_start(k + 1) <= t {
            k += 1;
        }
        if self.loop_start(k) > t && k > 0 {
            k -= 1;
        }
        let k = k.min(self.last_loop());
        (k, self.loop_start(k) == t)
    }

    /// Loop containing `t`, boundaries attributed to the loop they close.
    /// Returns whether `t` sits exactly on that loop's end.
    fn closing_loop(&self, t: f32) -> (u32, bool) {
        let (k, exact) = self.opening_loop(t);
        if exact && k > 0 {
            return (k - 1, true);
        }
        if self.loop_start(k + 1) == t {
            // Only reachable for the terminal boundary
            return (k, true);
        }
        (k, false)
    }

    /// Where a playhead resting at `t` sits after arriving in `direction`
    pub fn arrival(&self, t: f32, direction: Direction) -> Position {
        let (loop_index, _) = match direction {
            Direction::Forward => self.closing_loop(t),
            Direction::Backward => self.opening_loop(t),
        };
        Position {
            loop_index,
            looped: t - self.loop_start(loop_index),
        }
    }

    /// Where a playhead resting at `t` sits as it sets off in `direction`,
    /// and whether that is the start boundary of a loop
    pub fn departure(&self, t: f32, direction: Direction) -> (Position, bool) {
        let (loop_index, on_boundary) = match direction {
            Direction::Forward => self.opening_loop(t),
            Direction::Backward => self.closing_loop(t),
        };
        let position = Position {
            loop_index,
            looped: t - self.loop_start(loop_index),
        };
        (position, on_boundary)
    }

    /// Position of a moment reached by a traversal in `direction` that ends
    /// at `target`
    pub fn position_of(&self, moment: Moment, direction: Direction, target: f32) -> Position {
        let forward = direction == Direction::Forward;
        let (loop_index, looped) = match moment {
            Moment::Start if forward => (0, 0.0),
            Moment::Start => (self.last_loop(), self.loop_duration),
            Moment::Complete if forward => (self.last_loop(), self.loop_duration),
            Moment::Complete => (0, 0.0),
            Moment::LoopStart(k) => (k, if forward { 0.0 } else { self.loop_duration }),
            Moment::LoopComplete(k) => (k, if forward { self.loop_duration } else { 0.0 }),
            Moment::Update(k) => (k, target - self.loop_start(k)),
        };
        Position {
            loop_index,
            looped,
        }
    }

    /// Moments crossed moving from `from` to `to` (`from != to`, duration > 0)
    ///
    /// `primed` means the start moments at `from` were already fired.
    pub fn plan(&self, from: f32, to: f32, primed: bool) -> Plan {
        let duration = self.duration();
        let mut moments = SmallVec::new();

        let direction = if to > from {
            Direction::Forward
        } else {
            Direction::Backward
        };
        let (origin, departs_on_boundary) = self.departure(from, direction);
        let ka = origin.loop_index;

        if direction.is_forward() {
            let (kb, arrives_on_boundary) = self.closing_loop(to);

            if from <= 0.0 && !primed {
                moments.push(Moment::Start);
            }
            if departs_on_boundary && !primed {
                moments.push(Moment::LoopStart(ka));
            }
            for k in ka..kb {
                moments.push(Moment::LoopComplete(k));
                moments.push(Moment::LoopStart(k + 1));
            }
            if arrives_on_boundary {
                moments.push(Moment::LoopComplete(kb));
                if to >= duration {
                    moments.push(Moment::Complete);
                }
            } else {
                moments.push(Moment::Update(kb));
            }

            Plan { origin, moments }
        } else {
            let (kb, arrives_on_boundary) = self.opening_loop(to);

            if from >= duration && !primed {
                moments.push(Moment::Start);
            }
            if departs_on_boundary && !primed {
                moments.push(Moment::LoopStart(ka));
            }
            for k in (kb + 1..=ka).rev() {
                moments.push(Moment::LoopComplete(k));
                moments.push(Moment::LoopStart(k - 1));
            }
            if arrives_on_boundary {
                moments.push(Moment::LoopComplete(kb));
                if to <= 0.0 {
                    moments.push(Moment::Complete);
                }
            } else {
                moments.push(Moment::Update(kb));
            }

            Plan { origin, moments }
        }
    }
}
