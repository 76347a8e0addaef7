//! Playable state machine
//!
//! A playable is anything with a timeline: a [`Tween`](crate::Tween) or a
//! [`Sequence`](crate::Sequence). Both share the state machine here; they only
//! differ in what "performing" a moment means (applying a value, or walking
//! the children's chronolines).
//!
//! # Moving the playhead
//!
//! - **rewind** moves the playhead and fires every phase crossed on the way,
//!   in order. Scheduler frames use this path.
//! - **skip** moves the playhead silently: no events, nothing performed.
//!
//! # Locking
//!
//! A playable is locked while it evaluates. Control calls made from inside its
//! own phase listeners (or those of a sequence containing it) return
//! [`AnimationError::Locked`] instead of re-entering. Queries such as
//! [`Playable::state`] still answer: while the playable evaluates, they report
//! it as of its most recent phase.

use crate::error::{AnimationError, Result};
use crate::phase::{ListenerId, Phase, PhaseEvent, PhaseListeners};
use crate::sequence::SequenceBody;
use crate::settings::PlayableSettings;
use crate::timing::{Moment, Position, Timing};
use crate::tween::Perform;
use chrona_core::{ExecutionContext, TickFlow, TickId, WatchId};
use smallvec::SmallVec;
use std::cell::{Cell, RefCell, RefMut};
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};

/// How consecutive loops relate to each other
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopType {
    /// Every loop replays from the start
    #[default]
    Reset,
    /// Each loop continues from where the previous one ended
    Continue,
    /// Earlier loops hold the start value; only the final loop moves
    Mirror,
}

/// Playback direction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }

    pub fn is_forward(self) -> bool {
        self == Direction::Forward
    }

    /// Boundary a traversal in this direction departs from
    pub(crate) fn start_of(self, duration: f32) -> f32 {
        match self {
            Direction::Forward => 0.0,
            Direction::Backward => duration,
        }
    }

    /// Boundary a traversal in this direction arrives at
    pub(crate) fn end_of(self, duration: f32) -> f32 {
        self.reversed().start_of(duration)
    }
}

/// Lifecycle state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlayState {
    #[default]
    Reset,
    Playing,
    Paused,
    Completed,
}

pub(crate) type NodeRef = Rc<NodeCell>;
pub(crate) type WeakNode = Weak<NodeCell>;

/// A node, plus what its handles can read without borrowing it
pub(crate) struct NodeCell {
    node: RefCell<Node>,
    published: Rc<Cell<View>>,
    context: ExecutionContext,
}

impl Deref for NodeCell {
    type Target = RefCell<Node>;

    fn deref(&self) -> &RefCell<Node> {
        &self.node
    }
}

/// Queryable state of a playable
#[derive(Clone, Copy, Debug)]
pub(crate) struct View {
    pub timing: Timing,
    pub direction: Direction,
    pub played_time: f32,
    pub state: PlayState,
    pub owned: bool,
}

/// State shared by every kind of playable
pub(crate) struct Core {
    pub timing: Timing,
    pub direction: Direction,
    pub played_time: f32,
    pub state: PlayState,
    /// Sequence this playable belongs to
    pub parent: Option<WeakNode>,
    /// Departure from the playhead already fired, for this direction
    primed: Option<Direction>,
    listeners: PhaseListeners,
    context: ExecutionContext,
    ticking: Option<TickId>,
    owner_watch: Option<WatchId>,
    /// Last view handed to listeners
    published: Rc<Cell<View>>,
}

impl Core {
    fn new(context: ExecutionContext, settings: &PlayableSettings) -> Self {
        let timing = settings.timing();
        let direction = settings.direction;
        let played_time = direction.start_of(timing.duration());
        let view = View {
            timing,
            direction,
            played_time,
            state: PlayState::Reset,
            owned: false,
        };
        Self {
            timing,
            direction,
            played_time,
            state: PlayState::Reset,
            parent: None,
            primed: None,
            listeners: PhaseListeners::default(),
            context,
            ticking: None,
            owner_watch: None,
            published: Rc::new(Cell::new(view)),
        }
    }

    fn view(&self) -> View {
        View {
            timing: self.timing,
            direction: self.direction,
            played_time: self.played_time,
            state: self.state,
            owned: self.parent.is_some(),
        }
    }

    fn fire(&mut self, phase: Phase, direction: Direction, at: Position, emit: bool) {
        if !emit {
            return;
        }
        let event = PhaseEvent {
            phase,
            direction,
            loop_index: at.loop_index,
            time: self.timing.time_of(at),
        };
        tracing::trace!(
            phase = phase.name(),
            ?direction,
            loop_index = at.loop_index,
            time = event.time,
            "phase"
        );
        self.published.set(View {
            played_time: event.time,
            ..self.view()
        });
        self.listeners.dispatch(&event);
    }
}

/// What a playable performs when a moment is reached
pub(crate) enum Body {
    Tween(Box<dyn Perform>),
    Sequence(SequenceBody),
}

impl Body {
    /// Perform the window `[from, to]` of loop `loop_index`
    ///
    /// Without `include_origin`, what departing from `from` fires was
    /// already fired.
    #[allow(clippy::too_many_arguments)]
    fn advance(
        &mut self,
        timing: &Timing,
        loop_index: u32,
        from: f32,
        to: f32,
        direction: Direction,
        include_origin: bool,
        emit: bool,
    ) -> Result<()> {
        match self {
            Body::Tween(tween) => {
                tween.perform(timing, loop_index, to / timing.loop_duration, direction);
                Ok(())
            }
            Body::Sequence(sequence) => sequence.advance(
                timing.loop_duration,
                from,
                to,
                direction,
                include_origin,
                emit,
            ),
        }
    }

    fn depart(&mut self, looped: f32, direction: Direction, emit: bool) -> Result<()> {
        match self {
            Body::Tween(_) => Ok(()),
            Body::Sequence(sequence) => sequence.depart(looped, direction, emit),
        }
    }

    /// Perform a moment of a zero-length loop
    fn instant(
        &mut self,
        timing: &Timing,
        loop_index: u32,
        moment: Moment,
        direction: Direction,
        emit: bool,
    ) -> Result<()> {
        match self {
            Body::Tween(tween) => {
                let progress = if moment.is_closing() == direction.is_forward() {
                    1.0
                } else {
                    0.0
                };
                tween.perform(timing, loop_index, progress, direction);
                Ok(())
            }
            Body::Sequence(sequence) => match moment {
                Moment::LoopComplete(_) => sequence.flash(direction, emit),
                _ => Ok(()),
            },
        }
    }

    fn before_loop_starting(&mut self, direction: Direction) -> Result<()> {
        match self {
            Body::Tween(_) => Ok(()),
            Body::Sequence(sequence) => sequence.prime_loop(direction),
        }
    }

    fn skip(&mut self, timing: &Timing, time: f32, direction: Direction) -> Result<()> {
        match self {
            Body::Tween(_) => Ok(()),
            Body::Sequence(sequence) => sequence.settle(timing.arrival(time, direction).looped),
        }
    }
}

pub(crate) struct Node {
    pub core: Core,
    pub body: Body,
}

impl Node {
    pub fn new_ref(context: ExecutionContext, settings: &PlayableSettings, body: Body) -> NodeRef {
        let core = Core::new(context.clone(), settings);
        Rc::new(NodeCell {
            published: core.published.clone(),
            context,
            node: RefCell::new(Node { core, body }),
        })
    }

    pub fn duration(&self) -> f32 {
        self.core.timing.duration()
    }

    /// Move the playhead to `time`, firing every phase crossed
    pub fn rewind(&mut self, time: f32, emit: bool) -> Result<()> {
        let timing = self.core.timing;
        let target = time.clamp(0.0, timing.duration());
        let current = self.core.played_time;
        if target == current {
            return Ok(());
        }

        let direction = if target > current {
            Direction::Forward
        } else {
            Direction::Backward
        };
        let mut departed = self.core.primed == Some(direction);
        let plan = timing.plan(current, target, departed);
        let mut cursor = plan.origin;
        for moment in plan.moments {
            self.run_moment(moment, &mut cursor, direction, target, &mut departed, emit)?;
        }

        self.core.played_time = target;
        self.core.primed = None;
        Ok(())
    }

    /// Move the playhead to `time` without firing or performing anything
    pub fn skip(&mut self, time: f32) -> Result<()> {
        let timing = self.core.timing;
        let target = time.clamp(0.0, timing.duration());
        if target == self.core.played_time {
            return Ok(());
        }
        let direction = if target > self.core.played_time {
            Direction::Forward
        } else {
            Direction::Backward
        };
        self.body.skip(&timing, target, direction)?;
        self.core.played_time = target;
        self.core.primed = None;
        Ok(())
    }

    /// Re-seat the playhead after the timeline changed shape
    ///
    /// A reset playable goes back to its direction's start boundary; otherwise
    /// the playhead is clamped. Sequence elements are silently moved to match.
    pub fn reposition(&mut self) -> Result<()> {
        let duration = self.duration();
        let time = if self.core.state == PlayState::Reset {
            self.core.direction.start_of(duration)
        } else {
            self.core.played_time.min(duration)
        };
        self.core.played_time = time;
        self.core.primed = None;
        let timing = self.core.timing;
        self.body.skip(&timing, time, self.core.direction)
    }

    /// Fire what setting off from the playhead in `direction` fires, ahead
    /// of time
    ///
    /// On a boundary these are the start moments of the loop being entered. A
    /// sequence also fires the departing half of its chronoline at the
    /// playhead. Lets a parent sequence deliver them at the instant they
    /// belong to, rather than when the playhead first moves on. The next
    /// rewind in `direction` won't fire them again.
    pub fn depart(&mut self, direction: Direction, emit: bool) -> Result<()> {
        let timing = self.core.timing;
        let duration = timing.duration();
        let at = self.core.played_time;
        if duration <= 0.0 || self.core.primed == Some(direction) || at == direction.end_of(duration) {
            return Ok(());
        }

        let (mut cursor, on_boundary) = timing.departure(at, direction);
        let mut departed = false;
        if at == direction.start_of(duration) {
            self.run_moment(Moment::Start, &mut cursor, direction, at, &mut departed, emit)?;
        }
        if on_boundary {
            let opening = Moment::LoopStart(cursor.loop_index);
            self.run_moment(opening, &mut cursor, direction, at, &mut departed, emit)?;
        }
        self.body.depart(cursor.looped, direction, emit)?;
        self.core.primed = Some(direction);
        Ok(())
    }

    /// Fire every moment of every loop of a zero-duration playable
    pub fn burst(&mut self, direction: Direction, emit: bool) -> Result<()> {
        for iteration in 0..self.core.timing.loops {
            self.burst_loop(iteration, direction, emit)?;
        }
        Ok(())
    }

    /// Fire the moments of one zero-length loop, `iteration` counted from the
    /// direction's start
    pub fn burst_loop(&mut self, iteration: u32, direction: Direction, emit: bool) -> Result<()> {
        let timing = self.core.timing;
        let loop_index = match direction {
            Direction::Forward => iteration,
            Direction::Backward => timing.loops - 1 - iteration,
        };
        let at = Position {
            loop_index,
            looped: 0.0,
        };

        let mut moments: SmallVec<[Moment; 4]> = SmallVec::new();
        if iteration == 0 {
            moments.push(Moment::Start);
        }
        moments.push(Moment::LoopStart(loop_index));
        moments.push(Moment::LoopComplete(loop_index));
        if iteration + 1 == timing.loops {
            moments.push(Moment::Complete);
        }

        for moment in moments {
            if matches!(moment, Moment::LoopStart(_)) {
                self.body.before_loop_starting(direction)?;
            }
            let (before, after) = moment.phases();
            for &phase in before {
                self.core.fire(phase, direction, at, emit);
            }
            self.body.instant(&timing, loop_index, moment, direction, emit)?;
            for &phase in after {
                self.core.fire(phase, direction, at, emit);
            }
        }
        Ok(())
    }

    fn run_moment(
        &mut self,
        moment: Moment,
        cursor: &mut Position,
        direction: Direction,
        target: f32,
        departed: &mut bool,
        emit: bool,
    ) -> Result<()> {
        let timing = self.core.timing;
        let at = timing.position_of(moment, direction, target);
        if matches!(moment, Moment::LoopStart(_)) {
            self.body.before_loop_starting(direction)?;
        }

        let (before, after) = moment.phases();
        for &phase in before {
            self.core.fire(phase, direction, at, emit);
        }

        // A new loop is entered at its boundary: nothing before it to walk
        let from = if cursor.loop_index == at.loop_index {
            cursor.looped
        } else {
            at.looped
        };
        // Only the first window walked starts at the origin
        let include_origin = from == at.looped || !*departed;
        if from != at.looped {
            *departed = false;
        }
        self.body.advance(
            &timing,
            at.loop_index,
            from,
            at.looped,
            direction,
            include_origin,
            emit,
        )?;
        *cursor = at;

        for &phase in after {
            self.core.fire(phase, direction, at, emit);
        }
        Ok(())
    }

    fn set_direction(&mut self, direction: Direction) -> Result<()> {
        if self.core.direction == direction {
            return Ok(());
        }
        self.core.direction = direction;
        if self.core.state == PlayState::Reset {
            self.home()?;
        }
        Ok(())
    }

    /// Skip to the current direction's start boundary
    fn home(&mut self) -> Result<()> {
        let start = self.core.direction.start_of(self.duration());
        self.skip(start)
    }

    fn start_playing(
        &mut self,
        this: &NodeRef,
        direction: Direction,
        reset_if_completed: bool,
    ) -> Result<()> {
        if self.core.parent.is_some() {
            return Err(AnimationError::Owned);
        }
        if self.core.state == PlayState::Playing {
            if self.core.direction == direction {
                return Err(AnimationError::AlreadyPlaying(direction));
            }
            self.core.direction = direction;
            tracing::debug!(?direction, "playback reversed");
            return Ok(());
        }
        if self.core.state == PlayState::Completed && !reset_if_completed {
            return Err(AnimationError::AlreadyCompleted);
        }
        if !self.core.context.owner().is_active() {
            return Err(AnimationError::InactiveOwner);
        }
        if !self.core.context.scheduler().is_alive() {
            return Err(AnimationError::DriverGone);
        }

        self.set_direction(direction)?;
        if self.core.state == PlayState::Completed {
            self.home()?;
            self.core.state = PlayState::Reset;
        }

        if self.duration() <= 0.0 {
            tracing::debug!(?direction, "playing zero-duration playable");
            self.core.state = PlayState::Playing;
            let burst = self.burst(direction, true);
            self.core.state = PlayState::Completed;
            return burst;
        }

        self.drive(this)?;
        self.core.state = PlayState::Playing;
        tracing::debug!(?direction, from = self.core.played_time, "playable playing");
        Ok(())
    }

    /// Register the frame routine and the owner watcher, if not yet present
    fn drive(&mut self, this: &NodeRef) -> Result<()> {
        if self.core.ticking.is_none() {
            let weak = Rc::downgrade(this);
            let id = self
                .core
                .context
                .scheduler()
                .start_ticking(move |dt| drive_frame(&weak, dt))
                .ok_or(AnimationError::DriverGone)?;
            self.core.ticking = Some(id);
        }
        if self.core.owner_watch.is_none() {
            let weak = Rc::downgrade(this);
            let id = self
                .core
                .context
                .owner()
                .on_deactivated(move || owner_deactivated(&weak));
            self.core.owner_watch = Some(id);
        }
        Ok(())
    }

    fn frame(&mut self, dt: f32) -> Result<TickFlow> {
        if !self.core.context.owner().is_active() {
            tracing::debug!("owner inactive, resetting playable");
            self.force_reset();
            return Ok(TickFlow::Finish);
        }
        if self.core.state != PlayState::Playing {
            self.core.ticking = None;
            return Ok(TickFlow::Finish);
        }

        let direction = self.core.direction;
        let target = match direction {
            Direction::Forward => self.core.played_time + dt,
            Direction::Backward => self.core.played_time - dt,
        };
        self.rewind(target, true)?;

        if self.core.played_time == direction.end_of(self.duration()) {
            self.core.state = PlayState::Completed;
            self.core.ticking = None;
            self.release_owner();
            tracing::debug!(?direction, "playable completed");
            return Ok(TickFlow::Finish);
        }
        Ok(TickFlow::Continue)
    }

    fn stop_ticking(&mut self) {
        if let Some(id) = self.core.ticking.take() {
            self.core.context.scheduler().stop_ticking(id);
        }
    }

    fn release_owner(&mut self) {
        if let Some(id) = self.core.owner_watch.take() {
            self.core.context.owner().unwatch(id);
        }
    }

    fn force_reset(&mut self) {
        self.stop_ticking();
        self.release_owner();
        if let Err(err) = self.home() {
            tracing::error!(%err, "failed to reposition playable during reset");
        }
        self.core.state = PlayState::Reset;
    }
}

fn drive_frame(node: &WeakNode, dt: f32) -> TickFlow {
    let Some(node) = node.upgrade() else {
        return TickFlow::Finish;
    };
    let Ok(mut node) = node.try_borrow_mut() else {
        tracing::warn!("frame skipped: playable is locked");
        return TickFlow::Continue;
    };
    match node.frame(dt) {
        Ok(flow) => flow,
        Err(err) => {
            tracing::error!(%err, "playable frame failed, pausing");
            node.core.ticking = None;
            node.core.state = PlayState::Paused;
            TickFlow::Finish
        }
    }
}

fn owner_deactivated(node: &WeakNode) {
    let Some(node) = node.upgrade() else {
        return;
    };
    let Ok(mut node) = node.try_borrow_mut() else {
        // The frame routine notices on its next run
        tracing::debug!("owner deactivated mid-evaluation");
        return;
    };
    tracing::debug!("owner deactivated, resetting playable");
    node.force_reset();
}

/// Handle to a tween or sequence
///
/// Cloning the handle shares the playable.
#[derive(Clone)]
pub struct Playable {
    node: NodeRef,
}

impl Playable {
    pub(crate) fn from_node(node: NodeRef) -> Self {
        Self { node }
    }

    pub(crate) fn node(&self) -> &NodeRef {
        &self.node
    }

    pub(crate) fn downgrade(&self) -> WeakPlayable {
        WeakPlayable {
            node: Rc::downgrade(&self.node),
        }
    }

    /// Borrow for control, failing if this playable or any sequence
    /// containing it is evaluating
    pub(crate) fn lock(&self) -> Result<RefMut<'_, Node>> {
        let node = self
            .node
            .try_borrow_mut()
            .map_err(|_| AnimationError::Locked)?;
        let mut ancestor = node.core.parent.as_ref().and_then(Weak::upgrade);
        while let Some(current) = ancestor {
            ancestor = current
                .try_borrow()
                .map_err(|_| AnimationError::Locked)?
                .core
                .parent
                .as_ref()
                .and_then(Weak::upgrade);
        }
        Ok(node)
    }

    /// Play in the current direction, restarting if completed
    pub fn play(&self) -> Result<()> {
        self.play_with(true)
    }

    pub fn play_with(&self, reset_if_completed: bool) -> Result<()> {
        let mut node = self.lock()?;
        let direction = node.core.direction;
        node.start_playing(&self.node, direction, reset_if_completed)
    }

    /// Play forward. Reverses in place if currently playing backward.
    pub fn play_forward(&self) -> Result<()> {
        self.lock()?
            .start_playing(&self.node, Direction::Forward, true)
    }

    /// Play backward. Reverses in place if currently playing forward.
    pub fn play_backward(&self) -> Result<()> {
        self.lock()?
            .start_playing(&self.node, Direction::Backward, true)
    }

    pub fn pause(&self) -> Result<()> {
        let mut node = self.lock()?;
        if node.core.parent.is_some() {
            return Err(AnimationError::Owned);
        }
        if node.core.state != PlayState::Playing {
            return Err(AnimationError::NotPlaying);
        }
        node.stop_ticking();
        node.core.state = PlayState::Paused;
        tracing::debug!(at = node.core.played_time, "playable paused");
        Ok(())
    }

    /// Stop playback and silently return to the direction's start boundary
    pub fn reset(&self) -> Result<()> {
        let mut node = self.lock()?;
        if node.core.parent.is_some() {
            return Err(AnimationError::Owned);
        }
        if node.core.state == PlayState::Reset {
            return Err(AnimationError::AlreadyReset);
        }
        node.stop_ticking();
        node.release_owner();
        node.home()?;
        node.core.state = PlayState::Reset;
        tracing::debug!("playable reset");
        Ok(())
    }

    /// Seek to `time`, firing every phase crossed on the way
    ///
    /// `time` is clamped to `[0, duration]`.
    pub fn rewind_to(&self, time: f32) -> Result<()> {
        if !time.is_finite() {
            return Err(AnimationError::InvalidTime(time));
        }
        self.lock()?.rewind(time, true)
    }

    pub fn rewind_to_start(&self) -> Result<()> {
        self.rewind_to(0.0)
    }

    pub fn rewind_to_end(&self) -> Result<()> {
        let mut node = self.lock()?;
        let duration = node.duration();
        node.rewind(duration, true)
    }

    /// Seek to `time` silently
    pub fn skip_to(&self, time: f32) -> Result<()> {
        if !time.is_finite() {
            return Err(AnimationError::InvalidTime(time));
        }
        self.lock()?.skip(time)
    }

    pub fn skip_to_start(&self) -> Result<()> {
        self.skip_to(0.0)
    }

    pub fn skip_to_end(&self) -> Result<()> {
        let mut node = self.lock()?;
        let duration = node.duration();
        node.skip(duration)
    }

    /// Change the playback direction
    ///
    /// While reset, the playhead moves to the new direction's start boundary.
    pub fn set_direction(&self, direction: Direction) -> Result<()> {
        self.lock()?.set_direction(direction)
    }

    /// Listen to every phase
    pub fn on_phase<F>(&self, listener: F) -> Result<ListenerId>
    where
        F: FnMut(&PhaseEvent) + 'static,
    {
        self.add_listener(None, Box::new(listener))
    }

    /// Listen to one phase
    pub fn on<F>(&self, phase: Phase, listener: F) -> Result<ListenerId>
    where
        F: FnMut(&PhaseEvent) + 'static,
    {
        self.add_listener(Some(phase), Box::new(listener))
    }

    fn add_listener(
        &self,
        filter: Option<Phase>,
        listener: Box<dyn FnMut(&PhaseEvent)>,
    ) -> Result<ListenerId> {
        let mut node = self
            .node
            .try_borrow_mut()
            .map_err(|_| AnimationError::Locked)?;
        Ok(node.core.listeners.add(filter, listener))
    }

    /// Returns `Ok(false)` if no such listener was registered
    pub fn remove_listener(&self, id: ListenerId) -> Result<bool> {
        let mut node = self
            .node
            .try_borrow_mut()
            .map_err(|_| AnimationError::Locked)?;
        Ok(node.core.listeners.remove(id))
    }

    /// Current state, or the state as of the most recent phase while the
    /// playable evaluates
    fn view(&self) -> View {
        match self.node.try_borrow() {
            Ok(node) => node.core.view(),
            Err(_) => self.node.published.get(),
        }
    }

    pub fn state(&self) -> PlayState {
        self.view().state
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlayState::Playing
    }

    pub fn played_time(&self) -> f32 {
        self.view().played_time
    }

    /// Total duration over all loops
    pub fn duration(&self) -> f32 {
        self.view().timing.duration()
    }

    pub fn loop_duration(&self) -> f32 {
        self.view().timing.loop_duration
    }

    pub fn loops(&self) -> u32 {
        self.view().timing.loops
    }

    pub fn loop_type(&self) -> LoopType {
        self.view().timing.loop_type
    }

    pub fn direction(&self) -> Direction {
        self.view().direction
    }

    /// Whether a sequence drives this playable
    pub fn is_owned(&self) -> bool {
        self.view().owned
    }

    pub fn context(&self) -> ExecutionContext {
        self.node.context.clone()
    }

    /// Whether both handles refer to the same playable
    pub fn ptr_eq(&self, other: &Playable) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl fmt::Debug for Playable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node.try_borrow() {
            Ok(node) => f
                .debug_struct("Playable")
                .field("state", &node.core.state)
                .field("direction", &node.core.direction)
                .field("played_time", &node.core.played_time)
                .field("duration", &node.duration())
                .finish(),
            Err(_) => f.write_str("Playable { <evaluating> }"),
        }
    }
}

/// Non-owning playable handle
#[derive(Clone)]
pub(crate) struct WeakPlayable {
    node: WeakNode,
}

impl WeakPlayable {
    pub fn upgrade(&self) -> Option<Playable> {
        self.node.upgrade().map(Playable::from_node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrona_core::Scheduler;

    /// Records every performed (loop, progress) pair
    struct Recorder(Rc<RefCell<Vec<(u32, f32)>>>);

    impl Perform for Recorder {
        fn perform(&mut self, _timing: &Timing, loop_index: u32, progress: f32, _direction: Direction) {
            self.0.borrow_mut().push((loop_index, progress));
        }
    }

    fn recorded(
        scheduler: &Scheduler,
        settings: PlayableSettings,
    ) -> (Playable, Rc<RefCell<Vec<(u32, f32)>>>, Rc<RefCell<Vec<Phase>>>) {
        let performed = Rc::new(RefCell::new(Vec::new()));
        let node = Node::new_ref(
            ExecutionContext::for_scheduler(scheduler),
            &settings,
            Body::Tween(Box::new(Recorder(performed.clone()))),
        );
        let playable = Playable::from_node(node);
        let phases = Rc::new(RefCell::new(Vec::new()));
        let sink = phases.clone();
        playable
            .on_phase(move |event| sink.borrow_mut().push(event.phase))
            .unwrap();
        (playable, performed, phases)
    }

    #[test]
    fn test_rewind_fires_in_order() {
        let scheduler = Scheduler::new();
        let (playable, performed, phases) = recorded(&scheduler, PlayableSettings::new(1.0));

        playable.rewind_to(0.5).unwrap();
        assert_eq!(
            *phases.borrow(),
            vec![
                Phase::Starting,
                Phase::Started,
                Phase::LoopStarting,
                Phase::LoopStarted,
                Phase::Updating,
                Phase::LoopUpdating,
                Phase::LoopUpdated,
                Phase::Updated,
            ]
        );
        assert_eq!(performed.borrow().last(), Some(&(0, 0.5)));
        assert_eq!(playable.played_time(), 0.5);
    }

    #[test]
    fn test_rewind_to_same_time_is_noop() {
        let scheduler = Scheduler::new();
        let (playable, performed, phases) = recorded(&scheduler, PlayableSettings::new(1.0));

        playable.rewind_to(0.5).unwrap();
        let fired = phases.borrow().len();
        let applied = performed.borrow().len();
        playable.rewind_to(0.5).unwrap();
        assert_eq!(phases.borrow().len(), fired);
        assert_eq!(performed.borrow().len(), applied);
    }

    #[test]
    fn test_skip_is_silent() {
        let scheduler = Scheduler::new();
        let (playable, performed, phases) = recorded(&scheduler, PlayableSettings::new(1.0));

        playable.skip_to(0.75).unwrap();
        assert_eq!(playable.played_time(), 0.75);
        assert!(phases.borrow().is_empty());
        assert!(performed.borrow().is_empty());
    }

    #[test]
    fn test_depart_primes_start_moments() {
        let scheduler = Scheduler::new();
        let (playable, _performed, phases) = recorded(&scheduler, PlayableSettings::new(1.0));

        playable.lock().unwrap().depart(Direction::Forward, true).unwrap();
        assert_eq!(phases.borrow().len(), 4);

        playable.rewind_to(0.5).unwrap();
        let starts = phases
            .borrow()
            .iter()
            .filter(|p| **p == Phase::Started)
            .count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn test_zero_duration_burst() {
        let scheduler = Scheduler::new();
        let (playable, performed, phases) =
            recorded(&scheduler, PlayableSettings::new(0.0).with_loops(2));

        playable.rewind_to(1.0).unwrap();
        assert!(phases.borrow().is_empty());

        playable.play().unwrap();
        assert_eq!(playable.state(), PlayState::Completed);
        let fired = phases.borrow();
        assert_eq!(fired.first(), Some(&Phase::Starting));
        assert_eq!(fired.last(), Some(&Phase::Completed));
        assert_eq!(fired.iter().filter(|p| **p == Phase::LoopCompleted).count(), 2);
        assert_eq!(performed.borrow().last(), Some(&(1, 1.0)));
    }

    #[test]
    fn test_direction_change_while_reset_moves_playhead() {
        let scheduler = Scheduler::new();
        let (playable, _performed, phases) =
            recorded(&scheduler, PlayableSettings::new(1.0).with_loops(2));

        playable.set_direction(Direction::Backward).unwrap();
        assert_eq!(playable.played_time(), 2.0);
        assert!(phases.borrow().is_empty());
    }

    #[test]
    fn test_control_errors() {
        let scheduler = Scheduler::new();
        let (playable, _performed, _phases) = recorded(&scheduler, PlayableSettings::new(1.0));

        assert_eq!(playable.pause(), Err(AnimationError::NotPlaying));
        assert_eq!(playable.reset(), Err(AnimationError::AlreadyReset));
        assert!(matches!(
            playable.rewind_to(f32::NAN),
            Err(AnimationError::InvalidTime(_))
        ));

        playable.play().unwrap();
        assert_eq!(
            playable.play(),
            Err(AnimationError::AlreadyPlaying(Direction::Forward))
        );
        playable.pause().unwrap();
        assert_eq!(playable.state(), PlayState::Paused);
        playable.reset().unwrap();
        assert_eq!(playable.played_time(), 0.0);
    }

    #[test]
    fn test_queries_answer_inside_listeners() {
        let scheduler = Scheduler::new();
        let (playable, _performed, _phases) = recorded(&scheduler, PlayableSettings::new(2.0));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let handle = playable.clone();
        let sink = seen.clone();
        playable
            .on(Phase::Updated, move |_| {
                sink.borrow_mut().push((
                    handle.played_time(),
                    handle.state(),
                    handle.duration(),
                    handle.is_owned(),
                ));
                assert_eq!(handle.rewind_to_end(), Err(AnimationError::Locked));
                assert_eq!(handle.skip_to_end(), Err(AnimationError::Locked));
            })
            .unwrap();

        playable.rewind_to(0.5).unwrap();
        playable.rewind_to(1.5).unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![
                (0.5, PlayState::Reset, 2.0, false),
                (1.5, PlayState::Reset, 2.0, false),
            ]
        );
        assert_eq!(playable.played_time(), 1.5);
    }
}
