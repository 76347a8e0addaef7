//! Sequences
//!
//! A sequence is a playable whose loop is a timeline of other playables, each
//! placed at a start time. Sequences nest: an element can itself be a
//! sequence. The sequence's loop lasts until its last element ends.
//!
//! Driving a sequence never iterates its elements per frame. Instead the
//! sequence walks its chronolines (instants precomputed whenever an element
//! is added, removed or resized) between the previous and the new playhead,
//! so each element only hears about the instants that concern it, in time
//! order.
//!
//! ```rust
//! use chrona_animation::{Sequence, Tween};
//! use chrona_core::{ExecutionContext, Scheduler};
//!
//! let scheduler = Scheduler::new();
//! let context = ExecutionContext::for_scheduler(&scheduler);
//! let fade = |seconds| {
//!     Tween::builder(&context).from(0.0f32).to(1.0).duration(seconds).build(|_| {}).unwrap()
//! };
//!
//! let sequence = Sequence::new(&context);
//! sequence.append(fade(1.0)).unwrap();
//! sequence.join(fade(0.5)).unwrap();
//! sequence.append(fade(1.0)).unwrap();
//! assert_eq!(sequence.duration(), 2.0);
//! ```

use crate::chronoline::{Action, ChainEvent, Chronoline, Chronolines, Part, Span};
use crate::error::{AnimationError, Result};
use crate::playable::{Body, Direction, Node, NodeRef, PlayState, Playable};
use crate::settings::PlayableSettings;
use chrona_core::ExecutionContext;
use smallvec::SmallVec;
use std::cell::RefMut;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};

/// Identifies an element within its sequence
///
/// Ids are handed out in insertion order and never reused. Elements that
/// meet the same instant are processed in id order, reversed when the
/// sequence plays backward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(u64);

impl ElementId {
    pub(crate) fn new(order: u64) -> Self {
        Self(order)
    }

    /// Insertion order of the element
    pub fn order(&self) -> u64 {
        self.0
    }
}

/// How elements are brought back to their start when a new loop begins
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopResetBehaviour {
    /// Rewind each element to its start without firing events. Tween values
    /// are re-applied on the way, earliest element last.
    #[default]
    Rewind,
    /// Jump each element to its start without applying anything
    Skip,
}

struct Element {
    node: NodeRef,
    span: Span,
}

/// The per-sequence state behind [`Body::Sequence`]
pub(crate) struct SequenceBody {
    elements: BTreeMap<ElementId, Element>,
    next_order: u64,
    last_inserted: Option<ElementId>,
    lines: Chronolines,
    loop_reset: LoopResetBehaviour,
}

fn lock_child(node: &NodeRef) -> Result<RefMut<'_, Node>> {
    node.try_borrow_mut().map_err(|_| AnimationError::Locked)
}

/// Where `node` spans on a sequence when placed at `start`
fn span_of(node: &Node, start: f32) -> Span {
    let timing = node.core.timing;
    let marks: Rc<[f32]> = match &node.body {
        Body::Sequence(sequence) => sequence
            .lines
            .times()
            .into_iter()
            .filter(|t| *t > 0.0 && *t < timing.loop_duration)
            .collect(),
        Body::Tween(_) => Rc::from(Vec::new()),
    };
    Span {
        start,
        loop_duration: timing.loop_duration,
        loops: timing.loops,
        marks,
    }
}

impl SequenceBody {
    fn new() -> Self {
        Self {
            elements: BTreeMap::new(),
            next_order: 0,
            last_inserted: None,
            lines: Chronolines::default(),
            loop_reset: LoopResetBehaviour::default(),
        }
    }

    fn spans(&self) -> impl Iterator<Item = (ElementId, &Span)> + Clone + '_ {
        self.elements.iter().map(|(id, element)| (*id, &element.span))
    }

    /// Loop length implied by the elements
    fn loop_duration(&self) -> f32 {
        self.elements
            .values()
            .map(|element| element.span.end())
            .fold(0.0, f32::max)
    }

    fn push(&mut self, node: NodeRef, span: Span) -> ElementId {
        let id = ElementId(self.next_order);
        self.next_order += 1;
        let (lo, hi) = (span.start, span.end());
        self.elements.insert(id, Element { node, span });
        self.last_inserted = Some(id);

        let spans = self.elements.iter().map(|(id, element)| (*id, &element.span));
        self.lines.rebuild(lo, hi, spans);
        id
    }

    fn take(&mut self, id: ElementId) -> Result<Element> {
        let element = self
            .elements
            .remove(&id)
            .ok_or(AnimationError::UnknownElement(id.0))?;
        if self.last_inserted == Some(id) {
            self.last_inserted = self.elements.keys().next_back().copied();
        }

        let spans = self.elements.iter().map(|(id, element)| (*id, &element.span));
        self.lines
            .rebuild(element.span.start, element.span.end(), spans);
        Ok(element)
    }

    /// Pick up the new shape of the element backed by `node`
    fn refresh(&mut self, node: &NodeRef, shape: Span) -> bool {
        let Some(element) = self
            .elements
            .values_mut()
            .find(|element| Rc::ptr_eq(&element.node, node))
        else {
            return false;
        };
        let span = Span {
            start: element.span.start,
            ..shape
        };
        if span == element.span {
            return false;
        }
        let (lo, hi) = (span.start, element.span.end().max(span.end()));
        element.span = span;

        let spans = self.elements.iter().map(|(id, element)| (*id, &element.span));
        self.lines.rebuild(lo, hi, spans);
        true
    }

    /// Walk the chronolines between two points of one loop
    ///
    /// The departing half of the line at `from` is left out unless
    /// `include_origin`.
    pub fn advance(
        &self,
        loop_duration: f32,
        from: f32,
        to: f32,
        direction: Direction,
        include_origin: bool,
        emit: bool,
    ) -> Result<()> {
        if from == to {
            return Ok(());
        }

        match direction {
            Direction::Forward => {
                for (t, line) in self.lines.range(from, to) {
                    if t == from && !include_origin {
                        continue;
                    }
                    let part = if t == from {
                        Part::Post
                    } else if t == to && to < loop_duration {
                        Part::Pre
                    } else {
                        Part::All
                    };
                    self.fire(line.chain(direction).part(part), direction, emit)?;
                }
            }
            Direction::Backward => {
                for (t, line) in self.lines.range(to, from).rev() {
                    if t == from && !include_origin {
                        continue;
                    }
                    let part = if t == from {
                        Part::Post
                    } else if t == to && to > 0.0 {
                        Part::Pre
                    } else {
                        Part::All
                    };
                    self.fire(line.chain(direction).part(part), direction, emit)?;
                }
            }
        }

        // Landing between chronolines still moves whatever is in progress
        if self.lines.get(to).is_none() {
            let line = Chronoline::build(to, self.spans());
            self.fire(line.chain(direction).part(Part::Pre), direction, emit)?;
        }
        Ok(())
    }

    /// Fire the departing half of the chronoline at `looped`, if there is one
    pub fn depart(&self, looped: f32, direction: Direction, emit: bool) -> Result<()> {
        match self.lines.get(looped) {
            Some(line) => self.fire(line.chain(direction).part(Part::Post), direction, emit),
            None => Ok(()),
        }
    }

    /// Fire everything at the origin of a zero-length loop
    pub fn flash(&self, direction: Direction, emit: bool) -> Result<()> {
        match self.lines.get(0.0) {
            Some(line) => self.fire(line.chain(direction).part(Part::All), direction, emit),
            None => Ok(()),
        }
    }

    /// Bring every element back to its start boundary before a loop begins
    pub fn prime_loop(&self, direction: Direction) -> Result<()> {
        let ordered: Vec<&Element> = match direction {
            Direction::Forward => self.elements.values().rev().collect(),
            Direction::Backward => self.elements.values().collect(),
        };
        for element in ordered {
            let mut child = lock_child(&element.node)?;
            let boundary = direction.start_of(child.duration());
            match self.loop_reset {
                LoopResetBehaviour::Rewind => child.rewind(boundary, false)?,
                LoopResetBehaviour::Skip => child.skip(boundary)?,
            }
        }
        Ok(())
    }

    /// Silently place every element where the loop time `looped` puts it
    pub fn settle(&self, looped: f32) -> Result<()> {
        for element in self.elements.values() {
            let local = (looped - element.span.start).clamp(0.0, element.span.duration());
            lock_child(&element.node)?.skip(local)?;
        }
        Ok(())
    }

    fn fire(&self, events: &[ChainEvent], direction: Direction, emit: bool) -> Result<()> {
        for event in events {
            if let Action::Burst(group) = &event.action {
                self.burst_group(group, direction, emit)?;
                continue;
            }
            let Some(element) = self.elements.get(&event.element) else {
                continue;
            };

            let mut child = lock_child(&element.node)?;
            match &event.action {
                Action::Enter => {
                    let start = direction.start_of(child.duration());
                    if child.core.played_time != start {
                        child.skip(start)?;
                    }
                    child.depart(direction, emit)?;
                }
                Action::Update(local) => child.rewind(*local, emit)?,
                Action::Depart => child.depart(direction, emit)?,
                Action::Finish => {
                    let end = direction.end_of(child.duration());
                    child.rewind(end, emit)?;
                }
                Action::Burst(_) => {}
            }
        }
        Ok(())
    }

    /// Zero-duration elements at one instant run their loops side by side
    ///
    /// Forward, every element starts in the first round; backward, every
    /// element finishes in the last one.
    fn burst_group(&self, group: &[ElementId], direction: Direction, emit: bool) -> Result<()> {
        let mut children = group
            .iter()
            .filter_map(|id| self.elements.get(id))
            .map(|element| lock_child(&element.node))
            .collect::<Result<SmallVec<[RefMut<'_, Node>; 2]>>>()?;

        let rounds = children
            .iter()
            .map(|child| child.core.timing.loops)
            .max()
            .unwrap_or(0);
        for round in 0..rounds {
            for child in children.iter_mut() {
                let loops = child.core.timing.loops;
                let offset = match direction {
                    Direction::Forward => 0,
                    Direction::Backward => rounds - loops,
                };
                if round >= offset && round - offset < loops {
                    child.burst_loop(round - offset, direction, emit)?;
                }
            }
        }
        Ok(())
    }
}

fn sequence_body(body: &mut Body) -> &mut SequenceBody {
    match body {
        Body::Sequence(sequence) => sequence,
        Body::Tween(_) => unreachable!("sequence handle over a tween body"),
    }
}

fn sequence_body_ref(body: &Body) -> &SequenceBody {
    match body {
        Body::Sequence(sequence) => sequence,
        Body::Tween(_) => unreachable!("sequence handle over a tween body"),
    }
}

/// Whether `target` is anywhere below `node`
fn contains(node: &NodeRef, target: &NodeRef) -> Result<bool> {
    let node = node.try_borrow().map_err(|_| AnimationError::Locked)?;
    let Body::Sequence(sequence) = &node.body else {
        return Ok(false);
    };
    for element in sequence.elements.values() {
        if Rc::ptr_eq(&element.node, target) || contains(&element.node, target)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Tell the sequences above `node` that its shape changed
fn propagate_resize(node: &NodeRef) -> Result<()> {
    let parent = node.borrow().core.parent.as_ref().and_then(Weak::upgrade);
    let Some(parent) = parent else {
        return Ok(());
    };
    let shape = span_of(&node.borrow(), 0.0);
    let (loop_duration, loops) = (shape.loop_duration, shape.loops);

    let changed = {
        let mut guard = parent
            .try_borrow_mut()
            .map_err(|_| AnimationError::Locked)?;
        let Node { core, body } = &mut *guard;
        let sequence = sequence_body(body);
        if sequence.refresh(node, shape) {
            core.timing.loop_duration = sequence.loop_duration();
            guard.reposition()?;
            true
        } else {
            false
        }
    };

    if changed {
        tracing::debug!(loop_duration, loops, "nested sequence resized");
        propagate_resize(&parent)?;
    }
    Ok(())
}

/// A playable made of other playables
///
/// Element queries such as [`Sequence::element_ids`] read the sequence's
/// body and panic if called while the sequence evaluates. The
/// [`Playable`] queries it derefs to do not.
#[derive(Clone)]
pub struct Sequence {
    playable: Playable,
}

impl Sequence {
    /// An empty sequence: one loop, forward, zero duration until elements
    /// are added
    pub fn new(context: &ExecutionContext) -> Self {
        let settings = PlayableSettings::new(0.0);
        let node = Node::new_ref(
            context.clone(),
            &settings,
            Body::Sequence(SequenceBody::new()),
        );
        Self {
            playable: Playable::from_node(node),
        }
    }

    pub fn with_loops(self, loops: u32) -> Result<Self> {
        self.set_loops(loops)?;
        Ok(self)
    }

    pub fn with_loop_reset(self, behaviour: LoopResetBehaviour) -> Result<Self> {
        self.set_loop_reset(behaviour)?;
        Ok(self)
    }

    pub fn with_direction(self, direction: Direction) -> Result<Self> {
        self.set_direction(direction)?;
        Ok(self)
    }

    pub fn playable(&self) -> &Playable {
        &self.playable
    }

    pub fn into_playable(self) -> Playable {
        self.playable
    }

    pub fn set_loops(&self, loops: u32) -> Result<()> {
        if loops == 0 {
            return Err(AnimationError::InvalidLoopCount);
        }
        {
            let mut node = self.lock()?;
            if node.core.timing.loops == loops {
                return Ok(());
            }
            node.core.timing.loops = loops;
            node.reposition()?;
        }
        propagate_resize(self.node())
    }

    pub fn set_loop_reset(&self, behaviour: LoopResetBehaviour) -> Result<()> {
        let mut node = self.lock()?;
        sequence_body(&mut node.body).loop_reset = behaviour;
        Ok(())
    }

    /// Place `playable` at `time` on this sequence's loop
    ///
    /// Negative times are clamped to zero. The element is silently moved to
    /// wherever the sequence's playhead puts it.
    pub fn insert(&self, time: f32, playable: impl Into<Playable>) -> Result<ElementId> {
        let child: Playable = playable.into();
        if !time.is_finite() {
            return Err(AnimationError::InvalidTime(time));
        }
        if self.ptr_eq(&child) {
            return Err(AnimationError::SelfContainment);
        }

        let span = {
            let candidate = child
                .node()
                .try_borrow()
                .map_err(|_| AnimationError::Locked)?;
            if candidate.core.parent.is_some() {
                return Err(AnimationError::AlreadyOwned);
            }
            if matches!(candidate.core.state, PlayState::Playing | PlayState::Paused) {
                return Err(AnimationError::Busy);
            }
            span_of(&candidate, time.max(0.0))
        };
        let (start, duration) = (span.start, span.duration());
        if contains(child.node(), self.node())? {
            return Err(AnimationError::CyclicContainment);
        }

        let id = {
            let mut node = self.lock()?;
            let Node { core, body } = &mut *node;
            let sequence = sequence_body(body);
            let id = sequence.push(child.node().clone(), span);
            core.timing.loop_duration = sequence.loop_duration();

            {
                let mut adopted = child.node().borrow_mut();
                adopted.core.parent = Some(Rc::downgrade(self.node()));
                adopted.core.state = PlayState::Reset;
            }
            node.reposition()?;
            id
        };
        propagate_resize(self.node())?;

        tracing::debug!(?id, start, duration, "element inserted");
        Ok(id)
    }

    /// Insert at the end of the current loop
    pub fn append(&self, playable: impl Into<Playable>) -> Result<ElementId> {
        let end = self.lock()?.core.timing.loop_duration;
        self.insert(end, playable)
    }

    /// Insert alongside the most recently inserted element
    pub fn join(&self, playable: impl Into<Playable>) -> Result<ElementId> {
        let start = {
            let node = self.lock()?;
            let sequence = sequence_body_ref(&node.body);
            sequence
                .last_inserted
                .and_then(|id| sequence.elements.get(&id))
                .map_or(0.0, |element| element.span.start)
        };
        self.insert(start, playable)
    }

    /// Take an element out of the sequence, handing it back standalone
    pub fn remove(&self, id: ElementId) -> Result<Playable> {
        let element = {
            let mut node = self.lock()?;
            let Node { core, body } = &mut *node;
            let sequence = sequence_body(body);
            let element = sequence.take(id)?;
            core.timing.loop_duration = sequence.loop_duration();

            element.node.borrow_mut().core.parent = None;
            node.reposition()?;
            element
        };
        propagate_resize(self.node())?;

        tracing::debug!(?id, "element removed");
        Ok(Playable::from_node(element.node))
    }

    pub fn element_count(&self) -> usize {
        self.with_body(|sequence| sequence.elements.len())
    }

    /// Element ids in insertion order
    pub fn element_ids(&self) -> Vec<ElementId> {
        self.with_body(|sequence| sequence.elements.keys().copied().collect())
    }

    pub fn element(&self, id: ElementId) -> Option<Playable> {
        self.with_body(|sequence| {
            sequence
                .elements
                .get(&id)
                .map(|element| Playable::from_node(element.node.clone()))
        })
    }

    /// Start time of an element on the sequence's loop
    pub fn element_start(&self, id: ElementId) -> Option<f32> {
        self.with_body(|sequence| sequence.elements.get(&id).map(|element| element.span.start))
    }

    pub fn loop_reset(&self) -> LoopResetBehaviour {
        self.with_body(|sequence| sequence.loop_reset)
    }

    /// Instants with a precomputed chronoline, ascending
    pub fn chronoline_times(&self) -> Vec<f32> {
        self.with_body(|sequence| sequence.lines.times())
    }

    fn with_body<R>(&self, f: impl FnOnce(&SequenceBody) -> R) -> R {
        let node = self.node().borrow();
        f(sequence_body_ref(&node.body))
    }
}

impl Deref for Sequence {
    type Target = Playable;

    fn deref(&self) -> &Playable {
        &self.playable
    }
}

impl From<Sequence> for Playable {
    fn from(sequence: Sequence) -> Self {
        sequence.playable
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Sequence").field(&self.playable).finish()
    }
}
