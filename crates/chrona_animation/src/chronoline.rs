//! Chronolines
//!
//! A sequence precomputes, for every instant where some element starts, ends,
//! crosses a loop boundary or passes one of its own chronolines (a nested
//! sequence's), what each element has to do when the sequence
//! playhead passes that instant. That per-instant plan is a [`Chronoline`]; it
//! holds one [`Chain`] per direction, split into a *pre* part (what happens as
//! the playhead arrives) and a *post* part (what happens as it departs).
//!
//! Chronolines are rebuilt over a time span whenever an element is added,
//! removed, or resized. Building a line only looks at how each element
//! intersects that one instant, through the lookup in [`placement`].

use crate::playable::Direction;
use crate::sequence::ElementId;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::rc::Rc;

/// Totally ordered time key
#[derive(Clone, Copy, Debug)]
pub(crate) struct TimeKey(pub f32);

impl PartialEq for TimeKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimeKey {}

impl PartialOrd for TimeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Cached placement of an element on its sequence's loop
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Span {
    pub start: f32,
    pub loop_duration: f32,
    pub loops: u32,
    /// Instants strictly inside one of the element's loops where it has
    /// chronolines of its own (a nested sequence's element boundaries)
    pub marks: Rc<[f32]>,
}

/// How an element meets an instant
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Intersection {
    Start,
    /// In progress, at this local time
    Update(f32),
    /// In progress, on one of its own chronolines at this local time
    Mark(f32),
    LoopBoundary(u32),
    Complete,
    /// The element has zero duration and sits at the instant
    Instant,
}

impl Span {
    pub fn duration(&self) -> f32 {
        self.loop_duration * self.loops as f32
    }

    pub fn end(&self) -> f32 {
        self.start + self.duration()
    }

    fn loop_start(&self, k: u32) -> f32 {
        self.start + self.loop_duration * k as f32
    }

    /// Instants where this element needs a chronoline
    pub fn boundaries(&self) -> impl Iterator<Item = f32> + '_ {
        let moving = self.duration() > 0.0;
        let loops = if moving { self.loops } else { 0 };
        let inner = (0..loops).flat_map(move |k| {
            let loop_start = self.loop_start(k);
            std::iter::once(loop_start)
                .filter(move |_| k > 0)
                .chain(self.marks.iter().map(move |mark| loop_start + mark))
        });
        std::iter::once(self.start)
            .chain(inner)
            .chain(std::iter::once(self.end()).filter(move |_| moving))
    }

    pub fn intersection(&self, t: f32) -> Option<Intersection> {
        if self.duration() <= 0.0 {
            return (t == self.start).then_some(Intersection::Instant);
        }
        if t == self.start {
            return Some(Intersection::Start);
        }
        if t == self.end() {
            return Some(Intersection::Complete);
        }
        if t < self.start || t > self.end() {
            return None;
        }

        let guess = ((t - self.start) / self.loop_duration).floor().max(0.0) as u32;
        let last = self.loops - 1;
        for k in guess.saturating_sub(1).min(last)..=(guess + 1).min(last) {
            let loop_start = self.loop_start(k);
            if k > 0 && loop_start == t {
                return Some(Intersection::LoopBoundary(k));
            }
            for mark in self.marks.iter() {
                if loop_start + mark == t {
                    return Some(Intersection::Mark(self.loop_duration * k as f32 + mark));
                }
            }
        }
        Some(Intersection::Update(t - self.start))
    }
}

/// What an element does at a chronoline
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Action {
    /// Fire the element's start moments
    Enter,
    /// Move the element's playhead to this local time
    Update(f32),
    /// Fire what the element does on leaving its current playhead: the
    /// start of the loop it enters, or its own chronoline's departing half
    Depart,
    /// Move the element's playhead to its end boundary for the direction
    Finish,
    /// Run one loop at a time of every zero-duration element in the group,
    /// in lockstep
    Burst(SmallVec<[ElementId; 2]>),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ChainEvent {
    pub element: ElementId,
    pub action: Action,
}

/// Which side of a chronoline to fire
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Part {
    /// Arriving at the instant
    Pre,
    /// Departing from the instant
    Post,
    All,
}

/// Ordered events of one direction at one instant
///
/// Forward: finishes then updates on arrival; the burst group, entries and
/// departures on leaving. Backward swaps finishes with updates and entries
/// with departures. Elements within a group go in element order forward and
/// in reverse order backward.
#[derive(Clone, Debug, Default)]
pub(crate) struct Chain {
    events: Vec<ChainEvent>,
    pre_post_point: usize,
}

impl Chain {
    pub fn part(&self, part: Part) -> &[ChainEvent] {
        match part {
            Part::Pre => &self.events[..self.pre_post_point],
            Part::Post => &self.events[self.pre_post_point..],
            Part::All => &self.events,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    fn build(t: f32, direction: Direction, spans: &[(ElementId, &Span)]) -> Self {
        let mut finishes = Vec::new();
        let mut updates = Vec::new();
        let mut enters = Vec::new();
        let mut departs = Vec::new();
        let mut burst: SmallVec<[ElementId; 2]> = SmallVec::new();

        let ordered: SmallVec<[&(ElementId, &Span); 8]> = match direction {
            Direction::Forward => spans.iter().collect(),
            Direction::Backward => spans.iter().rev().collect(),
        };
        for &(element, span) in ordered {
            let Some(intersection) = span.intersection(t) else {
                continue;
            };
            let event = |action| ChainEvent { element, action };
            match placement(intersection, direction, span) {
                Placement::Burst => burst.push(element),
                Placement::Update(local) => updates.push(event(Action::Update(local))),
                Placement::Pass(local) => {
                    updates.push(event(Action::Update(local)));
                    departs.push(event(Action::Depart));
                }
                Placement::Enter => enters.push(event(Action::Enter)),
                Placement::Finish => finishes.push(event(Action::Finish)),
            }
        }

        let burst = (!burst.is_empty()).then(|| ChainEvent {
            element: burst[0],
            action: Action::Burst(burst),
        });
        let (pre, post) = match direction {
            Direction::Forward => ([finishes, updates], [enters, departs]),
            Direction::Backward => ([updates, finishes], [departs, enters]),
        };

        let mut events: Vec<ChainEvent> = pre.into_iter().flatten().collect();
        let pre_post_point = events.len();
        events.extend(burst);
        events.extend(post.into_iter().flatten());
        Chain {
            events,
            pre_post_point,
        }
    }
}

/// Where an element's events go at one instant
enum Placement {
    /// Joins the instant's burst group
    Burst,
    /// Moves to a local time on arrival
    Update(f32),
    /// Moves to a local time on arrival and departs from it on leaving
    Pass(f32),
    /// Enters on leaving
    Enter,
    /// Finishes on arrival
    Finish,
}

/// Intersection lookup: which side of the instant an element acts on, and how
fn placement(intersection: Intersection, direction: Direction, span: &Span) -> Placement {
    use Intersection::*;
    match (direction, intersection) {
        (_, Instant) => Placement::Burst,
        (_, Update(local)) => Placement::Update(local),
        (_, Mark(local)) => Placement::Pass(local),
        (_, LoopBoundary(k)) => Placement::Pass(span.loop_duration * k as f32),
        (Direction::Forward, Start) | (Direction::Backward, Complete) => Placement::Enter,
        (Direction::Forward, Complete) | (Direction::Backward, Start) => Placement::Finish,
    }
}

/// Both directions' chains at one instant
#[derive(Clone, Debug, Default)]
pub(crate) struct Chronoline {
    forward: Chain,
    backward: Chain,
}

impl Chronoline {
    pub fn build<'a, I>(t: f32, spans: I) -> Self
    where
        I: Iterator<Item = (ElementId, &'a Span)>,
    {
        let spans: SmallVec<[(ElementId, &Span); 8]> = spans.collect();
        Self {
            forward: Chain::build(t, Direction::Forward, &spans),
            backward: Chain::build(t, Direction::Backward, &spans),
        }
    }

    pub fn chain(&self, direction: Direction) -> &Chain {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Backward => &self.backward,
        }
    }
}

/// All chronolines of one sequence, sorted by time
#[derive(Debug, Default)]
pub(crate) struct Chronolines {
    lines: BTreeMap<TimeKey, Chronoline>,
}

impl Chronolines {
    /// Recompute every chronoline in `[lo, hi]` from the current spans
    pub fn rebuild<'a, I>(&mut self, lo: f32, hi: f32, spans: I)
    where
        I: Iterator<Item = (ElementId, &'a Span)> + Clone,
    {
        let stale: Vec<TimeKey> = self
            .lines
            .range(Self::span_range(lo, hi))
            .map(|(key, _)| *key)
            .collect();
        for key in stale {
            self.lines.remove(&key);
        }

        let mut times: Vec<f32> = spans
            .clone()
            .flat_map(|(_, span)| span.boundaries().collect::<SmallVec<[f32; 4]>>())
            .filter(|t| (lo..=hi).contains(t))
            .collect();
        times.sort_by(f32::total_cmp);
        times.dedup();

        for t in times {
            self.lines
                .insert(TimeKey(t), Chronoline::build(t, spans.clone()));
        }
        tracing::trace!(lo, hi, lines = self.lines.len(), "chronolines rebuilt");
    }

    /// Lines in `[lo, hi]`, ascending
    pub fn range(
        &self,
        lo: f32,
        hi: f32,
    ) -> impl DoubleEndedIterator<Item = (f32, &'_ Chronoline)> + '_ {
        self.lines
            .range(Self::span_range(lo, hi))
            .map(|(key, line)| (key.0, line))
    }

    pub fn get(&self, t: f32) -> Option<&Chronoline> {
        self.lines.get(&TimeKey(t))
    }

    pub fn times(&self) -> Vec<f32> {
        self.lines.keys().map(|key| key.0).collect()
    }

    fn span_range(lo: f32, hi: f32) -> RangeInclusive<TimeKey> {
        TimeKey(lo)..=TimeKey(hi.max(lo))
    }
}
