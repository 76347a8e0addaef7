//! Tweens
//!
//! A tween maps its playhead onto a value between two endpoints and hands
//! every computed value to an action sink. Endpoints are evaluated lazily,
//! each time a value is computed, so they can track live state.
//!
//! ```rust
//! use chrona_animation::{Easing, Tween};
//! use chrona_core::{ExecutionContext, Scheduler};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let scheduler = Scheduler::new();
//! let context = ExecutionContext::for_scheduler(&scheduler);
//! let opacity = Rc::new(Cell::new(0.0f32));
//! let sink = opacity.clone();
//!
//! let fade = Tween::builder(&context)
//!     .from(0.0f32)
//!     .to(1.0)
//!     .duration(0.5)
//!     .easing(Easing::EaseOutCubic)
//!     .build(move |value| sink.set(value))
//!     .unwrap();
//!
//! fade.rewind_to(0.5).unwrap();
//! assert_eq!(opacity.get(), 1.0);
//! ```

use crate::easing::{Easing, Formula};
use crate::error::{AnimationError, Result};
use crate::playable::{Body, Direction, LoopType, Node, Playable};
use crate::settings::PlayableSettings;
use crate::timing::Timing;
use crate::tweak::{Lerp, Linear, Tweak};
use chrona_core::ExecutionContext;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;

/// Applies the playable's state at one instant
pub(crate) trait Perform {
    /// `progress` is the position within loop `loop_index`, in `[0, 1]`
    fn perform(&mut self, timing: &Timing, loop_index: u32, progress: f32, direction: Direction);
}

type Endpoint<T> = Box<dyn Fn() -> T>;

struct TweenBody<T> {
    from: Endpoint<T>,
    to: Endpoint<T>,
    tweak: Box<dyn Tweak<T>>,
    action: Box<dyn FnMut(T)>,
}

impl<T: 'static> TweenBody<T> {
    fn value_at(&self, timing: &Timing, loop_index: u32, progress: f32, direction: Direction) -> T {
        let from = (self.from)();
        let to = (self.to)();

        let (start, end) = match timing.loop_type {
            LoopType::Reset => (from, to),
            LoopType::Continue => {
                let k = loop_index as f32;
                (
                    self.tweak.interpolate(&from, &to, k),
                    self.tweak.interpolate(&from, &to, k + 1.0),
                )
            }
            // Only the final loop moves
            LoopType::Mirror if loop_index + 1 < timing.loops => return from,
            LoopType::Mirror => (from, to),
        };

        match direction {
            Direction::Forward => self.tweak.evaluate(&start, &end, progress, timing.formula),
            // Same curve, traversed from the other end
            Direction::Backward => {
                self.tweak
                    .evaluate(&end, &start, 1.0 - progress, timing.formula.inverse())
            }
        }
    }
}

impl<T: 'static> Perform for TweenBody<T> {
    fn perform(&mut self, timing: &Timing, loop_index: u32, progress: f32, direction: Direction) {
        let value = self.value_at(timing, loop_index, progress, direction);
        (self.action)(value);
    }
}

/// A playable that interpolates a `T`
pub struct Tween<T> {
    playable: Playable,
    _value: PhantomData<fn(T)>,
}

impl<T: Lerp> Tween<T> {
    /// Start building a linearly interpolated tween
    pub fn builder(context: &ExecutionContext) -> TweenBuilder<T> {
        TweenBuilder::with_tweak(context, Linear)
    }
}

impl<T> Tween<T> {
    pub fn playable(&self) -> &Playable {
        &self.playable
    }

    pub fn into_playable(self) -> Playable {
        self.playable
    }
}

impl<T> Clone for Tween<T> {
    fn clone(&self) -> Self {
        Self {
            playable: self.playable.clone(),
            _value: PhantomData,
        }
    }
}

impl<T> Deref for Tween<T> {
    type Target = Playable;

    fn deref(&self) -> &Playable {
        &self.playable
    }
}

impl<T> From<Tween<T>> for Playable {
    fn from(tween: Tween<T>) -> Self {
        tween.playable
    }
}

impl<T> fmt::Debug for Tween<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Tween").field(&self.playable).finish()
    }
}

/// Builder for [`Tween`]
pub struct TweenBuilder<T> {
    context: ExecutionContext,
    settings: PlayableSettings,
    from: Option<Endpoint<T>>,
    to: Option<Endpoint<T>>,
    tweak: Box<dyn Tweak<T>>,
}

impl<T: 'static> TweenBuilder<T> {
    /// Start building a tween interpolated by `tweak`
    pub fn with_tweak(context: &ExecutionContext, tweak: impl Tweak<T>) -> Self {
        Self {
            context: context.clone(),
            settings: PlayableSettings::default(),
            from: None,
            to: None,
            tweak: Box::new(tweak),
        }
    }

    pub fn from(self, value: T) -> Self
    where
        T: Clone,
    {
        self.from_fn(move || value.clone())
    }

    /// Starting value, evaluated whenever a value is computed
    pub fn from_fn(mut self, from: impl Fn() -> T + 'static) -> Self {
        self.from = Some(Box::new(from));
        self
    }

    pub fn to(self, value: T) -> Self
    where
        T: Clone,
    {
        self.to_fn(move || value.clone())
    }

    /// Ending value, evaluated whenever a value is computed
    pub fn to_fn(mut self, to: impl Fn() -> T + 'static) -> Self {
        self.to = Some(Box::new(to));
        self
    }

    /// Duration of one loop in seconds
    pub fn duration(mut self, seconds: f32) -> Self {
        self.settings.loop_duration = seconds;
        self
    }

    pub fn loops(mut self, loops: u32) -> Self {
        self.settings.loops = loops;
        self
    }

    pub fn loop_type(mut self, loop_type: LoopType) -> Self {
        self.settings.loop_type = loop_type;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.settings.direction = direction;
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.settings.formula = Formula::new(easing);
        self
    }

    pub fn formula(mut self, formula: Formula) -> Self {
        self.settings.formula = formula;
        self
    }

    /// Replace every timing setting at once
    pub fn settings(mut self, settings: PlayableSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Finish the tween. `action` receives every computed value.
    pub fn build(self, action: impl FnMut(T) + 'static) -> Result<Tween<T>> {
        self.settings.validate()?;
        let from = self.from.ok_or(AnimationError::MissingEndpoint("from"))?;
        let to = self.to.ok_or(AnimationError::MissingEndpoint("to"))?;

        let body = TweenBody {
            from,
            to,
            tweak: self.tweak,
            action: Box::new(action),
        };
        let node = Node::new_ref(self.context, &self.settings, Body::Tween(Box::new(body)));
        Ok(Tween {
            playable: Playable::from_node(node),
            _value: PhantomData,
        })
    }
}
