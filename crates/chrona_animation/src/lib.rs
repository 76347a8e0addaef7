//! Chrona Animation Engine
//!
//! Time-based animation with precomputed event timelines.
//!
//! # Features
//!
//! - **Tweens**: interpolate any value between two late-bound endpoints, with
//!   easing formulas and Reset/Continue/Mirror looping
//! - **Sequences**: nest playables on a timeline; seeking fires every child's
//!   phase events in time order, whatever the frame rate
//! - **Phase Events**: twelve lifecycle moments with "-ing"/"-ed" pairs around
//!   each performed value
//! - **Scheduler Driven**: playback advances on [`chrona_core::Scheduler`]
//!   frames and resets itself when its owner scope goes away
//!
//! # Example
//!
//! ```rust
//! use chrona_animation::{Phase, Sequence, Tween};
//! use chrona_core::{ExecutionContext, Scheduler};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let scheduler = Scheduler::new();
//! let context = ExecutionContext::for_scheduler(&scheduler);
//! let log = Rc::new(RefCell::new(Vec::new()));
//!
//! let slide = Tween::builder(&context).from(0.0f32).to(100.0).build(|_| {}).unwrap();
//! let fade = Tween::builder(&context).from(0.0f32).to(1.0).build(|_| {}).unwrap();
//! let sink = log.clone();
//! fade.on(Phase::Completed, move |_| sink.borrow_mut().push("faded")).unwrap();
//!
//! let sequence = Sequence::new(&context);
//! sequence.append(slide).unwrap();
//! sequence.append(fade).unwrap();
//!
//! sequence.rewind_to(2.0).unwrap();
//! assert_eq!(*log.borrow(), vec!["faded"]);
//! ```

mod chronoline;
pub mod easing;
pub mod error;
pub mod phase;
pub mod playable;
pub mod repeater;
pub mod sequence;
pub mod settings;
mod timing;
pub mod tweak;
pub mod tween;

pub use easing::{Easing, Formula};
pub use error::{AnimationError, Result};
pub use phase::{ListenerId, Phase, PhaseEvent};
pub use playable::{Direction, LoopType, PlayState, Playable};
pub use repeater::Repeater;
pub use sequence::{ElementId, LoopResetBehaviour, Sequence};
pub use settings::PlayableSettings;
pub use tweak::{Hold, Lerp, Linear, Spherical, Tweak};
pub use tween::{Tween, TweenBuilder};
