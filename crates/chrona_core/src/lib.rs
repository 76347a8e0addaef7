//! Chrona Core Runtime
//!
//! The execution driver the animation engine runs on:
//!
//! - **Scheduler**: steps registered tick routines once per frame
//! - **Owner Scopes**: one-way liveness signal for whatever is being animated
//! - **Execution Context**: the scheduler/owner pair injected into playables
//!
//! # Example
//!
//! ```rust
//! use chrona_core::{Scheduler, TickFlow};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let scheduler = Scheduler::new();
//! let frames = Rc::new(Cell::new(0));
//! let counter = frames.clone();
//!
//! scheduler.handle().start_ticking(move |_dt| {
//!     counter.set(counter.get() + 1);
//!     if counter.get() == 3 { TickFlow::Finish } else { TickFlow::Continue }
//! });
//!
//! for _ in 0..5 {
//!     scheduler.advance(1.0 / 60.0);
//! }
//! assert_eq!(frames.get(), 3);
//! ```

pub mod context;
pub mod owner;
pub mod scheduler;

pub use context::ExecutionContext;
pub use owner::{OwnerScope, WatchId};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerHandle, TickFlow, TickId};
