//! Frame scheduler
//!
//! Owns every tick routine and steps them once per frame. Playables register a
//! routine when they start playing and drop it when they pause, reset, or
//! complete. Everything runs on the calling thread: a frame is driven either
//! by [`Scheduler::tick`] (monotonic wall clock) or by [`Scheduler::advance`]
//! (explicit delta, used by tests and external clocks).
//!
//! Routines are taken out of their slot while they run, so a routine may stop
//! itself, stop other routines, start new ones, or queue deferred work without
//! tripping over the scheduler's own borrow.

use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::time::Instant;

new_key_type! {
    /// Handle to a registered tick routine
    pub struct TickId;
}

/// What a routine wants after running for a frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickFlow {
    /// Keep the routine registered
    Continue,
    /// Unregister the routine
    Finish,
}

/// A per-frame routine. Receives the frame delta in seconds.
pub type Routine = Box<dyn FnMut(f32) -> TickFlow>;

/// Work queued to run once outside of any routine
pub type Deferred = Box<dyn FnOnce()>;

/// Frame stepping configuration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SchedulerConfig {
    /// Largest delta (seconds) a single frame may apply. Protects playback
    /// from huge jumps after the host stalls.
    pub max_delta: f32,
    /// Multiplier applied to every frame delta
    pub time_scale: f32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_delta: 0.25,
            time_scale: 1.0,
        }
    }
}

impl SchedulerConfig {
    /// No clamping, real-time speed
    pub fn unclamped() -> Self {
        Self {
            max_delta: f32::INFINITY,
            time_scale: 1.0,
        }
    }

    /// Builder: set the delta clamp
    pub fn with_max_delta(mut self, max_delta: f32) -> Self {
        self.max_delta = max_delta;
        self
    }

    /// Builder: set the time scale
    pub fn with_time_scale(mut self, time_scale: f32) -> Self {
        self.time_scale = time_scale;
        self
    }
}

struct SchedulerInner {
    /// `None` while the routine is running
    routines: SlotMap<TickId, Option<Routine>>,
    deferred: VecDeque<Deferred>,
    config: SchedulerConfig,
    last_frame: Instant,
    elapsed: f64,
    frame: u64,
}

/// The scheduler that ticks all registered routines
///
/// Keep the scheduler alive for as long as anything should animate, and hand
/// out [`SchedulerHandle`]s to the code that registers routines.
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SchedulerInner {
                routines: SlotMap::with_key(),
                deferred: VecDeque::new(),
                config,
                last_frame: Instant::now(),
                elapsed: 0.0,
                frame: 0,
            })),
        }
    }

    /// Get a weak handle for registering routines
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.inner.borrow().config
    }

    pub fn set_config(&self, config: SchedulerConfig) {
        self.inner.borrow_mut().config = config;
    }

    /// Run one frame using the time elapsed since the previous frame
    pub fn tick(&self) {
        let dt = {
            let mut inner = self.inner.borrow_mut();
            let now = Instant::now();
            let dt = (now - inner.last_frame).as_secs_f32();
            inner.last_frame = now;
            dt
        };
        run_frame(&self.inner, dt);
    }

    /// Run one frame with an explicit delta in seconds
    pub fn advance(&self, dt: f32) {
        self.inner.borrow_mut().last_frame = Instant::now();
        run_frame(&self.inner, dt);
    }

    /// Run deferred work without stepping any routine
    pub fn flush(&self) {
        run_deferred(&self.inner);
    }

    /// Check if any routine is registered
    pub fn has_active_routines(&self) -> bool {
        !self.inner.borrow().routines.is_empty()
    }

    /// Number of registered routines
    pub fn routine_count(&self) -> usize {
        self.inner.borrow().routines.len()
    }

    /// Scaled time accumulated over all frames, in seconds
    pub fn elapsed(&self) -> f64 {
        self.inner.borrow().elapsed
    }

    /// Number of frames run so far
    pub fn frame(&self) -> u64 {
        self.inner.borrow().frame
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn run_frame(inner: &Rc<RefCell<SchedulerInner>>, raw_dt: f32) {
    let (dt, ids) = {
        let mut guard = inner.borrow_mut();
        let dt = if raw_dt.is_finite() {
            raw_dt.clamp(0.0, guard.config.max_delta) * guard.config.time_scale
        } else {
            0.0
        };
        guard.elapsed += dt as f64;
        guard.frame += 1;
        let ids: SmallVec<[TickId; 16]> = guard.routines.keys().collect();
        (dt, ids)
    };

    tracing::trace!(dt, routines = ids.len(), "scheduler frame");

    for id in ids {
        let routine = match inner.borrow_mut().routines.get_mut(id) {
            Some(slot) => slot.take(),
            None => continue,
        };
        let Some(mut routine) = routine else {
            continue;
        };

        let flow = routine(dt);

        let mut guard = inner.borrow_mut();
        match (flow, guard.routines.get_mut(id)) {
            (TickFlow::Continue, Some(slot)) => *slot = Some(routine),
            (TickFlow::Finish, Some(_)) => {
                guard.routines.remove(id);
            }
            // Stopped while it was running
            (_, None) => {}
        }
    }

    run_deferred(inner);
}

fn run_deferred(inner: &Rc<RefCell<SchedulerInner>>) {
    loop {
        let task = inner.borrow_mut().deferred.pop_front();
        match task {
            Some(task) => task(),
            None => break,
        }
    }
}

/// A weak handle to the scheduler
///
/// This is what playables hold. It won't keep the scheduler alive; every
/// operation quietly degrades once the scheduler is gone.
#[derive(Clone)]
pub struct SchedulerHandle {
    inner: Weak<RefCell<SchedulerInner>>,
}

impl SchedulerHandle {
    /// A handle that was never attached to a scheduler
    pub fn detached() -> Self {
        Self { inner: Weak::new() }
    }

    /// Register a routine, returning `None` if the scheduler is gone
    pub fn start_ticking<F>(&self, routine: F) -> Option<TickId>
    where
        F: FnMut(f32) -> TickFlow + 'static,
    {
        self.inner.upgrade().map(|inner| {
            let mut guard = inner.borrow_mut();
            let id = guard.routines.insert(Some(Box::new(routine)));
            tracing::trace!(?id, "routine registered");
            id
        })
    }

    /// Unregister a routine. Returns `true` if it was registered.
    pub fn stop_ticking(&self, id: TickId) -> bool {
        self.inner
            .upgrade()
            .map(|inner| inner.borrow_mut().routines.remove(id).is_some())
            .unwrap_or(false)
    }

    /// Check if a routine is still registered
    pub fn is_ticking(&self, id: TickId) -> bool {
        self.inner
            .upgrade()
            .map(|inner| inner.borrow().routines.contains_key(id))
            .unwrap_or(false)
    }

    /// Queue work to run after the routines of the current frame
    ///
    /// Returns `false` (and drops the task) if the scheduler is gone.
    pub fn defer<F>(&self, task: F) -> bool
    where
        F: FnOnce() + 'static,
    {
        match self.inner.upgrade() {
            Some(inner) => {
                inner.borrow_mut().deferred.push_back(Box::new(task));
                true
            }
            None => false,
        }
    }

    /// Check if the scheduler is still alive
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_routine_receives_delta() {
        let scheduler = Scheduler::with_config(SchedulerConfig::unclamped());
        let handle = scheduler.handle();
        let total = Rc::new(Cell::new(0.0f32));
        let total_clone = total.clone();

        handle.start_ticking(move |dt| {
            total_clone.set(total_clone.get() + dt);
            TickFlow::Continue
        });

        scheduler.advance(0.5);
        scheduler.advance(0.25);
        assert_eq!(total.get(), 0.75);
        assert_eq!(scheduler.frame(), 2);
    }

    #[test]
    fn test_finish_unregisters() {
        let scheduler = Scheduler::new();
        let handle = scheduler.handle();
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();

        let id = handle
            .start_ticking(move |_| {
                runs_clone.set(runs_clone.get() + 1);
                TickFlow::Finish
            })
            .unwrap();

        scheduler.advance(0.1);
        scheduler.advance(0.1);
        assert_eq!(runs.get(), 1);
        assert!(!handle.is_ticking(id));
        assert!(!scheduler.has_active_routines());
    }

    #[test]
    fn test_routine_can_stop_itself() {
        let scheduler = Scheduler::new();
        let handle = scheduler.handle();
        let own_id: Rc<Cell<Option<TickId>>> = Rc::new(Cell::new(None));
        let own_id_clone = own_id.clone();
        let inner_handle = handle.clone();

        let id = handle
            .start_ticking(move |_| {
                if let Some(id) = own_id_clone.get() {
                    assert!(inner_handle.stop_ticking(id));
                }
                TickFlow::Continue
            })
            .unwrap();
        own_id.set(Some(id));

        scheduler.advance(0.1);
        assert_eq!(scheduler.routine_count(), 0);
    }

    #[test]
    fn test_deferred_runs_after_routines() {
        let scheduler = Scheduler::new();
        let handle = scheduler.handle();
        let log = Rc::new(RefCell::new(Vec::new()));

        let log_clone = log.clone();
        let defer_handle = handle.clone();
        handle.start_ticking(move |_| {
            let log_inner = log_clone.clone();
            defer_handle.defer(move || log_inner.borrow_mut().push("deferred"));
            log_clone.borrow_mut().push("routine");
            TickFlow::Finish
        });

        scheduler.advance(0.1);
        assert_eq!(*log.borrow(), vec!["routine", "deferred"]);
    }

    #[test]
    fn test_routine_started_mid_frame_waits() {
        let scheduler = Scheduler::new();
        let handle = scheduler.handle();
        let runs = Rc::new(Cell::new(0));

        let runs_clone = runs.clone();
        let spawn_handle = handle.clone();
        handle.start_ticking(move |_| {
            let runs_inner = runs_clone.clone();
            spawn_handle.start_ticking(move |_| {
                runs_inner.set(runs_inner.get() + 1);
                TickFlow::Continue
            });
            TickFlow::Finish
        });

        scheduler.advance(0.1);
        assert_eq!(runs.get(), 0);
        scheduler.advance(0.1);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_delta_is_clamped_and_scaled() {
        let scheduler =
            Scheduler::with_config(SchedulerConfig::default().with_max_delta(0.1).with_time_scale(2.0));
        let seen = Rc::new(Cell::new(0.0f32));
        let seen_clone = seen.clone();
        scheduler.handle().start_ticking(move |dt| {
            seen_clone.set(dt);
            TickFlow::Continue
        });

        scheduler.advance(5.0);
        assert!((seen.get() - 0.2).abs() < 1e-6);
        assert!((scheduler.elapsed() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_handle_outlives_scheduler() {
        let scheduler = Scheduler::new();
        let handle = scheduler.handle();
        assert!(handle.is_alive());
        drop(scheduler);

        assert!(!handle.is_alive());
        assert!(handle.start_ticking(|_| TickFlow::Continue).is_none());
        assert!(!handle.defer(|| {}));
    }
}
