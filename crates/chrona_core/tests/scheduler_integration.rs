//! Integration tests for the scheduler, owner scopes and execution contexts
//!
//! These tests verify that:
//! - Routines registered through a context's handle are driven by frames
//! - Owner deactivation reaches routines watching the scope
//! - Deferred work runs once per frame, after every routine

use chrona_core::{ExecutionContext, OwnerScope, Scheduler, SchedulerConfig, TickFlow};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A routine that stops itself once its owner goes away
#[test]
fn test_owner_stops_routine() {
    let scheduler = Scheduler::with_config(SchedulerConfig::unclamped());
    let owner = OwnerScope::new("panel");
    let ctx = ExecutionContext::with_owner(scheduler.handle(), owner.clone());

    let progress = Rc::new(Cell::new(0.0f32));
    let progress_clone = progress.clone();
    let routine_owner = ctx.owner().clone();
    ctx.scheduler().start_ticking(move |dt| {
        if !routine_owner.is_active() {
            return TickFlow::Finish;
        }
        progress_clone.set(progress_clone.get() + dt);
        TickFlow::Continue
    });

    scheduler.advance(0.5);
    owner.deactivate();
    scheduler.advance(0.5);
    assert_eq!(progress.get(), 0.5);
    assert!(!scheduler.has_active_routines());
}

#[test]
fn test_watchers_notified_in_order_once() {
    let owner = OwnerScope::new("list");
    let log = Rc::new(RefCell::new(Vec::new()));
    for name in ["first", "second", "third"] {
        let log = log.clone();
        owner.on_deactivated(move || log.borrow_mut().push(name));
    }

    owner.deactivate();
    owner.deactivate();
    assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
}

/// Watchers may unregister themselves while being notified
#[test]
fn test_watcher_unwatches_itself() {
    let owner = OwnerScope::new("item");
    let id_cell = Rc::new(Cell::new(None));
    let id_clone = id_cell.clone();
    let scope = owner.clone();
    let id = owner.on_deactivated(move || {
        if let Some(id) = id_clone.get() {
            assert!(scope.unwatch(id));
        }
    });
    id_cell.set(Some(id));

    owner.deactivate();
    assert_eq!(owner.watcher_count(), 0);
}

#[test]
fn test_reparented_context_shares_scheduler() {
    let scheduler = Scheduler::new();
    let ctx = ExecutionContext::for_scheduler(&scheduler);
    let child = ctx.reparent(OwnerScope::new("child"));

    assert!(!child.owner().ptr_eq(ctx.owner()));
    child.scheduler().start_ticking(|_| TickFlow::Finish);
    ctx.scheduler().start_ticking(|_| TickFlow::Finish);
    assert_eq!(scheduler.routine_count(), 2);

    scheduler.advance(0.1);
    assert_eq!(scheduler.routine_count(), 0);
}

#[test]
fn test_deferred_work_queued_by_deferred_work() {
    let scheduler = Scheduler::new();
    let handle = scheduler.handle();
    let log = Rc::new(RefCell::new(Vec::new()));

    let outer_log = log.clone();
    let outer_handle = handle.clone();
    handle.defer(move || {
        outer_log.borrow_mut().push(1);
        let inner_log = outer_log.clone();
        outer_handle.defer(move || inner_log.borrow_mut().push(2));
    });

    scheduler.flush();
    assert_eq!(*log.borrow(), vec![1, 2]);
    assert_eq!(scheduler.frame(), 0);
}

#[test]
fn test_detached_context_never_drives() {
    let ctx = ExecutionContext::new(chrona_core::SchedulerHandle::detached());
    assert!(!ctx.scheduler().is_alive());
    assert!(ctx.scheduler().start_ticking(|_| TickFlow::Continue).is_none());
    assert!(ctx.owner().is_active());
}
