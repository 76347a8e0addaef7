//! Execution context
//!
//! Every playable is constructed with an explicit context instead of reaching
//! for a process-wide default: the scheduler that will drive it and the owner
//! scope whose lifetime it is parented to.

use crate::owner::OwnerScope;
use crate::scheduler::{Scheduler, SchedulerHandle};

/// Scheduler + owner pair injected into playables
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    scheduler: SchedulerHandle,
    owner: OwnerScope,
}

impl ExecutionContext {
    /// Context with a fresh, always-active owner scope
    pub fn new(scheduler: SchedulerHandle) -> Self {
        Self::with_owner(scheduler, OwnerScope::new("default"))
    }

    pub fn with_owner(scheduler: SchedulerHandle, owner: OwnerScope) -> Self {
        Self { scheduler, owner }
    }

    /// Shorthand for `ExecutionContext::new(scheduler.handle())`
    pub fn for_scheduler(scheduler: &Scheduler) -> Self {
        Self::new(scheduler.handle())
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    pub fn owner(&self) -> &OwnerScope {
        &self.owner
    }

    /// Same scheduler, different owner
    pub fn reparent(&self, owner: OwnerScope) -> Self {
        Self {
            scheduler: self.scheduler.clone(),
            owner,
        }
    }
}
