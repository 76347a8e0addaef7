//! Owner scopes
//!
//! An owner scope stands for whatever external object a playable animates on
//! behalf of (a widget, an entity, a document). When the owner goes away the
//! scope is deactivated and every watcher is told once, so anything still
//! animating against it can stop before touching dead state.
//!
//! The signal is one-way: watchers observe the scope, they never mutate it.

use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

new_key_type! {
    /// Handle to a deactivation watcher
    pub struct WatchId;
}

type Watcher = Box<dyn FnMut()>;

struct OwnerInner {
    name: Cow<'static, str>,
    active: Cell<bool>,
    /// Slot is `None` while the watcher is being notified
    watchers: RefCell<SlotMap<WatchId, Option<Watcher>>>,
    /// Registration order, since slot order is reused after removals
    order: RefCell<Vec<WatchId>>,
}

/// Liveness signal of an animation owner
#[derive(Clone)]
pub struct OwnerScope {
    inner: Rc<OwnerInner>,
}

impl OwnerScope {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            inner: Rc::new(OwnerInner {
                name: name.into(),
                active: Cell::new(true),
                watchers: RefCell::new(SlotMap::with_key()),
                order: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Re-activate a previously deactivated scope
    pub fn activate(&self) {
        self.inner.active.set(true);
    }

    /// Deactivate the scope and notify every watcher in registration order
    ///
    /// Deactivating an inactive scope does nothing.
    pub fn deactivate(&self) {
        if !self.inner.active.replace(false) {
            return;
        }

        let ids: SmallVec<[WatchId; 8]> = self.inner.order.borrow().iter().copied().collect();
        tracing::debug!(owner = %self.inner.name, watchers = ids.len(), "owner scope deactivated");

        for id in ids {
            let watcher = match self.inner.watchers.borrow_mut().get_mut(id) {
                Some(slot) => slot.take(),
                None => continue,
            };
            let Some(mut watcher) = watcher else {
                continue;
            };

            watcher();

            if let Some(slot) = self.inner.watchers.borrow_mut().get_mut(id) {
                *slot = Some(watcher);
            }
        }
    }

    /// Register a callback fired when the scope is deactivated
    pub fn on_deactivated<F>(&self, watcher: F) -> WatchId
    where
        F: FnMut() + 'static,
    {
        let id = self
            .inner
            .watchers
            .borrow_mut()
            .insert(Some(Box::new(watcher)));
        self.inner.order.borrow_mut().push(id);
        id
    }

    /// Remove a watcher. Returns `true` if it was registered.
    pub fn unwatch(&self, id: WatchId) -> bool {
        let removed = self.inner.watchers.borrow_mut().remove(id).is_some();
        if removed {
            self.inner.order.borrow_mut().retain(|w| *w != id);
        }
        removed
    }

    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.borrow().len()
    }

    pub fn ptr_eq(&self, other: &OwnerScope) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for OwnerScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerScope")
            .field("name", &self.inner.name)
            .field("active", &self.is_active())
            .finish()
    }
}
