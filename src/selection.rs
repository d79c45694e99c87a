//! The one place the current selection lives.
//!
//! Views hold a cheap clone of [`SelectionStore`] and read the current value
//! from it; nobody keeps a second copy as ground truth. Everything runs on the
//! UI thread, so the store uses `Rc`/`Cell` rather than locks.

use crate::types::{CityId, ScoreFamily, Selection};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use tracing::trace;

/// A partial update; fields left `None` keep their current value.
/// `city: Some(None)` clears the selected city.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectRequest {
    pub city: Option<Option<CityId>>,
    pub family: Option<ScoreFamily>,
}

impl SelectRequest {
    pub fn city(id: CityId) -> Self {
        Self {
            city: Some(Some(id)),
            family: None,
        }
    }

    pub fn clear_city() -> Self {
        Self {
            city: Some(None),
            family: None,
        }
    }

    pub fn family(family: ScoreFamily) -> Self {
        Self {
            city: None,
            family: Some(family),
        }
    }

    pub fn with_family(mut self, family: ScoreFamily) -> Self {
        self.family = Some(family);
        self
    }

    fn apply(self, current: Selection) -> Selection {
        Selection {
            city: self.city.unwrap_or(current.city),
            family: self.family.unwrap_or(current.family),
        }
    }
}

type Listener = Rc<dyn Fn(&Selection)>;

struct Inner {
    current: Cell<Selection>,
    listeners: RefCell<Vec<(u64, Listener)>>,
    next_id: Cell<u64>,
    notifying: Cell<bool>,
    pending: RefCell<VecDeque<SelectRequest>>,
}

#[derive(Clone)]
pub struct SelectionStore {
    inner: Rc<Inner>,
}

impl Default for SelectionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Resets the notifying flag even if a listener panics.
struct CycleGuard<'a>(&'a Cell<bool>);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl SelectionStore {
    /// No city, arithmetic family.
    pub fn new() -> Self {
        Self::with_initial(Selection::default())
    }

    pub fn with_initial(initial: Selection) -> Self {
        Self {
            inner: Rc::new(Inner {
                current: Cell::new(initial),
                listeners: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
                notifying: Cell::new(false),
                pending: RefCell::new(VecDeque::new()),
            }),
        }
    }

    pub fn current(&self) -> Selection {
        self.inner.current.get()
    }

    /// Apply `req` and notify every listener once, in subscription order.
    ///
    /// A request that leaves the selection unchanged notifies nobody. A call
    /// made from inside a listener is queued and applied after the running
    /// cycle has reached every listener.
    pub fn select(&self, req: SelectRequest) {
        self.inner.pending.borrow_mut().push_back(req);
        if self.inner.notifying.get() {
            trace!(?req, "deferring re-entrant select");
            return;
        }
        self.inner.notifying.set(true);
        let _guard = CycleGuard(&self.inner.notifying);

        loop {
            let Some(req) = self.inner.pending.borrow_mut().pop_front() else {
                break;
            };
            let prev = self.inner.current.get();
            let next = req.apply(prev);
            if next == prev {
                continue;
            }
            self.inner.current.set(next);
            trace!(?prev, ?next, "selection changed");
            let listeners: Vec<Listener> = self
                .inner
                .listeners
                .borrow()
                .iter()
                .map(|(_, l)| Rc::clone(l))
                .collect();
            for listener in listeners {
                listener(&next);
            }
        }
    }

    pub fn select_city(&self, city: CityId) {
        self.select(SelectRequest::city(city));
    }

    pub fn select_family(&self, family: ScoreFamily) {
        self.select(SelectRequest::family(family));
    }

    pub fn subscribe(&self, listener: impl Fn(&Selection) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));
        Subscription {
            id,
            store: Rc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }
}

/// Handle returned by [`SelectionStore::subscribe`].
pub struct Subscription {
    id: u64,
    store: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(inner) = self.store.upgrade() {
            inner.listeners.borrow_mut().retain(|(id, _)| *id != self.id);
        }
    }
}
