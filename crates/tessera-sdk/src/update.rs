// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The per-frame update stream capability.
//!
//! An [`UpdateDispatcher`] placed in a collection publishes an
//! `Rc<dyn UpdateStream>`. Sibling components subscribe with an order key
//! and receive the frame delta on every [`UpdateHub::tick`], lowest order
//! first.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tessera_core::{Collection, CollectionResult, Component, ComponentBase, DisposalScope};

/// A per-frame callback receiving the frame delta in seconds.
pub type UpdateCallback = Box<dyn FnMut(f32)>;

/// A capability delivering per-frame updates.
pub trait UpdateStream {
    /// Subscribes `callback` with the given order key.
    ///
    /// Lower orders run first; equal orders run in subscription order. The
    /// callback stays subscribed as long as the returned [`Subscription`]
    /// lives.
    fn subscribe(&self, order: i32, callback: UpdateCallback) -> Subscription;
}

impl dyn UpdateStream {
    /// Subscribes a closure without boxing it at the call site.
    pub fn on_update(&self, order: i32, callback: impl FnMut(f32) + 'static) -> Subscription {
        self.subscribe(order, Box::new(callback))
    }
}

struct Subscriber {
    id: u64,
    order: i32,
    callback: Rc<RefCell<UpdateCallback>>,
    active: Rc<Cell<bool>>,
}

#[derive(Default)]
struct HubState {
    subscribers: Vec<Subscriber>,
    next_id: u64,
    closed: bool,
}

/// The subscriber list behind an update stream.
///
/// Cloning yields another handle to the same list.
#[derive(Clone, Default)]
pub struct UpdateHub {
    state: Rc<RefCell<HubState>>,
}

impl UpdateHub {
    /// Creates an open hub with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls every active subscriber with `dt`.
    ///
    /// Subscribers added during the tick are first called on the next one.
    /// Subscribers removed during the tick are not called once removed.
    pub fn tick(&self, dt: f32) {
        let snapshot: Vec<(Rc<RefCell<UpdateCallback>>, Rc<Cell<bool>>)> = self
            .state
            .borrow()
            .subscribers
            .iter()
            .map(|s| (s.callback.clone(), s.active.clone()))
            .collect();

        for (callback, active) in snapshot {
            if !active.get() {
                continue;
            }
            match callback.try_borrow_mut() {
                Ok(mut callback) => callback(dt),
                Err(_) => log::warn!("Skipping an update callback that re-entered the tick."),
            }
        }

        self.state.borrow_mut().subscribers.retain(|s| s.active.get());
    }

    /// Returns the number of active subscribers.
    pub fn len(&self) -> usize {
        self.state
            .borrow()
            .subscribers
            .iter()
            .filter(|s| s.active.get())
            .count()
    }

    /// Returns `true` if nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once the hub has been closed.
    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    /// Drops every subscriber and refuses new ones.
    pub fn close(&self) {
        let dropped = {
            let mut state = self.state.borrow_mut();
            state.closed = true;
            std::mem::take(&mut state.subscribers)
        };
        for subscriber in &dropped {
            subscriber.active.set(false);
        }
        log::debug!("Update hub closed, dropped {} subscriber(s).", dropped.len());
        // Callbacks may own handles that reach back into this hub.
        drop(dropped);
    }
}

impl UpdateStream for UpdateHub {
    fn subscribe(&self, order: i32, callback: UpdateCallback) -> Subscription {
        let active = Rc::new(Cell::new(false));
        let mut state = self.state.borrow_mut();
        if state.closed {
            log::warn!("Subscription to a closed update stream ignored.");
            return Subscription {
                hub: Weak::new(),
                id: 0,
                active,
            };
        }

        let id = state.next_id;
        state.next_id += 1;
        active.set(true);
        let position = state.subscribers.partition_point(|s| s.order <= order);
        state.subscribers.insert(
            position,
            Subscriber {
                id,
                order,
                callback: Rc::new(RefCell::new(callback)),
                active: active.clone(),
            },
        );
        log::trace!("Update subscriber {id} added with order {order}.");

        Subscription {
            hub: Rc::downgrade(&self.state),
            id,
            active,
        }
    }
}

impl fmt::Debug for UpdateHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateHub")
            .field("subscribers", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Keeps an update callback subscribed until dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    hub: Weak<RefCell<HubState>>,
    id: u64,
    active: Rc<Cell<bool>>,
}

impl Subscription {
    /// Returns `true` while the callback is still subscribed.
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Unsubscribes now.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Hands the subscription to `scope`, which unsubscribes when it is cleared.
    pub fn bind_to(self, scope: &DisposalScope) {
        scope.add(move || drop(self));
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.active.replace(false) {
            return;
        }
        let Some(hub) = self.hub.upgrade() else {
            return;
        };
        // While a tick is running the list is pruned at its end instead.
        if let Ok(mut state) = hub.try_borrow_mut() {
            let removed = state
                .subscribers
                .iter()
                .position(|s| s.id == self.id)
                .map(|index| state.subscribers.remove(index));
            drop(state);
            drop(removed);
        };
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// A component publishing an `Rc<dyn UpdateStream>` to its siblings.
///
/// Whoever drives the frame loop keeps a [`hub`](Self::hub) handle and ticks
/// it. Disposing the component closes the stream.
pub struct UpdateDispatcher {
    base: ComponentBase,
    hub: UpdateHub,
}

impl UpdateDispatcher {
    /// Creates a dispatcher with an open, empty hub.
    pub fn new() -> Self {
        Self {
            base: ComponentBase::new(),
            hub: UpdateHub::new(),
        }
    }

    /// Returns a handle to the dispatcher's hub.
    pub fn hub(&self) -> UpdateHub {
        self.hub.clone()
    }
}

impl Default for UpdateDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for UpdateDispatcher {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn register(&mut self, owner: &Collection) -> CollectionResult<()> {
        let hub = self.hub.clone();
        self.base.scope().add(move || hub.close());
        owner.register_capability::<Rc<dyn UpdateStream>>(Rc::new(self.hub.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{into_handle, Registry};

    fn recording(
        hub: &UpdateHub,
        order: i32,
        label: &'static str,
        log: &Rc<RefCell<Vec<&'static str>>>,
    ) -> Subscription {
        let log = log.clone();
        hub.subscribe(order, Box::new(move |_| log.borrow_mut().push(label)))
    }

    #[test]
    fn test_tick_runs_in_ascending_order_with_stable_ties() {
        let hub = UpdateHub::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let _late = recording(&hub, 10, "late", &log);
        let _first_tie = recording(&hub, 0, "tie-1", &log);
        let _early = recording(&hub, -5, "early", &log);
        let _second_tie = recording(&hub, 0, "tie-2", &log);

        hub.tick(0.016);

        assert_eq!(*log.borrow(), vec!["early", "tie-1", "tie-2", "late"]);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let hub = UpdateHub::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let kept = recording(&hub, 0, "kept", &log);
        let dropped = recording(&hub, 0, "dropped", &log);

        dropped.unsubscribe();
        hub.tick(0.016);

        assert_eq!(*log.borrow(), vec!["kept"]);
        assert!(kept.is_active());
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn test_bound_subscription_ends_with_scope() {
        let hub = UpdateHub::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let scope = DisposalScope::new();
        recording(&hub, 0, "bound", &log).bind_to(&scope);

        hub.tick(0.016);
        scope.dispose();
        hub.tick(0.016);

        assert_eq!(*log.borrow(), vec!["bound"]);
        assert!(hub.is_empty());
    }

    #[test]
    fn test_subscribe_during_tick_waits_for_next_tick() {
        let hub = UpdateHub::new();
        let calls = Rc::new(Cell::new(0));
        let held: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));
        let _spawner = {
            let hub_handle = hub.clone();
            let calls = calls.clone();
            let held = held.clone();
            hub.subscribe(
                0,
                Box::new(move |_| {
                    let calls = calls.clone();
                    let sub = hub_handle
                        .subscribe(1, Box::new(move |_| calls.set(calls.get() + 1)));
                    held.borrow_mut().push(sub);
                }),
            )
        };

        hub.tick(0.016);
        assert_eq!(calls.get(), 0);

        hub.tick(0.016);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_unsubscribe_during_tick_skips_the_removed_callback() {
        let hub = UpdateHub::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let _killer = {
            let victim = victim.clone();
            hub.subscribe(0, Box::new(move |_| drop(victim.borrow_mut().take())))
        };
        *victim.borrow_mut() = Some(recording(&hub, 1, "victim", &log));

        hub.tick(0.016);

        assert!(log.borrow().is_empty());
        assert_eq!(hub.len(), 1, "Only the killer should remain");
    }

    #[test]
    fn test_dispatcher_publishes_stream_and_closes_on_dispose() {
        // --- 1. ARRANGE ---
        let registry = Registry::default();
        let collection = Collection::new(&registry);
        let dispatcher = UpdateDispatcher::new();
        let hub = dispatcher.hub();
        collection.register(into_handle(dispatcher)).unwrap();

        let total = Rc::new(Cell::new(0.0_f32));
        let stream = collection.query_capability::<Rc<dyn UpdateStream>>().unwrap();
        let subscription = {
            let total = total.clone();
            stream.on_update(0, move |dt| total.set(total.get() + dt))
        };

        // --- 2. ACT ---
        hub.tick(0.5);
        collection.dispose();
        hub.tick(0.5);

        // --- 3. ASSERT ---
        assert_eq!(total.get(), 0.5);
        assert!(hub.is_closed());
        assert!(!subscription.is_active());
        assert!(!stream.on_update(0, |_| {}).is_active());
    }
}
