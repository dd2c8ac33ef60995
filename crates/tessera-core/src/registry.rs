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

//! The registry context: identity slot allocator plus every capability pool.
//!
//! A [`Registry`] is created once by the application root and shared by every
//! [`Collection`](crate::Collection) built from it. It is deliberately `!Send`:
//! all registry traffic is expected to come from the thread driving the
//! host's update loop.
//!
//! For hosts that prefer an implicit context there is a thread-local default,
//! reachable through [`Registry::current`] and replaceable through
//! [`Registry::install_current`] (for example between tests).

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::pool::{Capabilities, CapabilityPools};
use crate::scope::DisposalScope;
use crate::slot::{SlotAllocator, SlotId};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

thread_local! {
    static CURRENT: RefCell<Option<Registry>> = const { RefCell::new(None) };
}

struct RegistryInner {
    config: RegistryConfig,
    slots: RefCell<SlotAllocator>,
    pools: RefCell<CapabilityPools>,
}

/// A snapshot of registry occupancy, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStats {
    /// Number of identity slots currently managed.
    pub slot_capacity: usize,
    /// Number of identity slots held by live collections.
    pub slots_in_use: usize,
    /// Number of capability types that have a pool.
    pub pool_count: usize,
    /// Number of (capability type, slot) pairs holding at least one capability.
    pub occupied_entries: usize,
}

/// Shared handle to the identity slot allocator and the capability pools.
///
/// Cloning is cheap and yields a handle to the same registry.
///
/// # Example
///
/// ```rust
/// use tessera_core::{DisposalScope, Registry, RegistryConfig};
///
/// let registry = Registry::new(RegistryConfig::default());
/// let scope = DisposalScope::new();
/// let slot = registry.acquire_slot().unwrap();
///
/// registry.register_capability(slot, 42_u32, &scope);
/// assert_eq!(registry.query_capability::<u32>(slot), Some(42));
///
/// scope.clear();
/// assert_eq!(registry.query_capability::<u32>(slot), None);
/// registry.release_slot(slot).unwrap();
/// ```
#[derive(Clone)]
pub struct Registry {
    inner: Rc<RegistryInner>,
}

impl Registry {
    /// Creates a registry with its own slot allocator and empty pools.
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        log::debug!(
            "Registry created with {} identity slots ({:?} on exhaustion).",
            config.slot_capacity,
            config.exhaustion
        );
        Self {
            inner: Rc::new(RegistryInner {
                slots: RefCell::new(SlotAllocator::new(config.slot_capacity, config.exhaustion)),
                pools: RefCell::new(CapabilityPools::new()),
                config,
            }),
        }
    }

    /// Returns the thread's default registry, creating it with the default
    /// configuration on first use.
    pub fn current() -> Registry {
        CURRENT.with(|current| {
            current
                .borrow_mut()
                .get_or_insert_with(|| Registry::new(RegistryConfig::default()))
                .clone()
        })
    }

    /// Replaces the thread's default registry and returns the previous one.
    ///
    /// Collections keep the registry they were built with; only collections
    /// created afterwards see the new default.
    pub fn install_current(registry: Registry) -> Option<Registry> {
        CURRENT.with(|current| current.replace(Some(registry)))
    }

    /// Returns the configuration this registry was created with.
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Takes an identity slot from the allocator.
    pub fn acquire_slot(&self) -> Result<SlotId, RegistryError> {
        self.inner.slots.borrow_mut().acquire()
    }

    /// Returns an identity slot to the allocator.
    pub fn release_slot(&self, slot: SlotId) -> Result<(), RegistryError> {
        self.inner.slots.borrow_mut().release(slot)
    }

    /// Returns `true` if `slot` is currently held by a collection.
    pub fn is_slot_held(&self, slot: SlotId) -> bool {
        self.inner.slots.borrow().is_held(slot)
    }

    /// Appends `instance` to the `T` pool at `slot`.
    ///
    /// The first registration made under a given `scope` for capability type
    /// `T` installs one cleanup on that scope which empties the slot when the
    /// scope tears down. Further registrations from the same scope reuse it.
    /// The cleanup never releases the slot id.
    pub fn register_capability<T: Clone + 'static>(
        &self,
        slot: SlotId,
        instance: T,
        scope: &DisposalScope,
    ) {
        let scope_id = scope.id();
        let newly_bound = {
            let mut pools = self.inner.pools.borrow_mut();
            let pool = pools.get_or_insert::<T>();
            pool.register(slot, instance);
            pool.bind_scope(scope_id)
        };

        if newly_bound {
            let registry = Rc::downgrade(&self.inner);
            scope.add(move || {
                let Some(inner) = registry.upgrade() else {
                    return;
                };
                let released = inner
                    .pools
                    .borrow_mut()
                    .get_mut::<T>()
                    .and_then(|pool| pool.forget(slot, scope_id));
                if released.is_some() {
                    log::trace!(
                        "Cleared `{}` capabilities of slot {slot}.",
                        std::any::type_name::<T>()
                    );
                }
                // The capabilities are dropped here, after the pool borrow ends.
                drop(released);
            });
        }
    }

    /// Returns the first `T` registered at `slot`.
    pub fn query_capability<T: Clone + 'static>(&self, slot: SlotId) -> Option<T> {
        self.inner
            .pools
            .borrow()
            .get::<T>()
            .and_then(|pool| pool.query(slot))
    }

    /// Returns every `T` registered at `slot`, in registration order.
    pub fn query_capabilities<T: Clone + 'static>(&self, slot: SlotId) -> Capabilities<T> {
        self.inner
            .pools
            .borrow()
            .get::<T>()
            .map(|pool| pool.query_all(slot))
            .unwrap_or_default()
    }

    /// Returns `true` if at least one `T` is registered at `slot`.
    pub fn has_capability<T: Clone + 'static>(&self, slot: SlotId) -> bool {
        self.inner
            .pools
            .borrow()
            .get::<T>()
            .is_some_and(|pool| pool.is_registered(slot))
    }

    /// Returns the names of capability types with at least one live registration.
    pub fn occupied_capability_types(&self) -> Vec<&'static str> {
        self.inner.pools.borrow().occupied_types()
    }

    /// Returns a snapshot of the registry occupancy.
    pub fn stats(&self) -> RegistryStats {
        let slots = self.inner.slots.borrow();
        let pools = self.inner.pools.borrow();
        RegistryStats {
            slot_capacity: slots.capacity(),
            slots_in_use: slots.in_use(),
            pool_count: pools.len(),
            occupied_entries: pools.occupied_entries(),
        }
    }

    /// Returns `true` if both handles refer to the same registry.
    pub fn ptr_eq(&self, other: &Registry) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExhaustionPolicy;

    #[derive(Debug, Clone, PartialEq)]
    struct Health(i32);

    #[test]
    fn test_register_then_query() {
        let registry = Registry::default();
        let scope = DisposalScope::new();
        let slot = registry.acquire_slot().unwrap();

        registry.register_capability(slot, Health(3), &scope);
        registry.register_capability(slot, Health(4), &scope);

        assert_eq!(registry.query_capability::<Health>(slot), Some(Health(3)));
        assert_eq!(
            registry.query_capabilities::<Health>(slot).as_slice(),
            &[Health(3), Health(4)]
        );
        assert!(registry.has_capability::<Health>(slot));
        assert!(!registry.has_capability::<u8>(slot));
    }

    #[test]
    fn test_one_cleanup_per_scope_and_type() {
        let registry = Registry::default();
        let scope = DisposalScope::new();
        let slot = registry.acquire_slot().unwrap();

        registry.register_capability(slot, Health(1), &scope);
        registry.register_capability(slot, Health(2), &scope);
        registry.register_capability(slot, Health(3), &scope);
        registry.register_capability(slot, 7_u8, &scope);

        assert_eq!(scope.len(), 2, "One cleanup per capability type is expected");
    }

    #[test]
    fn test_scope_teardown_clears_slot_but_keeps_it_held() {
        let registry = Registry::default();
        let scope = DisposalScope::new();
        let slot = registry.acquire_slot().unwrap();
        registry.register_capability(slot, Health(1), &scope);

        scope.clear();

        assert_eq!(registry.query_capability::<Health>(slot), None);
        assert!(registry.is_slot_held(slot), "Clearing a slot must not release it");
        assert_eq!(registry.stats().occupied_entries, 0);
    }

    #[test]
    fn test_rebinding_after_clear() {
        let registry = Registry::default();
        let scope = DisposalScope::new();
        let slot = registry.acquire_slot().unwrap();
        registry.register_capability(slot, Health(1), &scope);
        scope.clear();

        registry.register_capability(slot, Health(2), &scope);
        assert_eq!(scope.len(), 1, "A cleared scope is bound again on next use");
        scope.clear();

        assert_eq!(registry.query_capability::<Health>(slot), None);
    }

    #[test]
    fn test_stats() {
        let registry = Registry::new(RegistryConfig::default().with_slot_capacity(16));
        let scope = DisposalScope::new();
        let slot = registry.acquire_slot().unwrap();
        registry.register_capability(slot, Health(1), &scope);
        registry.register_capability(slot, "name", &scope);

        let stats = registry.stats();

        assert_eq!(stats.slot_capacity, 16);
        assert_eq!(stats.slots_in_use, 1);
        assert_eq!(stats.pool_count, 2);
        assert_eq!(stats.occupied_entries, 2);
    }

    #[test]
    fn test_exhaustion_policy_is_applied() {
        let registry = Registry::new(
            RegistryConfig::default()
                .with_slot_capacity(1)
                .with_exhaustion_policy(ExhaustionPolicy::Fail),
        );
        registry.acquire_slot().unwrap();
        assert_eq!(
            registry.acquire_slot(),
            Err(RegistryError::SlotsExhausted { capacity: 1 })
        );
    }

    #[test]
    fn test_install_current_replaces_default() {
        let custom = Registry::new(RegistryConfig::default().with_slot_capacity(4));
        let previous = Registry::install_current(custom.clone());

        assert!(Registry::current().ptr_eq(&custom));

        if let Some(previous) = previous {
            Registry::install_current(previous);
        }
    }
}
