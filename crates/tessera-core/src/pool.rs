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

//! Per-capability-type storage addressed by identity slot.
//!
//! Each capability type `T` gets one [`CapabilityPool<T>`], a sparse array
//! whose entry at slot `i` lists the `T` instances registered by the
//! collection holding slot `i`. The pools of every type live side by side in
//! [`CapabilityPools`], a type-map keyed by [`TypeId`].

use crate::scope::ScopeId;
use crate::slot::SlotId;
use std::any::{type_name, Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

/// A snapshot of the capabilities of one type registered by a collection,
/// in registration order.
///
/// Obtaining it is O(1): the list is shared with the pool and copied only if
/// the collection registers more capabilities of this type while the
/// snapshot is alive.
pub struct Capabilities<T> {
    items: Option<Rc<Vec<T>>>,
}

impl<T> Capabilities<T> {
    /// An empty snapshot.
    pub fn empty() -> Self {
        Self { items: None }
    }

    /// Returns the capabilities as a slice.
    pub fn as_slice(&self) -> &[T] {
        match &self.items {
            Some(items) => items.as_slice(),
            None => &[],
        }
    }
}

impl<T> Deref for Capabilities<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> Clone for Capabilities<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<T> Default for Capabilities<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: fmt::Debug> fmt::Debug for Capabilities<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<'a, T> IntoIterator for &'a Capabilities<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

/// The sparse, slot-indexed storage for capabilities of type `T`.
pub struct CapabilityPool<T> {
    /// `slots[i]` holds the capabilities registered under slot `i`, if any.
    slots: Vec<Option<Rc<Vec<T>>>>,
    /// Scopes that already carry this pool's cleanup action.
    bound_scopes: HashSet<ScopeId>,
}

impl<T: Clone + 'static> CapabilityPool<T> {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            bound_scopes: HashSet::new(),
        }
    }

    /// Appends `instance` to the list of `slot`.
    pub fn register(&mut self, slot: SlotId, instance: T) {
        let index = slot.index();
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }
        let entry = self.slots[index].get_or_insert_with(Default::default);
        Rc::make_mut(entry).push(instance);
    }

    /// Records that `scope` carries this pool's cleanup.
    ///
    /// Returns `true` only the first time a given scope is bound, so the
    /// caller installs exactly one cleanup per scope.
    pub fn bind_scope(&mut self, scope: ScopeId) -> bool {
        self.bound_scopes.insert(scope)
    }

    /// Returns `true` if `scope` carries this pool's cleanup.
    pub fn is_bound(&self, scope: ScopeId) -> bool {
        self.bound_scopes.contains(&scope)
    }

    /// Returns the first capability registered under `slot`.
    pub fn query(&self, slot: SlotId) -> Option<T> {
        self.entry(slot).and_then(|items| items.first().cloned())
    }

    /// Returns every capability registered under `slot`, in registration order.
    pub fn query_all(&self, slot: SlotId) -> Capabilities<T> {
        Capabilities {
            items: self.entry(slot).cloned(),
        }
    }

    /// Returns `true` if at least one capability is registered under `slot`.
    pub fn is_registered(&self, slot: SlotId) -> bool {
        self.entry(slot).is_some()
    }

    /// Drops every capability of `slot` and unbinds `scope`.
    ///
    /// The removed list is returned so the caller can drop it once no borrow
    /// of the pool is held. The slot id itself stays allocated.
    pub fn forget(&mut self, slot: SlotId, scope: ScopeId) -> Option<Rc<Vec<T>>> {
        self.bound_scopes.remove(&scope);
        self.slots.get_mut(slot.index()).and_then(Option::take)
    }

    /// Returns the number of slots holding at least one capability.
    pub fn occupied_slots(&self) -> usize {
        self.slots.iter().filter(|entry| entry.is_some()).count()
    }

    fn entry(&self, slot: SlotId) -> Option<&Rc<Vec<T>>> {
        self.slots
            .get(slot.index())
            .and_then(Option::as_ref)
            .filter(|items| !items.is_empty())
    }
}

impl<T: Clone + 'static> Default for CapabilityPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased view of a [`CapabilityPool`], used for diagnostics and downcasting.
pub(crate) trait ErasedPool {
    /// The name of the capability type stored in the pool.
    fn capability_name(&self) -> &'static str;

    /// The number of slots holding at least one capability.
    fn occupied_slots(&self) -> usize;

    /// Allows downcasting to the concrete pool type.
    fn as_any(&self) -> &dyn Any;

    /// Allows mutable downcasting to the concrete pool type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Clone + 'static> ErasedPool for CapabilityPool<T> {
    fn capability_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn occupied_slots(&self) -> usize {
        CapabilityPool::occupied_slots(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A type-map holding one [`CapabilityPool`] per capability type.
#[derive(Default)]
pub(crate) struct CapabilityPools {
    pools: HashMap<TypeId, Box<dyn ErasedPool>>,
}

impl CapabilityPools {
    pub(crate) fn new() -> Self {
        Self {
            pools: HashMap::new(),
        }
    }

    /// Returns the pool for `T`, if any capability of that type was ever registered.
    pub(crate) fn get<T: Clone + 'static>(&self) -> Option<&CapabilityPool<T>> {
        self.pools
            .get(&TypeId::of::<T>())
            .and_then(|pool| pool.as_any().downcast_ref::<CapabilityPool<T>>())
    }

    pub(crate) fn get_mut<T: Clone + 'static>(&mut self) -> Option<&mut CapabilityPool<T>> {
        self.pools
            .get_mut(&TypeId::of::<T>())
            .and_then(|pool| pool.as_any_mut().downcast_mut::<CapabilityPool<T>>())
    }

    /// Returns the pool for `T`, creating it on first use.
    pub(crate) fn get_or_insert<T: Clone + 'static>(&mut self) -> &mut CapabilityPool<T> {
        self.pools
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                log::debug!("Created capability pool for `{}`.", type_name::<T>());
                Box::new(CapabilityPool::<T>::new())
            })
            .as_any_mut()
            .downcast_mut::<CapabilityPool<T>>()
            .expect("capability pool stored under a foreign TypeId")
    }

    /// Returns the number of capability types with a pool.
    pub(crate) fn len(&self) -> usize {
        self.pools.len()
    }

    /// Returns the total number of occupied slots across every pool.
    pub(crate) fn occupied_entries(&self) -> usize {
        self.pools.values().map(|pool| pool.occupied_slots()).sum()
    }

    /// Returns the names of the capability types with at least one occupied slot.
    pub(crate) fn occupied_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .pools
            .values()
            .filter(|pool| pool.occupied_slots() > 0)
            .map(|pool| pool.capability_name())
            .collect();
        names.sort_unstable();
        names
    }
}
