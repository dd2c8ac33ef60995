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

//! The aggregation root of a component set and its capability index.
//!
//! A [`Collection`] owns the components plugged into one entity, lazily owns
//! an identity slot in its [`Registry`], and drives the lifecycle
//! `Uninitialized -> Initialized -> Disposed`. Disposal cascades through the
//! collection's [`DisposalScope`]: every component's `dispose`, then the
//! capability pool cleanups, then the slot goes back to the allocator.

use crate::component::{Component, ComponentHandle};
use crate::error::{CollectionError, CollectionResult};
use crate::pool::Capabilities;
use crate::registry::Registry;
use crate::scope::DisposalScope;
use crate::slot::SlotId;
use std::any::{type_name, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

/// The lifecycle state of a [`Collection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    /// Components may be registered; none has been initialized yet.
    Uninitialized,
    /// `initialize` has run.
    Initialized,
    /// Terminal. The collection refuses registrations.
    Disposed,
}

/// The source of the components a collection carries before any is injected.
///
/// Invoked at most once, by [`Collection::extract_components`].
pub trait StaticComponentProvider {
    /// Returns the pre-existing components.
    fn extract_components(&mut self) -> Vec<ComponentHandle>;
}

impl<F> StaticComponentProvider for F
where
    F: FnMut() -> Vec<ComponentHandle>,
{
    fn extract_components(&mut self) -> Vec<ComponentHandle> {
        self()
    }
}

/// The provider of a host-independent collection: it declares nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStaticComponents;

impl StaticComponentProvider for NoStaticComponents {
    fn extract_components(&mut self) -> Vec<ComponentHandle> {
        Vec::new()
    }
}

/// What the collection knows about one capability type it registered.
#[derive(Debug, Clone, Copy)]
struct CapabilityRecord {
    name: &'static str,
    count: usize,
}

struct CollectionCore {
    registry: Registry,
    state: Cell<CollectionState>,
    /// Allocated on the first capability registration.
    slot: Cell<Option<SlotId>>,
    scope: DisposalScope,
    provider: RefCell<Option<Box<dyn StaticComponentProvider>>>,
    /// Registration order.
    components: RefCell<Vec<ComponentHandle>>,
    /// Identities of `components`, for set semantics.
    members: RefCell<HashSet<usize>>,
    index: RefCell<HashMap<TypeId, CapabilityRecord>>,
    /// Components whose `dispose` hook found them borrowed; drained once
    /// the borrow is released.
    deferred: Rc<RefCell<Vec<ComponentHandle>>>,
}

impl CollectionCore {
    fn dispose(&self) {
        if self.state.get() == CollectionState::Disposed {
            log::trace!("Collection already disposed; ignoring.");
            return;
        }
        self.state.set(CollectionState::Disposed);
        log::debug!(
            "Disposing collection (slot {:?}, {} component(s)).",
            self.slot.get(),
            self.components.borrow().len()
        );

        self.scope.dispose();

        self.index.borrow_mut().clear();
        self.members.borrow_mut().clear();
        let components = std::mem::take(&mut *self.components.borrow_mut());
        drop(components);
        self.provider.borrow_mut().take();

        if let Some(slot) = self.slot.take() {
            if let Err(e) = self.registry.release_slot(slot) {
                log::error!("Collection failed to return its identity slot: {e}");
            }
        }

        self.run_deferred_disposals();
    }

    /// Runs the `dispose` hooks postponed because their component was busy.
    ///
    /// A component still borrowed stays queued for the next drain.
    fn run_deferred_disposals(&self) {
        let pending = std::mem::take(&mut *self.deferred.borrow_mut());
        for component in pending {
            let disposed = match component.try_borrow_mut() {
                Ok(mut component) => {
                    component.dispose();
                    true
                }
                Err(_) => false,
            };
            if !disposed {
                log::debug!("A component is still borrowed; its dispose stays deferred.");
                self.deferred.borrow_mut().push(component);
            }
        }
    }
}

impl Drop for CollectionCore {
    fn drop(&mut self) {
        if self.state.get() != CollectionState::Disposed {
            log::debug!("Collection dropped without being disposed; disposing now.");
            self.dispose();
        }
    }
}

fn component_key(component: &ComponentHandle) -> usize {
    Rc::as_ptr(component) as *const () as usize
}

/// A set of components attached to one owner, and the registry through which
/// they discover each other's capabilities.
///
/// `Collection` is a cheap, clonable handle; components refer back to it
/// through a [`WeakCollection`]. Dropping the last handle disposes the
/// collection if that has not happened yet.
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use tessera_core::{into_handle, Collection, CollectionResult, Component, ComponentBase, Registry};
///
/// trait Greeter {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
/// impl Greeter for English {
///     fn greet(&self) -> String { "hello".into() }
/// }
///
/// #[derive(Default)]
/// struct Voice { base: ComponentBase }
///
/// impl Component for Voice {
///     fn base(&self) -> &ComponentBase { &self.base }
///     fn register(&mut self, owner: &Collection) -> CollectionResult<()> {
///         owner.register_capability::<Rc<dyn Greeter>>(Rc::new(English))
///     }
/// }
///
/// let registry = Registry::default();
/// let collection = Collection::new(&registry);
/// collection.register(into_handle(Voice::default())).unwrap();
/// collection.initialize().unwrap();
///
/// let greeter = collection.query_capability::<Rc<dyn Greeter>>().unwrap();
/// assert_eq!(greeter.greet(), "hello");
///
/// collection.dispose();
/// assert!(collection.query_capability::<Rc<dyn Greeter>>().is_none());
/// ```
#[derive(Clone)]
pub struct Collection {
    core: Rc<CollectionCore>,
}

impl Collection {
    /// Creates a host-independent collection with no static components.
    #[must_use]
    pub fn new(registry: &Registry) -> Self {
        Self::with_provider(registry, NoStaticComponents)
    }

    /// Creates a collection whose static components come from `provider`.
    #[must_use]
    pub fn with_provider(
        registry: &Registry,
        provider: impl StaticComponentProvider + 'static,
    ) -> Self {
        Self {
            core: Rc::new(CollectionCore {
                registry: registry.clone(),
                state: Cell::new(CollectionState::Uninitialized),
                slot: Cell::new(None),
                scope: DisposalScope::new(),
                provider: RefCell::new(Some(Box::new(provider))),
                components: RefCell::new(Vec::new()),
                members: RefCell::new(HashSet::new()),
                index: RefCell::new(HashMap::new()),
                deferred: Rc::new(RefCell::new(Vec::new())),
            }),
        }
    }

    /// Returns the registry this collection stores its capabilities in.
    pub fn registry(&self) -> &Registry {
        &self.core.registry
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> CollectionState {
        self.core.state.get()
    }

    /// Returns `true` once `initialize` has run and until disposal.
    pub fn is_initialized(&self) -> bool {
        self.state() == CollectionState::Initialized
    }

    /// Returns `true` once the collection has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.state() == CollectionState::Disposed
    }

    /// Returns the identity slot, if a capability was ever registered.
    pub fn slot_id(&self) -> Option<SlotId> {
        self.core.slot.get()
    }

    /// The scope torn down with the collection. Resources bound here live
    /// exactly as long as the collection.
    pub fn scope(&self) -> &DisposalScope {
        &self.core.scope
    }

    /// Returns the number of registered components.
    pub fn len(&self) -> usize {
        self.core.components.borrow().len()
    }

    /// Returns `true` if no component is registered.
    pub fn is_empty(&self) -> bool {
        self.core.components.borrow().is_empty()
    }

    /// Returns the registered components in registration order.
    pub fn components(&self) -> Vec<ComponentHandle> {
        self.core.components.borrow().clone()
    }

    /// Returns `true` if `component` is registered in this collection.
    pub fn contains(&self, component: &ComponentHandle) -> bool {
        self.core.members.borrow().contains(&component_key(component))
    }

    /// Takes the static components from the provider.
    ///
    /// The provider is consulted once; later calls return nothing.
    pub fn extract_components(&self) -> Vec<ComponentHandle> {
        let provider = self.core.provider.borrow_mut().take();
        match provider {
            Some(mut provider) => {
                let components = provider.extract_components();
                log::trace!("Extracted {} static component(s).", components.len());
                components
            }
            None => {
                log::debug!("Static components were already extracted; returning none.");
                Vec::new()
            }
        }
    }

    /// Adds a component.
    ///
    /// The component's owner is set, its `register` hook runs, it joins the
    /// component set and its `dispose` and scope are bound to the
    /// collection's scope. A component already in the set is ignored. If the
    /// collection is already initialized, the component is initialized right
    /// away.
    ///
    /// A failing `register` hook still leaves the component owned, so whatever
    /// it set up is torn down with the collection; the error is returned. A
    /// component that is currently borrowed (for example because it calls
    /// this from its own hook) is refused with [`CollectionError::Busy`].
    pub fn register(&self, component: ComponentHandle) -> CollectionResult<()> {
        if self.is_disposed() {
            return Err(CollectionError::Disposed);
        }

        let key = component_key(&component);
        if self.core.members.borrow().contains(&key) {
            log::warn!("Component is already registered in this collection; ignoring.");
            return Ok(());
        }

        let (name, component_scope, registered) = {
            let mut guard = component.try_borrow_mut().map_err(|_| {
                log::error!("Cannot register a component that is borrowed elsewhere.");
                CollectionError::Busy
            })?;
            let name = guard.name();
            guard.base().bind_owner(self, name)?;
            let component_scope = guard.base().scope().clone();
            let registered = guard.register(self);
            (name, component_scope, registered)
        };
        self.core.run_deferred_disposals();
        if let Err(e) = &registered {
            log::error!("Component `{name}` failed to register: {e}");
        }

        // A hook may have disposed the collection; binding below then tears
        // the component down immediately.
        if !self.is_disposed() {
            self.core.components.borrow_mut().push(component.clone());
            self.core.members.borrow_mut().insert(key);
        }

        self.core.scope.bind_child(&component_scope);
        let deferred = self.core.deferred.clone();
        let handle = component.clone();
        self.core.scope.add(move || {
            let disposed = match handle.try_borrow_mut() {
                Ok(mut component) => {
                    component.dispose();
                    true
                }
                Err(_) => false,
            };
            if !disposed {
                log::debug!("Component `{name}` is busy during teardown; deferring its dispose.");
                deferred.borrow_mut().push(handle);
            }
        });
        log::trace!("Registered component `{name}`.");

        registered?;

        if self.is_initialized() {
            log::debug!("Collection already initialized; initializing late component `{name}`.");
            let initialized = match component.try_borrow_mut() {
                Ok(mut component) => component.initialize(),
                Err(_) => Err(CollectionError::Busy),
            };
            self.core.run_deferred_disposals();
            initialized?;
        }
        Ok(())
    }

    /// Adds every component in order, stopping at the first error.
    pub fn register_all<I>(&self, components: I) -> CollectionResult<()>
    where
        I: IntoIterator<Item = ComponentHandle>,
    {
        components
            .into_iter()
            .try_for_each(|component| self.register(component))
    }

    /// Initializes every registered component, in registration order.
    ///
    /// Runs once: later calls are ignored. Every component is initialized
    /// even if an earlier one fails; the first failure is returned.
    pub fn initialize(&self) -> CollectionResult<()> {
        match self.state() {
            CollectionState::Initialized => {
                log::debug!("Collection already initialized; ignoring.");
                return Ok(());
            }
            CollectionState::Disposed => return Err(CollectionError::Disposed),
            CollectionState::Uninitialized => {}
        }
        self.core.state.set(CollectionState::Initialized);

        let components = self.components();
        log::debug!("Initializing {} component(s).", components.len());

        let mut first_error = None;
        for component in components {
            if self.is_disposed() {
                log::warn!("Collection disposed during initialization; stopping.");
                break;
            }
            let result = match component.try_borrow_mut() {
                Ok(mut component) => component.initialize().map_err(|e| {
                    log::error!("Component `{}` failed to initialize: {e}", component.name());
                    e
                }),
                Err(_) => {
                    log::error!("A component is busy and cannot be initialized.");
                    Err(CollectionError::Busy)
                }
            };
            self.core.run_deferred_disposals();
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Makes `instance` discoverable as a `T` capability of this collection.
    ///
    /// The first registration allocates the collection's identity slot.
    pub fn register_capability<T: Clone + 'static>(&self, instance: T) -> CollectionResult<()> {
        if self.is_disposed() {
            return Err(CollectionError::Disposed);
        }
        let slot = self.slot_or_acquire()?;

        self.core
            .index
            .borrow_mut()
            .entry(TypeId::of::<T>())
            .or_insert(CapabilityRecord {
                name: type_name::<T>(),
                count: 0,
            })
            .count += 1;

        self.core
            .registry
            .register_capability(slot, instance, &self.core.scope);
        log::trace!("Registered capability `{}` at slot {slot}.", type_name::<T>());
        Ok(())
    }

    /// Returns the first registered `T`, or `None`.
    pub fn query_capability<T: Clone + 'static>(&self) -> Option<T> {
        let slot = self.slot_id()?;
        self.core.registry.query_capability::<T>(slot)
    }

    /// Returns every registered `T` in registration order.
    pub fn query_capabilities<T: Clone + 'static>(&self) -> Capabilities<T> {
        match self.slot_id() {
            Some(slot) => self.core.registry.query_capabilities::<T>(slot),
            None => Capabilities::empty(),
        }
    }

    /// Like [`query_capability`](Collection::query_capability), but logs an
    /// error when the capability is missing.
    ///
    /// The caller still has to handle `None`.
    pub fn require_capability<T: Clone + 'static>(&self) -> Option<T> {
        let capability = self.query_capability::<T>();
        if capability.is_none() {
            log::error!(
                "Required capability `{}` is not registered in this collection.",
                type_name::<T>()
            );
        }
        capability
    }

    /// Returns `true` if at least one `T` is registered.
    pub fn has_capability<T: Clone + 'static>(&self) -> bool {
        self.slot_id()
            .is_some_and(|slot| self.core.registry.has_capability::<T>(slot))
    }

    /// Returns how many `T` this collection registered since its creation.
    pub fn capability_count<T: Clone + 'static>(&self) -> usize {
        self.core
            .index
            .borrow()
            .get(&TypeId::of::<T>())
            .map_or(0, |record| record.count)
    }

    /// Returns the names of the capability types registered by this collection.
    pub fn capability_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.core.index.borrow().values().map(|r| r.name).collect();
        names.sort_unstable();
        names
    }

    /// Disposes every component, clears every capability and returns the
    /// identity slot. Idempotent.
    pub fn dispose(&self) {
        self.core.dispose();
    }

    /// Returns a weak handle, as held by components.
    pub fn downgrade(&self) -> WeakCollection {
        WeakCollection {
            core: Rc::downgrade(&self.core),
        }
    }

    /// Returns `true` if both handles refer to the same collection.
    pub fn ptr_eq(&self, other: &Collection) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }

    fn slot_or_acquire(&self) -> CollectionResult<SlotId> {
        if let Some(slot) = self.core.slot.get() {
            return Ok(slot);
        }
        let slot = self.core.registry.acquire_slot()?;
        self.core.slot.set(Some(slot));
        log::debug!("Collection acquired identity slot {slot}.");
        Ok(slot)
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("state", &self.state())
            .field("slot", &self.slot_id())
            .field("components", &self.len())
            .field("capabilities", &self.capability_types())
            .finish()
    }
}

/// A non-owning reference to a [`Collection`].
#[derive(Clone, Default)]
pub struct WeakCollection {
    core: Weak<CollectionCore>,
}

impl WeakCollection {
    /// Returns the collection if it is still alive.
    pub fn upgrade(&self) -> Option<Collection> {
        self.core.upgrade().map(|core| Collection { core })
    }

    /// Returns `true` if this handle refers to `collection`.
    pub fn points_to(&self, collection: &Collection) -> bool {
        std::ptr::eq(self.core.as_ptr(), Rc::as_ptr(&collection.core))
    }
}

impl fmt::Debug for WeakCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakCollection")
            .field("alive", &(self.core.strong_count() > 0))
            .finish()
    }
}
