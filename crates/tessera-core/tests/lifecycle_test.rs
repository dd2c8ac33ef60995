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

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tessera_core::{
    into_handle, Collection, CollectionError, CollectionResult, CollectionState, Component,
    ComponentBase, ComponentHandle, Registry, RegistryConfig,
};

// --- DUMMY CAPABILITIES AND COMPONENTS FOR THESE TESTS ---

trait Health {
    fn value(&self) -> i32;
}

struct FixedHealth(i32);

impl Health for FixedHealth {
    fn value(&self) -> i32 {
        self.0
    }
}

trait Damage {
    fn amount(&self) -> i32;
}

struct FixedDamage(i32);

impl Damage for FixedDamage {
    fn amount(&self) -> i32 {
        self.0
    }
}

/// Publishes a `Health` capability from `register`.
struct HealthComponent {
    base: ComponentBase,
    value: i32,
    disposed: Rc<Cell<usize>>,
}

impl Component for HealthComponent {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn register(&mut self, owner: &Collection) -> CollectionResult<()> {
        owner.register_capability::<Rc<dyn Health>>(Rc::new(FixedHealth(self.value)))
    }

    fn dispose(&mut self) {
        self.disposed.set(self.disposed.get() + 1);
        self.base.scope().clear();
    }
}

/// Looks up its sibling's `Health` during `initialize`.
struct AttackComponent {
    base: ComponentBase,
    observed_health: Rc<Cell<Option<i32>>>,
    disposed: Rc<Cell<usize>>,
}

impl Component for AttackComponent {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn register(&mut self, owner: &Collection) -> CollectionResult<()> {
        owner.register_capability::<Rc<dyn Damage>>(Rc::new(FixedDamage(7)))
    }

    fn initialize(&mut self) -> CollectionResult<()> {
        let owner = self.base.require_owner()?;
        let health = owner
            .query_capability::<Rc<dyn Health>>()
            .ok_or_else(|| CollectionError::component(self.name(), "no Health sibling"))?;
        self.observed_health.set(Some(health.value()));
        Ok(())
    }

    fn dispose(&mut self) {
        self.disposed.set(self.disposed.get() + 1);
        self.base.scope().clear();
    }
}

fn health(value: i32, disposed: &Rc<Cell<usize>>) -> HealthComponent {
    HealthComponent {
        base: ComponentBase::new(),
        value,
        disposed: disposed.clone(),
    }
}

// --- TESTS ---

#[test]
fn test_components_discover_each_other() {
    // --- 1. ARRANGE ---
    let registry = Registry::default();
    let collection = Collection::new(&registry);
    let disposed = Rc::new(Cell::new(0));
    let observed = Rc::new(Cell::new(None));

    // --- 2. ACT ---
    collection
        .register_all([
            into_handle(AttackComponent {
                base: ComponentBase::new(),
                observed_health: observed.clone(),
                disposed: disposed.clone(),
            }),
            into_handle(health(100, &disposed)),
        ])
        .unwrap();
    collection.initialize().unwrap();

    // --- 3. ASSERT ---
    assert_eq!(
        observed.get(),
        Some(100),
        "Initialize should see capabilities declared by later-registered siblings"
    );
    let damage = collection.query_capability::<Rc<dyn Damage>>().unwrap();
    assert_eq!(damage.amount(), 7);
}

#[test]
fn test_query_all_preserves_registration_order() {
    let registry = Registry::default();
    let collection = Collection::new(&registry);
    let disposed = Rc::new(Cell::new(0));

    for value in [3, 1, 2] {
        collection.register(into_handle(health(value, &disposed))).unwrap();
    }

    let values: Vec<i32> = collection
        .query_capabilities::<Rc<dyn Health>>()
        .iter()
        .map(|h| h.value())
        .collect();
    assert_eq!(values, vec![3, 1, 2]);
    assert_eq!(
        collection.query_capability::<Rc<dyn Health>>().unwrap().value(),
        3,
        "The single query should return the first registration"
    );
}

#[test]
fn test_missing_capability_is_absent_not_an_error() {
    let registry = Registry::default();
    let collection = Collection::new(&registry);

    assert!(collection.query_capability::<Rc<dyn Health>>().is_none());
    assert!(collection.query_capabilities::<Rc<dyn Health>>().is_empty());
    assert!(collection.require_capability::<Rc<dyn Health>>().is_none());
    assert!(!collection.has_capability::<Rc<dyn Health>>());

    // With a slot allocated for another type, the answer is the same.
    collection.register_capability(1_u32).unwrap();
    assert!(collection.query_capability::<Rc<dyn Health>>().is_none());
}

#[test]
fn test_dispose_cascades_once_to_every_component() {
    // --- 1. ARRANGE ---
    let registry = Registry::default();
    let collection = Collection::new(&registry);
    let disposed_x = Rc::new(Cell::new(0));
    let disposed_y = Rc::new(Cell::new(0));
    collection.register(into_handle(health(1, &disposed_x))).unwrap();
    collection.register(into_handle(health(2, &disposed_y))).unwrap();
    collection.initialize().unwrap();
    assert_eq!(registry.stats().occupied_entries, 1);

    // --- 2. ACT ---
    collection.dispose();
    collection.dispose();

    // --- 3. ASSERT ---
    assert_eq!(disposed_x.get(), 1);
    assert_eq!(disposed_y.get(), 1);
    assert_eq!(registry.stats().occupied_entries, 0, "Pool entries should be cleared");
    assert_eq!(registry.stats().slots_in_use, 0, "The slot should be returned");
    assert!(collection.is_empty());
}

#[test]
fn test_components_are_disposed_in_reverse_registration_order() {
    struct Ordered {
        base: ComponentBase,
        label: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Component for Ordered {
        fn base(&self) -> &ComponentBase {
            &self.base
        }

        fn dispose(&mut self) {
            self.log.borrow_mut().push(self.label);
            self.base.scope().clear();
        }
    }

    let registry = Registry::default();
    let collection = Collection::new(&registry);
    let log = Rc::new(RefCell::new(Vec::new()));
    for label in ["a", "b", "c"] {
        collection
            .register(into_handle(Ordered {
                base: ComponentBase::new(),
                label,
                log: log.clone(),
            }))
            .unwrap();
    }

    collection.dispose();

    assert_eq!(*log.borrow(), vec!["c", "b", "a"]);
}

#[test]
fn test_component_scope_is_torn_down_with_collection() {
    struct Holder {
        base: ComponentBase,
    }

    impl Component for Holder {
        fn base(&self) -> &ComponentBase {
            &self.base
        }
    }

    let registry = Registry::default();
    let collection = Collection::new(&registry);
    let released = Rc::new(Cell::new(false));
    let holder = into_handle(Holder {
        base: ComponentBase::new(),
    });
    {
        let released = released.clone();
        holder
            .borrow()
            .base()
            .scope()
            .add(move || released.set(true));
    }
    collection.register(holder).unwrap();

    collection.dispose();

    assert!(released.get(), "The component's own resources should be released");
}

#[test]
fn test_initialize_failure_does_not_skip_siblings() {
    let registry = Registry::default();
    let collection = Collection::new(&registry);
    let disposed = Rc::new(Cell::new(0));
    let observed = Rc::new(Cell::new(None));
    let initialized = Rc::new(Cell::new(false));

    struct Flag {
        base: ComponentBase,
        initialized: Rc<Cell<bool>>,
    }

    impl Component for Flag {
        fn base(&self) -> &ComponentBase {
            &self.base
        }

        fn initialize(&mut self) -> CollectionResult<()> {
            self.initialized.set(true);
            Ok(())
        }
    }

    // No Health sibling: the attack component fails.
    collection
        .register(into_handle(AttackComponent {
            base: ComponentBase::new(),
            observed_health: observed.clone(),
            disposed,
        }))
        .unwrap();
    collection
        .register(into_handle(Flag {
            base: ComponentBase::new(),
            initialized: initialized.clone(),
        }))
        .unwrap();

    let result = collection.initialize();

    assert!(matches!(result, Err(CollectionError::Component { .. })));
    assert!(initialized.get(), "Later components should still be initialized");
    assert_eq!(observed.get(), None);
    assert!(collection.is_initialized());
}

#[test]
fn test_owner_is_weak() {
    let registry = Registry::new(RegistryConfig::default());
    let disposed = Rc::new(Cell::new(0));
    let component = Rc::new(RefCell::new(health(5, &disposed)));

    {
        let collection = Collection::new(&registry);
        collection.register(component.clone()).unwrap();
        assert!(component.borrow().base().owner().is_some());
    }

    assert!(
        component.borrow().base().owner().is_none(),
        "A component must not keep its collection alive"
    );
    assert!(component.borrow().base().is_owned());
    assert_eq!(disposed.get(), 1);
}

/// Disposes its own collection from one of its hooks.
struct SelfDestruct {
    base: ComponentBase,
    in_register: bool,
    disposed: Rc<Cell<usize>>,
}

impl SelfDestruct {
    fn new(in_register: bool, disposed: &Rc<Cell<usize>>, released: &Rc<Cell<bool>>) -> Self {
        let component = Self {
            base: ComponentBase::new(),
            in_register,
            disposed: disposed.clone(),
        };
        let released = released.clone();
        component.base.scope().add(move || released.set(true));
        component
    }
}

impl Component for SelfDestruct {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn register(&mut self, owner: &Collection) -> CollectionResult<()> {
        if self.in_register {
            owner.dispose();
        }
        Ok(())
    }

    fn initialize(&mut self) -> CollectionResult<()> {
        self.base.require_owner()?.dispose();
        Ok(())
    }

    fn dispose(&mut self) {
        self.disposed.set(self.disposed.get() + 1);
        self.base.scope().clear();
    }
}

#[test]
fn test_component_disposing_its_collection_from_initialize() {
    // --- 1. ARRANGE ---
    let registry = Registry::default();
    let collection = Collection::new(&registry);
    let disposed = Rc::new(Cell::new(0));
    let released = Rc::new(Cell::new(false));
    collection
        .register(into_handle(SelfDestruct::new(false, &disposed, &released)))
        .unwrap();

    // --- 2. ACT ---
    collection.initialize().unwrap();

    // --- 3. ASSERT ---
    assert_eq!(collection.state(), CollectionState::Disposed);
    assert_eq!(disposed.get(), 1, "The dispose hook should run once the hook returns");
    assert!(released.get(), "The component's own scope should be cleared");
}

#[test]
fn test_component_disposing_its_collection_from_register() {
    let registry = Registry::default();
    let collection = Collection::new(&registry);
    let disposed = Rc::new(Cell::new(0));
    let released = Rc::new(Cell::new(false));

    collection
        .register(into_handle(SelfDestruct::new(true, &disposed, &released)))
        .unwrap();

    assert!(collection.is_disposed());
    assert!(collection.is_empty());
    assert_eq!(disposed.get(), 1);
    assert!(released.get());
}

#[test]
fn test_registering_a_busy_component_is_refused() {
    /// Tries to move itself into another collection while initializing.
    struct Migrant {
        base: ComponentBase,
        me: Weak<RefCell<Migrant>>,
        target: Collection,
        outcome: Rc<RefCell<Option<CollectionResult<()>>>>,
    }

    impl Component for Migrant {
        fn base(&self) -> &ComponentBase {
            &self.base
        }

        fn initialize(&mut self) -> CollectionResult<()> {
            let me: ComponentHandle = self.me.upgrade().ok_or(CollectionError::NoOwner)?;
            *self.outcome.borrow_mut() = Some(self.target.register(me));
            Ok(())
        }
    }

    // --- 1. ARRANGE ---
    let registry = Registry::default();
    let home = Collection::new(&registry);
    let target = Collection::new(&registry);
    let outcome = Rc::new(RefCell::new(None));
    let migrant = Rc::new_cyclic(|me| {
        RefCell::new(Migrant {
            base: ComponentBase::new(),
            me: me.clone(),
            target: target.clone(),
            outcome: outcome.clone(),
        })
    });
    home.register(migrant.clone()).unwrap();

    // --- 2. ACT ---
    home.initialize().unwrap();

    // --- 3. ASSERT ---
    assert_eq!(*outcome.borrow(), Some(Err(CollectionError::Busy)));
    assert!(target.is_empty());
    assert!(home.contains(&(migrant.clone() as ComponentHandle)));
    let owner = migrant.borrow().base().owner().unwrap();
    assert!(owner.ptr_eq(&home));
}
