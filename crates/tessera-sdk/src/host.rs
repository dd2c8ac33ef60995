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

//! Host objects: the entities a collection can be attached to.
//!
//! A [`HostObject`] carries components placed on it ahead of time (by a
//! scene file, an editor, a spawner). The collection attached to it uses
//! those components as its static set. A [`Scene`] is the list of root host
//! objects, which is how installers reach collections that were placed
//! rather than built through the factory.

use crate::factory;
use anyhow::Result;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use tessera_core::{Collection, CollectionState, ComponentHandle, Registry};

struct HostInner {
    name: String,
    components: RefCell<Vec<ComponentHandle>>,
    collection: RefCell<Option<Collection>>,
}

/// A named host entity with pre-attached components and at most one collection.
///
/// Cloning yields another handle to the same host.
#[derive(Clone)]
pub struct HostObject {
    inner: Rc<HostInner>,
}

impl HostObject {
    /// Creates a host with no components and no collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(HostInner {
                name: name.into(),
                components: RefCell::new(Vec::new()),
                collection: RefCell::new(None),
            }),
        }
    }

    /// Returns the host's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Places a component on the host.
    ///
    /// It becomes part of the static set of a collection attached later. A
    /// collection that already extracted its static set does not see it.
    pub fn add_component(&self, component: ComponentHandle) {
        self.inner.components.borrow_mut().push(component);
    }

    /// Returns the components placed on the host.
    pub fn components(&self) -> Vec<ComponentHandle> {
        self.inner.components.borrow().clone()
    }

    /// Returns the attached collection, if any.
    pub fn collection(&self) -> Option<Collection> {
        self.inner.collection.borrow().clone()
    }

    /// Returns the attached collection, attaching a new one if needed.
    ///
    /// The new collection's static components are the host's components at
    /// extraction time.
    pub fn attach_collection(&self, registry: &Registry) -> Collection {
        if let Some(collection) = self.collection() {
            return collection;
        }

        let host: Weak<HostInner> = Rc::downgrade(&self.inner);
        let collection = Collection::with_provider(registry, move || {
            host.upgrade()
                .map(|host| host.components.borrow().clone())
                .unwrap_or_default()
        });
        log::debug!("Attached a collection to host '{}'.", self.name());
        *self.inner.collection.borrow_mut() = Some(collection.clone());
        collection
    }

    /// Initializes the attached collection if nothing else did.
    ///
    /// A host whose collection was built by the factory is left alone; a host
    /// placed without one gets a collection built from its static components.
    pub fn start(&self, registry: &Registry) -> Result<Collection> {
        let collection = self.attach_collection(registry);
        if collection.state() == CollectionState::Uninitialized {
            log::debug!("Starting host '{}'.", self.name());
            factory::initialize_collection(&collection, [], None)?;
        }
        Ok(collection)
    }

    /// Disposes and detaches the attached collection.
    pub fn destroy(&self) {
        let collection = self.inner.collection.borrow_mut().take();
        if let Some(collection) = collection {
            log::debug!("Destroying host '{}'.", self.name());
            collection.dispose();
        }
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject")
            .field("name", &self.inner.name)
            .field("components", &self.inner.components.borrow().len())
            .field("collection", &self.collection())
            .finish()
    }
}

/// The root host objects of a scene, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    roots: Vec<HostObject>,
}

impl Scene {
    /// Creates an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a root host object.
    pub fn add_root(&mut self, host: HostObject) {
        self.roots.push(host);
    }

    /// Returns the root host objects.
    pub fn roots(&self) -> &[HostObject] {
        &self.roots
    }

    /// Returns the collections attached to the root host objects.
    pub fn collections(&self) -> Vec<Collection> {
        self.roots.iter().filter_map(HostObject::collection).collect()
    }

    /// Returns the attached collections that have not been initialized yet.
    pub fn pending_collections(&self) -> Vec<Collection> {
        self.collections()
            .into_iter()
            .filter(|c| c.state() == CollectionState::Uninitialized)
            .collect()
    }

    /// Starts every root host object.
    pub fn start(&self, registry: &Registry) -> Result<()> {
        for host in &self.roots {
            host.start(registry)?;
        }
        Ok(())
    }

    /// Destroys every root host object.
    pub fn destroy(&self) {
        for host in &self.roots {
            host.destroy();
        }
    }
}
