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

//! The contract between a [`Collection`] and the units plugged into it.

use crate::collection::{Collection, WeakCollection};
use crate::error::{CollectionError, CollectionResult};
use crate::scope::DisposalScope;
use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

/// A shared, dynamically typed component as stored by a collection.
pub type ComponentHandle = Rc<RefCell<dyn Component>>;

/// Wraps a component into a [`ComponentHandle`].
pub fn into_handle<C: Component>(component: C) -> ComponentHandle {
    Rc::new(RefCell::new(component))
}

/// State every component carries: its owner back-reference and its disposal scope.
///
/// The owner is assigned by the collection exactly once, before the
/// component's `register` hook runs, and is held weakly.
#[derive(Default)]
pub struct ComponentBase {
    owner: OnceCell<WeakCollection>,
    scope: DisposalScope,
}

impl ComponentBase {
    /// Creates an unowned base with an empty disposal scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the owning collection, if the component is registered and the
    /// collection is still alive.
    pub fn owner(&self) -> Option<Collection> {
        self.owner.get().and_then(WeakCollection::upgrade)
    }

    /// Like [`owner`](ComponentBase::owner), as an error when absent.
    pub fn require_owner(&self) -> CollectionResult<Collection> {
        self.owner().ok_or(CollectionError::NoOwner)
    }

    /// Returns `true` once the component has been registered in a collection.
    pub fn is_owned(&self) -> bool {
        self.owner.get().is_some()
    }

    /// The resources owned by the component, torn down by [`Component::dispose`].
    pub fn scope(&self) -> &DisposalScope {
        &self.scope
    }

    /// Sets the owner. Re-binding to the same collection is accepted, any
    /// other owner is refused.
    pub(crate) fn bind_owner(&self, owner: &Collection, component: &str) -> CollectionResult<()> {
        if let Some(existing) = self.owner.get() {
            return if existing.points_to(owner) {
                Ok(())
            } else {
                Err(CollectionError::AlreadyOwned {
                    component: component.to_string(),
                })
            };
        }
        // The cell was empty above and nothing else can fill it in between.
        let _ = self.owner.set(owner.downgrade());
        Ok(())
    }
}

impl fmt::Debug for ComponentBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentBase")
            .field("owned", &self.is_owned())
            .field("scope", &self.scope)
            .finish()
    }
}

/// A unit pluggable into exactly one [`Collection`].
///
/// The collection drives the lifecycle: `register` once when the component is
/// added, `initialize` once when the collection initializes, and `dispose`
/// once when the collection is disposed. Capabilities are typically declared
/// from `register` and looked up from `initialize`, once every sibling had a
/// chance to declare its own.
///
/// Hooks run without any borrow of the collection held, so they may call
/// back into the owner freely.
pub trait Component: 'static {
    /// Returns the owner and disposal scope shared by every component.
    fn base(&self) -> &ComponentBase;

    /// A human-readable name used in diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Called once when the component is added to `owner`.
    fn register(&mut self, _owner: &Collection) -> CollectionResult<()> {
        Ok(())
    }

    /// Called once when the owning collection initializes, or right after
    /// `register` if the collection is already initialized.
    fn initialize(&mut self) -> CollectionResult<()> {
        Ok(())
    }

    /// Releases the resources bound to the component's scope.
    ///
    /// Overrides should keep clearing the scope.
    fn dispose(&mut self) {
        self.base().scope().clear();
    }
}
