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

//! # Tessera Core
//!
//! Capability discovery within one entity's component set.
//!
//! Components plugged into a [`Collection`] publish typed capabilities and
//! look up their siblings' capabilities by type, without holding direct
//! references to each other. Storage is a per-type array indexed by a small
//! recyclable [`SlotId`], so a lookup is one hash of the type plus one index,
//! and teardown is driven by [`DisposalScope`]s.

#![warn(missing_docs)]

pub mod collection;
pub mod component;
pub mod config;
pub mod error;
pub mod pool;
pub mod registry;
pub mod scope;
pub mod slot;

pub use collection::{
    Collection, CollectionState, NoStaticComponents, StaticComponentProvider, WeakCollection,
};
pub use component::{into_handle, Component, ComponentBase, ComponentHandle};
pub use config::{ExhaustionPolicy, RegistryConfig, DEFAULT_SLOT_CAPACITY};
pub use error::{CollectionError, CollectionResult, RegistryError};
pub use pool::{Capabilities, CapabilityPool};
pub use registry::{Registry, RegistryStats};
pub use scope::{DisposalScope, ScopeId};
pub use slot::{SlotAllocator, SlotId, MAX_SLOT_CAPACITY};
