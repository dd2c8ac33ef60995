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

//! The application-facing layer of Tessera.
//! This crate builds collections end to end, attaches them to host objects,
//! and ships the stock installer and update-stream capabilities.

#![warn(missing_docs)]

pub mod factory;
pub mod host;
pub mod installer;
pub mod update;

pub use tessera_core;

/// Everything an application needs to assemble collections.
pub mod prelude {
    pub use crate::factory::{
        create_collection, create_collection_on_host, initialize_collection,
        register_and_initialize, OnRegister,
    };
    pub use crate::host::{HostObject, Scene};
    pub use crate::installer::{install_all, ComponentInstaller, Installer};
    pub use crate::update::{Subscription, UpdateDispatcher, UpdateHub, UpdateStream};
    pub use tessera_core::{
        into_handle, Capabilities, Collection, CollectionError, CollectionResult,
        CollectionState, Component, ComponentBase, ComponentHandle, DisposalScope,
        ExhaustionPolicy, Registry, RegistryConfig,
    };
}
