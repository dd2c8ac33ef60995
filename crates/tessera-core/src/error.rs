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

//! Defines the error types of the registry and the collection lifecycle.
//!
//! Missing capabilities are never errors: queries return `None` or an empty
//! list. Errors are reserved for slot bookkeeping faults and lifecycle misuse.

use crate::slot::SlotId;
use thiserror::Error;

/// An error raised by the identity slot allocator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Every slot is held by a live collection and the pool may not grow.
    #[error("identity slot pool exhausted: all {capacity} slots are held")]
    SlotsExhausted {
        /// The number of slots managed by the allocator.
        capacity: usize,
    },
    /// The slot was released while already free.
    #[error("identity slot {slot} released while already free")]
    DoubleRelease {
        /// The slot that was released twice.
        slot: SlotId,
    },
    /// The slot lies outside the range managed by the allocator.
    #[error("identity slot {slot} is outside the allocator range (capacity {capacity})")]
    SlotOutOfRange {
        /// The offending slot.
        slot: SlotId,
        /// The number of slots managed by the allocator.
        capacity: usize,
    },
}

/// An error raised while registering or initializing the components of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    /// The collection has been disposed and accepts no further work.
    #[error("the collection has been disposed")]
    Disposed,
    /// The component already belongs to another collection.
    #[error("component `{component}` already belongs to another collection")]
    AlreadyOwned {
        /// The type name of the component.
        component: String,
    },
    /// The component has no live owner collection.
    #[error("the component is not registered in a live collection")]
    NoOwner,
    /// The component is borrowed elsewhere, typically because one of its
    /// own hooks is running.
    #[error("the component is busy and cannot be driven re-entrantly")]
    Busy,
    /// The identity slot allocator refused the request.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// A component hook reported a failure.
    #[error("component `{component}` failed: {message}")]
    Component {
        /// The type name of the component.
        component: String,
        /// A description of the failure.
        message: String,
    },
}

impl CollectionError {
    /// Builds a [`CollectionError::Component`] from a component name and a message.
    pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// A specialized `Result` type for collection operations.
pub type CollectionResult<T> = Result<T, CollectionError>;
