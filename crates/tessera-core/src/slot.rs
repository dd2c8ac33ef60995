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

//! Identity slots and their recycling allocator.

use crate::config::ExhaustionPolicy;
use crate::error::RegistryError;
use std::collections::VecDeque;
use std::fmt;

/// A small, recyclable integer identifying one live collection.
///
/// Capability pools are plain arrays indexed by this value, which is what makes
/// a lookup a single index operation. Unlike an entity id it carries no
/// generation: a slot must not be used after its collection is disposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u32);

impl SlotId {
    /// The slot handed out by [`ExhaustionPolicy::Sentinel`] when the pool is exhausted.
    pub const SENTINEL: SlotId = SlotId(0);

    /// Creates a slot id from a raw index.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns the index as a `usize`, for addressing pool storage.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The largest number of slots an allocator manages; slot ids are `u32`.
pub const MAX_SLOT_CAPACITY: usize = u32::MAX as usize;

/// Clamps a requested capacity to what `u32` slot ids can address.
fn clamp_capacity(capacity: usize) -> usize {
    if u32::try_from(capacity).is_ok() {
        return capacity;
    }
    log::warn!("Requested {capacity} identity slots; clamping to {MAX_SLOT_CAPACITY}.");
    MAX_SLOT_CAPACITY
}

/// Manages the free list of identity slots.
///
/// Free slots are handed out in FIFO order, so a released slot is reused only
/// after every other free slot has been taken. `held` mirrors the free list
/// for constant-time double-release detection.
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    /// Slots available for acquisition, oldest first.
    free: VecDeque<u32>,
    /// `held[i]` is `true` while slot `i` belongs to a collection.
    held: Vec<bool>,
    /// Number of `true` entries in `held`.
    in_use: usize,
    policy: ExhaustionPolicy,
}

impl SlotAllocator {
    /// Creates an allocator managing slots `0..capacity`.
    ///
    /// A capacity beyond [`MAX_SLOT_CAPACITY`] is clamped.
    pub fn new(capacity: usize, policy: ExhaustionPolicy) -> Self {
        let capacity = clamp_capacity(capacity);
        Self {
            free: (0..capacity as u32).collect(),
            held: vec![false; capacity],
            in_use: 0,
            policy,
        }
    }

    /// Takes a free slot.
    ///
    /// When every slot is held the configured [`ExhaustionPolicy`] decides:
    /// fail, grow the pool, or alias the sentinel slot.
    pub fn acquire(&mut self) -> Result<SlotId, RegistryError> {
        if let Some(index) = self.free.pop_front() {
            self.held[index as usize] = true;
            self.in_use += 1;
            log::trace!("Acquired identity slot #{index}.");
            return Ok(SlotId(index));
        }

        let capacity = self.capacity();
        let can_grow = capacity < MAX_SLOT_CAPACITY;
        match self.policy {
            ExhaustionPolicy::Grow if can_grow => {
                let grown = capacity
                    .saturating_mul(2)
                    .max(capacity + 1)
                    .min(MAX_SLOT_CAPACITY);
                self.held.resize(grown, false);
                self.free.extend(capacity as u32 + 1..grown as u32);
                self.held[capacity] = true;
                self.in_use += 1;
                log::debug!("Identity slot pool grown from {capacity} to {grown} slots.");
                Ok(SlotId(capacity as u32))
            }
            ExhaustionPolicy::Fail | ExhaustionPolicy::Grow => {
                log::error!("Identity slot pool exhausted: all {capacity} slots are held.");
                Err(RegistryError::SlotsExhausted { capacity })
            }
            ExhaustionPolicy::Sentinel => {
                log::error!(
                    "Identity slot pool exhausted: all {capacity} slots are held. \
                     Aliasing sentinel slot {}.",
                    SlotId::SENTINEL
                );
                Ok(SlotId::SENTINEL)
            }
        }
    }

    /// Returns a held slot to the free list.
    ///
    /// Releasing a free or unknown slot is logged and leaves the allocator untouched.
    pub fn release(&mut self, slot: SlotId) -> Result<(), RegistryError> {
        let capacity = self.capacity();
        match self.held.get_mut(slot.index()) {
            None => {
                log::error!("Identity slot {slot} released but the allocator manages {capacity} slots.");
                Err(RegistryError::SlotOutOfRange { slot, capacity })
            }
            Some(false) => {
                log::error!("Identity slot {slot} released twice.");
                Err(RegistryError::DoubleRelease { slot })
            }
            Some(held) => {
                *held = false;
                self.in_use -= 1;
                self.free.push_back(slot.raw());
                log::trace!("Released identity slot {slot}.");
                Ok(())
            }
        }
    }

    /// Returns `true` if `slot` is currently held.
    pub fn is_held(&self, slot: SlotId) -> bool {
        self.held.get(slot.index()).copied().unwrap_or(false)
    }

    /// Returns the number of slots managed by the allocator.
    pub fn capacity(&self) -> usize {
        self.held.len()
    }

    /// Returns the number of slots currently held.
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Returns the number of slots available without applying the exhaustion policy.
    pub fn available(&self) -> usize {
        self.free.len()
    }
}
