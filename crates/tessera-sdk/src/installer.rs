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

//! Feature injection into collections that have not been initialized yet.

use crate::host::Scene;
use anyhow::{Context, Result};
use std::rc::Rc;
use tessera_core::{Collection, CollectionResult, Component, ComponentBase};

/// A capability that injects features into another collection.
///
/// Installing typically registers capabilities (or components) on a
/// collection before its own components run `initialize`, so they can find
/// what the installer provides.
pub trait Installer {
    /// Installs this installer's features into `target`.
    fn install_into(&self, target: &Collection) -> Result<()>;
}

impl<F> Installer for F
where
    F: Fn(&Collection) -> Result<()>,
{
    fn install_into(&self, target: &Collection) -> Result<()> {
        self(target)
    }
}

/// Runs every [`Installer`] capability published in `source` against `target`.
///
/// Meant as a factory `on_register` callback, so features land before the
/// target's components register.
pub fn install_all(source: &Collection, target: &Collection) -> Result<()> {
    for installer in &source.query_capabilities::<Rc<dyn Installer>>() {
        installer.install_into(target)?;
    }
    Ok(())
}

/// A component that publishes an [`Installer`] capability and can push its
/// features into the collections already placed in a scene.
pub struct ComponentInstaller {
    base: ComponentBase,
    features: Rc<dyn Installer>,
}

impl ComponentInstaller {
    /// Creates an installer component around `features`.
    pub fn new(features: impl Installer + 'static) -> Self {
        Self {
            base: ComponentBase::new(),
            features: Rc::new(features),
        }
    }

    /// Returns the installer published by this component.
    pub fn installer(&self) -> Rc<dyn Installer> {
        self.features.clone()
    }

    /// Installs into `target`.
    pub fn install_into(&self, target: &Collection) -> Result<()> {
        self.features.install_into(target)
    }

    /// Installs into every collection of `scene` that is not initialized yet.
    ///
    /// Returns how many collections received the features. The first failure
    /// stops the pass.
    pub fn awake(&self, scene: &Scene) -> Result<usize> {
        let pending = scene.pending_collections();
        for (index, collection) in pending.iter().enumerate() {
            self.install_into(collection)
                .with_context(|| format!("Failed to install into pending collection #{index}"))?;
        }
        log::debug!("Installer reached {} pending collection(s).", pending.len());
        Ok(pending.len())
    }
}

impl Component for ComponentInstaller {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn register(&mut self, owner: &Collection) -> CollectionResult<()> {
        owner.register_capability(self.installer())
    }
}
