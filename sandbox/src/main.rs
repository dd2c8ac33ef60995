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

// Tessera Sandbox
// Builds a small scene, injects an update stream through an installer and
// runs a few frames.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::{Context, Result};
use tessera_sdk::prelude::*;

const FRAME_DT: f32 = 0.25;
const FRAMES: usize = 4;

/// Health exposed to sibling components.
trait Vitals {
    fn current(&self) -> f32;
    fn heal(&self, amount: f32);
}

struct HitPoints {
    current: Cell<f32>,
    max: f32,
}

impl Vitals for HitPoints {
    fn current(&self) -> f32 {
        self.current.get()
    }

    fn heal(&self, amount: f32) {
        self.current.set((self.current.get() + amount).min(self.max));
    }
}

struct HealthComponent {
    base: ComponentBase,
    vitals: Rc<HitPoints>,
}

impl HealthComponent {
    fn new(current: f32, max: f32) -> Self {
        Self {
            base: ComponentBase::new(),
            vitals: Rc::new(HitPoints {
                current: Cell::new(current),
                max,
            }),
        }
    }
}

impl Component for HealthComponent {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn register(&mut self, owner: &Collection) -> CollectionResult<()> {
        owner.register_capability::<Rc<dyn Vitals>>(self.vitals.clone())
    }
}

/// Heals its sibling every frame, driven by whatever update stream was installed.
struct RegenerationComponent {
    base: ComponentBase,
    per_second: f32,
}

impl RegenerationComponent {
    fn new(per_second: f32) -> Self {
        Self {
            base: ComponentBase::new(),
            per_second,
        }
    }
}

impl Component for RegenerationComponent {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn initialize(&mut self) -> CollectionResult<()> {
        let owner = self.base.require_owner()?;
        let (Some(vitals), Some(stream)) = (
            owner.require_capability::<Rc<dyn Vitals>>(),
            owner.require_capability::<Rc<dyn UpdateStream>>(),
        ) else {
            return Err(CollectionError::component(
                self.name(),
                "needs Vitals and an UpdateStream",
            ));
        };

        let per_second = self.per_second;
        stream
            .on_update(0, move |dt| vitals.heal(per_second * dt))
            .bind_to(self.base.scope());
        Ok(())
    }
}

fn registry_config() -> Result<RegistryConfig> {
    let mut config = RegistryConfig::default();
    if let Ok(raw) = std::env::var("TESSERA_SLOT_CAPACITY") {
        let capacity = raw
            .parse::<usize>()
            .with_context(|| format!("TESSERA_SLOT_CAPACITY is not a number: '{raw}'"))?;
        config = config.with_slot_capacity(capacity);
    }
    Ok(config)
}

fn log_vitals(label: &str, collection: &Collection) {
    match collection.query_capability::<Rc<dyn Vitals>>() {
        Some(vitals) => log::info!("  {label}: {:.2} hp", vitals.current()),
        None => log::info!("  {label}: no vitals"),
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = registry_config()?;
    log::info!("Starting sandbox with {config:?}");
    let registry = Registry::new(config);

    // The systems collection owns the frame clock and the installer.
    let dispatcher = UpdateDispatcher::new();
    let clock = dispatcher.hub();
    let stream_hub = clock.clone();
    let installer = Rc::new(RefCell::new(ComponentInstaller::new(
        move |target: &Collection| -> Result<()> {
            target.register_capability::<Rc<dyn UpdateStream>>(Rc::new(stream_hub.clone()))?;
            Ok(())
        },
    )));
    let installer_handle: ComponentHandle = installer.clone();
    let systems = create_collection(&registry, [into_handle(dispatcher), installer_handle], None)?;

    // Pre-placed hosts, not yet started.
    let mut scene = Scene::new();
    for (name, hp) in [("knight", 40.0), ("slime", 5.0)] {
        let host = HostObject::new(name);
        host.add_component(into_handle(HealthComponent::new(hp, 100.0)));
        host.add_component(into_handle(RegenerationComponent::new(4.0)));
        host.attach_collection(&registry);
        scene.add_root(host);
    }

    let reached = installer.borrow().awake(&scene)?;
    log::info!("Installer prepared {reached} placed collection(s).");
    scene.start(&registry)?;

    // A spawned collection gets the same features through the factory.
    let mut install = |target: &Collection| install_all(&systems, target);
    let on_register: OnRegister<'_> = &mut install;
    let spawned = create_collection(
        &registry,
        [
            into_handle(HealthComponent::new(90.0, 100.0)),
            into_handle(RegenerationComponent::new(20.0)),
        ],
        Some(on_register),
    )?;

    for frame in 1..=FRAMES {
        clock.tick(FRAME_DT);
        log::info!("Frame {frame}:");
        for host in scene.roots() {
            if let Some(collection) = host.collection() {
                log_vitals(host.name(), &collection);
            }
        }
        log_vitals("spawned", &spawned);
    }

    log::info!("Registry before teardown: {:?}", registry.stats());
    spawned.dispose();
    scene.destroy();
    systems.dispose();
    log::info!("Registry after teardown: {:?}", registry.stats());

    Ok(())
}
