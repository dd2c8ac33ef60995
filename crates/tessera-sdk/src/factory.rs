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

//! Convenience constructors that take a collection from creation to initialized.

use crate::host::HostObject;
use anyhow::{Context, Result};
use tessera_core::{Collection, CollectionResult, ComponentHandle, Registry};

/// A callback run on a fresh collection before any component is registered.
///
/// Installers use it to inject capabilities the components will look up.
pub type OnRegister<'a> = &'a mut dyn FnMut(&Collection) -> Result<()>;

/// Creates a host-independent collection, registers `components` and initializes it.
pub fn create_collection<I>(
    registry: &Registry,
    components: I,
    on_register: Option<OnRegister<'_>>,
) -> Result<Collection>
where
    I: IntoIterator<Item = ComponentHandle>,
{
    let collection = Collection::new(registry);
    initialize_collection(&collection, components, on_register)
}

/// Builds the collection attached to `host` (creating it if needed), then
/// registers the host's components followed by `components` and initializes.
pub fn create_collection_on_host<I>(
    host: &HostObject,
    registry: &Registry,
    components: I,
    on_register: Option<OnRegister<'_>>,
) -> Result<Collection>
where
    I: IntoIterator<Item = ComponentHandle>,
{
    let collection = host.attach_collection(registry);
    initialize_collection(&collection, components, on_register)
        .with_context(|| format!("Failed to build the collection of host '{}'", host.name()))
}

/// Completes a freshly created collection.
///
/// The static components are extracted first, then `on_register` runs, then
/// the static components followed by the injected `components` are
/// registered and the collection is initialized.
pub fn initialize_collection<I>(
    collection: &Collection,
    components: I,
    on_register: Option<OnRegister<'_>>,
) -> Result<Collection>
where
    I: IntoIterator<Item = ComponentHandle>,
{
    let static_components = collection.extract_components();

    if let Some(on_register) = on_register {
        on_register(collection).context("The on_register callback failed")?;
    }

    register_and_initialize(collection, static_components.into_iter().chain(components))
        .context("Failed to register and initialize components")?;
    Ok(collection.clone())
}

/// Registers `components` in order, then initializes the collection.
pub fn register_and_initialize<I>(collection: &Collection, components: I) -> CollectionResult<()>
where
    I: IntoIterator<Item = ComponentHandle>,
{
    collection.register_all(components)?;
    collection.initialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tessera_core::{into_handle, CollectionState, Component, ComponentBase};

    struct Recorder {
        base: ComponentBase,
        label: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Component for Recorder {
        fn base(&self) -> &ComponentBase {
            &self.base
        }

        fn register(&mut self, _owner: &Collection) -> CollectionResult<()> {
            self.log.borrow_mut().push(format!("register {}", self.label));
            Ok(())
        }

        fn initialize(&mut self) -> CollectionResult<()> {
            self.log.borrow_mut().push(format!("initialize {}", self.label));
            Ok(())
        }
    }

    fn recorder(label: &'static str, log: &Rc<RefCell<Vec<String>>>) -> ComponentHandle {
        into_handle(Recorder {
            base: ComponentBase::new(),
            label,
            log: log.clone(),
        })
    }

    #[test]
    fn test_create_collection_registers_then_initializes() {
        let registry = Registry::default();
        let log = Rc::new(RefCell::new(Vec::new()));

        let collection =
            create_collection(&registry, [recorder("a", &log), recorder("b", &log)], None).unwrap();

        assert_eq!(collection.state(), CollectionState::Initialized);
        assert_eq!(
            *log.borrow(),
            vec!["register a", "register b", "initialize a", "initialize b"]
        );
    }

    #[test]
    fn test_on_register_runs_before_components() {
        let registry = Registry::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        let callback_log = log.clone();
        let mut on_register = move |collection: &Collection| -> Result<()> {
            callback_log.borrow_mut().push("on_register".to_string());
            collection.register_capability(42_u32)?;
            Ok(())
        };

        let callback: OnRegister<'_> = &mut on_register;

        let collection = create_collection(&registry, [recorder("a", &log)], Some(callback)).unwrap();

        assert_eq!(log.borrow()[0], "on_register");
        assert_eq!(collection.query_capability::<u32>(), Some(42));
    }

    #[test]
    fn test_failing_on_register_aborts() {
        let registry = Registry::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut on_register = |_: &Collection| -> Result<()> { anyhow::bail!("refused") };

        let callback: OnRegister<'_> = &mut on_register;

        let result = create_collection(&registry, [recorder("a", &log)], Some(callback));

        assert!(result.is_err());
        assert!(log.borrow().is_empty(), "No component should be registered");
    }

    #[test]
    fn test_static_components_come_first() {
        let registry = Registry::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        let host = HostObject::new("prefab");
        host.add_component(recorder("static", &log));

        create_collection_on_host(&host, &registry, [recorder("injected", &log)], None).unwrap();

        assert_eq!(
            &log.borrow()[..2],
            &["register static".to_string(), "register injected".to_string()]
        );
    }
}
