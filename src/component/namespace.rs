//! Component Namespaces and the Component Registry

use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::descriptor::ComponentDescriptor;
use super::error::{ComponentError, ComponentResult};
use super::traits::Component;
use crate::plugin::IsolationUnit;

/// Namespace of the runtime's own components
pub const RUNTIME_NAMESPACE: &str = "plinth::runtime";

/// A named set of component descriptors, in declaration order.
///
/// Namespaces built from a plugin retain its isolation unit so that component
/// code stays mapped for as long as the components live.
#[derive(Clone)]
pub struct ComponentNamespace {
    name: String,
    components: Vec<ComponentDescriptor>,
    retained: Option<Arc<dyn IsolationUnit>>,
}

impl ComponentNamespace {
    pub fn new<S: Into<String>>(name: S, components: Vec<ComponentDescriptor>) -> Self {
        Self {
            name: name.into(),
            components,
            retained: None,
        }
    }

    pub fn empty<S: Into<String>>(name: S) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn with(mut self, descriptor: ComponentDescriptor) -> Self {
        self.components.push(descriptor);
        self
    }

    /// Keep `unit` alive alongside every component created from this namespace
    pub fn retaining(mut self, unit: Arc<dyn IsolationUnit>) -> Self {
        self.retained = Some(unit);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn components(&self) -> &[ComponentDescriptor] {
        &self.components
    }

    pub fn retained_unit(&self) -> Option<&Arc<dyn IsolationUnit>> {
        self.retained.as_ref()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl fmt::Debug for ComponentNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentNamespace")
            .field("name", &self.name)
            .field("components", &self.components.len())
            .field("retained", &self.retained.is_some())
            .finish()
    }
}

/// A created component as stored in the registry
#[derive(Clone)]
pub struct RegisteredComponent {
    // Declared first so the instance drops before the unit holding its code
    instance: Arc<dyn Component>,
    type_name: &'static str,
    namespace: String,
    _unit: Option<Arc<dyn IsolationUnit>>,
}

impl RegisteredComponent {
    pub fn instance(&self) -> &Arc<dyn Component> {
        &self.instance
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

/// Concurrent name to instance map; names are unique per runtime
#[derive(Default)]
pub struct ComponentRegistry {
    components: DashMap<String, RegisteredComponent>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// Insert under `name`, refusing names already taken
    pub fn insert(
        &self,
        name: &str,
        instance: Arc<dyn Component>,
        type_name: &'static str,
        namespace: &ComponentNamespace,
    ) -> ComponentResult<()> {
        match self.components.entry(name.to_string()) {
            Entry::Occupied(_) => Err(ComponentError::name_conflict(name)),
            Entry::Vacant(slot) => {
                slot.insert(RegisteredComponent {
                    instance,
                    type_name,
                    namespace: namespace.name().to_string(),
                    _unit: namespace.retained_unit().cloned(),
                });
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Component>> {
        self.components.get(name).map(|entry| Arc::clone(entry.value().instance()))
    }

    /// Typed lookup
    pub fn get_as<T: Component>(&self, name: &str) -> Option<Arc<T>> {
        self.get(name)?.into_any_arc().downcast::<T>().ok()
    }

    pub fn entry(&self, name: &str) -> Option<RegisteredComponent> {
        self.components.get(name).map(|entry| entry.value().clone())
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.components.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Names registered from `namespace`, sorted
    pub fn names_in(&self, namespace: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .components
            .iter()
            .filter(|e| e.value().namespace() == namespace)
            .map(|e| e.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
