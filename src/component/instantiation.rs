//! Instantiation Strategies
//!
//! The pipeline never calls constructors directly. An [`InstantiationStrategy`]
//! decides how a descriptor becomes an instance; the default one prefers a
//! factory registered for the component type and falls back to the
//! descriptor's own constructor.

use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;
use log::debug;

use super::descriptor::{ComponentDescriptor, Constructor};
use super::error::{ComponentError, ComponentResult};
use super::traits::Component;
use crate::errors::handler::{contain, panic_message};

pub trait InstantiationStrategy: Send + Sync {
    fn instantiate(&self, descriptor: &ComponentDescriptor) -> ComponentResult<Arc<dyn Component>>;
}

/// Per-type factories with constructor fallback
#[derive(Default)]
pub struct FactoryInstantiation {
    factories: DashMap<TypeId, Constructor>,
}

impl FactoryInstantiation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `factory` for every component of type `T`
    pub fn register_factory<T, F>(&self, factory: F)
    where
        T: Component,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let constructor: Constructor = Arc::new(move || Arc::new(factory()) as Arc<dyn Component>);
        debug!("Registered factory for {}", std::any::type_name::<T>());
        self.factories.insert(TypeId::of::<T>(), constructor);
    }

    pub fn has_factory(&self, type_id: TypeId) -> bool {
        self.factories.contains_key(&type_id)
    }
}

impl InstantiationStrategy for FactoryInstantiation {
    fn instantiate(&self, descriptor: &ComponentDescriptor) -> ComponentResult<Arc<dyn Component>> {
        let factory = self
            .factories
            .get(&descriptor.type_id())
            .map(|entry| Arc::clone(entry.value()));

        let outcome = contain(|| match &factory {
            Some(factory) => factory(),
            None => descriptor.construct(),
        });

        outcome.map_err(|payload| {
            ComponentError::construction_failed(descriptor.type_name(), panic_message(payload.as_ref()))
        })
    }
}
