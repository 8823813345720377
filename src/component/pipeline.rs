//! Component Creation Pipeline
//!
//! Creates components in a deterministic order and wires them through
//! resolvers. Resolvers are themselves components: creating one registers it
//! for its declared marker, so later components in the same or subsequent
//! namespaces are wired by it.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, info, warn};

use super::descriptor::{ComponentDescriptor, MarkerId};
use super::error::{ComponentError, ComponentResult};
use super::instantiation::{FactoryInstantiation, InstantiationStrategy};
use super::namespace::{ComponentNamespace, ComponentRegistry};
use super::traits::{Component, ResolveContext};
use crate::errors::handler::{contain, panic_message};
use crate::errors::{ErrorHandlerRegistry, RuntimeError};
use crate::events::{EventEnvelope, LifecycleBus, LifecycleEvent, LifecycleEventKind};
use crate::guard::{verify_token, CallerFilter, OrchestratorToken};

const CREATE_ALL_CALLERS: &[CallerFilter] = &[CallerFilter::exact("Runtime", "start")];

/// A resolver as held in the resolver tables
#[derive(Clone)]
struct ResolverEntry {
    name: String,
    component: Arc<dyn Component>,
}

/// Result of creating one component during `create_all`
#[derive(Debug, Clone)]
pub struct CreationOutcome {
    pub type_name: &'static str,
    /// Registered name on success
    pub result: ComponentResult<String>,
}

impl CreationOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct ComponentPipeline {
    registry: ComponentRegistry,
    class_resolvers: DashMap<MarkerId, ResolverEntry>,
    method_resolvers: DashMap<MarkerId, ResolverEntry>,
    strategy: Arc<dyn InstantiationStrategy>,
    bus: Arc<LifecycleBus>,
    errors: Arc<ErrorHandlerRegistry>,
}

impl ComponentPipeline {
    pub fn new(bus: Arc<LifecycleBus>, errors: Arc<ErrorHandlerRegistry>) -> Self {
        Self::with_strategy(bus, errors, Arc::new(FactoryInstantiation::new()))
    }

    pub fn with_strategy(
        bus: Arc<LifecycleBus>,
        errors: Arc<ErrorHandlerRegistry>,
        strategy: Arc<dyn InstantiationStrategy>,
    ) -> Self {
        Self {
            registry: ComponentRegistry::new(),
            class_resolvers: DashMap::new(),
            method_resolvers: DashMap::new(),
            strategy,
            bus,
            errors,
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Markers that currently have a class resolver, sorted
    pub fn class_markers(&self) -> Vec<MarkerId> {
        let mut markers: Vec<MarkerId> = self.class_resolvers.iter().map(|e| e.key().clone()).collect();
        markers.sort();
        markers
    }

    /// Markers that currently have a method resolver, sorted
    pub fn method_markers(&self) -> Vec<MarkerId> {
        let mut markers: Vec<MarkerId> = self.method_resolvers.iter().map(|e| e.key().clone()).collect();
        markers.sort();
        markers
    }

    /// Create one component outside of any plugin namespace
    pub fn create(&self, descriptor: &ComponentDescriptor) -> ComponentResult<Arc<dyn Component>> {
        self.create_in(descriptor, &ComponentNamespace::empty("detached"))
    }

    /// Create one component as a member of `namespace`
    pub fn create_in(
        &self,
        descriptor: &ComponentDescriptor,
        namespace: &ComponentNamespace,
    ) -> ComponentResult<Arc<dyn Component>> {
        let name = descriptor.component_name().to_string();
        if self.registry.contains(&name) {
            return Err(ComponentError::name_conflict(name));
        }

        let pre = EventEnvelope::new(LifecycleEvent::pre(LifecycleEventKind::ComponentLoad {
            name: name.clone(),
            type_name: descriptor.type_name(),
        }));
        self.bus.publish(pre.clone());

        let instance = self.strategy.instantiate(descriptor)?;
        let is_resolver =
            instance.as_class_resolver().is_some() || instance.as_method_resolver().is_some();
        // A resolver without a target never enters the registry
        let target = match (is_resolver, descriptor.resolver_target()) {
            (true, None) => return Err(ComponentError::missing_resolver_target(descriptor.type_name())),
            (_, target) => target,
        };

        self.registry
            .insert(&name, Arc::clone(&instance), descriptor.type_name(), namespace)?;
        debug!("Created component '{}' ({})", name, descriptor.type_name());

        if let (true, Some(target)) = (is_resolver, target) {
            self.register_resolver(&name, target, &instance);
        } else {
            self.dispatch(&name, descriptor, &instance);
        }

        self.bus.publish(pre.follow(pre.event().to_post()));
        Ok(instance)
    }

    /// Create every component of `namespace` in declared order.
    ///
    /// One failing component does not stop the pass; each outcome is reported.
    pub fn create_all(
        &self,
        token: &OrchestratorToken,
        namespace: &ComponentNamespace,
    ) -> ComponentResult<Vec<CreationOutcome>> {
        verify_token(token, CREATE_ALL_CALLERS)?;

        let pre = EventEnvelope::new(LifecycleEvent::pre(LifecycleEventKind::CreateAll {
            namespace: namespace.name().to_string(),
        }));
        self.bus.publish(pre.clone());

        let mut ordered: Vec<&ComponentDescriptor> = namespace.components().iter().collect();
        ordered.sort_by_key(|descriptor| descriptor.creation_order());

        let mut outcomes = Vec::with_capacity(ordered.len());
        for descriptor in ordered {
            let result = self
                .create_in(descriptor, namespace)
                .map(|_| descriptor.component_name().to_string());
            if let Err(e) = &result {
                warn!("Component {} in '{}' not created: {}", descriptor.type_name(), namespace.name(), e);
            }
            outcomes.push(CreationOutcome {
                type_name: descriptor.type_name(),
                result,
            });
        }

        let created = outcomes.iter().filter(|o| o.is_ok()).count();
        info!("Created {}/{} components in '{}'", created, outcomes.len(), namespace.name());
        self.bus.publish(pre.follow(pre.event().to_post()));
        Ok(outcomes)
    }

    fn register_resolver(&self, name: &str, target: &MarkerId, instance: &Arc<dyn Component>) {
        let entry = ResolverEntry {
            name: name.to_string(),
            component: Arc::clone(instance),
        };
        if instance.as_class_resolver().is_some() {
            Self::claim(&self.class_resolvers, target, entry.clone());
        }
        if instance.as_method_resolver().is_some() {
            Self::claim(&self.method_resolvers, target, entry);
        }
    }

    fn claim(table: &DashMap<MarkerId, ResolverEntry>, target: &MarkerId, entry: ResolverEntry) {
        match table.entry(target.clone()) {
            Entry::Occupied(existing) => {
                let conflict = ComponentError::resolver_conflict(target.as_str(), &existing.get().name);
                warn!("{}; keeping {}, ignoring {}", conflict, existing.get().name, entry.name);
            }
            Entry::Vacant(slot) => {
                debug!("Resolver '{}' registered for marker '{}'", entry.name, target);
                slot.insert(entry);
            }
        }
    }

    /// Hand the new component to every resolver matching one of its markers
    fn dispatch(&self, name: &str, descriptor: &ComponentDescriptor, instance: &Arc<dyn Component>) {
        let ctx = ResolveContext {
            bus: &self.bus,
            errors: &self.errors,
            component_name: name,
        };

        for marker in descriptor.class_markers() {
            let resolver = self.class_resolvers.get(marker.id()).map(|e| e.value().clone());
            let Some(resolver) = resolver else {
                debug!("No class resolver for marker '{}' on '{}'", marker.id(), name);
                continue;
            };
            let outcome = contain(|| match resolver.component.as_class_resolver() {
                Some(r) => r.resolve_class(&ctx, instance, descriptor, marker),
                None => Ok(()),
            });
            self.report(&resolver.name, name, outcome);
        }

        for method in descriptor.methods() {
            for marker in method.markers() {
                let resolver = self.method_resolvers.get(marker.id()).map(|e| e.value().clone());
                let Some(resolver) = resolver else {
                    debug!("No method resolver for marker '{}' on '{}::{}'", marker.id(), name, method.name());
                    continue;
                };
                let outcome = contain(|| match resolver.component.as_method_resolver() {
                    Some(r) => r.resolve_method(&ctx, instance, method, marker),
                    None => Ok(()),
                });
                self.report(&resolver.name, name, outcome);
            }
        }
    }

    fn report(
        &self,
        resolver: &str,
        component: &str,
        outcome: std::thread::Result<ComponentResult<()>>,
    ) {
        let failure = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => ComponentError::resolver_failed(resolver, component, e.to_string()),
            Err(payload) => ComponentError::resolver_failed(
                resolver,
                component,
                format!("panicked: {}", panic_message(payload.as_ref())),
            ),
        };
        warn!("{}", failure);
        self.errors.handle_current(&RuntimeError::from(failure));
    }
}
