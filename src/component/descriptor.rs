//! Component Descriptors
//!
//! Components are declared explicitly: a [`ComponentDescriptor`] names the
//! component type, how to construct it, its [`ComponentMarker`], the markers on
//! the class and on each described method, and, for resolver components, the
//! marker they resolve.

use std::any::{type_name, Any, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use super::error::{ComponentError, ComponentResult};
use super::traits::Component;

/// Identifier of a marker, such as `exception-handler`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(Cow<'static, str>);

impl MarkerId {
    pub const fn from_static(id: &'static str) -> Self {
        MarkerId(Cow::Borrowed(id))
    }

    pub fn new<S: Into<String>>(id: S) -> Self {
        MarkerId(Cow::Owned(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for MarkerId {
    fn from(id: &'static str) -> Self {
        MarkerId::from_static(id)
    }
}

/// A marker attached to a component class or method, with an optional value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    id: MarkerId,
    value: Option<String>,
}

impl Marker {
    pub fn new<I: Into<MarkerId>>(id: I) -> Self {
        Self { id: id.into(), value: None }
    }

    pub fn with_value<I: Into<MarkerId>, V: Into<String>>(id: I, value: V) -> Self {
        Self {
            id: id.into(),
            value: Some(value.into()),
        }
    }

    pub fn id(&self) -> &MarkerId {
        &self.id
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// Name override and creation order of a component
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentMarker {
    pub name: Option<String>,
    pub order: i32,
}

/// A parameter type with assignability checks
#[derive(Clone, Copy)]
pub struct ParamType {
    id: Option<TypeId>,
    name: &'static str,
}

impl ParamType {
    pub fn of<T: Any>() -> Self {
        Self {
            id: Some(TypeId::of::<T>()),
            name: simple_type_name(type_name::<T>()),
        }
    }

    /// A parameter accepting an argument of any type
    pub const fn any() -> Self {
        Self { id: None, name: "_" }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether an argument of type `argument` may be passed to this parameter
    pub fn is_assignable_from(&self, argument: &ParamType) -> bool {
        match (self.id, argument.id) {
            (None, _) => true,
            (Some(expected), Some(actual)) => expected == actual,
            (Some(_), None) => false,
        }
    }
}

impl PartialEq for ParamType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Render a parameter list as `A, B, C`
pub fn describe_params(params: &[ParamType]) -> String {
    params.iter().map(ParamType::name).collect::<Vec<_>>().join(", ")
}

pub type Invoker = Arc<dyn Fn(&dyn Component, &[&dyn Any]) -> ComponentResult<()> + Send + Sync>;

/// A callable method on a component, described for method resolvers
#[derive(Clone)]
pub struct MethodDescriptor {
    name: String,
    params: Vec<ParamType>,
    markers: Vec<Marker>,
    invoker: Invoker,
}

impl MethodDescriptor {
    pub fn new<S: Into<String>>(name: S, params: Vec<ParamType>, invoker: Invoker) -> Self {
        Self {
            name: name.into(),
            params,
            markers: Vec::new(),
            invoker,
        }
    }

    /// Describe a one-argument method of `C`
    pub fn unary<C, A, F>(name: &str, method: F) -> Self
    where
        C: Component,
        A: Any,
        F: Fn(&C, &A) -> ComponentResult<()> + Send + Sync + 'static,
    {
        let method_name = name.to_string();
        let invoker: Invoker = Arc::new(move |component: &dyn Component, args: &[&dyn Any]| {
            let target = downcast_receiver::<C>(&method_name, component)?;
            check_arity(&method_name, args, 1)?;
            let a = downcast_arg::<A>(&method_name, args[0], 0)?;
            method(target, a)
        });
        Self::new(name, vec![ParamType::of::<A>()], invoker)
    }

    /// Describe a two-argument method of `C`
    pub fn binary<C, A, B, F>(name: &str, method: F) -> Self
    where
        C: Component,
        A: Any,
        B: Any,
        F: Fn(&C, &A, &B) -> ComponentResult<()> + Send + Sync + 'static,
    {
        let method_name = name.to_string();
        let invoker: Invoker = Arc::new(move |component: &dyn Component, args: &[&dyn Any]| {
            let target = downcast_receiver::<C>(&method_name, component)?;
            check_arity(&method_name, args, 2)?;
            let a = downcast_arg::<A>(&method_name, args[0], 0)?;
            let b = downcast_arg::<B>(&method_name, args[1], 1)?;
            method(target, a, b)
        });
        Self::new(name, vec![ParamType::of::<A>(), ParamType::of::<B>()], invoker)
    }

    pub fn marked(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ParamType] {
        &self.params
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn invoke(&self, component: &dyn Component, args: &[&dyn Any]) -> ComponentResult<()> {
        (self.invoker)(component, args)
    }

    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("markers", &self.markers)
            .finish()
    }
}

fn downcast_receiver<'a, C: Component>(method: &str, component: &'a dyn Component) -> ComponentResult<&'a C> {
    component.as_any().downcast_ref::<C>().ok_or_else(|| {
        ComponentError::invocation_failed(method, format!("receiver is not a {}", type_name::<C>()))
    })
}

fn downcast_arg<'a, T: Any>(method: &str, arg: &'a dyn Any, position: usize) -> ComponentResult<&'a T> {
    arg.downcast_ref::<T>().ok_or_else(|| {
        ComponentError::invocation_failed(
            method,
            format!("argument {} is not a {}", position, simple_type_name(type_name::<T>())),
        )
    })
}

fn check_arity(method: &str, args: &[&dyn Any], expected: usize) -> ComponentResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ComponentError::invocation_failed(
            method,
            format!("expected {} arguments, got {}", expected, args.len()),
        ))
    }
}

pub type Constructor = Arc<dyn Fn() -> Arc<dyn Component> + Send + Sync>;

/// Everything the pipeline needs to create and wire one component type
#[derive(Clone)]
pub struct ComponentDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    marker: ComponentMarker,
    resolves: Option<MarkerId>,
    class_markers: Vec<Marker>,
    methods: Vec<MethodDescriptor>,
    constructor: Constructor,
}

impl ComponentDescriptor {
    /// Describe a component constructed with `Default`
    pub fn of<T: Component + Default>() -> Self {
        Self::with_constructor(T::default)
    }

    /// Describe a component built by `construct`
    pub fn with_constructor<T, F>(construct: F) -> Self
    where
        T: Component,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let constructor: Constructor = Arc::new(move || Arc::new(construct()) as Arc<dyn Component>);
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            marker: ComponentMarker::default(),
            resolves: None,
            class_markers: Vec::new(),
            methods: Vec::new(),
            constructor,
        }
    }

    /// Override the registration name
    pub fn named<S: Into<String>>(mut self, name: S) -> Self {
        self.marker.name = Some(name.into());
        self
    }

    /// Creation order within a namespace; lower first
    pub fn order(mut self, order: i32) -> Self {
        self.marker.order = order;
        self
    }

    /// Attach a class marker
    pub fn marked(mut self, marker: Marker) -> Self {
        self.class_markers.push(marker);
        self
    }

    /// Declare the marker this resolver component resolves
    pub fn resolves<I: Into<MarkerId>>(mut self, target: I) -> Self {
        self.resolves = Some(target.into());
        self
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Type name without its module path
    pub fn simple_name(&self) -> &'static str {
        simple_type_name(self.type_name)
    }

    /// Name the component registers under
    pub fn component_name(&self) -> &str {
        self.marker.name.as_deref().unwrap_or_else(|| self.simple_name())
    }

    pub fn marker(&self) -> &ComponentMarker {
        &self.marker
    }

    pub fn creation_order(&self) -> i32 {
        self.marker.order
    }

    pub fn resolver_target(&self) -> Option<&MarkerId> {
        self.resolves.as_ref()
    }

    pub fn class_markers(&self) -> &[Marker] {
        &self.class_markers
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// Run the descriptor's own constructor
    pub fn construct(&self) -> Arc<dyn Component> {
        (self.constructor)()
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("type_name", &self.type_name)
            .field("marker", &self.marker)
            .field("resolves", &self.resolves)
            .field("class_markers", &self.class_markers)
            .field("methods", &self.methods)
            .finish()
    }
}

/// Last path segment of a type name, ignoring generic arguments
pub fn simple_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
