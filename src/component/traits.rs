//! Component and Resolver Traits

use std::any::Any;
use std::sync::Arc;

use super::descriptor::{describe_params, ComponentDescriptor, Marker, MethodDescriptor, ParamType};
use super::error::{ComponentError, ComponentResult};
use crate::errors::ErrorHandlerRegistry;
use crate::events::{LifecycleBus, LifecycleEvent, Subscriber};

/// Downcasting support for components
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A host or plugin building block created by the pipeline.
///
/// Components opt into resolver or subscriber roles by overriding the
/// accessors below.
pub trait Component: AsAny {
    fn as_class_resolver(&self) -> Option<&dyn ClassResolver> {
        None
    }

    fn as_method_resolver(&self) -> Option<&dyn MethodResolver> {
        None
    }

    fn as_subscriber(self: Arc<Self>) -> Option<Arc<dyn Subscriber<LifecycleEvent>>> {
        None
    }
}

/// What resolvers may touch while wiring a component
pub struct ResolveContext<'a> {
    pub bus: &'a Arc<LifecycleBus>,
    pub errors: &'a Arc<ErrorHandlerRegistry>,
    /// Registered name of the component being wired
    pub component_name: &'a str,
}

/// Wires components carrying a class marker
pub trait ClassResolver: Send + Sync {
    fn resolve_class(
        &self,
        ctx: &ResolveContext<'_>,
        component: &Arc<dyn Component>,
        descriptor: &ComponentDescriptor,
        marker: &Marker,
    ) -> ComponentResult<()>;
}

/// Wires methods carrying a method marker
pub trait MethodResolver: Send + Sync {
    fn resolve_method(
        &self,
        ctx: &ResolveContext<'_>,
        component: &Arc<dyn Component>,
        method: &MethodDescriptor,
        marker: &Marker,
    ) -> ComponentResult<()>;

    /// Check that `method` takes exactly `expected`, position by position
    fn check_argument_shape(&self, method: &MethodDescriptor, expected: &[ParamType]) -> ComponentResult<()> {
        let params = method.params();
        let fits = params.len() == expected.len()
            && params
                .iter()
                .zip(expected)
                .all(|(param, argument)| param.is_assignable_from(argument));

        if fits {
            Ok(())
        } else {
            Err(ComponentError::shape_mismatch(
                method.name(),
                describe_params(expected),
                describe_params(params),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ShapeOnly;

    impl MethodResolver for ShapeOnly {
        fn resolve_method(
            &self,
            _ctx: &ResolveContext<'_>,
            _component: &Arc<dyn Component>,
            _method: &MethodDescriptor,
            _marker: &Marker,
        ) -> ComponentResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Target;

    impl Component for Target {}

    fn two_args(_: &Target, _: &u32, _: &String) -> ComponentResult<()> {
        Ok(())
    }

    #[test]
    fn test_shape_accepts_exact_match() {
        let method = MethodDescriptor::binary::<Target, u32, String, _>("two", two_args);
        let expected = [ParamType::of::<u32>(), ParamType::of::<String>()];
        assert!(ShapeOnly.check_argument_shape(&method, &expected).is_ok());
    }

    #[test]
    fn test_shape_rejects_count_mismatch() {
        let method = MethodDescriptor::binary::<Target, u32, String, _>("two", two_args);
        let err = ShapeOnly
            .check_argument_shape(&method, &[ParamType::of::<u32>()])
            .unwrap_err();
        assert!(matches!(err, ComponentError::ArgumentShapeMismatch { .. }));
    }

    #[test]
    fn test_shape_rejects_position_mismatch() {
        let method = MethodDescriptor::binary::<Target, u32, String, _>("two", two_args);
        let swapped = [ParamType::of::<String>(), ParamType::of::<u32>()];
        let err = ShapeOnly.check_argument_shape(&method, &swapped).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Method 'two' expects (u32, String), resolver requires (String, u32)"
        );
    }

    #[test]
    fn test_default_roles_are_absent() {
        let component: Arc<dyn Component> = Arc::new(Target);
        assert!(component.as_class_resolver().is_none());
        assert!(component.as_method_resolver().is_none());
        assert!((*component).as_any().is::<Target>());
        assert!(component.as_subscriber().is_none());
    }
}
