//! Component Error Types

use thiserror::Error;

use crate::errors::ErrorKind;
use crate::guard::GuardError;

/// Result type for component pipeline operations
pub type ComponentResult<T> = Result<T, ComponentError>;

#[derive(Error, Debug, Clone)]
pub enum ComponentError {
    /// A component is already registered under this name
    #[error("Component name already in use: {name}")]
    NameConflict { name: String },

    /// A method's parameters do not fit the shape a resolver needs
    #[error("Method '{method}' expects ({actual}), resolver requires ({expected})")]
    ArgumentShapeMismatch {
        method: String,
        expected: String,
        actual: String,
    },

    /// The component constructor or factory failed
    #[error("Failed to construct {type_name}: {message}")]
    ConstructionFailed { type_name: String, message: String },

    /// A resolver component declared no marker to resolve
    #[error("Resolver {type_name} declares no resolver target")]
    MissingResolverTarget { type_name: String },

    /// Another resolver already claimed the marker
    #[error("Marker '{marker}' is already resolved by {existing}")]
    ResolverConflict { marker: String, existing: String },

    /// A resolver failed while wiring a component
    #[error("Resolver {resolver} failed on component '{component}': {message}")]
    ResolverFailed {
        resolver: String,
        component: String,
        message: String,
    },

    /// A described method could not be invoked with the given arguments
    #[error("Invocation of '{method}' failed: {message}")]
    InvocationFailed { method: String, message: String },

    #[error(transparent)]
    Unauthorized(#[from] GuardError),
}

impl ComponentError {
    pub fn name_conflict<S: Into<String>>(name: S) -> Self {
        Self::NameConflict { name: name.into() }
    }

    pub fn shape_mismatch<M, E, A>(method: M, expected: E, actual: A) -> Self
    where
        M: Into<String>,
        E: Into<String>,
        A: Into<String>,
    {
        Self::ArgumentShapeMismatch {
            method: method.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn construction_failed<T: Into<String>, S: Into<String>>(type_name: T, message: S) -> Self {
        Self::ConstructionFailed {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    pub fn missing_resolver_target<T: Into<String>>(type_name: T) -> Self {
        Self::MissingResolverTarget { type_name: type_name.into() }
    }

    pub fn resolver_conflict<M: Into<String>, E: Into<String>>(marker: M, existing: E) -> Self {
        Self::ResolverConflict {
            marker: marker.into(),
            existing: existing.into(),
        }
    }

    pub fn resolver_failed<R, C, S>(resolver: R, component: C, message: S) -> Self
    where
        R: Into<String>,
        C: Into<String>,
        S: Into<String>,
    {
        Self::ResolverFailed {
            resolver: resolver.into(),
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn invocation_failed<M: Into<String>, S: Into<String>>(method: M, message: S) -> Self {
        Self::InvocationFailed {
            method: method.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ComponentError::NameConflict { .. } => ErrorKind::ComponentNameConflict,
            ComponentError::ArgumentShapeMismatch { .. } => ErrorKind::ArgumentShapeMismatch,
            ComponentError::ConstructionFailed { .. } => ErrorKind::ComponentConstructionFailed,
            ComponentError::MissingResolverTarget { .. } => ErrorKind::MissingResolverTarget,
            ComponentError::ResolverConflict { .. } => ErrorKind::ResolverConflict,
            ComponentError::ResolverFailed { .. } => ErrorKind::ResolverFailed,
            ComponentError::InvocationFailed { .. } => ErrorKind::InvocationFailed,
            ComponentError::Unauthorized(GuardError::UnauthorizedCaller { .. }) => {
                ErrorKind::UnauthorizedCaller
            }
            ComponentError::Unauthorized(GuardError::GuardMisuse { .. }) => ErrorKind::GuardMisuse,
        }
    }

    /// Check if the error leaves the component unregistered
    pub fn is_creation_error(&self) -> bool {
        matches!(
            self,
            ComponentError::NameConflict { .. }
                | ComponentError::ConstructionFailed { .. }
                | ComponentError::MissingResolverTarget { .. }
        )
    }
}
