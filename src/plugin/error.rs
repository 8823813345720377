//! Plugin Error Types
//!
//! Errors raised while loading, registering and advancing plugins.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::state::PluginState;
use crate::errors::ErrorKind;
use crate::guard::GuardError;

/// Result type for plugin operations
pub type PluginResult<T> = Result<T, PluginError>;

#[derive(Error, Debug, Clone)]
pub enum PluginError {
    /// The package has no manifest entry
    #[error("Package {} has no {manifest} manifest", package.display())]
    MissingManifest { package: PathBuf, manifest: String },

    /// The manifest is not valid YAML or has the wrong shape
    #[error("Descriptor parse error: {message}")]
    DescriptorParseError { message: String },

    /// A required manifest field is absent or blank
    #[error("Missing descriptor field: {field}")]
    MissingDescriptorField { field: String },

    /// The declared runtime version is unknown or newer than the running one
    #[error("Plugin '{plugin}' requires runtime API {declared}, running {running}")]
    UnsupportedPluginVersion {
        plugin: String,
        declared: String,
        running: String,
    },

    /// The package file could not be opened or read
    #[error("Cannot read package {}: {message}", package.display())]
    PackageUnreadable { package: PathBuf, message: String },

    /// The entry point symbol could not be resolved
    #[error("Entry point '{entry_point}' could not be loaded: {message}")]
    EntryPointLoadFailed { entry_point: String, message: String },

    /// The entry point symbol exists but does not produce a plugin
    #[error("Entry point '{entry_point}' does not satisfy the plugin contract: {message}")]
    EntryPointContractViolation { entry_point: String, message: String },

    /// The entry point constructor failed
    #[error("Constructor of '{entry_point}' failed: {message}")]
    ConstructorFailed { entry_point: String, message: String },

    /// A bind-once descriptor field was bound twice
    #[error("Descriptor '{plugin}' already has {field} bound")]
    DescriptorAlreadyBound { plugin: String, field: String },

    #[error("Plugin already registered: {plugin_name}")]
    DuplicateName { plugin_name: String },

    #[error("Plugin not found: {plugin_name}")]
    PluginNotFound { plugin_name: String },

    #[error("Plugin '{plugin}' cannot change from {current} to {attempted}")]
    IllegalStateTransition {
        plugin: String,
        current: PluginState,
        attempted: PluginState,
    },

    /// A lifecycle hook failed; the recorded state is unchanged
    #[error("Plugin '{plugin}' hook {hook} failed: {message}")]
    HookFailed {
        plugin: String,
        hook: String,
        message: String,
    },

    #[error("Plugin '{plugin}' cannot be unloaded while {state}")]
    UnloadRefused { plugin: String, state: PluginState },

    /// A package in the plugin directory failed to load
    #[error("Failed to load {}: {cause}", file.display())]
    LoadFailed { file: PathBuf, cause: Box<PluginError> },

    /// The plugin directory itself could not be scanned
    #[error("Plugin discovery error: {message}")]
    DiscoveryFailed { message: String },

    #[error(transparent)]
    Unauthorized(#[from] GuardError),
}

impl PluginError {
    pub fn missing_manifest<P: AsRef<Path>, S: Into<String>>(package: P, manifest: S) -> Self {
        Self::MissingManifest {
            package: package.as_ref().to_path_buf(),
            manifest: manifest.into(),
        }
    }

    /// Create a descriptor parse error
    pub fn descriptor_parse_error<S: Into<String>>(message: S) -> Self {
        Self::DescriptorParseError { message: message.into() }
    }

    /// Create a missing field error
    pub fn missing_field<S: Into<String>>(field: S) -> Self {
        Self::MissingDescriptorField { field: field.into() }
    }

    pub fn unsupported_version<P, D, R>(plugin: P, declared: D, running: R) -> Self
    where
        P: Into<String>,
        D: Into<String>,
        R: Into<String>,
    {
        Self::UnsupportedPluginVersion {
            plugin: plugin.into(),
            declared: declared.into(),
            running: running.into(),
        }
    }

    pub fn package_unreadable<P: AsRef<Path>, S: Into<String>>(package: P, message: S) -> Self {
        Self::PackageUnreadable {
            package: package.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub fn entry_point_load_failed<E: Into<String>, S: Into<String>>(entry_point: E, message: S) -> Self {
        Self::EntryPointLoadFailed {
            entry_point: entry_point.into(),
            message: message.into(),
        }
    }

    pub fn contract_violation<E: Into<String>, S: Into<String>>(entry_point: E, message: S) -> Self {
        Self::EntryPointContractViolation {
            entry_point: entry_point.into(),
            message: message.into(),
        }
    }

    pub fn constructor_failed<E: Into<String>, S: Into<String>>(entry_point: E, message: S) -> Self {
        Self::ConstructorFailed {
            entry_point: entry_point.into(),
            message: message.into(),
        }
    }

    pub fn already_bound<P: Into<String>, F: Into<String>>(plugin: P, field: F) -> Self {
        Self::DescriptorAlreadyBound {
            plugin: plugin.into(),
            field: field.into(),
        }
    }

    /// Create a duplicate name error
    pub fn duplicate_name<S: Into<String>>(plugin_name: S) -> Self {
        Self::DuplicateName { plugin_name: plugin_name.into() }
    }

    /// Create a plugin not found error
    pub fn plugin_not_found<S: Into<String>>(plugin_name: S) -> Self {
        Self::PluginNotFound { plugin_name: plugin_name.into() }
    }

    pub fn illegal_transition<S: Into<String>>(
        plugin: S,
        current: PluginState,
        attempted: PluginState,
    ) -> Self {
        Self::IllegalStateTransition {
            plugin: plugin.into(),
            current,
            attempted,
        }
    }

    pub fn hook_failed<P: Into<String>, H: Into<String>, S: Into<String>>(
        plugin: P,
        hook: H,
        message: S,
    ) -> Self {
        Self::HookFailed {
            plugin: plugin.into(),
            hook: hook.into(),
            message: message.into(),
        }
    }

    pub fn unload_refused<S: Into<String>>(plugin: S, state: PluginState) -> Self {
        Self::UnloadRefused { plugin: plugin.into(), state }
    }

    /// Wrap the failure of one package during discovery
    pub fn load_failed<P: AsRef<Path>>(file: P, cause: PluginError) -> Self {
        Self::LoadFailed {
            file: file.as_ref().to_path_buf(),
            cause: Box::new(cause),
        }
    }

    /// Create a discovery failed error
    pub fn discovery_failed<S: Into<String>>(message: S) -> Self {
        Self::DiscoveryFailed { message: message.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PluginError::MissingManifest { .. } => ErrorKind::MissingManifest,
            PluginError::DescriptorParseError { .. } => ErrorKind::DescriptorParse,
            PluginError::MissingDescriptorField { .. } => ErrorKind::MissingDescriptorField,
            PluginError::UnsupportedPluginVersion { .. } => ErrorKind::UnsupportedPluginVersion,
            PluginError::PackageUnreadable { .. } => ErrorKind::PackageUnreadable,
            PluginError::EntryPointLoadFailed { .. } => ErrorKind::EntryPointLoadFailed,
            PluginError::EntryPointContractViolation { .. } => ErrorKind::EntryPointContractViolation,
            PluginError::ConstructorFailed { .. } => ErrorKind::ConstructorFailed,
            PluginError::DescriptorAlreadyBound { .. } => ErrorKind::DescriptorAlreadyBound,
            PluginError::DuplicateName { .. } => ErrorKind::DuplicateName,
            PluginError::PluginNotFound { .. } => ErrorKind::PluginNotFound,
            PluginError::IllegalStateTransition { .. } => ErrorKind::IllegalStateTransition,
            PluginError::HookFailed { .. } => ErrorKind::HookFailed,
            PluginError::UnloadRefused { .. } => ErrorKind::UnloadRefused,
            PluginError::LoadFailed { .. } => ErrorKind::PluginLoadFailed,
            PluginError::DiscoveryFailed { .. } => ErrorKind::DiscoveryFailed,
            PluginError::Unauthorized(GuardError::UnauthorizedCaller { .. }) => {
                ErrorKind::UnauthorizedCaller
            }
            PluginError::Unauthorized(GuardError::GuardMisuse { .. }) => ErrorKind::GuardMisuse,
        }
    }

    /// The failure behind a discovery wrapper, or `self`
    pub fn root_cause(&self) -> &PluginError {
        match self {
            PluginError::LoadFailed { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Check if the package itself is malformed
    pub fn is_package_error(&self) -> bool {
        matches!(
            self.root_cause(),
            PluginError::MissingManifest { .. }
                | PluginError::DescriptorParseError { .. }
                | PluginError::MissingDescriptorField { .. }
                | PluginError::PackageUnreadable { .. }
        )
    }

    /// Check if the failure came from resolving or constructing the entry point
    pub fn is_entry_point_error(&self) -> bool {
        matches!(
            self.root_cause(),
            PluginError::EntryPointLoadFailed { .. }
                | PluginError::EntryPointContractViolation { .. }
                | PluginError::ConstructorFailed { .. }
        )
    }

    /// Check if error is related to plugin lifecycle
    pub fn is_lifecycle_error(&self) -> bool {
        matches!(
            self,
            PluginError::IllegalStateTransition { .. }
                | PluginError::HookFailed { .. }
                | PluginError::UnloadRefused { .. }
        )
    }
}

impl From<serde_yaml::Error> for PluginError {
    fn from(err: serde_yaml::Error) -> Self {
        PluginError::descriptor_parse_error(format!("YAML error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = PluginError::plugin_not_found("test-plugin");
        assert_eq!(error.to_string(), "Plugin not found: test-plugin");

        let error = PluginError::missing_field("author");
        assert_eq!(error.to_string(), "Missing descriptor field: author");

        let error = PluginError::illegal_transition("alpha", PluginState::Registered, PluginState::Loaded);
        assert_eq!(error.to_string(), "Plugin 'alpha' cannot change from Registered to Loaded");
    }

    #[test]
    fn test_error_classification() {
        let wrapped = PluginError::load_failed("plugins/b.plx", PluginError::missing_field("author"));
        assert!(wrapped.is_package_error());
        assert!(!wrapped.is_entry_point_error());
        assert_eq!(wrapped.kind(), ErrorKind::PluginLoadFailed);
        assert_eq!(wrapped.root_cause().kind(), ErrorKind::MissingDescriptorField);

        let ctor = PluginError::constructor_failed("demo::Alpha", "panicked");
        assert!(ctor.is_entry_point_error());

        let hook = PluginError::hook_failed("alpha", "on_enable", "refused");
        assert!(hook.is_lifecycle_error());
        assert!(!hook.is_package_error());
    }

    #[test]
    fn test_guard_errors_keep_their_kind() {
        let err: PluginError = GuardError::unauthorized("Runtime::start", "Host::main").into();
        assert_eq!(err.kind(), ErrorKind::UnauthorizedCaller);
        assert!(err.to_string().contains("Host::main"));
    }

    #[test]
    fn test_yaml_conversion() {
        let yaml_err = serde_yaml::from_str::<Vec<u32>>("{ not: a list").unwrap_err();
        let err: PluginError = yaml_err.into();
        assert_eq!(err.kind(), ErrorKind::DescriptorParse);
        assert!(err.to_string().contains("YAML error"));
    }
}
