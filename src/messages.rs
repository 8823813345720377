//! Message Catalogue
//!
//! The runtime does not load translations itself. A host supplies a
//! [`MessageCatalog`] for its configured locale; errors render through it with
//! [`RuntimeError::describe`](crate::errors::RuntimeError::describe). Templates
//! use `{detail}` as the placeholder for the error's own text.

use std::collections::HashMap;

/// Locale collaborator contract
pub trait MessageCatalog: Send + Sync {
    /// Locale tag such as `en` or `de-AT`
    fn locale(&self) -> &str;

    /// Template for a message key, if the catalogue has one
    fn template(&self, key: &str) -> Option<&str>;

    /// Render `key` with `detail`, falling back to the bare detail
    fn render(&self, key: &str, detail: &str) -> String {
        match self.template(key) {
            Some(template) => template.replace("{detail}", detail),
            None => detail.to_string(),
        }
    }
}

/// In-memory catalogue, built from key/template pairs
#[derive(Debug, Clone, Default)]
pub struct DefaultCatalog {
    locale: String,
    templates: HashMap<String, String>,
}

impl DefaultCatalog {
    pub fn new<S: Into<String>>(locale: S) -> Self {
        Self {
            locale: locale.into(),
            templates: HashMap::new(),
        }
    }

    /// Built-in English texts
    pub fn english() -> Self {
        let mut catalog = Self::new("en");
        for (key, template) in ENGLISH {
            catalog.insert(*key, *template);
        }
        catalog
    }

    /// Catalogue for a locale; only English ships with the runtime
    pub fn for_locale(locale: &str) -> Self {
        let mut catalog = Self::english();
        catalog.locale = locale.to_string();
        catalog
    }

    pub fn insert<K: Into<String>, T: Into<String>>(&mut self, key: K, template: T) {
        self.templates.insert(key.into(), template.into());
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl MessageCatalog for DefaultCatalog {
    fn locale(&self) -> &str {
        &self.locale
    }

    fn template(&self, key: &str) -> Option<&str> {
        self.templates.get(key).map(String::as_str)
    }
}

const ENGLISH: &[(&str, &str)] = &[
    ("UnauthorizedCaller", "This operation may only be started by the runtime: {detail}"),
    ("GuardMisuse", "Internal guard configuration error: {detail}"),
    ("MissingManifest", "The plugin package has no manifest: {detail}"),
    ("DescriptorParse", "The plugin manifest could not be read: {detail}"),
    ("MissingDescriptorField", "The plugin manifest is incomplete: {detail}"),
    ("UnsupportedPluginVersion", "The plugin was built for an unsupported runtime: {detail}"),
    ("PackageUnreadable", "The plugin package could not be opened: {detail}"),
    ("EntryPointLoadFailed", "The plugin entry point could not be found: {detail}"),
    ("EntryPointContractViolation", "The plugin entry point is not a plugin: {detail}"),
    ("DuplicateName", "A plugin with this name is already registered: {detail}"),
    ("IllegalStateTransition", "The plugin cannot change to that state: {detail}"),
    ("PluginLoadFailed", "A plugin failed to load: {detail}"),
    ("ComponentNameConflict", "A component with this name already exists: {detail}"),
    ("ArgumentShapeMismatch", "A component method has the wrong parameters: {detail}"),
    ("LifecycleEventError", "A lifecycle event subscriber failed: {detail}"),
    ("Panic", "Unexpected internal failure: {detail}"),
];
