//! Plugin Isolation Units
//!
//! Each loaded plugin gets its own isolation unit: the scope in which its
//! entry point and components are resolved. Resolution looks in the plugin's
//! own package first and falls back to the host's [`SymbolTable`].
//!
//! Two units ship with the runtime:
//!
//! * [`NativeIsolation`] extracts the native library named by the manifest's
//!   `library` key and resolves exported [`EntryPointDecl`] statics from it.
//!   The library stays mapped until the last handle to the unit is dropped.
//! * [`HostIsolation`] resolves from the host symbol table only, for plugins
//!   linked into the host binary.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use log::{debug, trace};
use uuid::Uuid;
use zip::ZipArchive;

use super::descriptor::PluginDescriptor;
use super::entry::{export_symbol, EntryConstructor, EntryPointDecl};
use super::error::{PluginError, PluginResult};
use crate::component::{ComponentDescriptor, ComponentNamespace};

/// A resolved symbol
#[derive(Clone)]
pub enum Symbol {
    /// A plugin entry point declaration
    Plugin(EntryPointDecl),
    /// A component type registered with the host
    Component(ComponentDescriptor),
    /// Something that exists under the name but is neither of the above
    Opaque { description: String },
}

impl Symbol {
    pub fn kind(&self) -> &'static str {
        match self {
            Symbol::Plugin(_) => "plugin entry point",
            Symbol::Component(_) => "component",
            Symbol::Opaque { .. } => "opaque symbol",
        }
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Plugin(decl) => f.debug_tuple("Plugin").field(&decl.contract).finish(),
            Symbol::Component(descriptor) => f.debug_tuple("Component").field(&descriptor.type_name()).finish(),
            Symbol::Opaque { description } => f.debug_struct("Opaque").field("description", description).finish(),
        }
    }
}

/// Symbols the host application makes visible to plugins, in declaration order
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: Vec<(String, Symbol)>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a symbol
    pub fn insert<S: Into<String>>(&mut self, path: S, symbol: Symbol) {
        let path = path.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == path) {
            Some((_, slot)) => *slot = symbol,
            None => self.entries.push((path, symbol)),
        }
    }

    /// Builder form of [`insert`](Self::insert) for a plugin entry point
    pub fn with_plugin<S: Into<String>>(mut self, path: S, construct: EntryConstructor) -> Self {
        self.insert(path, Symbol::Plugin(EntryPointDecl::bare(construct)));
        self
    }

    pub fn with_declaration<S: Into<String>>(mut self, path: S, decl: EntryPointDecl) -> Self {
        self.insert(path, Symbol::Plugin(decl));
        self
    }

    /// Register a component under `<module>::<simple type name>`
    pub fn with_component<S: AsRef<str>>(mut self, module: S, descriptor: ComponentDescriptor) -> Self {
        let path = format!("{}::{}", module.as_ref(), descriptor.simple_name());
        self.insert(path, Symbol::Component(descriptor));
        self
    }

    pub fn with_opaque<S: Into<String>, D: Into<String>>(mut self, path: S, description: D) -> Self {
        self.insert(path, Symbol::Opaque { description: description.into() });
        self
    }

    pub fn lookup(&self, path: &str) -> Option<&Symbol> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == path)
            .map(|(_, symbol)| symbol)
    }

    /// Components registered directly inside `module`
    pub fn components_in(&self, module: &str) -> Vec<ComponentDescriptor> {
        self.entries
            .iter()
            .filter_map(|(path, symbol)| match symbol {
                Symbol::Component(descriptor) if parent_module(path) == module => {
                    Some(descriptor.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parent_module(path: &str) -> &str {
    path.rsplit_once("::").map(|(module, _)| module).unwrap_or("")
}

/// The scope a plugin's code is resolved in
pub trait IsolationUnit: Send + Sync + fmt::Debug {
    /// Package the unit was created for
    fn package(&self) -> &Path;

    /// Resolve a symbol path, package scope first, then the host
    fn resolve(&self, symbol: &str) -> Option<Symbol>;

    /// Components of the plugin whose entry point is `entry_point`
    fn namespace(&self, entry_point: &str) -> ComponentNamespace;
}

/// Creates isolation units for packages
pub trait IsolationProvider: Send + Sync {
    fn isolate(&self, package: &Path, descriptor: &PluginDescriptor) -> PluginResult<Arc<dyn IsolationUnit>>;
}

/// Collect a plugin's namespace: host components in the entry point's module,
/// then whatever the declaration exports
fn collect_namespace(unit: &dyn IsolationUnit, host: &SymbolTable, entry_point: &str) -> ComponentNamespace {
    let module = parent_module(entry_point);
    let mut components = host.components_in(module);
    if let Some(Symbol::Plugin(decl)) = unit.resolve(entry_point) {
        components.extend((decl.components)());
    }
    ComponentNamespace::new(if module.is_empty() { entry_point } else { module }, components)
}

/// Resolves from the host symbol table only
#[derive(Debug)]
pub struct HostIsolation {
    package: PathBuf,
    host: Arc<SymbolTable>,
}

impl HostIsolation {
    pub fn new<P: Into<PathBuf>>(package: P, host: Arc<SymbolTable>) -> Self {
        Self { package: package.into(), host }
    }
}

impl IsolationUnit for HostIsolation {
    fn package(&self) -> &Path {
        &self.package
    }

    fn resolve(&self, symbol: &str) -> Option<Symbol> {
        self.host.lookup(symbol).cloned()
    }

    fn namespace(&self, entry_point: &str) -> ComponentNamespace {
        collect_namespace(self, &self.host, entry_point)
    }
}

/// Resolves from a native library extracted from the package
pub struct NativeIsolation {
    package: PathBuf,
    library_path: PathBuf,
    library: Library,
    host: Arc<SymbolTable>,
}

impl NativeIsolation {
    /// Extract `library` from `package` into `cache_dir` and load it
    pub fn open(package: &Path, library: &str, cache_dir: &Path, host: Arc<SymbolTable>) -> PluginResult<Self> {
        let library_path = extract_library(package, library, cache_dir)?;

        // SAFETY: loading runs the library's initialisers. Packages are trusted
        // in-process code; isolation here is about symbol scope, not security.
        let loaded = unsafe { Library::new(&library_path) }.map_err(|e| {
            PluginError::package_unreadable(package, format!("cannot load {}: {}", library_path.display(), e))
        })?;
        debug!("Loaded native library {}", library_path.display());

        Ok(Self {
            package: package.to_path_buf(),
            library_path,
            library: loaded,
            host,
        })
    }

    pub fn library_path(&self) -> &Path {
        &self.library_path
    }

    fn resolve_native(&self, symbol: &str) -> Option<Symbol> {
        let exported = format!("{}\0", export_symbol(symbol));

        // SAFETY: exported entry points are `EntryPointDecl` statics; the magic
        // and contract fields are checked before anything else is used.
        let decl = unsafe {
            let found = self.library.get::<*const EntryPointDecl>(exported.as_bytes()).ok()?;
            let pointer: *const EntryPointDecl = *found;
            if pointer.is_null() {
                return None;
            }
            *pointer
        };

        if decl.is_compatible() {
            Some(Symbol::Plugin(decl))
        } else {
            Some(Symbol::Opaque {
                description: format!(
                    "{} does not carry a plugin declaration for contract {}",
                    symbol,
                    super::entry::PLUGIN_CONTRACT
                ),
            })
        }
    }
}

impl fmt::Debug for NativeIsolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeIsolation")
            .field("package", &self.package)
            .field("library_path", &self.library_path)
            .finish()
    }
}

impl IsolationUnit for NativeIsolation {
    fn package(&self) -> &Path {
        &self.package
    }

    fn resolve(&self, symbol: &str) -> Option<Symbol> {
        self.resolve_native(symbol).or_else(|| {
            trace!("{} not exported by {}, trying host", symbol, self.library_path.display());
            self.host.lookup(symbol).cloned()
        })
    }

    fn namespace(&self, entry_point: &str) -> ComponentNamespace {
        collect_namespace(self, &self.host, entry_point)
    }
}

fn extract_library(package: &Path, library: &str, cache_dir: &Path) -> PluginResult<PathBuf> {
    let unreadable = |e: &dyn fmt::Display| PluginError::package_unreadable(package, e.to_string());

    let file = File::open(package).map_err(|e| unreadable(&e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| unreadable(&e))?;
    let mut entry = archive.by_name(library).map_err(|e| unreadable(&e))?;

    let stem = package
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plugin".to_string());
    let file_name = Path::new(library)
        .file_name()
        .ok_or_else(|| PluginError::package_unreadable(package, format!("invalid library path {}", library)))?;

    // Every extraction gets a fresh directory so a mapped library is never rewritten
    let target_dir = cache_dir.join(format!("{}-{}", stem, Uuid::now_v7().simple()));
    fs::create_dir_all(&target_dir).map_err(|e| unreadable(&e))?;
    let target = target_dir.join(file_name);

    let mut out = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
        .map_err(|e| unreadable(&e))?;
    io::copy(&mut entry, &mut out).map_err(|e| unreadable(&e))?;
    trace!("Extracted {} to {}", library, target.display());
    Ok(target)
}

/// Picks native isolation when the manifest names a library, host otherwise
#[derive(Debug)]
pub struct DefaultIsolationProvider {
    host: Arc<SymbolTable>,
    cache_dir: PathBuf,
}

impl DefaultIsolationProvider {
    pub fn new<P: Into<PathBuf>>(host: Arc<SymbolTable>, cache_dir: P) -> Self {
        Self { host, cache_dir: cache_dir.into() }
    }

    pub fn host(&self) -> &Arc<SymbolTable> {
        &self.host
    }
}

impl IsolationProvider for DefaultIsolationProvider {
    fn isolate(&self, package: &Path, descriptor: &PluginDescriptor) -> PluginResult<Arc<dyn IsolationUnit>> {
        match descriptor.library() {
            Some(library) => {
                let unit = NativeIsolation::open(package, library, &self.cache_dir, Arc::clone(&self.host))?;
                Ok(Arc::new(unit))
            }
            None => Ok(Arc::new(HostIsolation::new(package, Arc::clone(&self.host)))),
        }
    }
}
