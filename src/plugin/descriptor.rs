//! Plugin Descriptor
//!
//! The immutable record read from the `plugin.yml` manifest inside a plugin
//! package, plus two fields bound exactly once while the plugin loads: the
//! package file and the isolation unit.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use serde::Deserialize;
use serde_yaml::Value;
use zip::result::ZipError;
use zip::ZipArchive;

use super::error::{PluginError, PluginResult};
use super::isolation::IsolationUnit;
use crate::version::RuntimeVersion;

/// Name of the manifest entry inside a package
pub const MANIFEST_NAME: &str = "plugin.yml";

/// Raw manifest shape. Scalars are kept as YAML values because authors write
/// `api-version: 2.0` unquoted as often as quoted.
#[derive(Debug, Default, Deserialize)]
struct Manifest {
    name: Option<Value>,
    #[serde(rename = "main-class")]
    main_class: Option<Value>,
    #[serde(rename = "api-version")]
    api_version: Option<Value>,
    author: Option<Value>,
    library: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    name: String,
    entry_point: String,
    declared_version: String,
    resolved_version: RuntimeVersion,
    author: String,
    library: Option<String>,
    package_file: OnceLock<PathBuf>,
    isolation_unit: OnceLock<Arc<dyn IsolationUnit>>,
}

impl PluginDescriptor {
    /// Build a descriptor directly, bypassing manifest parsing
    pub fn new<N, E, V, A>(name: N, entry_point: E, declared_version: V, author: A) -> Self
    where
        N: Into<String>,
        E: Into<String>,
        V: Into<String>,
        A: Into<String>,
    {
        let declared_version = declared_version.into();
        Self {
            name: name.into(),
            entry_point: entry_point.into(),
            resolved_version: RuntimeVersion::resolve(&declared_version),
            declared_version,
            author: author.into(),
            library: None,
            package_file: OnceLock::new(),
            isolation_unit: OnceLock::new(),
        }
    }

    /// Parse manifest text.
    ///
    /// Required fields are checked in the order `name`, `main-class`,
    /// `api-version`, `author`; the first absent or blank one is reported.
    pub fn from_yaml(text: &str) -> PluginResult<Self> {
        let manifest: Manifest = if text.trim().is_empty() {
            Manifest::default()
        } else {
            serde_yaml::from_str(text)?
        };

        let name = required(manifest.name, "name")?;
        let entry_point = required(manifest.main_class, "main-class")?;
        let declared_version = required(manifest.api_version, "api-version")?;
        let author = required(manifest.author, "author")?;

        let mut descriptor = Self::new(name, entry_point, declared_version, author);
        descriptor.library = manifest.library.and_then(scalar).filter(|l| !l.is_empty());
        Ok(descriptor)
    }

    /// Read and parse the manifest of a package archive
    pub fn read_from_package(package: &Path) -> PluginResult<Self> {
        let file = File::open(package)
            .map_err(|e| PluginError::package_unreadable(package, e.to_string()))?;
        let mut archive = ZipArchive::new(file)
            .map_err(|e| PluginError::package_unreadable(package, e.to_string()))?;

        let mut entry = match archive.by_name(MANIFEST_NAME) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(PluginError::missing_manifest(package, MANIFEST_NAME))
            }
            Err(e) => return Err(PluginError::package_unreadable(package, e.to_string())),
        };

        let mut text = String::new();
        entry
            .read_to_string(&mut text)
            .map_err(|e| PluginError::descriptor_parse_error(format!("{}: {}", MANIFEST_NAME, e)))?;
        Self::from_yaml(&text)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Symbol path of the entry point (`main-class`)
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Module path of the entry point, naming the plugin's component namespace
    pub fn namespace(&self) -> &str {
        self.entry_point
            .rsplit_once("::")
            .map(|(module, _)| module)
            .unwrap_or(&self.entry_point)
    }

    /// Runtime version as written in the manifest
    pub fn declared_version(&self) -> &str {
        &self.declared_version
    }

    pub fn resolved_version(&self) -> RuntimeVersion {
        self.resolved_version
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    /// Native library path inside the package, if the plugin ships one
    pub fn library(&self) -> Option<&str> {
        self.library.as_deref()
    }

    pub fn with_library<S: Into<String>>(mut self, library: S) -> Self {
        self.library = Some(library.into());
        self
    }

    /// Accept only plugins built against `running` or an older known version
    pub fn check_compatibility(&self, running: &RuntimeVersion) -> PluginResult<()> {
        if self.resolved_version.is_supported_by(running) {
            Ok(())
        } else {
            Err(PluginError::unsupported_version(
                &self.name,
                &self.declared_version,
                running.label(),
            ))
        }
    }

    pub fn package_file(&self) -> Option<&Path> {
        self.package_file.get().map(PathBuf::as_path)
    }

    pub fn bind_package_file<P: Into<PathBuf>>(&self, package: P) -> PluginResult<()> {
        self.package_file
            .set(package.into())
            .map_err(|_| PluginError::already_bound(&self.name, "package file"))
    }

    pub fn isolation_unit(&self) -> Option<&Arc<dyn IsolationUnit>> {
        self.isolation_unit.get()
    }

    pub fn bind_isolation_unit(&self, unit: Arc<dyn IsolationUnit>) -> PluginResult<()> {
        self.isolation_unit
            .set(unit)
            .map_err(|_| PluginError::already_bound(&self.name, "isolation unit"))
    }
}

fn scalar(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn required(value: Option<Value>, field: &str) -> PluginResult<String> {
    value
        .and_then(scalar)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PluginError::missing_field(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::isolation::{HostIsolation, SymbolTable};
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    const FULL: &str = "name: Alpha\nmain-class: demo::alpha::AlphaPlugin\napi-version: \"2.0\"\nauthor: Ada\n";

    #[test]
    fn test_parse_complete_manifest() {
        let descriptor = PluginDescriptor::from_yaml(FULL).unwrap();
        assert_eq!(descriptor.name(), "Alpha");
        assert_eq!(descriptor.entry_point(), "demo::alpha::AlphaPlugin");
        assert_eq!(descriptor.namespace(), "demo::alpha");
        assert_eq!(descriptor.author(), "Ada");
        assert_eq!(descriptor.resolved_version(), RuntimeVersion::current());
        assert!(descriptor.library().is_none());
        assert!(descriptor.package_file().is_none());
    }

    #[test]
    fn test_unquoted_version() {
        let text = "name: Alpha\nmain-class: Alpha\napi-version: 1.3\nauthor: Ada\n";
        let descriptor = PluginDescriptor::from_yaml(text).unwrap();
        assert_eq!(descriptor.declared_version(), "1.3");
        assert!(descriptor.resolved_version().is_available());
    }

    #[test]
    fn test_missing_fields_reported_in_order() {
        let cases = [
            ("", "name"),
            ("name: A\n", "main-class"),
            ("name: A\nmain-class: B\n", "api-version"),
            ("name: A\nmain-class: B\napi-version: '2.0'\n", "author"),
            ("name: A\nmain-class: B\napi-version: '2.0'\nauthor: '   '\n", "author"),
            ("main-class: B\nauthor: C\n", "name"),
        ];
        for (text, field) in cases {
            match PluginDescriptor::from_yaml(text) {
                Err(PluginError::MissingDescriptorField { field: missing }) => assert_eq!(missing, field),
                other => panic!("expected missing {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_malformed_yaml() {
        let err = PluginDescriptor::from_yaml("name: [unclosed").unwrap_err();
        assert!(matches!(err, PluginError::DescriptorParseError { .. }));
    }

    #[test]
    fn test_compatibility() {
        let current = RuntimeVersion::current();

        let descriptor = PluginDescriptor::new("a", "a::A", current.label(), "x");
        assert!(descriptor.check_compatibility(&current).is_ok());

        let descriptor = PluginDescriptor::new("a", "a::A", "9.9", "x");
        let err = descriptor.check_compatibility(&current).unwrap_err();
        assert!(matches!(err, PluginError::UnsupportedPluginVersion { .. }));

        let oldest = RuntimeVersion::Known(0);
        let descriptor = PluginDescriptor::new("a", "a::A", current.label(), "x");
        assert!(descriptor.check_compatibility(&oldest).is_err());
    }

    #[test]
    fn test_bind_once() {
        let descriptor = PluginDescriptor::from_yaml(FULL).unwrap();
        descriptor.bind_package_file("plugins/alpha.plx").unwrap();
        let err = descriptor.bind_package_file("plugins/other.plx").unwrap_err();
        assert!(matches!(err, PluginError::DescriptorAlreadyBound { .. }));
        assert_eq!(descriptor.package_file(), Some(Path::new("plugins/alpha.plx")));

        let table = Arc::new(SymbolTable::new());
        let unit: Arc<dyn IsolationUnit> =
            Arc::new(HostIsolation::new("plugins/alpha.plx", Arc::clone(&table)));
        descriptor.bind_isolation_unit(Arc::clone(&unit)).unwrap();
        assert!(descriptor.bind_isolation_unit(unit).is_err());
    }

    #[test]
    fn test_read_from_package() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alpha.plx");
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        writer.start_file(MANIFEST_NAME, FileOptions::default()).unwrap();
        writer.write_all(FULL.as_bytes()).unwrap();
        writer.finish().unwrap();

        let descriptor = PluginDescriptor::read_from_package(&path).unwrap();
        assert_eq!(descriptor.name(), "Alpha");
    }

    #[test]
    fn test_package_without_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.plx");
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        writer.start_file("readme.txt", FileOptions::default()).unwrap();
        writer.write_all(b"nothing here").unwrap();
        writer.finish().unwrap();

        let err = PluginDescriptor::read_from_package(&path).unwrap_err();
        assert!(matches!(err, PluginError::MissingManifest { .. }));
    }

    #[test]
    fn test_unreadable_package() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.plx");
        std::fs::write(&path, b"not a zip archive").unwrap();

        let err = PluginDescriptor::read_from_package(&path).unwrap_err();
        assert!(matches!(err, PluginError::PackageUnreadable { .. }));

        let err = PluginDescriptor::read_from_package(&dir.path().join("absent.plx")).unwrap_err();
        assert!(matches!(err, PluginError::PackageUnreadable { .. }));
    }
}
