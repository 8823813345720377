use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use toml::Value;

use crate::events::BusConfig;
use crate::plugin::{LoaderConfig, DEFAULT_PACKAGE_EXTENSION};
use crate::version::RuntimeVersion;

/// Configuration storage - section_name -> key -> value
pub type Configuration = HashMap<String, HashMap<String, String>>;

/// Configuration manager
pub struct ConfigManager {
    config: Configuration,
    config_file_path: Option<PathBuf>,
    selected_section: Option<String>,
}

impl ConfigManager {
    /// Create a new ConfigManager from a Configuration (primarily for testing)
    pub fn from_config(config: Configuration) -> Self {
        Self {
            config,
            config_file_path: None,
            selected_section: None,
        }
    }

    /// Load configuration using discovery hierarchy
    pub fn load() -> Result<Self> {
        debug!("Starting configuration discovery");

        for path in discover_config_files() {
            debug!("Attempting to load config from: {}", path.display());
            if path.exists() {
                info!("Loading configuration from: {}", path.display());
                return Self::load_from_file(path);
            }
        }

        info!("No configuration file found, using defaults");
        Ok(Self::from_config(Configuration::new()))
    }

    /// Load configuration from explicit file path
    pub fn load_from_file(path: PathBuf) -> Result<Self> {
        debug!("Loading configuration from file: {}", path.display());

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = parse_toml_config(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(Self {
            config,
            config_file_path: Some(path),
            selected_section: None,
        })
    }

    pub fn config_file_path(&self) -> Option<&Path> {
        self.config_file_path.as_deref()
    }

    /// Get value from configuration with section fallback
    pub fn get_value(&self, section: &str, key: &str) -> Option<&String> {
        // Priority: selected_section -> specified section -> base
        if let Some(selected) = &self.selected_section {
            if let Some(value) = self.config.get(selected).and_then(|s| s.get(key)) {
                return Some(value);
            }
        }

        if let Some(value) = self.config.get(section).and_then(|s| s.get(key)) {
            return Some(value);
        }

        self.config.get("base").and_then(|s| s.get(key))
    }

    /// Select configuration section for --config-name
    pub fn select_section(&mut self, section: String) {
        debug!("Selecting configuration section: {}", section);
        self.selected_section = Some(section);
    }

    /// Get boolean value with type conversion
    pub fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>> {
        match self.get_value(section, key) {
            Some(value) => match value.to_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(anyhow::anyhow!("Invalid boolean value for {}.{}: {}", section, key, value)),
            },
            None => Ok(None),
        }
    }

    pub fn get_usize(&self, section: &str, key: &str) -> Result<Option<usize>> {
        match self.get_value(section, key) {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .map(Some)
                .with_context(|| format!("Invalid {}.{} value in config: {}", section, key, value)),
            None => Ok(None),
        }
    }

    /// Get log level value with type conversion
    pub fn get_log_level(&self, section: &str, key: &str) -> Result<Option<log::LevelFilter>> {
        match self.get_value(section, key) {
            Some(value) => Ok(Some(crate::logging::parse_log_level(value)?)),
            None => Ok(None),
        }
    }

    /// Get path value with type conversion
    pub fn get_path(&self, section: &str, key: &str) -> Option<PathBuf> {
        self.get_value(section, key).map(PathBuf::from)
    }

    /// Runtime settings from the `[runtime]` and `[events]` sections
    pub fn runtime_config(&self) -> Result<RuntimeConfig> {
        let mut config = RuntimeConfig::default();

        if let Some(locale) = self.get_value("runtime", "locale") {
            config.locale = locale.clone();
        }
        if let Some(dir) = self.get_path("runtime", "plugin-dir") {
            config.plugin_dir = dir;
        }
        if let Some(extension) = self.get_value("runtime", "package-extension") {
            config.package_extension = extension.trim_start_matches('.').to_string();
        }
        if let Some(dir) = self.get_path("runtime", "cache-dir") {
            config.cache_dir = dir;
        }
        if let Some(workers) = self.get_usize("events", "workers")? {
            config.event_workers = workers;
        }
        if let Some(capacity) = self.get_usize("events", "queue-capacity")? {
            config.event_queue_capacity = capacity;
        }
        if let Some(millis) = self.get_usize("events", "shutdown-timeout-ms")? {
            config.shutdown_timeout = Duration::from_millis(millis as u64);
        }

        config
            .validate()
            .with_context(|| "Runtime configuration validation failed")?;
        Ok(config)
    }
}

/// Read-only settings the runtime is built from
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Locale for error messages
    pub locale: String,
    /// Directory scanned for plugin packages
    pub plugin_dir: PathBuf,
    /// Package file extension, without the dot
    pub package_extension: String,
    /// Where native plugin libraries are extracted
    pub cache_dir: PathBuf,
    pub event_workers: usize,
    pub event_queue_capacity: usize,
    /// How long shutdown waits for queued events
    pub shutdown_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(env::temp_dir)
            .join("plinth")
            .join("native");
        Self {
            locale: "en".to_string(),
            plugin_dir: PathBuf::from("plugins"),
            package_extension: DEFAULT_PACKAGE_EXTENSION.to_string(),
            cache_dir,
            event_workers: num_cpus::get().max(1),
            event_queue_capacity: 256,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.event_workers == 0 {
            anyhow::bail!("events.workers must be at least 1");
        }
        if self.event_queue_capacity == 0 {
            anyhow::bail!("events.queue-capacity must be at least 1");
        }
        if self.package_extension.is_empty() {
            anyhow::bail!("runtime.package-extension must not be empty");
        }
        Ok(())
    }

    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            workers: self.event_workers,
            queue_capacity: self.event_queue_capacity,
        }
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            package_extension: self.package_extension.clone(),
            running_version: RuntimeVersion::current(),
        }
    }
}

/// Discover configuration files in order of precedence
fn discover_config_files() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. Environment variable $PLINTH_CONFIG
    if let Ok(env_path) = env::var("PLINTH_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    // 2. XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("plinth").join("config.toml"));
    }

    // 3. Home directory
    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".plinth.toml"));
    }

    // 4. Project local
    paths.push(PathBuf::from("./.plinth.toml"));

    debug!("Config discovery paths: {:?}", paths);
    paths
}

/// Parse TOML content to string-based configuration
fn parse_toml_config(content: &str) -> Result<Configuration> {
    let toml_value: Value = content.parse().context("Failed to parse TOML content")?;

    let mut config = Configuration::new();
    if let Value::Table(table) = toml_value {
        flatten_toml_table(&table, String::new(), &mut config);
    }

    debug!("Parsed configuration: {:?}", config);
    Ok(config)
}

/// Recursively flatten TOML tables into section.subsection format
fn flatten_toml_table(table: &toml::Table, prefix: String, config: &mut Configuration) {
    for (key, value) in table {
        let section_name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            Value::Table(subtable) => {
                if subtable.values().all(|v| !matches!(v, Value::Table(_))) {
                    // Leaf table: a configuration section
                    let section = config.entry(section_name).or_default();
                    for (subkey, subvalue) in subtable {
                        section.insert(subkey.clone(), toml_value_to_string(subvalue));
                    }
                } else {
                    flatten_toml_table(subtable, section_name, config);
                }
            }
            _ => {
                // Top-level keys belong to [base]
                let section = if prefix.is_empty() { "base".to_string() } else { prefix.clone() };
                config
                    .entry(section)
                    .or_default()
                    .insert(key.clone(), toml_value_to_string(value));
            }
        }
    }
}

/// Convert TOML Value to string representation
fn toml_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Array(_) | Value::Table(_) => value.to_string(),
        Value::Datetime(d) => d.to_string(),
    }
}
