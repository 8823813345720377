//! Tables for plugin and component listings
//!
//! Layout is done by prettytable on plain text; colour is applied per line
//! afterwards so escape codes never skew column widths.

use prettytable::{format, Cell, Row, Table};

use super::colours::ColourManager;
use crate::component::{ComponentRegistry, CreationOutcome};
use crate::plugin::{PluginLoader, PluginState};

/// Format a compact table with headers and rows using prettytable-rs clean format
pub fn format_compact_table(headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
    if rows.is_empty() {
        return Vec::new();
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);
    table.add_row(Row::new(headers.iter().map(|header| Cell::new(header)).collect()));
    for row in rows {
        table.add_row(Row::new(row.iter().map(|cell| Cell::new(cell)).collect()));
    }

    table
        .to_string()
        .lines()
        .map(|line| format!("  {}", line.trim_end()))
        .collect()
}

/// One line per registered plugin: name, state, declared version, author, package
pub fn plugin_table(loader: &PluginLoader, colours: &ColourManager) -> String {
    let mut states: Vec<PluginState> = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    for plugin in loader.all_plugins() {
        let Some(state) = loader.state_of(plugin.name()) else {
            continue;
        };
        let descriptor = plugin.descriptor();
        let package = descriptor
            .package_file()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "-".to_string());
        states.push(state);
        rows.push(vec![
            descriptor.name().to_string(),
            state.to_string(),
            descriptor.declared_version().to_string(),
            descriptor.author().to_string(),
            package,
        ]);
    }

    let lines = format_compact_table(&["Plugin", "State", "API", "Author", "Package"], &rows);
    if lines.is_empty() {
        return format!("  {}\n", colours.muted("No plugins registered."));
    }

    let mut output = String::new();
    for (index, line) in lines.iter().enumerate() {
        let painted = match index {
            0 => colours.highlight(line),
            n => colours.state(states[n - 1], line),
        };
        output.push_str(&painted.to_string());
        output.push('\n');
    }
    output
}

/// One line per created component: name, type, namespace
pub fn component_table(registry: &ComponentRegistry, colours: &ColourManager) -> String {
    let rows: Vec<Vec<String>> = registry
        .names()
        .into_iter()
        .filter_map(|name| {
            let entry = registry.entry(&name)?;
            Some(vec![name, entry.type_name().to_string(), entry.namespace().to_string()])
        })
        .collect();

    let lines = format_compact_table(&["Component", "Type", "Namespace"], &rows);
    if lines.is_empty() {
        return format!("  {}\n", colours.muted("No components created."));
    }

    let mut output = String::new();
    for (index, line) in lines.iter().enumerate() {
        let painted = if index == 0 { colours.highlight(line) } else { colours.info(line) };
        output.push_str(&painted.to_string());
        output.push('\n');
    }
    output
}

/// Components that could not be created, one per line
pub fn creation_failures(outcomes: &[CreationOutcome], colours: &ColourManager) -> String {
    let mut output = String::new();
    for outcome in outcomes {
        if let Err(e) = &outcome.result {
            let line = format!("  {}: {}", outcome.type_name, e);
            output.push_str(&colours.error(&line).to_string());
            output.push('\n');
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, ComponentDescriptor, ComponentError, ComponentNamespace};
    use crate::plugin::tests::mock_plugins::{recording_plugin, Harness};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct Probe;

    impl Component for Probe {}

    #[test]
    fn test_compact_table_layout() {
        let lines = format_compact_table(
            &["Plugin", "State"],
            &[
                vec!["Alpha".to_string(), "Loaded".to_string()],
                vec!["LongerName".to_string(), "Enabled".to_string()],
            ],
        );

        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|line| line.starts_with("  ")));
        let column = lines[0].find("State").unwrap();
        assert_eq!(lines[1].find("Loaded"), Some(column));
        assert_eq!(lines[2].find("Enabled"), Some(column));
    }

    #[test]
    fn test_empty_compact_table() {
        assert!(format_compact_table(&["Plugin"], &[]).is_empty());
    }

    #[test]
    fn test_plugin_table_shows_states() {
        let harness = Harness::new();
        let hooks = Arc::new(Mutex::new(Vec::new()));
        harness.loader.register("Alpha", recording_plugin("Alpha", &hooks)).unwrap();
        harness.loader.register("Beta", recording_plugin("Beta", &hooks)).unwrap();
        harness.loader.advance("Beta", PluginState::Enabled).unwrap();

        let table = plugin_table(&harness.loader, &ColourManager::with_colours(false));
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("Plugin") && lines[0].contains("Author"));
        assert!(lines[1].contains("Alpha") && lines[1].contains("Registered"));
        assert!(lines[2].contains("Beta") && lines[2].contains("Enabled"));
        assert!(lines[2].contains("Test Author"));
    }

    #[test]
    fn test_empty_plugin_table() {
        let harness = Harness::new();
        let table = plugin_table(&harness.loader, &ColourManager::with_colours(false));
        assert_eq!(table, "  No plugins registered.\n");
    }

    #[test]
    fn test_component_table() {
        let registry = ComponentRegistry::new();
        let namespace = ComponentNamespace::empty("host");
        registry.insert("Probe", Arc::new(Probe), "table::Probe", &namespace).unwrap();

        let table = component_table(&registry, &ColourManager::with_colours(false));
        assert!(table.contains("Component"));
        assert!(table.contains("Probe"));
        assert!(table.contains("host"));
    }

    #[test]
    fn test_empty_component_table() {
        let table = component_table(&ComponentRegistry::new(), &ColourManager::with_colours(false));
        assert_eq!(table, "  No components created.\n");
    }

    #[test]
    fn test_creation_failures_lists_errors_only() {
        let descriptor = ComponentDescriptor::of::<Probe>();
        let outcomes = vec![
            CreationOutcome {
                type_name: descriptor.type_name(),
                result: Ok("Probe".to_string()),
            },
            CreationOutcome {
                type_name: "table::Broken",
                result: Err(ComponentError::name_conflict("Broken")),
            },
        ];

        let text = creation_failures(&outcomes, &ColourManager::with_colours(false));
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("  table::Broken: "));
    }
}
