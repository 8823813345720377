//! Plugin Entry Point Contract
//!
//! Every plugin package names an entry point (`main-class`). Resolving it must
//! yield an [`EntryPointDecl`], whose constructor produces the plugin's
//! [`PluginEntry`] instance.
//!
//! Native plugins export the declaration as a static with
//! [`declare_plugin!`](crate::declare_plugin). The exported symbol name is the
//! entry point path with `::` replaced by `__`, see [`export_symbol`].

use crate::component::ComponentDescriptor;

use super::state::LifecycleHook;

/// Bumped whenever [`PluginEntry`] or [`EntryPointDecl`] change shape
pub const PLUGIN_CONTRACT: u32 = 2;

/// Leading bytes of every entry point declaration
pub const ENTRY_MAGIC: [u8; 8] = *b"PLINTHEP";

/// Result type of lifecycle hooks
pub type HookResult = anyhow::Result<()>;

pub type EntryConstructor = fn() -> Box<dyn PluginEntry>;
pub type ComponentExport = fn() -> Vec<ComponentDescriptor>;

/// The plugin contract. Hooks run when the plugin enters the matching state.
///
/// A hook runs with the plugin's entry lock held. Reaching back to the same
/// plugin through [`Plugin::entry`](super::Plugin::entry) from inside a hook
/// deadlocks; [`Plugin::try_entry`](super::Plugin::try_entry) returns `None`
/// instead.
pub trait PluginEntry: Send {
    fn on_enable(&mut self) -> HookResult {
        Ok(())
    }

    fn on_load(&mut self) -> HookResult {
        Ok(())
    }

    fn on_stop(&mut self) -> HookResult {
        Ok(())
    }

    fn on_disable(&mut self) -> HookResult {
        Ok(())
    }

    fn run_hook(&mut self, hook: LifecycleHook) -> HookResult {
        match hook {
            LifecycleHook::OnEnable => self.on_enable(),
            LifecycleHook::OnLoad => self.on_load(),
            LifecycleHook::OnStop => self.on_stop(),
            LifecycleHook::OnDisable => self.on_disable(),
        }
    }
}

/// What an entry point symbol resolves to
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct EntryPointDecl {
    pub magic: [u8; 8],
    pub contract: u32,
    pub construct: EntryConstructor,
    pub components: ComponentExport,
}

impl EntryPointDecl {
    pub const fn new(construct: EntryConstructor, components: ComponentExport) -> Self {
        Self {
            magic: ENTRY_MAGIC,
            contract: PLUGIN_CONTRACT,
            construct,
            components,
        }
    }

    /// Declaration for a plugin without components of its own
    pub const fn bare(construct: EntryConstructor) -> Self {
        Self::new(construct, no_components)
    }

    /// Whether this declaration was built against the running contract
    pub fn is_compatible(&self) -> bool {
        self.magic == ENTRY_MAGIC && self.contract == PLUGIN_CONTRACT
    }
}

pub fn no_components() -> Vec<ComponentDescriptor> {
    Vec::new()
}

/// Exported symbol name for an entry point path
pub fn export_symbol(entry_point: &str) -> String {
    entry_point.replace("::", "__")
}

/// Export an [`EntryPointDecl`] from a native plugin library.
///
/// ```ignore
/// plinth::declare_plugin!(demo__alpha__AlphaPlugin, AlphaPlugin::boxed);
/// plinth::declare_plugin!(demo__beta__BetaPlugin, BetaPlugin::boxed, beta_components);
/// ```
#[macro_export]
macro_rules! declare_plugin {
    ($symbol:ident, $construct:path) => {
        #[no_mangle]
        #[allow(non_upper_case_globals)]
        pub static $symbol: $crate::plugin::EntryPointDecl =
            $crate::plugin::EntryPointDecl::bare($construct);
    };
    ($symbol:ident, $construct:path, $components:path) => {
        #[no_mangle]
        #[allow(non_upper_case_globals)]
        pub static $symbol: $crate::plugin::EntryPointDecl =
            $crate::plugin::EntryPointDecl::new($construct, $components);
    };
}
