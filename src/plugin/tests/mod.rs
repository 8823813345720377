//! Plugin System Tests
//!
//! Loader and registry behaviour against mock plugins and generated packages.



#[cfg(test)]
pub mod state_properties;
