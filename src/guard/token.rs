//! Orchestrator Capability Tokens
//!
//! Protected lifecycle operations take an [`OrchestratorToken`] by reference.
//! The token can only be issued from inside this crate, so code outside the
//! crate cannot drive bulk lifecycle transitions at all. The token also records
//! the call site that issued it, which the guarded operation checks against its
//! allowed filters.

use std::fmt;

/// Identity of a caller: the owning type and the operation within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSite {
    owner: &'static str,
    operation: &'static str,
}

impl CallSite {
    pub const fn new(owner: &'static str, operation: &'static str) -> Self {
        Self { owner, operation }
    }

    pub fn owner(&self) -> &'static str {
        self.owner
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner, self.operation)
    }
}

/// Unforgeable capability held by the orchestrating entry point
pub struct OrchestratorToken {
    site: CallSite,
    // Keeps the token from being built with a struct literal outside the crate
    _sealed: (),
}

impl OrchestratorToken {
    pub(crate) fn issue(site: CallSite) -> Self {
        Self { site, _sealed: () }
    }

    pub fn call_site(&self) -> &CallSite {
        &self.site
    }
}

impl fmt::Debug for OrchestratorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestratorToken")
            .field("site", &self.site)
            .finish()
    }
}
