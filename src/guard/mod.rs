//! Call-site Authorization Guard
//!
//! Verifies that single-owner lifecycle entry points are only driven by the
//! designated orchestrating code. Callers present an explicit [`CallSite`]
//! (carried inside an [`OrchestratorToken`]) and the guarded operation lists the
//! filters it accepts.
//!
//! This is not a security boundary against hostile in-process code; it keeps
//! accidental callers away from internal transitions.
//!
//! # Example
//!
//! ```
//! use plinth::guard::{verify_caller, CallSite, CallerFilter};
//!
//! let site = CallSite::new("Runtime", "start");
//! assert!(verify_caller(&site, &[CallerFilter::exact("Runtime", "start")]).is_ok());
//! assert!(verify_caller(&site, &[CallerFilter::owner("Runtime")]).is_ok());
//! assert!(verify_caller(&site, &[CallerFilter::exact("Runtime", "shutdown")]).is_err());
//! ```

pub mod error;
pub mod token;

pub use error::{GuardError, GuardResult};
pub use token::{CallSite, OrchestratorToken};

use std::fmt;

/// One allowed caller: exact owner+operation, or any operation of an owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerFilter {
    owner: &'static str,
    operation: Option<&'static str>,
}

impl CallerFilter {
    /// Match a single operation of a single owner
    pub const fn exact(owner: &'static str, operation: &'static str) -> Self {
        Self { owner, operation: Some(operation) }
    }

    /// Match any operation of the owner
    pub const fn owner(owner: &'static str) -> Self {
        Self { owner, operation: None }
    }

    fn is_empty(&self) -> bool {
        self.owner.is_empty() && self.operation.map_or(true, str::is_empty)
    }

    fn check(&self, site: &CallSite) -> GuardResult<()> {
        if self.is_empty() {
            return Err(GuardError::misuse(
                "caller filter must name an owner or an operation",
            ));
        }

        let owner_matches = self.owner.is_empty() || self.owner == site.owner();
        let operation_matches = match self.operation {
            Some(operation) if !operation.is_empty() => operation == site.operation(),
            _ => true,
        };

        if owner_matches && operation_matches {
            Ok(())
        } else {
            Err(GuardError::unauthorized(self.to_string(), site.to_string()))
        }
    }
}

impl fmt::Display for CallerFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operation {
            Some(operation) => write!(f, "{}::{}", self.owner, operation),
            None => write!(f, "{}::*", self.owner),
        }
    }
}

/// Verify that `site` matches one of `allowed`.
///
/// Filters are evaluated in order and the first match wins. When none match,
/// the failure from the last filter is returned. A filter naming neither owner
/// nor operation is a [`GuardError::GuardMisuse`], as is an empty filter list.
pub fn verify_caller(site: &CallSite, allowed: &[CallerFilter]) -> GuardResult<()> {
    let mut last_failure = GuardError::misuse("no caller filters supplied");

    for filter in allowed {
        match filter.check(site) {
            Ok(()) => return Ok(()),
            Err(err) if err.is_misuse() => return Err(err),
            Err(err) => last_failure = err,
        }
    }

    log::warn!("Rejected call from {}: {}", site, last_failure);
    Err(last_failure)
}

/// Verify the call site carried by an orchestrator token
pub fn verify_token(token: &OrchestratorToken, allowed: &[CallerFilter]) -> GuardResult<()> {
    verify_caller(token.call_site(), allowed)
}
