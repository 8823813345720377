//! Error Handler Registry
//!
//! Errors that cannot be returned to a caller (subscriber failures, resolver
//! failures, plugin load failures, panics) are routed here. Lookup order is the
//! handler registered for the concrete [`ErrorKind`], then the generic handler,
//! and finally a "no handler found" escalation.

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use log::{debug, error};
use parking_lot::RwLock;

use super::{ErrorKind, RuntimeError};

const PANIC_ROUTER_THREAD: &str = "plinth-panic-router";

thread_local! {
    /// Depth of [`contain`] calls on this thread
    static CONTAINED: Cell<usize> = const { Cell::new(0) };
}

/// Run `f`, catching any panic it raises.
///
/// The caller reports what it caught, so the panic hook skips panics raised
/// inside this call.
pub(crate) fn contain<F, R>(f: F) -> thread::Result<R>
where
    F: FnOnce() -> R,
{
    CONTAINED.with(|depth| depth.set(depth.get() + 1));
    let outcome = panic::catch_unwind(AssertUnwindSafe(f));
    CONTAINED.with(|depth| depth.set(depth.get() - 1));
    outcome
}

fn is_contained() -> bool {
    CONTAINED.with(|depth| depth.get() > 0)
}

/// The thread on which an error surfaced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    name: String,
    id: ThreadId,
}

impl ThreadInfo {
    pub fn current() -> Self {
        let current = thread::current();
        Self {
            name: current.name().unwrap_or("<unnamed>").to_string(),
            id: current.id(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }
}

impl fmt::Display for ThreadInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.name, self.id)
    }
}

/// Receives errors routed to the registry
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, thread: &ThreadInfo, error: &RuntimeError);
}

impl<F> ErrorHandler for F
where
    F: Fn(&ThreadInfo, &RuntimeError) + Send + Sync,
{
    fn handle(&self, thread: &ThreadInfo, error: &RuntimeError) {
        self(thread, error)
    }
}

/// Which handler, if any, took an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlingOutcome {
    Specific(ErrorKind),
    Generic,
    Escalated,
}

/// Kind-keyed error handlers with a generic fallback
#[derive(Default)]
pub struct ErrorHandlerRegistry {
    handlers: DashMap<ErrorKind, Arc<dyn ErrorHandler>>,
    generic: RwLock<Option<Arc<dyn ErrorHandler>>>,
    escalations: AtomicU64,
}

impl ErrorHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for one error kind, returning any handler it replaces
    pub fn register(
        &self,
        kind: ErrorKind,
        handler: Arc<dyn ErrorHandler>,
    ) -> Option<Arc<dyn ErrorHandler>> {
        debug!("Registering error handler for {}", kind);
        self.handlers.insert(kind, handler)
    }

    /// Register the fallback handler, returning any handler it replaces
    pub fn set_generic(&self, handler: Arc<dyn ErrorHandler>) -> Option<Arc<dyn ErrorHandler>> {
        debug!("Registering generic error handler");
        self.generic.write().replace(handler)
    }

    pub fn has_handler(&self, kind: ErrorKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn has_generic(&self) -> bool {
        self.generic.read().is_some()
    }

    /// Drop every registered handler, generic included
    pub fn clear(&self) {
        self.handlers.clear();
        self.generic.write().take();
    }

    /// Number of errors nobody handled
    pub fn escalation_count(&self) -> u64 {
        self.escalations.load(Ordering::Relaxed)
    }

    /// Route an error that surfaced on `thread`
    pub fn handle(&self, thread: &ThreadInfo, err: &RuntimeError) -> HandlingOutcome {
        let kind = err.kind();

        // Clone the Arc out so no map guard is held while the handler runs
        let specific = self.handlers.get(&kind).map(|entry| Arc::clone(entry.value()));
        if let Some(handler) = specific {
            if Self::invoke(handler.as_ref(), thread, err) {
                return HandlingOutcome::Specific(kind);
            }
        }

        let generic = self.generic.read().clone();
        if let Some(handler) = generic {
            if Self::invoke(handler.as_ref(), thread, err) {
                return HandlingOutcome::Generic;
            }
        }

        self.escalations.fetch_add(1, Ordering::Relaxed);
        error!("No handler found for {} on thread {}: {}", kind, thread, err);
        HandlingOutcome::Escalated
    }

    /// Route an error that surfaced on the calling thread
    pub fn handle_current(&self, err: &RuntimeError) -> HandlingOutcome {
        self.handle(&ThreadInfo::current(), err)
    }

    fn invoke(handler: &dyn ErrorHandler, thread: &ThreadInfo, err: &RuntimeError) -> bool {
        match contain(|| handler.handle(thread, err)) {
            Ok(()) => true,
            Err(payload) => {
                error!(
                    "Error handler panicked while handling {}: {}",
                    err.kind(),
                    panic_message(payload.as_ref())
                );
                false
            }
        }
    }
}

impl fmt::Debug for ErrorHandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&'static str> =
            self.handlers.iter().map(|entry| entry.key().as_str()).collect();
        kinds.sort_unstable();
        f.debug_struct("ErrorHandlerRegistry")
            .field("kinds", &kinds)
            .field("generic", &self.has_generic())
            .field("escalations", &self.escalation_count())
            .finish()
    }
}

/// Route uncaught panics on every thread into `registry`, then run the
/// previous hook.
///
/// Panics caught by a runtime boundary (subscriber delivery, lifecycle hooks,
/// resolvers, constructors, error handlers) are already routed as their own
/// error kind and are skipped here.
pub fn install_panic_hook(registry: Arc<ErrorHandlerRegistry>) {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if !is_contained() {
            let origin = ThreadInfo::current();
            let mut message = panic_message(info.payload());
            if let Some(location) = info.location() {
                message = format!("{} at {}:{}", message, location.file(), location.line());
            }
            route_panic(&registry, origin, message);
        }
        previous(info);
    }));
}

/// Handlers run on a router thread; a second panic on the panicking thread
/// would abort the process.
fn route_panic(registry: &Arc<ErrorHandlerRegistry>, origin: ThreadInfo, message: String) {
    let router = Arc::clone(registry);
    let spawned = thread::Builder::new()
        .name(PANIC_ROUTER_THREAD.to_string())
        .spawn(move || {
            let err = RuntimeError::panic(origin.name(), message);
            contain(|| router.handle(&origin, &err))
        });
    match spawned {
        Ok(handle) => {
            if handle.join().is_err() {
                error!("Panic router stopped unexpectedly");
            }
        }
        Err(e) => error!("Could not start panic router: {}", e),
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
