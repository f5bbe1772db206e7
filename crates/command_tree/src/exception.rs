//! Failure-kind to handler dispatch with ancestor fallback.

use std::{
    collections::HashMap,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use command_tree_contract::FailureKind;
use tracing::warn;

use crate::{engine::panic_message, error::CommandError};

/// Side-effecting observer of a failed attempt.
pub type ExceptionHandler<C> = Arc<dyn Fn(&C, &CommandError) + Send + Sync>;

/// Handler table keyed by [`FailureKind`].
pub struct ExceptionController<C> {
    handlers: HashMap<FailureKind, ExceptionHandler<C>>,
}

impl<C> fmt::Debug for ExceptionController<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionController")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<C> Default for ExceptionController<C> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<C> ExceptionController<C> {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for `kind`, replacing any previous one.
    pub fn register_handler<F>(&mut self, kind: FailureKind, handler: F)
    where
        F: Fn(&C, &CommandError) + Send + Sync + 'static,
    {
        self.handlers.insert(kind, Arc::new(handler));
    }

    /// Removes the handler for `kind`.
    pub fn remove_handler(&mut self, kind: FailureKind) -> Option<ExceptionHandler<C>> {
        self.handlers.remove(&kind)
    }

    /// Whether a handler is registered for exactly `kind`.
    pub fn has_handler(&self, kind: FailureKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Kind whose handler would observe `error`.
    pub fn resolve(&self, kind: FailureKind) -> Option<FailureKind> {
        kind.lineage()
            .into_iter()
            .find(|candidate| self.handlers.contains_key(candidate))
    }

    /// Invokes the most specific handler for `error`, falling back through its ancestors.
    ///
    /// Returns `false` when no level has a handler; the failure is logged and still reaches the
    /// caller through the attempt's result. A panicking handler is logged and counts as handled.
    pub fn handle(&self, sender: &C, error: &CommandError) -> bool {
        let Some(handler) = self
            .resolve(error.kind())
            .and_then(|kind| self.handlers.get(&kind))
        else {
            warn!(kind = ?error.kind(), %error, "unhandled command failure");
            return false;
        };
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(sender, error))) {
            warn!(
                kind = ?error.kind(),
                cause = %panic_message("exception handler", payload.as_ref()),
                "exception handler failed"
            );
        }
        true
    }
}
