//! Scoped suspension of a page global.
//!
//! Importing bundled modules while an AMD loader's `define` is visible can
//! make them register with the page's loader instead of running. The
//! bootstrap suspends `define` for the import phase:
//!
//! ```text
//!   let _guard = window.suspend_global("define");   define = undefined
//!   ... imports ...
//!   drop(_guard)                                    define restored
//! ```
//!
//! Both steps are best effort. A read-only binding logs a warning and the
//! caller carries on.

// ============================================================================
// Imports
// ============================================================================

use tracing::{trace, warn};

use super::Window;
use super::globals::GlobalValue;

// ============================================================================
// GlobalGuard
// ============================================================================

/// Clears a global on creation and restores it on drop.
///
/// Restoration happens on every exit path, unwinding included.
#[must_use = "the global is restored as soon as the guard is dropped"]
pub struct GlobalGuard<'a> {
    window: &'a Window,
    name: String,
    saved: GlobalValue,
}

impl<'a> GlobalGuard<'a> {
    /// Captures `window[name]` and sets it to `undefined`.
    pub(crate) fn new(window: &'a Window, name: &str) -> Self {
        let saved = window.get(name).unwrap_or(GlobalValue::Undefined);

        if let Err(e) = window.set(name, GlobalValue::Undefined) {
            warn!(error = %e, "global.{name} could not be deleted.");
        } else {
            trace!(name, "Global suspended");
        }

        Self {
            window,
            name: name.to_string(),
            saved,
        }
    }

    /// Name of the suspended global.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value that will be restored.
    #[inline]
    #[must_use]
    pub fn saved(&self) -> &GlobalValue {
        &self.saved
    }
}

impl Drop for GlobalGuard<'_> {
    fn drop(&mut self) {
        let saved = std::mem::replace(&mut self.saved, GlobalValue::Undefined);

        if let Err(e) = self.window.set(&self.name, saved) {
            warn!(error = %e, "global.{} could not be overwritten.", self.name);
        } else {
            trace!(name = %self.name, "Global restored");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
