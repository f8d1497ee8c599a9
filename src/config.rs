//! Build-time configuration.
//!
//! The bundler bakes these values in as environment constants; the crate
//! reads them once at bootstrap through [`BuildConfig::from_env`].
//!
//! # Example
//!
//! ```ignore
//! use opn_inpage::BuildConfig;
//!
//! let config = BuildConfig::new()
//!     .with_name("OPN Wallet")
//!     .with_app_id("io.iopn.wallet")
//!     .with_debug();
//!
//! assert_eq!(config.log_level(), tracing::Level::DEBUG);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::env;

use tracing::Level;

use crate::error::{Error, Result};

// ============================================================================
// Environment Keys
// ============================================================================

/// Enables debug-level logging.
pub const ENV_DEBUG: &str = "METAMASK_DEBUG";

/// Wallet display name.
pub const ENV_BUILD_NAME: &str = "METAMASK_BUILD_NAME";

/// Wallet icon (data URI).
pub const ENV_BUILD_ICON: &str = "METAMASK_BUILD_ICON";

/// Reverse-DNS app identifier.
pub const ENV_BUILD_APP_ID: &str = "METAMASK_BUILD_APP_ID";

/// Set in end-to-end test builds.
pub const ENV_IN_TEST: &str = "IN_TEST";

// ============================================================================
// BuildConfig
// ============================================================================

/// Values the bundler injects into the inpage script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildConfig {
    /// Debug build (log level `DEBUG` instead of `WARN`).
    pub debug: bool,

    /// Display name announced to dapps.
    pub name: String,

    /// Icon reference announced to dapps.
    pub icon: String,

    /// Reverse-DNS identifier announced to dapps.
    pub app_id: String,

    /// End-to-end test build.
    pub in_test: bool,
}

// ============================================================================
// Constructors
// ============================================================================

impl BuildConfig {
    /// Creates an empty configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the configuration from process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            debug: lookup(ENV_DEBUG).is_some_and(|v| is_truthy(&v)),
            name: lookup(ENV_BUILD_NAME).unwrap_or_default(),
            icon: lookup(ENV_BUILD_ICON).unwrap_or_default(),
            app_id: lookup(ENV_BUILD_APP_ID).unwrap_or_default(),
            in_test: lookup(ENV_IN_TEST).is_some_and(|v| is_truthy(&v)),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl BuildConfig {
    /// Enables debug logging.
    #[inline]
    #[must_use]
    pub fn with_debug(mut self) -> Self {
        self.debug = true;
        self
    }

    /// Sets the display name.
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the icon reference.
    #[inline]
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    /// Sets the reverse-DNS app identifier.
    #[inline]
    #[must_use]
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    /// Marks this as a test build.
    #[inline]
    #[must_use]
    pub fn with_in_test(mut self) -> Self {
        self.in_test = true;
        self
    }
}

// ============================================================================
// Queries
// ============================================================================

impl BuildConfig {
    /// Default log level for the inpage logger.
    #[inline]
    #[must_use]
    pub fn log_level(&self) -> Level {
        if self.debug { Level::DEBUG } else { Level::WARN }
    }

    /// Checks that the identity values announced to dapps are present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the name or app id is empty.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config(format!("{ENV_BUILD_NAME} is not set")));
        }

        if self.app_id.trim().is_empty() {
            return Err(Error::config(format!("{ENV_BUILD_APP_ID} is not set")));
        }

        Ok(())
    }
}

/// Bundler flags arrive as strings; only explicit truthy values count.
fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use rustc_hash::FxHashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: FxHashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_reads_all_keys() {
        let config = BuildConfig::from_lookup(lookup_from(&[
            (ENV_DEBUG, "true"),
            (ENV_BUILD_NAME, "OPN Wallet"),
            (ENV_BUILD_ICON, "data:image/svg+xml,<svg/>"),
            (ENV_BUILD_APP_ID, "io.iopn.wallet"),
        ]));

        assert!(config.debug);
        assert!(!config.in_test);
        assert_eq!(config.name, "OPN Wallet");
        assert_eq!(config.app_id, "io.iopn.wallet");
        assert!(config.icon.starts_with("data:"));
    }

    #[test]
    fn test_log_level() {
        assert_eq!(BuildConfig::new().log_level(), Level::WARN);
        assert_eq!(BuildConfig::new().with_debug().log_level(), Level::DEBUG);
    }

    #[test]
    fn test_false_flag_is_not_debug() {
        let config = BuildConfig::from_lookup(lookup_from(&[(ENV_DEBUG, "false")]));
        assert!(!config.debug);
    }

    #[test]
    fn test_validate_requires_name_and_app_id() {
        assert!(BuildConfig::new().validate().is_err());
        assert!(BuildConfig::new().with_name("OPN").validate().is_err());
        assert!(
            BuildConfig::new()
                .with_name("OPN")
                .with_app_id("io.iopn.wallet")
                .validate()
                .is_ok()
        );
    }
}
