//! Contract constants shared with the extension's other contexts.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `stream` | Context and stream channel names |
//! | `whitelist` | Marketing sites allowed to read the cookie id |

// ============================================================================
// Submodules
// ============================================================================

/// Context and stream channel names.
pub mod stream;

/// Marketing site whitelist.
pub mod whitelist;

// ============================================================================
// Re-exports
// ============================================================================

pub use stream::{
    CONTENT_SCRIPT, LEGACY_CONTENT_SCRIPT, LEGACY_INPAGE, LEGACY_PROVIDER, LEGACY_PUBLIC_CONFIG,
    METAMASK_CAIP_MULTICHAIN_PROVIDER, METAMASK_COOKIE_HANDLER, METAMASK_EIP_1193_PROVIDER,
    METAMASK_INPAGE, PHISHING_SAFELIST, PHISHING_STREAM, PHISHING_WARNING_PAGE,
};
pub use whitelist::{COOKIE_ID_MARKETING_WHITELIST, MarketingWhitelist};
