//! Context and stream channel names.
//!
//! These strings must match the content script and background exactly.

// ============================================================================
// Contexts
// ============================================================================

/// Content script side of the page transport.
pub const CONTENT_SCRIPT: &str = "opn-contentscript";

/// Page side of the page transport.
pub const METAMASK_INPAGE: &str = "opn-inpage";

/// Phishing warning page context.
pub const PHISHING_WARNING_PAGE: &str = "opn-phishing-warning-page";

// ============================================================================
// Stream Channels
// ============================================================================

/// Cookie handler channel.
pub const METAMASK_COOKIE_HANDLER: &str = "opn-cookie-handler";

/// EIP-1193 provider sub-stream.
pub const METAMASK_EIP_1193_PROVIDER: &str = "opn-provider";

/// CAIP multichain provider channel.
pub const METAMASK_CAIP_MULTICHAIN_PROVIDER: &str = "opn-multichain-provider";

/// Phishing safelist channel.
pub const PHISHING_SAFELIST: &str = "opn-phishing-safelist";

/// Phishing detection channel.
pub const PHISHING_STREAM: &str = "phishing";

// ============================================================================
// Legacy Channels
// ============================================================================

// Reserved for pages still running the pre-rename provider. Not opened by
// new code.

/// Legacy content script context.
pub const LEGACY_CONTENT_SCRIPT: &str = "contentscript";

/// Legacy page context.
pub const LEGACY_INPAGE: &str = "inpage";

/// Legacy provider sub-stream.
pub const LEGACY_PROVIDER: &str = "provider";

/// Legacy public config sub-stream.
pub const LEGACY_PUBLIC_CONFIG: &str = "publicConfig";

// ============================================================================
// Tests
// ============================================================================
