//! Marketing sites allowed to receive the wallet's cookie id.

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::error::Result;

// ============================================================================
// Constants
// ============================================================================

/// Production marketing sites.
pub const COOKIE_ID_MARKETING_WHITELIST: &[&str] = &[
    "https://iopn.io",
    "https://learn.iopn.io",
    "https://iopn.zendesk.com",
    "https://community.iopn.io",
    "https://support.iopn.io",
];

/// Local test server, appended in test builds only.
const TEST_SITE: &str = "http://127.0.0.1:8080";

// ============================================================================
// MarketingWhitelist
// ============================================================================

/// Resolved whitelist, as full URLs and as serialized origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketingWhitelist {
    urls: Vec<String>,
    origins: Vec<String>,
}

impl MarketingWhitelist {
    /// Builds the whitelist, adding the local test server when `in_test`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Url`] if an entry is not a valid URL.
    pub fn new(in_test: bool) -> Result<Self> {
        let mut urls: Vec<String> = COOKIE_ID_MARKETING_WHITELIST
            .iter()
            .map(|s| (*s).to_string())
            .collect();

        if in_test {
            urls.push(TEST_SITE.to_string());
        }

        let origins = urls
            .iter()
            .map(|u| Ok(Url::parse(u)?.origin().ascii_serialization()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { urls, origins })
    }

    /// Whitelisted URLs as configured.
    #[inline]
    #[must_use]
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Origins of the whitelisted URLs.
    #[inline]
    #[must_use]
    pub fn origins(&self) -> &[String] {
        &self.origins
    }

    /// Returns `true` if `url` shares an origin with a whitelisted site.
    #[must_use]
    pub fn allows(&self, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization();
        self.origins.iter().any(|o| *o == origin)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_whitelist() {
        let list = MarketingWhitelist::new(false).expect("valid");
        assert_eq!(list.urls().len(), 5);
        assert!(!list.urls().iter().any(|u| u.contains("127.0.0.1")));
    }

    #[test]
    fn test_test_build_adds_local_server() {
        let list = MarketingWhitelist::new(true).expect("valid");
        assert_eq!(list.urls().len(), 6);
        assert!(list.origins().contains(&"http://127.0.0.1:8080".to_string()));
    }

    #[test]
    fn test_origins_match_paths() {
        let list = MarketingWhitelist::new(false).expect("valid");
        let url = Url::parse("https://learn.iopn.io/articles/1").expect("url");
        assert!(list.allows(&url));

        let other = Url::parse("https://iopn.io.evil.example/").expect("url");
        assert!(!list.allows(&other));
    }

    #[test]
    fn test_scheme_is_part_of_origin() {
        let list = MarketingWhitelist::new(false).expect("valid");
        let url = Url::parse("http://iopn.io/").expect("url");
        assert!(!list.allows(&url));
    }
}
