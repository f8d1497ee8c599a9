//! Provider injection eligibility.
//!
//! Decides whether the bridge should touch a page at all. Non-HTML
//! documents (XML, PDF viewers) and a short list of domains known to break
//! when a provider appears are skipped.
//!
//! The decision is a seam: anything implementing [`InjectionPolicy`] can
//! replace the default, including plain closures.

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

// ============================================================================
// Constants
// ============================================================================

/// Domains (and their subdomains) that never get a provider.
pub const BLOCKED_DOMAINS: &[&str] = &[
    "execution.consensys.io",
    "uscourts.gov",
    "dropbox.com",
    "webbyawards.com",
    "adyen.com",
    "gravityforms.com",
    "harbourair.com",
    "ani.gamer.com.tw",
    "blueskybooking.com",
    "sharefile.com",
    "battle.net",
];

/// Path suffixes of documents that are not web apps.
const PROHIBITED_SUFFIXES: &[&str] = &[".xml", ".pdf"];

static BLOCKED_HOST: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = BLOCKED_DOMAINS
        .iter()
        .map(|d| regex::escape(d))
        .collect::<Vec<_>>()
        .join("|");

    Regex::new(&format!(r"(?i)^(?:[^.]+\.)*(?:{alternation})$"))
        .expect("blocked domain pattern is valid")
});

// ============================================================================
// PageContext
// ============================================================================

/// What the bridge can observe about the current document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    /// Document location.
    pub url: Url,

    /// `document.doctype.name`, if the document has a doctype.
    pub doctype: Option<String>,

    /// `document.documentElement.nodeName`, if any.
    pub document_element: Option<String>,
}

impl PageContext {
    /// An ordinary HTML page at `url`.
    #[must_use]
    pub fn html(url: Url) -> Self {
        Self {
            url,
            doctype: Some("html".to_string()),
            document_element: Some("HTML".to_string()),
        }
    }

    /// Sets the doctype name.
    #[inline]
    #[must_use]
    pub fn with_doctype(mut self, doctype: Option<&str>) -> Self {
        self.doctype = doctype.map(str::to_string);
        self
    }

    /// Sets the document element node name.
    #[inline]
    #[must_use]
    pub fn with_document_element(mut self, node_name: Option<&str>) -> Self {
        self.document_element = node_name.map(str::to_string);
        self
    }
}

// ============================================================================
// InjectionPolicy
// ============================================================================

/// Eligibility predicate consulted before any side effect.
pub trait InjectionPolicy: Send + Sync {
    /// Returns `true` if the provider should be injected into `page`.
    fn should_inject(&self, page: &PageContext) -> bool;
}

impl<F> InjectionPolicy for F
where
    F: Fn(&PageContext) -> bool + Send + Sync,
{
    fn should_inject(&self, page: &PageContext) -> bool {
        self(page)
    }
}

// ============================================================================
// DefaultInjectionPolicy
// ============================================================================

/// Document-type and domain checks applied to every page.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultInjectionPolicy;

impl InjectionPolicy for DefaultInjectionPolicy {
    fn should_inject(&self, page: &PageContext) -> bool {
        doctype_check(page)
            && suffix_check(page)
            && document_element_check(page)
            && !blocked_domain_check(page)
    }
}

fn doctype_check(page: &PageContext) -> bool {
    page.doctype.as_deref().is_none_or(|name| name == "html")
}

fn suffix_check(page: &PageContext) -> bool {
    let path = page.url.path();
    !PROHIBITED_SUFFIXES.iter().any(|s| path.ends_with(s))
}

fn document_element_check(page: &PageContext) -> bool {
    page.document_element
        .as_deref()
        .is_none_or(|name| name.eq_ignore_ascii_case("html"))
}

fn blocked_domain_check(page: &PageContext) -> bool {
    page.url
        .host_str()
        .is_some_and(|host| BLOCKED_HOST.is_match(host))
}

// ============================================================================
// Tests
// ============================================================================
