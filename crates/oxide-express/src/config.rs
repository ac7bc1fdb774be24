//! Application configuration.

use serde::{Deserialize, Serialize};

/// Default maximum request body size (4 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 4 * 1024 * 1024;

/// Routing and request-handling settings.
///
/// Every field has a default, so a partial document deserializes:
///
/// ```
/// use oxide_express::Config;
///
/// let config: Config = serde_json::from_str(r#"{"strict_routing": true}"#).unwrap();
/// assert!(config.strict_routing);
/// assert!(!config.case_sensitive);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `/Foo` and `/foo` are different routes.
    pub case_sensitive: bool,
    /// `/foo` and `/foo/` are different routes.
    pub strict_routing: bool,
    /// Percent-decode the request path before matching.
    pub unescape_path: bool,
    /// Informational application name.
    pub app_name: Option<String>,
    /// Bodies larger than this are rejected with 413.
    pub body_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            strict_routing: false,
            unescape_path: false,
            app_name: None,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl Config {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets case-sensitive routing.
    #[must_use]
    pub fn case_sensitive(mut self, enabled: bool) -> Self {
        self.case_sensitive = enabled;
        self
    }

    /// Sets strict routing.
    #[must_use]
    pub fn strict_routing(mut self, enabled: bool) -> Self {
        self.strict_routing = enabled;
        self
    }

    /// Sets path unescaping.
    #[must_use]
    pub fn unescape_path(mut self, enabled: bool) -> Self {
        self.unescape_path = enabled;
        self
    }

    /// Sets the application name.
    #[must_use]
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Sets the body limit in bytes.
    #[must_use]
    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }
}
