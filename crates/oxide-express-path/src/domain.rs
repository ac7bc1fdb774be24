//! Host name patterns for virtual-host routing.
//!
//! A pattern is a dotted host name whose labels are either constants or
//! `:name` placeholders, e.g. `:tenant.api.example.com`. Matching is ASCII
//! case-insensitive and a placeholder spans exactly one label.

use crate::error::{PatternError, Result};

/// A compiled host pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainPattern {
    raw: String,
    /// Labels, constants lowercased.
    parts: Vec<String>,
    param_indices: Vec<usize>,
    param_names: Vec<String>,
}

impl DomainPattern {
    /// Compiles a host pattern.
    ///
    /// # Example
    ///
    /// ```
    /// use oxide_express_path::DomainPattern;
    ///
    /// let pattern = DomainPattern::compile(":tenant.example.com").unwrap();
    /// assert_eq!(pattern.matches("ACME.example.com"), Some(vec!["acme".to_string()]));
    /// assert_eq!(pattern.matches("example.com"), None);
    /// ```
    pub fn compile(pattern: &str) -> Result<Self> {
        let invalid = |reason: &str| PatternError::InvalidDomain {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let host = pattern.strip_suffix('.').unwrap_or(pattern);
        if host.is_empty() {
            return Err(invalid("empty host"));
        }

        let mut parts = Vec::new();
        let mut param_indices = Vec::new();
        let mut param_names = Vec::new();

        for (i, label) in host.split('.').enumerate() {
            if label.is_empty() {
                return Err(invalid("empty label"));
            }
            if let Some(name) = label.strip_prefix(':') {
                if name.is_empty() {
                    return Err(invalid("unnamed parameter"));
                }
                if param_names.iter().any(|n| n == name) {
                    return Err(invalid("duplicate parameter"));
                }
                param_indices.push(i);
                param_names.push(name.to_string());
                parts.push(label.to_string());
            } else {
                parts.push(label.to_ascii_lowercase());
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            parts,
            param_indices,
            param_names,
        })
    }

    /// Returns the pattern as written.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the placeholder names in label order.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Number of labels.
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Matches a `Host` value and returns the lowercased placeholder values.
    ///
    /// A port and a trailing root dot are ignored.
    pub fn matches(&self, host: &str) -> Option<Vec<String>> {
        let host = strip_port(host);
        let host = host.strip_suffix('.').unwrap_or(host);
        if host.is_empty() {
            return None;
        }

        let mut values = Vec::with_capacity(self.param_indices.len());
        let mut next_param = self.param_indices.iter().peekable();
        let mut count = 0;

        for (i, label) in host.split('.').enumerate() {
            let part = self.parts.get(i)?;
            if next_param.next_if_eq(&&i).is_some() {
                if label.is_empty() {
                    return None;
                }
                values.push(label.to_ascii_lowercase());
            } else if !part.eq_ignore_ascii_case(label) {
                return None;
            }
            count += 1;
        }

        (count == self.parts.len()).then_some(values)
    }
}

/// Removes a `:port` suffix from a `Host` value.
///
/// Bracketed IPv6 literals lose their brackets; a bare IPv6 address is
/// returned unchanged.
pub fn strip_port(host: &str) -> &str {
    if let Some(inner) = host.strip_prefix('[') {
        return inner.find(']').map_or(host, |end| &inner[..end]);
    }

    match host.rfind(':') {
        Some(i) if host[..i].contains(':') => host,
        Some(i) => &host[..i],
        None => host,
    }
}
