//! Parameter constraints.
//!
//! A constraint is attached to a named parameter with `<...>`:
//!
//! ```text
//! /users/:id<int>
//! /api/v1/:n<int;max(3000)>
//! /posts/:date<datetime(2006\-01\-02)>
//! /tags/:tag<regex(^[a-z]+$)>
//! ```
//!
//! Arguments are parsed when the pattern is compiled, so a malformed argument
//! or regex fails registration instead of a request.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::error::{PatternError, Result};
use crate::layout;

static GUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:urn:uuid:)?\{?[0-9a-fA-F]{8}-?[0-9a-fA-F]{4}-?[0-9a-fA-F]{4}-?[0-9a-fA-F]{4}-?[0-9a-fA-F]{12}\}?$",
    )
    .unwrap_or_else(|_| unreachable!("static guid regex compiles"))
});

/// Signature of a user-registered constraint check.
///
/// Receives the captured value and the constraint's (unescaped) arguments.
pub type CustomCheck = Arc<dyn Fn(&str, &[String]) -> bool + Send + Sync>;

/// A validator attached to a parameter capture.
#[derive(Clone)]
pub enum Constraint {
    /// Signed 64-bit integer.
    Int,
    /// `1`, `t`, `T`, `TRUE`, `true`, `True` and the `false` equivalents.
    Bool,
    /// Floating point number.
    Float,
    /// Letters only.
    Alpha,
    /// A UUID in hyphenated, braced, urn or compact form.
    Guid,
    /// Integer of at least the given value.
    Min(i64),
    /// Integer of at most the given value.
    Max(i64),
    /// Integer within the inclusive range.
    Range(i64, i64),
    /// Exact byte length.
    Len(usize),
    /// Minimum byte length.
    MinLen(usize),
    /// Maximum byte length.
    MaxLen(usize),
    /// Inclusive byte length range.
    BetweenLen(usize, usize),
    /// Matches a reference-time layout.
    Datetime {
        /// The layout as written in the pattern.
        layout: String,
        /// The translated `chrono` format.
        format: String,
    },
    /// Unanchored regex search.
    Regex(Regex),
    /// A constraint registered in a [`ConstraintRegistry`].
    Custom {
        /// Registered name.
        name: String,
        /// Arguments from the pattern.
        args: Vec<String>,
        /// The check itself.
        check: CustomCheck,
    },
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => f.write_str("Int"),
            Self::Bool => f.write_str("Bool"),
            Self::Float => f.write_str("Float"),
            Self::Alpha => f.write_str("Alpha"),
            Self::Guid => f.write_str("Guid"),
            Self::Min(n) => f.debug_tuple("Min").field(n).finish(),
            Self::Max(n) => f.debug_tuple("Max").field(n).finish(),
            Self::Range(lo, hi) => f.debug_tuple("Range").field(lo).field(hi).finish(),
            Self::Len(n) => f.debug_tuple("Len").field(n).finish(),
            Self::MinLen(n) => f.debug_tuple("MinLen").field(n).finish(),
            Self::MaxLen(n) => f.debug_tuple("MaxLen").field(n).finish(),
            Self::BetweenLen(lo, hi) => f.debug_tuple("BetweenLen").field(lo).field(hi).finish(),
            Self::Datetime { layout, .. } => f.debug_tuple("Datetime").field(layout).finish(),
            Self::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            Self::Custom { name, args, .. } => f
                .debug_struct("Custom")
                .field("name", name)
                .field("args", args)
                .finish_non_exhaustive(),
        }
    }
}

impl Constraint {
    /// Builds a constraint from its name and raw argument text.
    ///
    /// `data` is the text between the parentheses, still escaped. It is split
    /// on unescaped `,` for every constraint except `regex`, whose argument is
    /// taken verbatim.
    pub fn parse(
        name: &str,
        data: Option<&str>,
        registry: &ConstraintRegistry,
    ) -> std::result::Result<Self, ConstraintParseError> {
        let args = match (name, data) {
            ("regex", _) | (_, None) => Vec::new(),
            (_, Some(raw)) => split_args(raw),
        };

        let constraint = match name {
            "int" => Self::Int,
            "bool" => Self::Bool,
            "float" => Self::Float,
            "alpha" => Self::Alpha,
            "guid" => Self::Guid,
            "min" => Self::Min(int_arg(name, &args, 0, 1)?),
            "max" => Self::Max(int_arg(name, &args, 0, 1)?),
            "range" => Self::Range(int_arg(name, &args, 0, 2)?, int_arg(name, &args, 1, 2)?),
            "len" => Self::Len(len_arg(name, &args, 0, 1)?),
            "minLen" => Self::MinLen(len_arg(name, &args, 0, 1)?),
            "maxLen" => Self::MaxLen(len_arg(name, &args, 0, 1)?),
            "betweenLen" => {
                Self::BetweenLen(len_arg(name, &args, 0, 2)?, len_arg(name, &args, 1, 2)?)
            }
            "datetime" => {
                let layout = args.first().ok_or_else(|| missing(name, 1, 0))?.clone();
                let format = layout::to_strftime(&layout);
                if !layout::is_valid_format(&format) {
                    return Err(ConstraintParseError::Pattern(
                        PatternError::InvalidConstraintData {
                            name: name.to_string(),
                            value: layout,
                        },
                    ));
                }
                Self::Datetime { layout, format }
            }
            "regex" => {
                let source = data.filter(|d| !d.is_empty()).ok_or_else(|| missing(name, 1, 0))?;
                let re = Regex::new(source).map_err(|e| {
                    ConstraintParseError::Pattern(PatternError::InvalidRegex {
                        regex: source.to_string(),
                        message: e.to_string(),
                    })
                })?;
                Self::Regex(re)
            }
            other => match registry.get(other) {
                Some(check) => Self::Custom {
                    name: other.to_string(),
                    args,
                    check,
                },
                None => return Err(ConstraintParseError::Unknown(other.to_string())),
            },
        };

        Ok(constraint)
    }

    /// Returns the constraint name as written in patterns.
    pub fn name(&self) -> &str {
        match self {
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Float => "float",
            Self::Alpha => "alpha",
            Self::Guid => "guid",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::Range(..) => "range",
            Self::Len(_) => "len",
            Self::MinLen(_) => "minLen",
            Self::MaxLen(_) => "maxLen",
            Self::BetweenLen(..) => "betweenLen",
            Self::Datetime { .. } => "datetime",
            Self::Regex(_) => "regex",
            Self::Custom { name, .. } => name,
        }
    }

    /// Checks a captured parameter value.
    pub fn check(&self, value: &str) -> bool {
        match self {
            Self::Int => value.parse::<i64>().is_ok(),
            Self::Bool => parse_bool(value).is_some(),
            Self::Float => value.parse::<f64>().is_ok(),
            Self::Alpha => value.chars().all(char::is_alphabetic),
            Self::Guid => GUID.is_match(value),
            Self::Min(min) => value.parse::<i64>().is_ok_and(|n| n >= *min),
            Self::Max(max) => value.parse::<i64>().is_ok_and(|n| n <= *max),
            Self::Range(lo, hi) => value.parse::<i64>().is_ok_and(|n| n >= *lo && n <= *hi),
            Self::Len(len) => value.len() == *len,
            Self::MinLen(min) => value.len() >= *min,
            Self::MaxLen(max) => value.len() <= *max,
            Self::BetweenLen(lo, hi) => value.len() >= *lo && value.len() <= *hi,
            Self::Datetime { format, .. } => layout::matches_format(format, value),
            Self::Regex(re) => re.is_match(value),
            Self::Custom { args, check, .. } => check(value, args),
        }
    }

    /// Renders the constraint back into pattern syntax.
    pub fn to_pattern(&self) -> String {
        match self {
            Self::Min(n) | Self::Max(n) => format!("{}({n})", self.name()),
            Self::Range(lo, hi) => format!("range({lo},{hi})"),
            Self::Len(n) | Self::MinLen(n) | Self::MaxLen(n) => format!("{}({n})", self.name()),
            Self::BetweenLen(lo, hi) => format!("betweenLen({lo},{hi})"),
            Self::Datetime { layout, .. } => format!("datetime({})", escape_arg(layout)),
            Self::Regex(re) => format!("regex({})", re.as_str()),
            Self::Custom { name, args, .. } if !args.is_empty() => {
                let args: Vec<String> = args.iter().map(|a| escape_arg(a)).collect();
                format!("{name}({})", args.join(","))
            }
            _ => self.name().to_string(),
        }
    }
}

/// Failure while building a single constraint.
///
/// The compiler turns this into a [`PatternError`] carrying the pattern.
#[derive(Debug)]
pub enum ConstraintParseError {
    /// No built-in or registered constraint has this name.
    Unknown(String),
    /// Any other failure, already fully described.
    Pattern(PatternError),
}

/// User-registered constraints, looked up by name during compilation.
#[derive(Clone, Default)]
pub struct ConstraintRegistry {
    entries: HashMap<String, CustomCheck>,
}

impl fmt::Debug for ConstraintRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("ConstraintRegistry")
            .field("names", &names)
            .finish()
    }
}

impl ConstraintRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constraint. Built-in names cannot be shadowed.
    pub fn register<F>(&mut self, name: impl Into<String>, check: F)
    where
        F: Fn(&str, &[String]) -> bool + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Arc::new(check));
    }

    /// Looks up a registered constraint.
    pub fn get(&self, name: &str) -> Option<CustomCheck> {
        self.entries.get(name).cloned()
    }

    /// Returns true if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parses `1`, `t`, `true` and `0`, `f`, `false` in their usual casings.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn missing(name: &str, expected: usize, got: usize) -> ConstraintParseError {
    ConstraintParseError::Pattern(PatternError::MissingConstraintData {
        name: name.to_string(),
        expected,
        got,
    })
}

fn arg<'a>(
    name: &str,
    args: &'a [String],
    index: usize,
    expected: usize,
) -> std::result::Result<&'a str, ConstraintParseError> {
    if args.len() < expected {
        return Err(missing(name, expected, args.len()));
    }
    Ok(args[index].trim())
}

fn int_arg(
    name: &str,
    args: &[String],
    index: usize,
    expected: usize,
) -> std::result::Result<i64, ConstraintParseError> {
    let raw = arg(name, args, index, expected)?;
    raw.parse().map_err(|_| invalid(name, raw))
}

fn len_arg(
    name: &str,
    args: &[String],
    index: usize,
    expected: usize,
) -> std::result::Result<usize, ConstraintParseError> {
    let raw = arg(name, args, index, expected)?;
    raw.parse().map_err(|_| invalid(name, raw))
}

fn invalid(name: &str, value: &str) -> ConstraintParseError {
    ConstraintParseError::Pattern(PatternError::InvalidConstraintData {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Splits on unescaped `,` and removes the escapes from each part.
fn split_args(raw: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ',' => out.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    out.push(current);
    out
}

fn escape_arg(arg: &str) -> String {
    let mut out = String::with_capacity(arg.len());
    for c in arg.chars() {
        if matches!(c, ',' | ';' | '(' | ')' | '<' | '>' | '\\' | '-' | '.' | '/' | ':') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Compiles a full `<...>` block body into constraints.
///
/// Items are separated by unescaped `;` outside parentheses.
pub(crate) fn parse_block(
    pattern: &str,
    block: &str,
    registry: &ConstraintRegistry,
) -> Result<Vec<Constraint>> {
    let mut constraints = Vec::new();

    for item in split_block(block) {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }

        let malformed = || PatternError::MalformedConstraint {
            pattern: pattern.to_string(),
            constraint: item.to_string(),
        };

        let (name, data) = match item.find('(') {
            Some(open) => {
                let close = item.rfind(')').filter(|c| *c > open).ok_or_else(malformed)?;
                if close != item.len() - 1 {
                    return Err(malformed());
                }
                (&item[..open], Some(&item[open + 1..close]))
            }
            None => (item, None),
        };
        if name.is_empty() {
            return Err(malformed());
        }

        let constraint = Constraint::parse(name, data, registry).map_err(|e| match e {
            ConstraintParseError::Unknown(name) => PatternError::UnknownConstraint {
                pattern: pattern.to_string(),
                name,
            },
            ConstraintParseError::Pattern(err) => err,
        })?;
        constraints.push(constraint);
    }

    Ok(constraints)
}

fn split_block(block: &str) -> Vec<&str> {
    let bytes = block.as_bytes();
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b';' if depth == 0 => {
                items.push(&block[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    items.push(&block[start.min(block.len())..]);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(name: &str, data: Option<&str>) -> Constraint {
        Constraint::parse(name, data, &ConstraintRegistry::new()).unwrap()
    }

    #[test]
    fn test_int_and_bounds() {
        assert!(build("int", None).check("123"));
        assert!(!build("int", None).check("12a"));
        assert!(build("max", Some("3000")).check("3000"));
        assert!(!build("max", Some("3000")).check("3001"));
        assert!(!build("min", Some("5")).check("x"));
        assert!(build("range", Some("10,20")).check("15"));
        assert!(!build("range", Some("10,20")).check("21"));
    }

    #[test]
    fn test_length_constraints_count_bytes() {
        assert!(build("len", Some("4")).check("abcd"));
        assert!(!build("len", Some("1")).check("é"));
        assert!(build("len", Some("2")).check("é"));
        assert!(build("minLen", Some("2")).check("ab"));
        assert!(!build("maxLen", Some("2")).check("abc"));
        assert!(build("betweenLen", Some("1,3")).check("ab"));
    }

    #[test]
    fn test_bool_float_alpha_guid() {
        assert!(build("bool", None).check("true"));
        assert!(build("bool", None).check("0"));
        assert!(!build("bool", None).check("yes"));
        assert!(build("float", None).check("1.5"));
        assert!(!build("float", None).check("abc"));
        assert!(build("alpha", None).check("Hello"));
        assert!(!build("alpha", None).check("abc1"));
        assert!(build("guid", None).check("f81d4fae-7dec-11d0-a765-00a0c91e6bf6"));
        assert!(build("guid", None).check("{f81d4fae-7dec-11d0-a765-00a0c91e6bf6}"));
        assert!(!build("guid", None).check("f81d4fae-7dec-11d0"));
    }

    #[test]
    fn test_datetime_layout() {
        let c = build("datetime", Some(r"2006\-01\-02"));
        assert!(c.check("2005-11-01"));
        assert!(!c.check("11-01-2005x"));
    }

    #[test]
    fn test_regex_keeps_escapes() {
        let c = build("regex", Some(r"^\d{3}$"));
        assert!(c.check("123"));
        assert!(!c.check("1234"));
    }

    #[test]
    fn test_errors() {
        let registry = ConstraintRegistry::new();
        assert!(matches!(
            Constraint::parse("nope", None, &registry),
            Err(ConstraintParseError::Unknown(_))
        ));
        assert!(matches!(
            Constraint::parse("max", None, &registry),
            Err(ConstraintParseError::Pattern(PatternError::MissingConstraintData { .. }))
        ));
        assert!(matches!(
            Constraint::parse("range", Some("1"), &registry),
            Err(ConstraintParseError::Pattern(PatternError::MissingConstraintData { .. }))
        ));
        assert!(matches!(
            Constraint::parse("len", Some("abc"), &registry),
            Err(ConstraintParseError::Pattern(PatternError::InvalidConstraintData { .. }))
        ));
        assert!(matches!(
            Constraint::parse("regex", Some("(unclosed"), &registry),
            Err(ConstraintParseError::Pattern(PatternError::InvalidRegex { .. }))
        ));
    }

    #[test]
    fn test_custom_constraint() {
        let mut registry = ConstraintRegistry::new();
        registry.register("prefix", |value, args| {
            args.first().is_some_and(|p| value.starts_with(p.as_str()))
        });
        let c = Constraint::parse("prefix", Some("ab"), &registry).unwrap();
        assert!(c.check("abc"));
        assert!(!c.check("xbc"));
        assert_eq!(c.name(), "prefix");
    }

    #[test]
    fn test_parse_block() {
        let registry = ConstraintRegistry::new();
        let cs = parse_block("/:n", "int;max(3000)", &registry).unwrap();
        assert_eq!(cs.len(), 2);
        assert!(cs.iter().all(|c| c.check("123")));
        assert!(!cs.iter().all(|c| c.check("8728382")));

        let cs = parse_block("/:x", r"regex(^(a|b);?$)", &registry).unwrap();
        assert_eq!(cs.len(), 1);
        assert!(cs[0].check("a;"));
    }
}
