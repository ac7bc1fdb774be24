//! Translation of reference-time layouts into `chrono` format strings.
//!
//! The `datetime(...)` constraint takes a layout written against the reference
//! time `Mon Jan 2 15:04:05 MST 2006`, e.g. `2006-01-02` or `15:04`. Layouts are
//! translated once at compile time; matching only runs the `chrono` parser.

use chrono::format::{parse, Parsed, StrftimeItems};

/// Layout tokens, longest first so that `2006` wins over `2` and `January`
/// over `Jan`.
const TOKENS: &[(&str, &str)] = &[
    ("January", "%B"),
    ("Monday", "%A"),
    (".000000000", "%.9f"),
    (".999999999", "%.f"),
    (".000000", "%.6f"),
    (".999999", "%.f"),
    ("Z07:00", "%:z"),
    ("-07:00", "%:z"),
    (".000", "%.3f"),
    (".999", "%.f"),
    ("-0700", "%z"),
    ("Z0700", "%z"),
    ("2006", "%Y"),
    ("Jan", "%b"),
    ("Mon", "%a"),
    ("MST", "%Z"),
    ("002", "%j"),
    ("_2", "%e"),
    ("01", "%m"),
    ("02", "%d"),
    ("03", "%I"),
    ("04", "%M"),
    ("05", "%S"),
    ("06", "%y"),
    ("15", "%H"),
    ("PM", "%p"),
    ("pm", "%P"),
    ("1", "%m"),
    ("2", "%d"),
    ("3", "%I"),
    ("4", "%M"),
    ("5", "%S"),
];

/// Converts a reference-time layout into a `chrono` strftime string.
///
/// Bytes that are not part of a layout token are copied verbatim (with `%`
/// doubled so it stays literal).
pub fn to_strftime(layout: &str) -> String {
    let mut out = String::with_capacity(layout.len() * 2);
    let mut rest = layout;

    'outer: while !rest.is_empty() {
        for (token, spec) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(spec);
                rest = tail;
                continue 'outer;
            }
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            if c == '%' {
                out.push_str("%%");
            } else {
                out.push(c);
            }
        }
        rest = chars.as_str();
    }

    out
}

/// Returns true if the strftime string contains no invalid specifiers.
pub fn is_valid_format(format: &str) -> bool {
    StrftimeItems::new(format).all(|item| !matches!(item, chrono::format::Item::Error))
}

/// Checks `value` against a translated format.
///
/// Parsing stops at field validation: a date-only layout accepts a date
/// without requiring a time component.
pub fn matches_format(format: &str, value: &str) -> bool {
    let mut parsed = Parsed::new();
    parse(&mut parsed, value, StrftimeItems::new(format)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_date() {
        assert_eq!(to_strftime("2006-01-02"), "%Y-%m-%d");
    }

    #[test]
    fn test_translate_clock() {
        assert_eq!(to_strftime("15:04:05"), "%H:%M:%S");
        assert_eq!(to_strftime("3:04PM"), "%I:%M%p");
    }

    #[test]
    fn test_translate_names_and_literals() {
        assert_eq!(to_strftime("Monday, 02-Jan-06"), "%A, %d-%b-%y");
        assert_eq!(to_strftime("100%"), "%m00%%");
    }

    #[test]
    fn test_matches_format() {
        let format = to_strftime("2006-01-02");
        assert!(matches_format(&format, "2005-11-01"));
        assert!(!matches_format(&format, "2005-13-01"));
        assert!(!matches_format(&format, "25-11-01x"));
        assert!(is_valid_format(&format));
    }
}
