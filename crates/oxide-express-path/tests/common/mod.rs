#![allow(dead_code)]

use oxide_express_path::{PatternError, RoutePattern, MAX_PARAMS};

pub fn compile(pattern: &str) -> RoutePattern {
    RoutePattern::compile(pattern)
        .unwrap_or_else(|e| panic!("Failed to compile: {pattern}\nError: {e:?}"))
}

pub fn compile_err(pattern: &str) -> PatternError {
    RoutePattern::compile(pattern)
        .expect_err(&format!("Expected compile error for: {pattern}"))
}

/// Captured values of an exact match, `None` when the path does not match.
pub fn capture(pattern: &str, path: &str) -> Option<Vec<String>> {
    compile(pattern)
        .match_path(path)
        .map(|params| params.into_iter().map(|(_, v)| v.to_string()).collect())
}

/// Asserts that every `(path, expected)` case behaves as listed.
pub fn check_cases(pattern: &str, cases: &[(&str, Option<&[&str]>)]) {
    let compiled = compile(pattern);
    for (path, expected) in cases {
        let mut values = [""; MAX_PARAMS];
        let matched = compiled.matches(path, path, &mut values, false);
        match expected {
            Some(expected) => {
                assert!(matched, "{pattern} should match {path}");
                assert_eq!(
                    &values[..expected.len()],
                    *expected,
                    "{pattern} against {path}"
                );
            }
            None => assert!(!matched, "{pattern} should not match {path}"),
        }
    }
}
