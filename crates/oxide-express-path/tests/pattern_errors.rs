//! Compile-time failures for path and host patterns.

mod common;
use common::*;

use oxide_express_path::{DomainPattern, PatternError};

#[test]
fn unterminated_escape() {
    assert!(matches!(compile_err(r"/a\"), PatternError::UnterminatedEscape(_)));
}

#[test]
fn unterminated_constraint() {
    assert!(matches!(
        compile_err("/:id<int"),
        PatternError::UnterminatedConstraint(_)
    ));
}

#[test]
fn unknown_constraint() {
    match compile_err("/:id<numeric>") {
        PatternError::UnknownConstraint { name, .. } => assert_eq!(name, "numeric"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn bad_constraint_arguments() {
    assert!(matches!(
        compile_err("/:id<max(abc)>"),
        PatternError::InvalidConstraintData { .. }
    ));
    assert!(matches!(
        compile_err("/:id<range(1)>"),
        PatternError::MissingConstraintData { .. }
    ));
}

#[test]
fn bad_regex_is_reported_at_compile_time() {
    assert!(matches!(
        compile_err("/:id<regex([a-)>"),
        PatternError::InvalidRegex { .. }
    ));
}

#[test]
fn bad_domain_pattern() {
    assert!(matches!(
        DomainPattern::compile("a..example.com"),
        Err(PatternError::InvalidDomain { .. })
    ));
}
