//! Error types for pattern compilation.

use thiserror::Error;

/// Errors raised while compiling a route or domain pattern.
///
/// Compilation happens at registration time, so every variant here surfaces
/// from the registration call and never from request handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// A `\` escape is the final byte of the pattern.
    #[error("unterminated escape at the end of pattern `{0}`")]
    UnterminatedEscape(String),

    /// A `<` constraint block is never closed.
    #[error("unterminated constraint block in pattern `{0}`")]
    UnterminatedConstraint(String),

    /// Constraint syntax is malformed (empty name, unbalanced parentheses).
    #[error("malformed constraint `{constraint}` in pattern `{pattern}`")]
    MalformedConstraint { pattern: String, constraint: String },

    /// The constraint name is neither built in nor registered.
    #[error("unknown constraint `{name}` in pattern `{pattern}`")]
    UnknownConstraint { pattern: String, name: String },

    /// The constraint was given fewer arguments than it needs.
    #[error("constraint `{name}` expects {expected} argument(s), got {got}")]
    MissingConstraintData {
        name: String,
        expected: usize,
        got: usize,
    },

    /// A constraint argument could not be parsed.
    #[error("invalid argument `{value}` for constraint `{name}`")]
    InvalidConstraintData { name: String, value: String },

    /// The `regex(...)` constraint does not compile.
    #[error("invalid regex `{regex}`: {message}")]
    InvalidRegex { regex: String, message: String },

    /// The pattern declares more parameters than a match buffer can hold.
    #[error("pattern `{pattern}` declares {count} parameters, at most {max} are allowed")]
    TooManyParams {
        pattern: String,
        count: usize,
        max: usize,
    },

    /// Malformed host pattern.
    #[error("invalid domain pattern `{pattern}`: {reason}")]
    InvalidDomain { pattern: String, reason: String },

    /// A required parameter is missing while building a path.
    #[error("missing value for parameter `{0}`")]
    MissingParam(String),
}

/// Result type alias for pattern operations.
pub type Result<T> = std::result::Result<T, PatternError>;
