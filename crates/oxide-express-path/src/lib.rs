//! # oxide-express-path
//!
//! Route and host pattern compilation for `oxide-express`.
//!
//! This crate provides:
//! - A path-pattern compiler producing a flat segment list
//! - An allocation-free matcher writing parameter values into a fixed buffer
//! - Parameter constraints (`int`, `regex(...)`, `datetime(...)`, ...) and a
//!   registry for custom ones
//! - A host-pattern matcher for virtual-host routing
//! - Reverse routing (building a path from parameter values)
//!
//! ## Quick Start
//!
//! ```
//! use oxide_express_path::{RoutePattern, MAX_PARAMS};
//!
//! let pattern = RoutePattern::compile("/api/*/:param?").unwrap();
//!
//! let path = "/api/joker/batman/robin/1";
//! let mut values = [""; MAX_PARAMS];
//! assert!(pattern.matches(path, path, &mut values, false));
//! assert_eq!(&values[..2], ["joker/batman/robin", "1"]);
//! ```
//!
//! ## Constraints
//!
//! ```
//! use oxide_express_path::RoutePattern;
//!
//! let pattern = RoutePattern::compile("/api/v1/:n<int;max(3000)>").unwrap();
//! assert!(pattern.match_path("/api/v1/123").is_some());
//! assert!(pattern.match_path("/api/v1/8728382").is_none());
//! ```
//!
//! ## Custom Constraints
//!
//! ```
//! use oxide_express_path::{ConstraintRegistry, RoutePattern};
//!
//! let mut registry = ConstraintRegistry::new();
//! registry.register("even", |value, _args| {
//!     value.parse::<i64>().is_ok_and(|n| n % 2 == 0)
//! });
//!
//! let pattern = RoutePattern::with_registry("/n/:n<even>", &registry).unwrap();
//! assert!(pattern.match_path("/n/4").is_some());
//! assert!(pattern.match_path("/n/5").is_none());
//! ```

mod constraint;
mod domain;
mod error;
mod layout;
mod matcher;
mod pattern;
mod pool;

pub use constraint::{parse_bool, Constraint, ConstraintRegistry, CustomCheck};
pub use domain::{strip_port, DomainPattern};
pub use error::{PatternError, Result};
pub use pattern::{ConstSegment, ParamSegment, RoutePattern, Segment, MAX_PARAMS};
