//! # oxide-express
//!
//! An Express-style web framework core.
//!
//! This crate provides:
//! - Route registration per HTTP method, prefix middleware, groups and named
//!   routes with reverse routing
//! - Path patterns with parameters, wildcards and constraints
//!   (see [`oxide_express_path`])
//! - Virtual-host routing with host parameters
//! - Typed request binding from query, headers, params, cookies and form
//!   bodies through `#[derive(Bind)]`
//!
//! The core is transport-agnostic: a server hands a [`Request`] to
//! [`App::handle`] and writes back the returned [`Response`].
//!
//! ## Quick Start
//!
//! ```
//! use oxide_express::{App, Bind, Request};
//!
//! #[derive(Default, Bind)]
//! struct Paging {
//!     #[bind(query = "page")]
//!     page: u32,
//!     #[bind(param = "user")]
//!     user: String,
//! }
//!
//! let mut app = App::new();
//! app.get("/users/:user/posts", |ctx| {
//!     let mut paging = Paging::default();
//!     ctx.bind().req(&mut paging).result()?;
//!     ctx.send_string(format!("{} page {}", paging.user, paging.page))
//! })
//! .unwrap();
//!
//! let res = app.handle(Request::get("/users/ann/posts?page=2"));
//! assert_eq!(res.status, 200);
//! assert_eq!(res.body_string().unwrap(), "ann page 2");
//!
//! let res = app.handle(Request::get("/users/ann/posts?page=two"));
//! assert_eq!(res.status, 400);
//! assert_eq!(res.body_string().unwrap(), "unable to decode 'two' as u32");
//! ```
//!
//! ## Middleware
//!
//! Handlers call [`Ctx::next`] to continue the chain:
//!
//! ```
//! use oxide_express::{App, Request};
//!
//! let mut app = App::new();
//! app.use_handler(|ctx| {
//!     ctx.set("X-Powered-By", "oxide");
//!     ctx.next()
//! })
//! .unwrap();
//! app.get("/", |ctx| ctx.send_string("home")).unwrap();
//!
//! let res = app.handle(Request::get("/"));
//! assert_eq!(res.get_header("x-powered-by"), Some("oxide"));
//! ```

extern crate self as oxide_express;

pub mod bind;
pub mod body;
mod config;
mod ctx;
mod domain;
mod error;
pub mod middleware;
mod request;
mod response;
mod router;

pub use bind::{Bind, BindError};
pub use config::{Config, DEFAULT_BODY_LIMIT};
pub use ctx::Ctx;
pub use domain::{domain_param, DomainRouter};
pub use error::{Error, Result};
pub use oxide_express_derive::Bind;
pub use oxide_express_path::{DomainPattern, PatternError, RoutePattern};
pub use request::{Args, Method, Request};
pub use response::{status_text, Response};
pub use router::{
    default_error_handler, handler, App, ErrorHandler, Group, Handler, Route, RouteChain,
    XmlDecoder,
};
