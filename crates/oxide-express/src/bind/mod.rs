//! Typed request binding.
//!
//! A target struct describes its fields once, usually through
//! `#[derive(Bind)]`:
//!
//! ```
//! use oxide_express::{App, Bind, Request};
//!
//! #[derive(Debug, Default, Bind)]
//! struct Search {
//!     #[bind(query = "id")]
//!     id: i64,
//!     #[bind(query = "hobby")]
//!     hobby: Vec<String>,
//!     #[bind(header = "x-trace")]
//!     trace: Option<String>,
//! }
//!
//! let mut app = App::new();
//! app.get("/search", |ctx| {
//!     let mut search = Search::default();
//!     ctx.bind().req(&mut search).result()?;
//!     ctx.send_string(format!("{} {:?}", search.id, search.hobby))
//! })
//! .unwrap();
//!
//! let res = app.handle(Request::get("/search?id=1&hobby=chess&hobby=go"));
//! assert_eq!(res.body_string().unwrap(), r#"1 ["chess", "go"]"#);
//! ```
//!
//! The description is compiled into a [`Decoder`] the first time a type is
//! bound and cached for the lifetime of the process.

mod cache;
mod chain;
mod compile;
mod text;

use std::fmt;

use thiserror::Error;

use crate::ctx::Ctx;

pub use cache::{cached_decoders, decoder};
pub use chain::Binder;
pub use compile::{Decoder, DecoderKind, FieldSet, Source};
pub use text::TextDecode;

/// Where a field's value is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// URL query arguments.
    Query,
    /// Request headers.
    Header,
    /// Headers already set on the response.
    RespHeader,
    /// Path parameters.
    Param,
    /// Request cookies.
    Cookie,
    /// Url-encoded form body.
    Form,
    /// Value fields of a `multipart/form-data` body.
    Multipart,
}

impl Scope {
    /// Returns the compile mode this scope belongs to.
    pub const fn mode(self) -> Mode {
        match self {
            Self::Query | Self::Header | Self::RespHeader | Self::Param | Self::Cookie => {
                Mode::Request
            }
            Self::Form | Self::Multipart => Mode::Body,
        }
    }

    /// Header scopes compare keys ignoring ASCII case.
    pub const fn folds_case(self) -> bool {
        matches!(self, Self::Header | Self::RespHeader)
    }

    /// Returns the attribute name of the scope.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Header => "header",
            Self::RespHeader => "resp_header",
            Self::Param => "param",
            Self::Cookie => "cookie",
            Self::Form => "form",
            Self::Multipart => "multipart",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoder compile mode. A decoder reads either request metadata or the body,
/// never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Query, headers, response headers, params and cookies.
    Request,
    /// Url-encoded and multipart form values.
    Body,
}

/// A struct whose fields can be bound from a request.
///
/// Implemented by `#[derive(Bind)]`. A manual implementation registers each
/// field on the [`FieldSet`]:
///
/// ```
/// use oxide_express::bind::{Bind, FieldSet, Scope};
///
/// #[derive(Default)]
/// struct Page {
///     number: u32,
/// }
///
/// impl Bind for Page {
///     fn describe(fields: &mut FieldSet<Self>) {
///         fields.scalar(Scope::Query, "page", |p| &mut p.number);
///     }
/// }
/// ```
pub trait Bind: Sized + 'static {
    /// Registers the bindable fields.
    fn describe(fields: &mut FieldSet<Self>);
}

/// A field type that reads itself from the request context.
///
/// Such a field takes precedence over any scope attribute and is called once
/// per request-mode bind.
pub trait CtxUnmarshal {
    /// Fills `self` from the context.
    fn unmarshal_ctx(&mut self, ctx: &Ctx<'_>) -> Result<(), BindError>;
}

/// Post-binding validation, run by [`Binder::validate`].
pub trait Validate {
    /// Returns a message describing the first violation.
    fn validate(&self) -> Result<(), String>;
}

/// Errors raised while compiling a decoder or binding a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// The target type cannot be compiled.
    #[error("invalid bind target {type_name}: {reason}")]
    InvalidTarget {
        type_name: &'static str,
        reason: String,
    },

    /// A field is registered in a way the compiler does not support.
    #[error("unsupported field `{field}` in {type_name}: {reason}")]
    UnsupportedType {
        type_name: &'static str,
        field: String,
        reason: String,
    },

    /// A raw value does not parse as the field type.
    #[error("unable to decode '{raw}' as {kind}")]
    Decode { raw: String, kind: &'static str },

    /// The body binder was called with a body of another media type.
    #[error("unsupported content type `{actual}`, expected {expected}")]
    ContentTypeMismatch {
        expected: &'static str,
        actual: String,
    },

    /// Malformed JSON body.
    #[error("invalid json body: {0}")]
    Json(String),

    /// Malformed XML body, or no XML decoder configured.
    #[error("invalid xml body: {0}")]
    Xml(String),

    /// Malformed multipart body.
    #[error("invalid multipart body: {0}")]
    Multipart(String),

    /// [`Validate::validate`] rejected the bound value.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Error reported by a [`CtxUnmarshal`] or [`TextDecode`] implementation.
    #[error("{0}")]
    Custom(String),
}

impl BindError {
    /// Creates a decode error for `raw`.
    pub fn decode(raw: &str, kind: &'static str) -> Self {
        Self::Decode {
            raw: raw.to_string(),
            kind,
        }
    }

    /// Returns the HTTP status this error maps to.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Decode { .. }
            | Self::Json(_)
            | Self::Xml(_)
            | Self::Multipart(_)
            | Self::Validation(_)
            | Self::Custom(_) => 400,
            Self::ContentTypeMismatch { .. } => 415,
            Self::InvalidTarget { .. } | Self::UnsupportedType { .. } => 500,
        }
    }
}
