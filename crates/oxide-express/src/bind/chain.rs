//! The bind chain returned by [`Ctx::bind`].

use serde::de::DeserializeOwned;

use super::{decoder, Bind, BindError, Mode, Validate};
use crate::body::{has_media_prefix, MIME_FORM, MIME_JSON, MIME_MULTIPART, MIME_TEXT_XML, MIME_XML};
use crate::ctx::Ctx;

/// Chains binding steps over one request.
///
/// After the first failing step every following step is skipped; the error
/// is read with [`Binder::err`] or [`Binder::result`].
///
/// ```
/// use oxide_express::bind::Validate;
/// use oxide_express::{App, Bind, Request};
///
/// #[derive(Default, Bind)]
/// struct Login {
///     #[bind(form = "user")]
///     user: String,
/// }
///
/// impl Validate for Login {
///     fn validate(&self) -> Result<(), String> {
///         if self.user.is_empty() {
///             return Err("user is required".into());
///         }
///         Ok(())
///     }
/// }
///
/// let mut app = App::new();
/// app.post("/login", |ctx| {
///     let mut login = Login::default();
///     ctx.bind().form(&mut login).validate(&login).result()?;
///     ctx.send_string(login.user)
/// })
/// .unwrap();
///
/// let res = app.handle(
///     Request::post("/login")
///         .header("Content-Type", "application/x-www-form-urlencoded")
///         .body("user="),
/// );
/// assert_eq!(res.status, 400);
/// assert_eq!(res.body_string().unwrap(), "validation failed: user is required");
/// ```
pub struct Binder<'c, 'a> {
    ctx: &'c Ctx<'a>,
    error: Option<BindError>,
}

impl<'c, 'a> Binder<'c, 'a> {
    pub(crate) const fn new(ctx: &'c Ctx<'a>) -> Self {
        Self { ctx, error: None }
    }

    /// Binds query, header, response header, param and cookie fields, and
    /// runs context unmarshalers.
    #[must_use]
    pub fn req<T: Bind>(self, target: &mut T) -> Self {
        self.then(|ctx| decoder::<T>(Mode::Request)?.decode(target, ctx))
    }

    /// Binds `form` and `multipart` fields from the body.
    #[must_use]
    pub fn form<T: Bind>(self, target: &mut T) -> Self {
        self.then(|ctx| {
            if has_media_prefix(ctx.request().content_type(), MIME_MULTIPART) {
                ctx.multipart_form()?;
            }
            decoder::<T>(Mode::Body)?.decode(target, ctx)
        })
    }

    /// Deserializes a JSON body. Fails with 415 unless the content type is
    /// `application/json`.
    #[must_use]
    pub fn json<T: DeserializeOwned>(self, target: &mut T) -> Self {
        self.then(|ctx| {
            let content_type = ctx.request().content_type();
            if !has_media_prefix(content_type, MIME_JSON) {
                return Err(mismatch(MIME_JSON, content_type));
            }
            *target = serde_json::from_slice(&ctx.request().body)
                .map_err(|e| BindError::Json(e.to_string()))?;
            Ok(())
        })
    }

    /// Deserializes an XML body with the application's XML decoder. Fails
    /// with 415 unless the content type is `application/xml` or `text/xml`.
    #[must_use]
    pub fn xml<T: DeserializeOwned>(self, target: &mut T) -> Self {
        self.then(|ctx| {
            let content_type = ctx.request().content_type();
            if !is_xml(content_type) {
                return Err(mismatch("application/xml or text/xml", content_type));
            }
            let decode = ctx
                .app()
                .xml_parser()
                .ok_or_else(|| BindError::Xml("no xml decoder configured".to_string()))?;
            let value = decode(ctx.request().body.as_slice()).map_err(BindError::Xml)?;
            *target = serde_json::from_value(value).map_err(|e| BindError::Xml(e.to_string()))?;
            Ok(())
        })
    }

    /// Picks [`Binder::json`], [`Binder::xml`] or [`Binder::form`] from the
    /// content type.
    #[must_use]
    pub fn body<T: Bind + DeserializeOwned>(self, target: &mut T) -> Self {
        let ctx = self.ctx;
        let content_type = ctx.request().content_type();
        if has_media_prefix(content_type, MIME_JSON) {
            self.json(target)
        } else if is_xml(content_type) {
            self.xml(target)
        } else if has_media_prefix(content_type, MIME_FORM)
            || has_media_prefix(content_type, MIME_MULTIPART)
        {
            self.form(target)
        } else {
            self.then(|_| {
                Err(mismatch(
                    "a json, xml, url-encoded or multipart body",
                    content_type,
                ))
            })
        }
    }

    /// Runs [`Validate::validate`] on the bound value.
    #[must_use]
    pub fn validate<T: Validate>(self, target: &T) -> Self {
        self.then(|_| target.validate().map_err(BindError::Validation))
    }

    /// Returns the first error of the chain.
    pub fn err(self) -> Option<BindError> {
        self.error
    }

    /// Returns the first error of the chain as a `Result`.
    pub fn result(self) -> Result<(), BindError> {
        self.error.map_or(Ok(()), Err)
    }

    fn then(mut self, step: impl FnOnce(&'c Ctx<'a>) -> Result<(), BindError>) -> Self {
        if self.error.is_none() {
            self.error = step(self.ctx).err();
        }
        self
    }
}

fn is_xml(content_type: &str) -> bool {
    has_media_prefix(content_type, MIME_XML) || has_media_prefix(content_type, MIME_TEXT_XML)
}

fn mismatch(expected: &'static str, actual: &str) -> BindError {
    BindError::ContentTypeMismatch {
        expected,
        actual: actual.to_string(),
    }
}
