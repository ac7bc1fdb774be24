//! Per-request context handed to handlers.

use std::any::Any;
use std::cell::OnceCell;
use std::collections::HashMap;

use oxide_express_path::{strip_port, MAX_PARAMS};
use serde::Serialize;
use tracing::trace;

use crate::bind::{BindError, Binder, Scope, Source, TextDecode};
use crate::body::{self, has_media_prefix, MultipartForm, MIME_FORM};
use crate::error::{Error, Result};
use crate::request::{decode_component, Args, Method, Request};
use crate::response::Response;
use crate::router::{App, Route};

/// State of one request while it travels through the handler chain.
///
/// A context is owned by a single dispatch; handlers receive it mutably and
/// never share it across threads.
pub struct Ctx<'a> {
    app: &'a App,
    request: Request,
    response: Response,
    /// Path matched against routes: unescaped if configured, trailing slash
    /// trimmed unless routing is strict.
    route_path: String,
    /// `route_path`, lowercased unless routing is case sensitive.
    detection: String,
    route_index: usize,
    handler_index: usize,
    route: Option<&'a Route>,
    params: Vec<(String, String)>,
    locals: HashMap<String, Box<dyn Any + Send + Sync>>,
    cookies: OnceCell<Args>,
    form: OnceCell<Args>,
    multipart: OnceCell<std::result::Result<MultipartForm, BindError>>,
}

impl<'a> Ctx<'a> {
    pub(crate) fn new(app: &'a App, request: Request) -> Self {
        let config = app.config();

        let mut route_path = if config.unescape_path {
            decode_component(&request.path, false)
        } else {
            request.path.clone()
        };
        if !route_path.starts_with('/') {
            route_path.insert(0, '/');
        }
        if !config.strict_routing && route_path.len() > 1 && route_path.ends_with('/') {
            route_path.pop();
        }
        let detection = if config.case_sensitive {
            route_path.clone()
        } else {
            route_path.to_ascii_lowercase()
        };

        Self {
            app,
            request,
            response: Response::ok(),
            route_path,
            detection,
            route_index: 0,
            handler_index: 0,
            route: None,
            params: Vec::new(),
            locals: HashMap::new(),
            cookies: OnceCell::new(),
            form: OnceCell::new(),
            multipart: OnceCell::new(),
        }
    }

    /// Returns the application serving this request.
    pub const fn app(&self) -> &'a App {
        self.app
    }

    /// Returns the request.
    pub const fn request(&self) -> &Request {
        &self.request
    }

    /// Returns the response built so far.
    pub const fn response(&self) -> &Response {
        &self.response
    }

    /// Returns the response for direct modification.
    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    pub(crate) fn into_response(self) -> Response {
        self.response
    }

    /// Request method.
    pub const fn method(&self) -> Method {
        self.request.method
    }

    /// Request path as received, without the query string.
    pub fn path(&self) -> &str {
        &self.request.path
    }

    /// Request URI as received, query string included.
    pub fn original_url(&self) -> &str {
        self.request.original_url()
    }

    /// The route whose handler is running.
    pub const fn route(&self) -> Option<&'a Route> {
        self.route
    }

    /// Host name from the `Host` header, without the port.
    pub fn hostname(&self) -> &str {
        strip_port(self.request.host())
    }

    /// Value of a path parameter, or `""`.
    pub fn params(&self, key: &str) -> &str {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map_or("", |(_, v)| v.as_str())
    }

    /// Parses a path parameter as an integer.
    pub fn params_int(&self, key: &str) -> Result<i64> {
        Ok(i64::decode_text(self.params(key))?)
    }

    /// Every path parameter of the current route, in pattern order.
    pub fn all_params(&self) -> &[(String, String)] {
        &self.params
    }

    /// First value of a query argument, or `""`.
    pub fn query(&self, key: &str) -> &str {
        self.request.query.get(key).unwrap_or_default()
    }

    /// First value of a request header, or `""`.
    pub fn get(&self, key: &str) -> &str {
        self.request.get_header(key).unwrap_or_default()
    }

    /// First value of a response header, or `""`.
    pub fn get_resp_header(&self, key: &str) -> &str {
        self.response.get_header(key).unwrap_or_default()
    }

    /// Value of a request cookie, or `""`.
    pub fn cookies(&self, key: &str) -> &str {
        self.cookie_args().get(key).unwrap_or_default()
    }

    /// First value of a form field, from an url-encoded or multipart body,
    /// or `""`.
    pub fn form_value(&self, key: &str) -> &str {
        if let Some(value) = self.form_args().get(key) {
            return value;
        }
        self.multipart_form()
            .ok()
            .and_then(|form| form.value(key))
            .unwrap_or_default()
    }

    /// Parses the body as `multipart/form-data`. The result is cached.
    pub fn multipart_form(&self) -> std::result::Result<&MultipartForm, BindError> {
        self.multipart
            .get_or_init(|| MultipartForm::parse(self.request.content_type(), &self.request.body))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Gets a request-scoped value stored with [`Ctx::set_locals`].
    pub fn locals<T: Any>(&self, key: &str) -> Option<&T> {
        self.locals.get(key)?.downcast_ref()
    }

    /// Stores a request-scoped value, replacing any previous one.
    pub fn set_locals<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.locals.insert(key.into(), Box::new(value));
    }

    /// Sets the response status.
    pub fn status(&mut self, status: u16) -> &mut Self {
        self.response.status = status;
        self
    }

    /// Sets a response header, replacing earlier values.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.response.set_header(key, value);
        self
    }

    /// Adds a response header value, keeping earlier ones.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.response.append_header(key, value);
        self
    }

    /// Sends raw bytes as the body.
    pub fn send(&mut self, body: impl Into<Vec<u8>>) -> Result<()> {
        self.response.body = body.into();
        Ok(())
    }

    /// Sends a text body, defaulting the content type to plain text.
    pub fn send_string(&mut self, body: impl Into<String>) -> Result<()> {
        if self.response.get_header("Content-Type").is_none() {
            self.response
                .set_header("Content-Type", "text/plain; charset=utf-8");
        }
        self.send(body.into())
    }

    /// Serializes `value` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let body = serde_json::to_vec(value).map_err(|e| Error::Internal(e.to_string()))?;
        self.response.set_header("Content-Type", body::MIME_JSON);
        self.send(body)
    }

    /// Starts a bind chain over this request.
    pub const fn bind(&self) -> Binder<'_, 'a> {
        Binder::new(self)
    }

    /// Runs the next handler of the current route, or the next matching
    /// route once the current one is exhausted.
    pub fn next(&mut self) -> Result<()> {
        self.handler_index += 1;
        if let Some(route) = self.route {
            if let Some(handler) = route.handlers().get(self.handler_index) {
                return handler(self);
            }
        }
        self.next_route()
    }

    /// Skips the rest of the current route and continues with the next
    /// route matching this request.
    pub fn next_route(&mut self) -> Result<()> {
        let app = self.app;
        let stack = app.stack(self.request.method);

        while let Some(route) = stack.get(self.route_index) {
            self.route_index += 1;

            let mut values = [""; MAX_PARAMS];
            if !route.matcher().matches(
                &self.detection,
                &self.route_path,
                &mut values,
                route.is_use(),
            ) {
                continue;
            }

            self.params = route
                .params()
                .iter()
                .zip(values)
                .map(|(name, value)| (name.clone(), value.to_string()))
                .collect();
            self.route = Some(route);
            self.handler_index = 0;
            trace!(
                method = %self.request.method,
                path = %self.request.path,
                route = route.path(),
                "route matched"
            );

            if let Some(handler) = route.handlers().first() {
                return handler(self);
            }
        }

        Err(self.unmatched())
    }

    /// 405 when the path is routed for other methods, 404 otherwise.
    ///
    /// Middleware and routes on other hosts do not count as routed. Neither
    /// does the other half of a GET route's HEAD copy for GET and HEAD
    /// requests.
    fn unmatched(&self) -> Error {
        let host = self.hostname();
        let get_or_head = matches!(self.request.method, Method::Get | Method::Head);
        let allowed: Vec<Method> = Method::ALL
            .into_iter()
            .filter(|&method| method != self.request.method)
            .filter(|&method| {
                self.app.stack(method).iter().any(|route| {
                    let mut values = [""; MAX_PARAMS];
                    !route.is_use()
                        && !(get_or_head && route.is_get_head_pair())
                        && route.answers_host(host)
                        && route
                            .matcher()
                            .matches(&self.detection, &self.route_path, &mut values, false)
                })
            })
            .collect();

        if allowed.is_empty() {
            Error::NotFound {
                method: self.request.method,
                path: self.request.path.clone(),
            }
        } else {
            Error::MethodNotAllowed {
                method: self.request.method,
                path: self.request.path.clone(),
                allowed,
            }
        }
    }

    fn cookie_args(&self) -> &Args {
        self.cookies.get_or_init(|| {
            let mut args = Args::new();
            for (_, header) in self
                .request
                .headers
                .iter()
                .filter(|(k, _)| k.eq_ignore_ascii_case("Cookie"))
            {
                for (name, value) in body::parse_cookies(header).iter() {
                    args.add(name, value);
                }
            }
            args
        })
    }

    fn form_args(&self) -> &Args {
        self.form.get_or_init(|| {
            if has_media_prefix(self.request.content_type(), MIME_FORM) {
                body::parse_form(&self.request.body)
            } else {
                Args::new()
            }
        })
    }
}

impl Source for Ctx<'_> {
    fn pairs(&self, scope: Scope) -> &[(String, String)] {
        match scope {
            Scope::Query => self.request.query.as_pairs(),
            Scope::Header => &self.request.headers,
            Scope::RespHeader => &self.response.headers,
            Scope::Param => &self.params,
            Scope::Cookie => self.cookie_args().as_pairs(),
            Scope::Form => self.form_args().as_pairs(),
            Scope::Multipart => self
                .multipart_form()
                .map_or(&[][..], |form| form.values.as_pairs()),
        }
    }
}
