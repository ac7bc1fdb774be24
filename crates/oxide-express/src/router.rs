//! Route registration and request dispatch.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use oxide_express_path::{ConstraintRegistry, DomainPattern, RoutePattern};
use tracing::{debug, warn};

use crate::config::Config;
use crate::ctx::Ctx;
use crate::domain::DomainRouter;
use crate::error::{Error, Result};
use crate::request::{Method, Request};
use crate::response::Response;

/// A request handler.
pub type Handler = Arc<dyn Fn(&mut Ctx<'_>) -> Result<()> + Send + Sync>;

/// Turns a handler error into a response.
pub type ErrorHandler = Arc<dyn Fn(&mut Ctx<'_>, Error) -> Result<()> + Send + Sync>;

/// Decodes an XML body into a JSON value for [`crate::bind::Binder::xml`].
pub type XmlDecoder = Arc<dyn Fn(&[u8]) -> std::result::Result<serde_json::Value, String> + Send + Sync>;

/// Wraps a closure into a [`Handler`], for registration calls taking several
/// handlers.
pub fn handler<H>(handler: H) -> Handler
where
    H: Fn(&mut Ctx<'_>) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(handler)
}

/// The default error handler.
///
/// Writes the error message as plain text with [`Error::status_code`] as the
/// status, and an `Allow` header for 405 responses.
pub fn default_error_handler(ctx: &mut Ctx<'_>, err: Error) -> Result<()> {
    write_error(ctx, &err);
    Ok(())
}

fn write_error(ctx: &mut Ctx<'_>, err: &Error) {
    let status = err.status_code();
    if status >= 500 {
        warn!(
            method = %ctx.method(),
            path = ctx.path(),
            status,
            error = %err,
            "request failed"
        );
    }

    if let Error::MethodNotAllowed { allowed, .. } = err {
        let allow: Vec<&str> = allowed.iter().map(Method::as_str).collect();
        ctx.set("Allow", allow.join(", "));
    }

    let response = ctx.response_mut();
    response.status = status;
    response.set_header("Content-Type", "text/plain; charset=utf-8");
    response.body = err.to_string().into_bytes();
}

/// A registered route.
#[derive(Clone)]
pub struct Route {
    method: Method,
    path: String,
    name: Option<String>,
    /// Compiled from `path`, used for reverse routing.
    pattern: RoutePattern,
    /// `pattern`, lowercased for case-insensitive routing.
    matcher: RoutePattern,
    is_use: bool,
    /// GET or HEAD half of a route registered for both.
    get_head_pair: bool,
    /// Host pattern of routes registered through a [`DomainRouter`].
    domain: Option<Arc<DomainPattern>>,
    handlers: Vec<Handler>,
    seq: usize,
}

impl Route {
    /// HTTP method this entry answers.
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Path as registered, group prefixes included.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Route name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Parameter names in pattern order.
    pub fn params(&self) -> &[String] {
        self.pattern.params()
    }

    /// The compiled pattern.
    pub const fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// Prefix middleware registered with `use`.
    pub const fn is_use(&self) -> bool {
        self.is_use
    }

    /// Handlers in call order.
    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    /// Host pattern this route is limited to, if any.
    pub fn domain(&self) -> Option<&DomainPattern> {
        self.domain.as_deref()
    }

    pub(crate) const fn matcher(&self) -> &RoutePattern {
        &self.matcher
    }

    pub(crate) const fn is_get_head_pair(&self) -> bool {
        self.get_head_pair
    }

    /// True if the route is not limited to a host or `host` matches it.
    pub(crate) fn answers_host(&self, host: &str) -> bool {
        match &self.domain {
            Some(domain) => domain.matches(host).is_some(),
            None => true,
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("name", &self.name)
            .field("is_use", &self.is_use)
            .field("domain", &self.domain.as_ref().map(|d| d.raw()))
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

macro_rules! method_shortcuts {
    ($($(#[$doc:meta])* $name:ident => [$($method:ident),+];)*) => {
        $(
            $(#[$doc])*
            pub fn $name<H>(&mut self, path: &str, handler: H) -> Result<&mut Self>
            where
                H: Fn(&mut Ctx<'_>) -> Result<()> + Send + Sync + 'static,
            {
                self.add(&[$(Method::$method),+], path, vec![crate::router::handler(handler)])
            }
        )*

        /// Registers a route for every method.
        pub fn all<H>(&mut self, path: &str, handler: H) -> Result<&mut Self>
        where
            H: Fn(&mut Ctx<'_>) -> Result<()> + Send + Sync + 'static,
        {
            self.add(&Method::ALL, path, vec![crate::router::handler(handler)])
        }
    };
}

pub(crate) use method_shortcuts;

/// Expands to the per-method registration shortcuts of a router type that
/// has an `add(methods, path, handlers)` method.
macro_rules! router_methods {
    () => {
        crate::router::method_shortcuts! {
            /// Registers a GET route, which also answers HEAD.
            ///
            /// Shortcuts take one handler; chain several with `add` and
            /// [`handler`](crate::handler), e.g.
            /// `add(&[Method::Get, Method::Head], path, vec![handler(a), handler(b)])`.
            get => [Get, Head];
            /// Registers a HEAD route.
            head => [Head];
            /// Registers a POST route.
            post => [Post];
            /// Registers a PUT route.
            put => [Put];
            /// Registers a DELETE route.
            delete => [Delete];
            /// Registers a CONNECT route.
            connect => [Connect];
            /// Registers an OPTIONS route.
            options => [Options];
            /// Registers a TRACE route.
            trace => [Trace];
            /// Registers a PATCH route.
            patch => [Patch];
        }
    };
}

pub(crate) use router_methods;

/// The application: configuration, route table and dispatcher.
///
/// Routes are registered through `&mut self` before serving and read
/// concurrently afterwards; `App` is `Sync`, so one instance can dispatch
/// from many threads.
///
/// ```
/// use oxide_express::{App, Request};
///
/// let mut app = App::new();
/// app.get("/test/:user", |ctx| {
///     let user = ctx.params("user").to_string();
///     ctx.send_string(user)
/// })
/// .unwrap();
///
/// let res = app.handle(Request::get("/test/john"));
/// assert_eq!(res.body_string().unwrap(), "john");
///
/// let res = app.handle(Request::get("/nope"));
/// assert_eq!(res.status, 404);
/// assert_eq!(res.body_string().unwrap(), "Cannot GET /nope");
/// ```
pub struct App {
    config: Config,
    /// Routes per method, in registration order.
    stacks: Vec<Vec<Route>>,
    constraints: ConstraintRegistry,
    error_handler: ErrorHandler,
    xml_decoder: Option<XmlDecoder>,
    /// `(method index, route index)` of the last registration.
    latest: Vec<(usize, usize)>,
    next_seq: usize,
    handler_count: usize,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("routes", &self.routes())
            .finish_non_exhaustive()
    }
}

impl App {
    /// Creates an application with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an application with the given configuration.
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            stacks: Method::ALL.iter().map(|_| Vec::new()).collect(),
            constraints: ConstraintRegistry::new(),
            error_handler: Arc::new(default_error_handler),
            xml_decoder: None,
            latest: Vec::new(),
            next_seq: 0,
            handler_count: 0,
        }
    }

    /// Replaces the error handler.
    #[must_use]
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Ctx<'_>, Error) -> Result<()> + Send + Sync + 'static,
    {
        self.error_handler = Arc::new(handler);
        self
    }

    /// Sets the decoder used by XML body binding.
    #[must_use]
    pub fn xml_decoder<F>(mut self, decoder: F) -> Self
    where
        F: Fn(&[u8]) -> std::result::Result<serde_json::Value, String> + Send + Sync + 'static,
    {
        self.xml_decoder = Some(Arc::new(decoder));
        self
    }

    /// Registers a custom constraint for routes registered afterwards.
    pub fn register_constraint<F>(&mut self, name: impl Into<String>, check: F) -> &mut Self
    where
        F: Fn(&str, &[String]) -> bool + Send + Sync + 'static,
    {
        self.constraints.register(name, check);
        self
    }

    /// Returns the configuration.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn xml_parser(&self) -> Option<&XmlDecoder> {
        self.xml_decoder.as_ref()
    }

    pub(crate) fn stack(&self, method: Method) -> &[Route] {
        self.stacks
            .get(method.index())
            .map_or(&[][..], Vec::as_slice)
    }

    router_methods!();

    /// Registers one or more handlers for several methods at once. The
    /// handlers run in order, each continuing with [`Ctx::next`].
    ///
    /// Fails if the pattern does not compile or no handler is given.
    pub fn add(&mut self, methods: &[Method], path: &str, handlers: Vec<Handler>) -> Result<&mut Self> {
        self.register(methods, path, handlers, false, None)
    }

    pub(crate) fn add_on_domain(
        &mut self,
        methods: &[Method],
        path: &str,
        handlers: Vec<Handler>,
        domain: &Arc<DomainPattern>,
    ) -> Result<&mut Self> {
        self.register(methods, path, handlers, false, Some(domain))
    }

    pub(crate) fn use_on_domain(
        &mut self,
        prefix: &str,
        handlers: Vec<Handler>,
        domain: &Arc<DomainPattern>,
    ) -> Result<&mut Self> {
        self.register(&Method::ALL, prefix, handlers, true, Some(domain))
    }

    /// Registers middleware for every path and method.
    pub fn use_handler<H>(&mut self, handler: H) -> Result<&mut Self>
    where
        H: Fn(&mut Ctx<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.register(&Method::ALL, "/", vec![crate::router::handler(handler)], true, None)
    }

    /// Registers middleware for paths under `prefix`.
    pub fn use_path<H>(&mut self, prefix: &str, handler: H) -> Result<&mut Self>
    where
        H: Fn(&mut Ctx<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.register(&Method::ALL, prefix, vec![crate::router::handler(handler)], true, None)
    }

    /// Registers several middleware handlers under `prefix`.
    pub fn use_handlers(&mut self, prefix: &str, handlers: Vec<Handler>) -> Result<&mut Self> {
        self.register(&Method::ALL, prefix, handlers, true, None)
    }

    /// Starts a route group. `handlers` run as middleware for every path
    /// under `prefix`.
    pub fn group(&mut self, prefix: &str, handlers: Vec<Handler>) -> Result<Group<'_>> {
        let prefix = join_path("", prefix);
        if !handlers.is_empty() {
            self.use_handlers(&prefix, handlers)?;
        }
        Ok(Group { app: self, prefix })
    }

    /// Starts a chain of registrations on one path.
    pub fn route(&mut self, path: &str) -> RouteChain<'_> {
        RouteChain {
            app: self,
            path: path.to_string(),
        }
    }

    /// Starts a router whose routes only match requests for `host`.
    pub fn domain(&mut self, host: &str) -> Result<DomainRouter<'_>> {
        let pattern = DomainPattern::compile(host)?;
        Ok(DomainRouter::new(self, pattern))
    }

    /// Names the routes of the last registration.
    pub fn name(&mut self, name: &str) -> &mut Self {
        for &(method, index) in &self.latest {
            if let Some(route) = self.stacks.get_mut(method).and_then(|s| s.get_mut(index)) {
                route.name = Some(name.to_string());
            }
        }
        self
    }

    /// Finds a route by name.
    pub fn get_route(&self, name: &str) -> Option<&Route> {
        self.routes().into_iter().find(|r| r.name() == Some(name))
    }

    /// Builds the path of a named route.
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use oxide_express::App;
    ///
    /// let mut app = App::new();
    /// app.get("/users/:id/:tab?", |ctx| ctx.send_string("user")).unwrap();
    /// app.name("user");
    ///
    /// let params = HashMap::from([("id".to_string(), "42".to_string())]);
    /// assert_eq!(app.url_for("user", &params).unwrap(), "/users/42");
    /// ```
    pub fn url_for(&self, name: &str, params: &HashMap<String, String>) -> Result<String> {
        let route = self
            .get_route(name)
            .ok_or_else(|| Error::RouteNotFound(name.to_string()))?;
        Ok(route
            .pattern
            .build_path(|param| params.get(param).map(String::as_str))?)
    }

    /// Every registered route in registration order. Routes registered for
    /// several methods appear once per method.
    pub fn routes(&self) -> Vec<&Route> {
        let mut routes: Vec<&Route> = self.stacks.iter().flatten().collect();
        routes.sort_by_key(|r| (r.seq, r.method));
        routes
    }

    /// Total number of registered handlers.
    pub const fn handlers_count(&self) -> usize {
        self.handler_count
    }

    /// Dispatches a request and returns the response.
    ///
    /// Handler errors go through the error handler; if that fails too, the
    /// default error handler writes the response.
    pub fn handle(&self, request: Request) -> Response {
        let too_large = request.body.len() > self.config.body_limit;
        let is_head = request.method == Method::Head;

        let mut ctx = Ctx::new(self, request);
        let result = if too_large {
            Err(Error::payload_too_large())
        } else {
            ctx.next_route()
        };

        if let Err(err) = result {
            if let Err(err) = (self.error_handler)(&mut ctx, err) {
                write_error(&mut ctx, &err);
            }
        }

        let mut response = ctx.into_response();
        if is_head {
            response.body.clear();
        }
        response
    }

    fn register(
        &mut self,
        methods: &[Method],
        path: &str,
        handlers: Vec<Handler>,
        is_use: bool,
        domain: Option<&Arc<DomainPattern>>,
    ) -> Result<&mut Self> {
        if handlers.is_empty() {
            return Err(Error::Internal(format!("missing handler for route {path}")));
        }

        let mut path = join_path("", path);
        if !self.config.strict_routing && path.len() > 1 && path.ends_with('/') {
            path.pop();
        }

        let pattern = RoutePattern::with_registry(&path, &self.constraints)?;
        let matcher = if self.config.case_sensitive {
            pattern.clone()
        } else {
            pattern.to_case_insensitive()
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        self.handler_count += handlers.len();
        self.latest.clear();
        let paired = methods.contains(&Method::Get) && methods.contains(&Method::Head);

        for &method in methods {
            let stack = &mut self.stacks[method.index()];
            self.latest.push((method.index(), stack.len()));
            stack.push(Route {
                method,
                path: path.clone(),
                name: None,
                pattern: pattern.clone(),
                matcher: matcher.clone(),
                is_use,
                get_head_pair: paired && matches!(method, Method::Get | Method::Head),
                domain: domain.cloned(),
                handlers: handlers.clone(),
                seq,
            });
        }

        debug!(
            methods = ?methods,
            path = %path,
            handlers = handlers.len(),
            is_use,
            domain = domain.map(|d| d.raw()),
            "registered route"
        );
        Ok(self)
    }
}

/// Routes sharing a path prefix.
///
/// ```
/// use oxide_express::{handler, App, Request};
///
/// let mut app = App::new();
/// let mut api = app
///     .group("/api", vec![handler(|ctx| {
///         ctx.set("X-Api", "1");
///         ctx.next()
///     })])
///     .unwrap();
/// let mut v1 = api.group("/v1", Vec::new()).unwrap();
/// v1.get("/users", |ctx| ctx.send_string("users")).unwrap();
///
/// let res = app.handle(Request::get("/api/v1/users"));
/// assert_eq!(res.get_header("x-api"), Some("1"));
/// assert_eq!(res.body_string().unwrap(), "users");
/// ```
pub struct Group<'a> {
    app: &'a mut App,
    prefix: String,
}

impl Group<'_> {
    /// The full prefix of this group.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    router_methods!();

    /// Registers handlers for several methods under the group prefix.
    pub fn add(&mut self, methods: &[Method], path: &str, handlers: Vec<Handler>) -> Result<&mut Self> {
        self.app.add(methods, &join_path(&self.prefix, path), handlers)?;
        Ok(self)
    }

    /// Registers middleware for every path under the group prefix.
    pub fn use_handler<H>(&mut self, handler: H) -> Result<&mut Self>
    where
        H: Fn(&mut Ctx<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.app.use_path(&self.prefix, handler)?;
        Ok(self)
    }

    /// Starts a nested group.
    pub fn group(&mut self, prefix: &str, handlers: Vec<Handler>) -> Result<Group<'_>> {
        let prefix = join_path(&self.prefix, prefix);
        self.app.group(&prefix, handlers)
    }

    /// Names the routes of the last registration.
    pub fn name(&mut self, name: &str) -> &mut Self {
        self.app.name(name);
        self
    }
}

/// Several methods registered on one path.
///
/// ```
/// use oxide_express::{App, Method, Request};
///
/// let mut app = App::new();
/// app.route("/item")
///     .get(|ctx| ctx.send_string("read"))
///     .unwrap()
///     .post(|ctx| ctx.send_string("created"))
///     .unwrap();
///
/// let res = app.handle(Request::new(Method::Post, "/item"));
/// assert_eq!(res.body_string().unwrap(), "created");
/// ```
pub struct RouteChain<'a> {
    app: &'a mut App,
    path: String,
}

macro_rules! chain_shortcuts {
    ($(#[$doc:meta] $name:ident => [$($method:ident),+];)*) => {
        $(
            #[$doc]
            pub fn $name<H>(&mut self, handler: H) -> Result<&mut Self>
            where
                H: Fn(&mut Ctx<'_>) -> Result<()> + Send + Sync + 'static,
            {
                self.add(&[$(Method::$method),+], vec![crate::router::handler(handler)])
            }
        )*
    };
}

impl RouteChain<'_> {
    chain_shortcuts! {
        /// Registers GET (and HEAD) on the chained path.
        get => [Get, Head];
        /// Registers HEAD on the chained path.
        head => [Head];
        /// Registers POST on the chained path.
        post => [Post];
        /// Registers PUT on the chained path.
        put => [Put];
        /// Registers DELETE on the chained path.
        delete => [Delete];
        /// Registers OPTIONS on the chained path.
        options => [Options];
        /// Registers PATCH on the chained path.
        patch => [Patch];
        /// Registers every method on the chained path.
        all => [Get, Head, Post, Put, Delete, Connect, Options, Trace, Patch];
    }

    /// Registers handlers for several methods on the chained path.
    pub fn add(&mut self, methods: &[Method], handlers: Vec<Handler>) -> Result<&mut Self> {
        self.app.add(methods, &self.path, handlers)?;
        Ok(self)
    }

    /// Continues the chain on a sub-path.
    #[must_use]
    pub fn route(self, path: &str) -> Self {
        let path = join_path(&self.path, path);
        Self {
            app: self.app,
            path,
        }
    }
}

/// Joins a prefix and a path with exactly one `/` between them.
pub(crate) fn join_path(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return if prefix.is_empty() {
            "/".to_string()
        } else {
            prefix.to_string()
        };
    }
    if prefix.is_empty() {
        format!("/{path}")
    } else {
        format!("{prefix}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_handler(ctx: &mut Ctx<'_>) -> Result<()> {
        ctx.send_string("ok")
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", ""), "/");
        assert_eq!(join_path("", "users"), "/users");
        assert_eq!(join_path("/api/", "/users"), "/api/users");
        assert_eq!(join_path("/api", "/"), "/api");
        assert_eq!(join_path("/api", "v1/:id/"), "/api/v1/:id/");
    }

    #[test]
    fn test_get_registers_head() {
        let mut app = App::new();
        app.get("/a", ok_handler).unwrap();

        let methods: Vec<Method> = app.routes().iter().map(|r| r.method()).collect();
        assert_eq!(methods, [Method::Get, Method::Head]);
        assert_eq!(app.handlers_count(), 1);
    }

    #[test]
    fn test_routes_keep_registration_order() {
        let mut app = App::new();
        app.post("/b", ok_handler).unwrap();
        app.get("/a", ok_handler).unwrap();
        app.delete("/c", ok_handler).unwrap();

        let paths: Vec<(Method, &str)> = app
            .routes()
            .iter()
            .map(|r| (r.method(), r.path()))
            .collect();
        assert_eq!(
            paths,
            [
                (Method::Post, "/b"),
                (Method::Get, "/a"),
                (Method::Head, "/a"),
                (Method::Delete, "/c"),
            ]
        );
    }

    #[test]
    fn test_invalid_pattern_fails_registration() {
        let mut app = App::new();
        let err = app.get("/a/:id<int", ok_handler).unwrap_err();
        assert!(matches!(err, Error::Pattern(_)));
        assert!(app.routes().is_empty());

        let err = app.add(&[Method::Get], "/x", Vec::new()).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn test_non_strict_registration_trims_slash() {
        let mut app = App::new();
        app.get("/users/", ok_handler).unwrap();
        assert_eq!(app.routes()[0].path(), "/users");

        let mut strict = App::with_config(Config::new().strict_routing(true));
        strict.get("/users/", ok_handler).unwrap();
        assert_eq!(strict.routes()[0].path(), "/users/");
    }
}
