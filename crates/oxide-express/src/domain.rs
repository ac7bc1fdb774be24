//! Virtual-host routing.

use std::sync::Arc;

use oxide_express_path::DomainPattern;
use tracing::trace;

use crate::ctx::Ctx;
use crate::error::Result;
use crate::request::Method;
use crate::router::{join_path, router_methods, App, Handler};

/// Locals key under which the matched host parameters are stored.
const DOMAIN_PARAMS: &str = "oxide_express.domain_params";

struct DomainParams(Vec<(String, String)>);

/// Registers routes that only answer requests whose `Host` matches a
/// pattern.
///
/// Every route gets a filter as its first handler. On a host match the
/// filter stores the host parameters and continues with the route's
/// handlers; otherwise it skips to the next matching route. Routes on other
/// hosts never show up in a 405 `Allow` header.
///
/// ```
/// use oxide_express::{domain_param, App, Request};
///
/// let mut app = App::new();
/// app.domain(":tenant.example.com")
///     .unwrap()
///     .get("/", |ctx| {
///         let tenant = domain_param(ctx, "tenant").to_string();
///         ctx.send_string(tenant)
///     })
///     .unwrap();
///
/// let res = app.handle(Request::get("/").header("Host", "acme.example.com"));
/// assert_eq!(res.body_string().unwrap(), "acme");
///
/// let res = app.handle(Request::get("/").header("Host", "example.com"));
/// assert_eq!(res.status, 404);
/// ```
pub struct DomainRouter<'a> {
    app: &'a mut App,
    pattern: Arc<DomainPattern>,
    prefix: String,
}

impl<'a> DomainRouter<'a> {
    pub(crate) fn new(app: &'a mut App, pattern: DomainPattern) -> Self {
        Self {
            app,
            pattern: Arc::new(pattern),
            prefix: String::new(),
        }
    }

    /// The host pattern.
    pub fn pattern(&self) -> &DomainPattern {
        &self.pattern
    }

    router_methods!();

    /// Registers handlers for several methods on this host.
    pub fn add(&mut self, methods: &[Method], path: &str, handlers: Vec<Handler>) -> Result<&mut Self> {
        let path = join_path(&self.prefix, path);
        let chain = self.filtered(handlers);
        self.app.add_on_domain(methods, &path, chain, &self.pattern)?;
        Ok(self)
    }

    /// Registers middleware for every path on this host.
    pub fn use_handler<H>(&mut self, handler: H) -> Result<&mut Self>
    where
        H: Fn(&mut Ctx<'_>) -> Result<()> + Send + Sync + 'static,
    {
        let prefix = join_path(&self.prefix, "/");
        let chain = self.filtered(vec![crate::router::handler(handler)]);
        self.app.use_on_domain(&prefix, chain, &self.pattern)?;
        Ok(self)
    }

    /// Continues with routes under `prefix` on the same host.
    #[must_use]
    pub fn group(self, prefix: &str) -> Self {
        let prefix = join_path(&self.prefix, prefix);
        Self { prefix, ..self }
    }

    /// Names the routes of the last registration.
    pub fn name(&mut self, name: &str) -> &mut Self {
        self.app.name(name);
        self
    }

    /// Prepends the host filter to `handlers`.
    fn filtered(&self, handlers: Vec<Handler>) -> Vec<Handler> {
        let pattern = Arc::clone(&self.pattern);
        let filter: Handler = Arc::new(move |ctx: &mut Ctx<'_>| {
            let Some(values) = pattern.matches(ctx.hostname()) else {
                trace!(
                    host = ctx.hostname(),
                    pattern = pattern.raw(),
                    "domain mismatch"
                );
                return ctx.next_route();
            };
            let params = pattern
                .param_names()
                .iter()
                .cloned()
                .zip(values)
                .collect();
            ctx.set_locals(DOMAIN_PARAMS, DomainParams(params));
            ctx.next()
        });

        let mut chain = Vec::with_capacity(handlers.len() + 1);
        chain.push(filter);
        chain.extend(handlers);
        chain
    }
}

/// Value of a host parameter matched by a [`DomainRouter`] route, or `""`.
pub fn domain_param<'c>(ctx: &'c Ctx<'_>, name: &str) -> &'c str {
    ctx.locals::<DomainParams>(DOMAIN_PARAMS)
        .and_then(|params| params.0.iter().find(|(k, _)| k == name))
        .map_or("", |(_, v)| v.as_str())
}
