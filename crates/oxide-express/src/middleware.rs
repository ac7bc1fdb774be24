//! Built-in middleware.

use std::time::Instant;

use tracing::info;

use crate::ctx::Ctx;
use crate::error::Result;
use crate::router::{handler, Handler};

/// Logs one `info` event per request with method, path, status and latency.
///
/// Register it first so it wraps every other handler:
///
/// ```
/// use oxide_express::{middleware, App, Request};
///
/// let mut app = App::new();
/// app.use_handlers("/", vec![middleware::logger()]).unwrap();
/// app.get("/", |ctx| ctx.send_string("home")).unwrap();
///
/// assert_eq!(app.handle(Request::get("/")).status, 200);
/// ```
///
/// An error from the rest of the chain is logged with the status it maps to
/// and passed on unchanged.
pub fn logger() -> Handler {
    handler(log_request)
}

fn log_request(ctx: &mut Ctx<'_>) -> Result<()> {
    let started = Instant::now();
    let result = ctx.next();

    let status = match &result {
        Ok(()) => ctx.response().status,
        Err(err) => err.status_code(),
    };
    info!(
        method = %ctx.method(),
        path = ctx.path(),
        status,
        latency_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
        "request"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use crate::router::App;

    #[test]
    fn test_logger_passes_responses_and_errors_through() {
        let mut app = App::new();
        app.use_handlers("/", vec![logger()]).unwrap();
        app.get("/ok", |ctx| ctx.status(201).send_string("made"))
            .unwrap();

        let res = app.handle(Request::get("/ok"));
        assert_eq!(res.status, 201);
        assert_eq!(res.body_string().unwrap(), "made");

        let res = app.handle(Request::get("/missing"));
        assert_eq!(res.status, 404);
    }
}
