//! Virtual-host routing end to end.

mod common;
use common::*;

use oxide_express::{domain_param, App, Bind, Request};

fn tenant_app() -> App {
    let mut app = App::new();
    app.domain(":tenant.example.com")
        .unwrap()
        .get("/", |ctx| {
            let tenant = domain_param(ctx, "tenant").to_string();
            ctx.send_string(format!("tenant {tenant}"))
        })
        .unwrap();
    app
}

#[test]
fn tenant_label_is_captured() {
    let app = tenant_app();

    let request = Request::get("/").header("Host", "acme.example.com");
    assert_eq!(send(&app, request), (200, "tenant acme".into()));
}

#[test]
fn label_count_must_match() {
    let app = tenant_app();

    for host in ["example.com", "a.b.example.com", ""] {
        let request = Request::get("/").header("Host", host);
        assert_eq!(send(&app, request).0, 404, "host {host:?}");
    }
}

#[test]
fn domain_param_is_empty_outside_domain_routes() {
    let mut app = App::new();
    app.get("/", |ctx| {
        let tenant = domain_param(ctx, "tenant").to_string();
        ctx.send_string(format!("[{tenant}]"))
    })
    .unwrap();

    let request = Request::get("/").header("Host", "acme.example.com");
    assert_eq!(send(&app, request).1, "[]");
}

#[test]
fn hosts_share_paths() {
    let mut app = App::new();
    app.domain("blog.example.com")
        .unwrap()
        .get("/posts/:id", |ctx| {
            let id = ctx.params("id").to_string();
            ctx.send_string(format!("blog {id}"))
        })
        .unwrap();
    app.domain("shop.example.com")
        .unwrap()
        .get("/posts/:id", |ctx| {
            let id = ctx.params("id").to_string();
            ctx.send_string(format!("shop {id}"))
        })
        .unwrap();

    let blog = Request::get("/posts/1").header("Host", "Blog.Example.com");
    assert_eq!(send(&app, blog).1, "blog 1");

    let shop = Request::get("/posts/2").header("Host", "shop.example.com:443");
    assert_eq!(send(&app, shop).1, "shop 2");

    let other = Request::get("/posts/3").header("Host", "www.example.com");
    assert_eq!(send(&app, other), (404, "Cannot GET /posts/3".into()));
}

#[test]
fn head_follows_the_host_filter() {
    let app = tenant_app();

    let res = app.handle(Request::head("/").header("Host", "acme.example.com"));
    assert_eq!(res.status, 200);
    assert!(res.body.is_empty());

    let res = app.handle(Request::head("/").header("Host", "example.com"));
    assert_eq!(res.status, 404);
    assert_eq!(res.get_header("allow"), None);
}

#[test]
fn other_hosts_are_not_allowed_methods() {
    let mut app = App::new();
    app.domain("admin.example.com")
        .unwrap()
        .post("/x", |ctx| ctx.send_string("posted"))
        .unwrap();

    let res = app.handle(Request::get("/x").header("Host", "www.example.com"));
    assert_eq!(res.status, 404);
    assert_eq!(res.get_header("allow"), None);

    let res = app.handle(Request::get("/x").header("Host", "admin.example.com"));
    assert_eq!(res.status, 405);
    assert_eq!(res.get_header("allow"), Some("POST"));
}

#[derive(Debug, Default, Bind)]
struct Page {
    #[bind(param = "slug")]
    slug: String,
    #[bind(query = "lang")]
    lang: Option<String>,
}

#[test]
fn domain_routes_bind_requests() {
    let mut app = App::new();
    app.domain(":tenant.:region.example.com")
        .unwrap()
        .group("/pages")
        .get("/:slug", |ctx| {
            let mut page = Page::default();
            ctx.bind().req(&mut page).result()?;
            let tenant = domain_param(ctx, "tenant").to_string();
            let region = domain_param(ctx, "region").to_string();
            ctx.send_string(format!(
                "{tenant}@{region} {} {}",
                page.slug,
                page.lang.unwrap_or_default()
            ))
        })
        .unwrap()
        .name("page");

    let request = Request::get("/pages/about?lang=fr").header("Host", "acme.eu.example.com");
    assert_eq!(send(&app, request).1, "acme@eu about fr");
    assert_eq!(app.get_route("page").unwrap().path(), "/pages/:slug");
}
