#![allow(dead_code)]

use oxide_express::{App, Request, Response};

pub const BOUNDARY: &str = "oxide-boundary";

/// Dispatches `request` and returns the status and body text.
pub fn send(app: &App, request: Request) -> (u16, String) {
    let res = app.handle(request);
    let body = text(&res);
    (res.status, body)
}

pub fn text(res: &Response) -> String {
    res.body_string()
        .unwrap_or_else(|| panic!("Response body is not UTF-8: {:?}", res.body))
}

pub fn form_post(uri: &str, body: &str) -> Request {
    Request::post(uri)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(body)
}

pub fn json_post(uri: &str, body: &str) -> Request {
    Request::post(uri)
        .header("Content-Type", "application/json")
        .body(body)
}

/// Builds a `multipart/form-data` POST from value fields.
pub fn multipart_post(uri: &str, fields: &[(&str, &str)]) -> Request {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::post(uri)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(body)
}
