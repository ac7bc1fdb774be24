//! HTTP response type.

/// An HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response headers in insertion order; names may repeat.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
}

impl Response {
    /// Creates a new response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Creates a 200 OK response.
    pub fn ok() -> Self {
        Self::new(200)
    }

    /// Replaces every value of a header (names compared case-insensitively).
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&key));
        self.headers.push((key, value.into()));
    }

    /// Adds a header value, keeping earlier ones.
    pub fn append_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.push((key.into(), value.into()));
    }

    /// Gets the first value of a header.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the body as a string.
    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.body.clone()).ok()
    }

    /// Returns the status text for the current status code.
    pub fn status_text(&self) -> &'static str {
        status_text(self.status)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}

/// Returns the reason phrase for a status code.
pub fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        413 => "Request Entity Too Large",
        415 => "Unsupported Media Type",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_response() {
        let mut res = Response::default();
        res.set_header("X-Custom", "value");
        res.body = b"Hello".to_vec();

        assert_eq!(res.status, 200);
        assert_eq!(res.get_header("x-custom"), Some("value"));
        assert_eq!(res.body_string(), Some("Hello".to_string()));
    }

    #[test]
    fn test_set_replaces_append_keeps() {
        let mut res = Response::ok();
        res.append_header("Keys", "v1");
        res.append_header("keys", "v2");
        assert_eq!(res.headers.len(), 2);

        res.set_header("KEYS", "v3");
        assert_eq!(res.headers, vec![("KEYS".to_string(), "v3".to_string())]);
    }

    #[test]
    fn test_status_text() {
        assert_eq!(Response::new(415).status_text(), "Unsupported Media Type");
        assert_eq!(status_text(799), "Unknown");
    }
}
