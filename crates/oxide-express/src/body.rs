//! Body and cookie parsers: url-encoded forms, `multipart/form-data` and the
//! `Cookie` header.

use crate::bind::BindError;
use crate::request::Args;

/// `application/json`
pub const MIME_JSON: &str = "application/json";
/// `application/xml`
pub const MIME_XML: &str = "application/xml";
/// `text/xml`
pub const MIME_TEXT_XML: &str = "text/xml";
/// `application/x-www-form-urlencoded`
pub const MIME_FORM: &str = "application/x-www-form-urlencoded";
/// `multipart/form-data`
pub const MIME_MULTIPART: &str = "multipart/form-data";

const MAX_BOUNDARY_LEN: usize = 70;

/// Returns the media type of a `Content-Type` value, without parameters.
pub fn media_type(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or_default().trim()
}

/// Returns true if the media type of `content_type` starts with `prefix`
/// (ASCII case-insensitive).
pub fn has_media_prefix(content_type: &str, prefix: &str) -> bool {
    let media = media_type(content_type);
    media.len() >= prefix.len()
        && media.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Parses a `Cookie` header value (`a=1; b=2`).
pub fn parse_cookies(header: &str) -> Args {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

/// Parses an url-encoded form body.
pub fn parse_form(body: &[u8]) -> Args {
    Args::parse(&String::from_utf8_lossy(body))
}

/// One file part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name.
    pub name: String,
    /// Client-supplied file name.
    pub filename: String,
    /// Part `Content-Type`, if sent.
    pub content_type: Option<String>,
    /// File contents.
    pub data: Vec<u8>,
}

/// A parsed `multipart/form-data` body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    /// Value fields in body order.
    pub values: Args,
    /// File fields in body order.
    pub files: Vec<FilePart>,
}

impl MultipartForm {
    /// Parses a body given the request's `Content-Type`.
    pub fn parse(content_type: &str, body: &[u8]) -> Result<Self, BindError> {
        let boundary = parse_boundary(content_type)?;
        MultipartParser::new(&boundary).parse(body)
    }

    /// Gets the first value field named `key`.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key)
    }

    /// Gets the first file field named `key`.
    pub fn file(&self, key: &str) -> Option<&FilePart> {
        self.files.iter().find(|f| f.name == key)
    }
}

/// Extracts the boundary from a multipart `Content-Type` value.
pub fn parse_boundary(content_type: &str) -> Result<String, BindError> {
    if !media_type(content_type).eq_ignore_ascii_case(MIME_MULTIPART) {
        return Err(multipart_error("not a multipart/form-data body"));
    }

    for param in content_type.split(';').skip(1) {
        let Some((key, value)) = param.trim().split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("boundary") {
            let boundary = value.trim().trim_matches('"');
            if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LEN {
                return Err(multipart_error("invalid boundary"));
            }
            return Ok(boundary.to_string());
        }
    }

    Err(multipart_error("missing boundary"))
}

struct MultipartParser {
    /// `--` followed by the boundary.
    delimiter: Vec<u8>,
}

impl MultipartParser {
    fn new(boundary: &str) -> Self {
        let mut delimiter = Vec::with_capacity(boundary.len() + 2);
        delimiter.extend_from_slice(b"--");
        delimiter.extend_from_slice(boundary.as_bytes());
        Self { delimiter }
    }

    fn parse(&self, body: &[u8]) -> Result<MultipartForm, BindError> {
        let mut form = MultipartForm::default();
        let mut pos = self.find_delimiter(body, 0)?;

        loop {
            let delimiter_end = pos + self.delimiter.len();
            match body.get(delimiter_end..delimiter_end + 2) {
                Some(b"--") => break,
                Some(b"\r\n") => {}
                _ => return Err(multipart_error("expected CRLF after boundary")),
            }
            pos = delimiter_end + 2;

            let (headers, header_end) = parse_part_headers(body, pos)?;
            pos = header_end;

            let disposition = headers
                .iter()
                .find(|(k, _)| k == "content-disposition")
                .map(|(_, v)| v.as_str())
                .ok_or_else(|| multipart_error("missing Content-Disposition"))?;
            let (name, filename) = parse_content_disposition(disposition)?;
            let content_type = headers
                .iter()
                .find(|(k, _)| k == "content-type")
                .map(|(_, v)| v.clone());

            let data_end = self.find_delimiter(body, pos)?;
            // The CRLF before a delimiter belongs to the delimiter.
            let data = &body[pos..data_end.saturating_sub(2).max(pos)];

            match filename {
                Some(filename) => form.files.push(FilePart {
                    name,
                    filename,
                    content_type,
                    data: data.to_vec(),
                }),
                None => form
                    .values
                    .add(name, String::from_utf8_lossy(data).into_owned()),
            }

            pos = data_end;
        }

        Ok(form)
    }

    /// Finds the next delimiter at or after `start` that begins a line and is
    /// followed by CRLF or `--`.
    fn find_delimiter(&self, data: &[u8], start: usize) -> Result<usize, BindError> {
        let len = self.delimiter.len();
        if data.len() < len {
            return Err(multipart_error("unexpected end of body"));
        }

        for i in start..=data.len() - len {
            if !data[i..].starts_with(&self.delimiter) {
                continue;
            }
            if i != 0 && (i < 2 || &data[i - 2..i] != b"\r\n") {
                continue;
            }
            match data.get(i + len..i + len + 2) {
                Some(b"\r\n" | b"--") => return Ok(i),
                Some(_) => {}
                None => break,
            }
        }

        Err(multipart_error("unexpected end of body"))
    }
}

fn parse_part_headers(
    data: &[u8],
    start: usize,
) -> Result<(Vec<(String, String)>, usize), BindError> {
    let mut headers = Vec::new();
    let mut pos = start;

    loop {
        let line_end = find_crlf(data, pos)?;
        let line = &data[pos..line_end];
        if line.is_empty() {
            return Ok((headers, line_end + 2));
        }

        let line = std::str::from_utf8(line)
            .map_err(|_| multipart_error("invalid UTF-8 in part header"))?;
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
        pos = line_end + 2;
    }
}

fn find_crlf(data: &[u8], start: usize) -> Result<usize, BindError> {
    data.get(start..)
        .and_then(|rest| rest.windows(2).position(|w| w == b"\r\n"))
        .map(|offset| start + offset)
        .ok_or_else(|| multipart_error("unexpected end of part headers"))
}

/// Parses `form-data; name="field"; filename="file.txt"`.
fn parse_content_disposition(value: &str) -> Result<(String, Option<String>), BindError> {
    let mut name = None;
    let mut filename = None;

    for param in value.split(';').skip(1) {
        let Some((key, raw)) = param.trim().split_once('=') else {
            continue;
        };
        let unquoted = raw.trim().trim_matches('"').to_string();
        if key.trim().eq_ignore_ascii_case("name") {
            name = Some(unquoted);
        } else if key.trim().eq_ignore_ascii_case("filename") {
            filename = Some(unquoted);
        }
    }

    let name = name.ok_or_else(|| multipart_error("part without a name"))?;
    Ok((name, filename))
}

fn multipart_error(message: &str) -> BindError {
    BindError::Multipart(message.to_string())
}
