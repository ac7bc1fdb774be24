//! Route pattern compilation.
//!
//! Pattern syntax:
//! - `/users` - literal path
//! - `/users/:id` - named parameter, matches one non-empty piece of a segment
//! - `/users/:id?` - optional parameter, captures `""` when absent
//! - `/users/:id<int;max(3000)>` - parameter with constraints
//! - `/files/*` - wildcard, zero or more bytes, greedy (`*1`, `*2`, ...)
//! - `/files/+` - one or more bytes, greedy (`+1`, `+2`, ...)
//! - `/:file.:ext`, `/:from-:to` - parameters split by `-`, `.` or `/`
//! - `\:`, `\?`, `\*`, `\+`, `\\` - escaped literal bytes

use std::fmt::Write as _;

use crate::constraint::{self, Constraint, ConstraintRegistry};
use crate::error::{PatternError, Result};
use crate::pool;

/// Maximum number of parameters a single route may declare.
pub const MAX_PARAMS: usize = 30;

const PARAM_START: u8 = b':';
const WILDCARD: u8 = b'*';
const PLUS: u8 = b'+';
const OPTIONAL: u8 = b'?';
const ESCAPE: u8 = b'\\';
const CONSTRAINT_START: u8 = b'<';
const CONSTRAINT_END: u8 = b'>';
const SLASH: u8 = b'/';

/// Bytes that terminate a parameter name.
const NAME_END: &[u8] = b"?:\\/-.<*+";

/// A constant piece of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstSegment {
    /// Unescaped bytes to compare literally.
    pub value: String,
    /// The constant ends in `/` and that slash may be missing from the path,
    /// because it is followed by an optional parameter or ends the pattern.
    pub has_optional_slash: bool,
}

impl ConstSegment {
    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Returns true if the constant is empty.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// A parameter piece of a pattern.
#[derive(Debug, Clone)]
pub struct ParamSegment {
    /// Parameter name; `*N` and `+N` for unnamed greedy parameters.
    pub name: String,
    /// The constant bytes after this parameter up to the next constant block,
    /// used to find where the capture ends.
    pub compare_part: String,
    /// How often `compare_part` occurs in the constants that follow. Greedy
    /// parameters leave that many occurrences to the rest of the pattern.
    pub part_count: usize,
    /// Fixed capture length in characters, `1` when this parameter is
    /// directly followed by another non-greedy parameter, otherwise `0`.
    pub length: usize,
    /// `*` or `+`.
    pub is_greedy: bool,
    /// `?` or `*`.
    pub is_optional: bool,
    /// The final segment of the pattern.
    pub is_last: bool,
    /// Checks run on the captured value.
    pub constraints: Vec<Constraint>,
}

impl ParamSegment {
    /// Runs every constraint against `value`.
    pub fn check(&self, value: &str) -> bool {
        self.constraints.iter().all(|c| c.check(value))
    }
}

/// One element of a compiled pattern.
#[derive(Debug, Clone)]
pub enum Segment {
    /// Literal bytes.
    Const(ConstSegment),
    /// A capture.
    Param(ParamSegment),
}

impl Segment {
    /// Returns the parameter if this is a parameter segment.
    pub fn as_param(&self) -> Option<&ParamSegment> {
        match self {
            Self::Param(p) => Some(p),
            Self::Const(_) => None,
        }
    }

    /// Returns the constant if this is a constant segment.
    pub fn as_const(&self) -> Option<&ConstSegment> {
        match self {
            Self::Const(c) => Some(c),
            Self::Param(_) => None,
        }
    }

    pub(crate) fn is_optional_param(&self) -> bool {
        self.as_param().is_some_and(|p| p.is_optional)
    }
}

/// A compiled path pattern.
///
/// Built once when a route is registered and immutable afterwards. Matching
/// (see [`RoutePattern::matches`]) never mutates the pattern, so one pattern
/// can be matched from many threads at once.
///
/// An optional parameter placed directly after a constrained parameter with
/// no constant between them is not supported: the constraint is checked only
/// against the span the first parameter settles on, and the optional one is
/// never given back characters to make the constraint pass.
#[derive(Debug)]
pub struct RoutePattern {
    /// The pattern as registered.
    raw: String,
    /// Parsed segments, in order.
    pub(crate) segments: Vec<Segment>,
    /// Parameter names in order.
    params: Vec<String>,
    wildcard_count: usize,
    plus_count: usize,
}

impl Clone for RoutePattern {
    fn clone(&self) -> Self {
        let mut segments = pool::acquire();
        segments.extend(self.segments.iter().cloned());
        Self {
            raw: self.raw.clone(),
            segments,
            params: self.params.clone(),
            wildcard_count: self.wildcard_count,
            plus_count: self.plus_count,
        }
    }
}

impl Drop for RoutePattern {
    fn drop(&mut self) {
        pool::release(std::mem::take(&mut self.segments));
    }
}

impl RoutePattern {
    /// Compiles a pattern with the built-in constraints only.
    ///
    /// # Example
    ///
    /// ```
    /// use oxide_express_path::RoutePattern;
    ///
    /// let pattern = RoutePattern::compile("/posts/:id/comments/:comment?").unwrap();
    /// let params = pattern.match_path("/posts/123/comments").unwrap();
    /// assert_eq!(params, vec![("id", "123"), ("comment", "")]);
    /// ```
    pub fn compile(pattern: &str) -> Result<Self> {
        Self::with_registry(pattern, &ConstraintRegistry::new())
    }

    /// Compiles a pattern, resolving unknown constraint names in `registry`.
    pub fn with_registry(pattern: &str, registry: &ConstraintRegistry) -> Result<Self> {
        let mut compiler = Compiler {
            pattern,
            registry,
            segments: pool::acquire(),
            params: Vec::new(),
            wildcard_count: 0,
            plus_count: 0,
        };

        let mut rest = pattern;
        while !rest.is_empty() {
            let consumed = match next_param_start(pattern, rest)? {
                Some(0) => compiler.param(rest)?,
                Some(pos) => compiler.constant(&rest[..pos])?,
                None => compiler.constant(rest)?,
            };
            rest = &rest[consumed..];
        }

        if compiler.params.len() > MAX_PARAMS {
            return Err(PatternError::TooManyParams {
                pattern: pattern.to_string(),
                count: compiler.params.len(),
                max: MAX_PARAMS,
            });
        }

        let Compiler {
            mut segments,
            params,
            wildcard_count,
            plus_count,
            ..
        } = compiler;
        add_meta_info(&mut segments);

        Ok(Self {
            raw: pattern.to_string(),
            segments,
            params,
            wildcard_count,
            plus_count,
        })
    }

    /// Returns the pattern as registered.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the compiled segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the parameter names in order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Number of `*` parameters.
    pub fn wildcard_count(&self) -> usize {
        self.wildcard_count
    }

    /// Number of `+` parameters.
    pub fn plus_count(&self) -> usize {
        self.plus_count
    }

    /// Returns true if the pattern has no parameters.
    pub fn is_static(&self) -> bool {
        self.params.is_empty()
    }

    /// Returns a copy whose constants are ASCII-lowercased, for matching
    /// against lowercased request paths. Parameter names and constraints are
    /// left untouched.
    #[must_use]
    pub fn to_case_insensitive(&self) -> Self {
        let mut lowered = self.clone();
        for segment in &mut lowered.segments {
            match segment {
                Segment::Const(c) => c.value.make_ascii_lowercase(),
                Segment::Param(p) => p.compare_part.make_ascii_lowercase(),
            }
        }
        lowered
    }

    /// Re-renders the segments into pattern syntax.
    ///
    /// Compiling the result yields the same segments as this pattern.
    pub fn normalized(&self) -> String {
        let mut out = String::with_capacity(self.raw.len());
        let mut after_param = false;
        for segment in &self.segments {
            match segment {
                Segment::Const(c) => {
                    for (i, ch) in c.value.chars().enumerate() {
                        let continues_name = i == 0
                            && after_param
                            && !NAME_END.contains(&u8::try_from(ch).unwrap_or(0));
                        if continues_name || matches!(ch, ':' | '?' | '*' | '+' | '\\' | '<' | '>') {
                            out.push('\\');
                        }
                        out.push(ch);
                    }
                }
                Segment::Param(p) if p.is_greedy => {
                    out.push_str(&p.name[..1]);
                }
                Segment::Param(p) => {
                    out.push(':');
                    out.push_str(&p.name);
                    if !p.constraints.is_empty() {
                        let rendered: Vec<String> =
                            p.constraints.iter().map(Constraint::to_pattern).collect();
                        let _ = write!(out, "<{}>", rendered.join(";"));
                    }
                    if p.is_optional {
                        out.push('?');
                    }
                }
            }
            after_param = segment.as_param().is_some_and(|p| !p.is_greedy);
        }
        out
    }

    /// Builds a concrete path from parameter values.
    ///
    /// Required parameters must be present; optional and greedy ones become
    /// empty when missing.
    ///
    /// # Example
    ///
    /// ```
    /// use oxide_express_path::RoutePattern;
    ///
    /// let pattern = RoutePattern::compile("/posts/:id").unwrap();
    /// let path = pattern.build_path(|name| (name == "id").then_some("123")).unwrap();
    /// assert_eq!(path, "/posts/123");
    /// ```
    pub fn build_path<'v>(&self, lookup: impl Fn(&str) -> Option<&'v str>) -> Result<String> {
        let mut path = String::with_capacity(self.raw.len());

        for segment in &self.segments {
            match segment {
                Segment::Const(c) => path.push_str(&c.value),
                Segment::Param(p) => match lookup(&p.name) {
                    Some(value) => path.push_str(value),
                    None if p.is_optional => {
                        if path.len() > 1 && path.ends_with('/') {
                            path.pop();
                        }
                    }
                    None => return Err(PatternError::MissingParam(p.name.clone())),
                },
            }
        }

        if path.is_empty() {
            path.push('/');
        }
        Ok(path)
    }
}

struct Compiler<'a> {
    pattern: &'a str,
    registry: &'a ConstraintRegistry,
    segments: Vec<Segment>,
    params: Vec<String>,
    wildcard_count: usize,
    plus_count: usize,
}

impl Compiler<'_> {
    /// Pushes a constant, returns the number of pattern bytes consumed.
    fn constant(&mut self, part: &str) -> Result<usize> {
        let value = unescape(self.pattern, part)?;
        self.segments.push(Segment::Const(ConstSegment {
            value,
            has_optional_slash: false,
        }));
        Ok(part.len())
    }

    /// Pushes a parameter starting at `rest[0]`, returns the bytes consumed.
    fn param(&mut self, rest: &str) -> Result<usize> {
        let bytes = rest.as_bytes();

        if bytes[0] == WILDCARD || bytes[0] == PLUS {
            let is_wildcard = bytes[0] == WILDCARD;
            let name = if is_wildcard {
                self.wildcard_count += 1;
                format!("*{}", self.wildcard_count)
            } else {
                self.plus_count += 1;
                format!("+{}", self.plus_count)
            };
            self.push_param(name, true, is_wildcard, Vec::new());
            return Ok(1);
        }

        let mut pos = 1;
        while pos < bytes.len() && !NAME_END.contains(&bytes[pos]) {
            pos += 1;
        }
        let name = &rest[1..pos];

        let mut constraints = Vec::new();
        if bytes.get(pos) == Some(&CONSTRAINT_START) {
            let end = constraint_end(rest, pos)
                .ok_or_else(|| PatternError::UnterminatedConstraint(self.pattern.to_string()))?;
            constraints = constraint::parse_block(self.pattern, &rest[pos + 1..end], self.registry)?;
            pos = end + 1;
        }

        let is_optional = bytes.get(pos) == Some(&OPTIONAL);
        if is_optional {
            pos += 1;
        }

        self.push_param(name.to_string(), false, is_optional, constraints);
        Ok(pos)
    }

    fn push_param(
        &mut self,
        name: String,
        is_greedy: bool,
        is_optional: bool,
        constraints: Vec<Constraint>,
    ) {
        self.params.push(name.clone());
        self.segments.push(Segment::Param(ParamSegment {
            name,
            compare_part: String::new(),
            part_count: 0,
            length: 0,
            is_greedy,
            is_optional,
            is_last: false,
            constraints,
        }));
    }
}

/// Finds the next unescaped parameter start in `rest`.
///
/// A `:` that cannot start a name (end of pattern, or followed by `/` or
/// another `:`) is literal and stays part of the constant.
fn next_param_start(pattern: &str, rest: &str) -> Result<Option<usize>> {
    let bytes = rest.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            ESCAPE => {
                if i + 1 >= bytes.len() {
                    return Err(PatternError::UnterminatedEscape(pattern.to_string()));
                }
                i += 2;
                continue;
            }
            WILDCARD | PLUS => return Ok(Some(i)),
            PARAM_START if !matches!(bytes.get(i + 1), None | Some(&SLASH | &PARAM_START)) => {
                return Ok(Some(i));
            }
            _ => {}
        }
        i += 1;
    }

    Ok(None)
}

/// Returns the index of the `>` closing the block opened at `start`.
///
/// Escaped bytes and `>` inside parentheses do not close the block.
fn constraint_end(rest: &str, start: usize) -> Option<usize> {
    let bytes = rest.as_bytes();
    let mut depth = 0usize;
    let mut i = start + 1;

    while i < bytes.len() {
        match bytes[i] {
            ESCAPE => i += 1,
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            CONSTRAINT_END if depth == 0 => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Removes escapes: `\x` becomes `x`.
fn unescape(pattern: &str, part: &str) -> Result<String> {
    if !part.contains('\\') {
        return Ok(part.to_string());
    }

    let mut out = String::with_capacity(part.len());
    let mut chars = part.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            let escaped = chars
                .next()
                .ok_or_else(|| PatternError::UnterminatedEscape(pattern.to_string()))?;
            out.push(escaped);
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

/// Fills in the fields that depend on neighbouring segments.
fn add_meta_info(segments: &mut [Segment]) {
    let len = segments.len();
    if let Some(Segment::Param(last)) = segments.last_mut() {
        last.is_last = true;
    }

    // Back to front: every parameter learns the constant that follows it.
    let mut compare_part = String::new();
    for segment in segments.iter_mut().rev() {
        match segment {
            Segment::Param(p) => p.compare_part.clone_from(&compare_part),
            Segment::Const(c) => {
                compare_part.clone_from(&c.value);
                if compare_part.len() > 1 {
                    let trimmed = compare_part.trim_end_matches('/').len();
                    compare_part.truncate(trimmed.max(1));
                }
            }
        }
    }

    for i in 0..len {
        let next_is_plain_param = segments
            .get(i + 1)
            .and_then(Segment::as_param)
            .is_some_and(|p| !p.is_greedy);
        let next_is_optional = segments.get(i + 1).is_some_and(Segment::is_optional_param);
        let is_last = i + 1 == len;

        let part_count = match &segments[i] {
            Segment::Param(p) if !p.compare_part.is_empty() => segments[i + 1..]
                .iter()
                .filter_map(Segment::as_const)
                .map(|c| c.value.matches(p.compare_part.as_str()).count())
                .sum(),
            _ => 0,
        };

        match &mut segments[i] {
            Segment::Param(p) => {
                if !p.is_greedy && next_is_plain_param {
                    p.length = 1;
                }
                p.part_count = part_count;
            }
            Segment::Const(c) => {
                if c.value.ends_with('/') && (is_last || next_is_optional) {
                    c.has_optional_slash = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(pattern: &RoutePattern) -> Vec<&str> {
        pattern.params().iter().map(String::as_str).collect()
    }

    #[test]
    fn test_literal_path() {
        let pattern = RoutePattern::compile("/api/v1/users").unwrap();
        assert!(pattern.is_static());
        assert_eq!(pattern.segments().len(), 1);
        assert_eq!(pattern.segments()[0].as_const().unwrap().value, "/api/v1/users");
    }

    #[test]
    fn test_single_param() {
        let pattern = RoutePattern::compile("/users/:id").unwrap();
        assert_eq!(names(&pattern), vec!["id"]);
        let param = pattern.segments()[1].as_param().unwrap();
        assert!(param.is_last);
        assert!(!param.is_optional);
        assert!(!param.is_greedy);
    }

    #[test]
    fn test_wildcards_are_numbered() {
        let pattern = RoutePattern::compile("/*/+/*").unwrap();
        assert_eq!(names(&pattern), vec!["*1", "+1", "*2"]);
        assert_eq!(pattern.wildcard_count(), 2);
        assert_eq!(pattern.plus_count(), 1);
        let first = pattern.segments()[1].as_param().unwrap();
        assert!(first.is_greedy && first.is_optional);
        let plus = pattern.segments()[3].as_param().unwrap();
        assert!(plus.is_greedy && !plus.is_optional);
    }

    #[test]
    fn test_greedy_implies_optional_for_wildcard_only() {
        let pattern = RoutePattern::compile("/a/*/b/+").unwrap();
        for param in pattern.segments().iter().filter_map(Segment::as_param) {
            if param.name.starts_with('*') {
                assert!(param.is_optional);
            }
        }
    }

    #[test]
    fn test_adjacent_params() {
        let pattern = RoutePattern::compile("/:day.:month?.:year?").unwrap();
        assert_eq!(names(&pattern), vec!["day", "month", "year"]);
        let day = pattern.segments()[1].as_param().unwrap();
        assert_eq!(day.compare_part, ".");
        assert_eq!(day.part_count, 2);

        let pattern = RoutePattern::compile("/:a:b").unwrap();
        assert_eq!(pattern.segments()[1].as_param().unwrap().length, 1);
    }

    #[test]
    fn test_compare_part_trims_slashes() {
        let pattern = RoutePattern::compile("/api/*/:param/fixedEnd/").unwrap();
        let wildcard = pattern.segments()[1].as_param().unwrap();
        assert_eq!(wildcard.compare_part, "/");
        let param = pattern.segments()[3].as_param().unwrap();
        assert_eq!(param.compare_part, "/fixedEnd");
    }

    #[test]
    fn test_optional_slash() {
        let pattern = RoutePattern::compile("/api/:param?").unwrap();
        assert!(pattern.segments()[0].as_const().unwrap().has_optional_slash);

        let pattern = RoutePattern::compile("/api/:param").unwrap();
        assert!(!pattern.segments()[0].as_const().unwrap().has_optional_slash);
    }

    #[test]
    fn test_escapes() {
        let pattern = RoutePattern::compile(r"/v1/some/resource/name\:customVerb").unwrap();
        assert!(pattern.is_static());
        assert_eq!(
            pattern.segments()[0].as_const().unwrap().value,
            "/v1/some/resource/name:customVerb"
        );

        let pattern = RoutePattern::compile(r"/a\*b\+c\?d\\e").unwrap();
        assert_eq!(pattern.segments()[0].as_const().unwrap().value, r"/a*b+c?d\e");
    }

    #[test]
    fn test_literal_colon() {
        let pattern = RoutePattern::compile("/a:/b").unwrap();
        assert!(pattern.is_static());
    }

    #[test]
    fn test_constraints_are_attached() {
        let pattern = RoutePattern::compile(r"/api/v1/:date<datetime(2006\-01\-02)>/:n<int;max(3000)>?")
            .unwrap();
        assert_eq!(names(&pattern), vec!["date", "n"]);
        let date = pattern.segments()[1].as_param().unwrap();
        assert_eq!(date.constraints.len(), 1);
        assert_eq!(date.compare_part, "/");
        let n = pattern.segments()[3].as_param().unwrap();
        assert_eq!(n.constraints.len(), 2);
        assert!(n.is_optional);
    }

    #[test]
    fn test_compile_errors() {
        assert!(matches!(
            RoutePattern::compile(r"/abc\"),
            Err(PatternError::UnterminatedEscape(_))
        ));
        assert!(matches!(
            RoutePattern::compile("/:id<int"),
            Err(PatternError::UnterminatedConstraint(_))
        ));
        assert!(matches!(
            RoutePattern::compile("/:id<nope>"),
            Err(PatternError::UnknownConstraint { .. })
        ));
        assert!(matches!(
            RoutePattern::compile("/:id<max(>"),
            Err(PatternError::UnterminatedConstraint(_)) | Err(PatternError::MalformedConstraint { .. })
        ));
        assert!(matches!(
            RoutePattern::compile("/:id<regex([a-)>"),
            Err(PatternError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_too_many_params() {
        let pattern: String = (0..=MAX_PARAMS).map(|i| format!("/:p{i}")).collect();
        assert!(matches!(
            RoutePattern::compile(&pattern),
            Err(PatternError::TooManyParams { .. })
        ));
    }

    #[test]
    fn test_normalized_round_trip() {
        for raw in [
            "/api/v1/:param/*",
            "/:day.:month?.:year?",
            r"/api/:n<int;max(3000)>",
            r"/name\:verb/+",
        ] {
            let pattern = RoutePattern::compile(raw).unwrap();
            let again = RoutePattern::compile(&pattern.normalized()).unwrap();
            assert_eq!(pattern.normalized(), again.normalized());
            assert_eq!(pattern.params(), again.params());
        }
    }

    #[test]
    fn test_build_path() {
        let pattern = RoutePattern::compile("/posts/:id/:page?").unwrap();
        let path = pattern
            .build_path(|name| (name == "id").then_some("42"))
            .unwrap();
        assert_eq!(path, "/posts/42");

        assert!(matches!(
            pattern.build_path(|_| None),
            Err(PatternError::MissingParam(name)) if name == "id"
        ));
    }
}
