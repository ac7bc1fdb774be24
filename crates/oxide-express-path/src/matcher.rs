//! Matching compiled patterns against request paths.
//!
//! Segments are walked left to right. Each parameter first takes the length
//! suggested by its compare part; when the rest of the pattern then fails,
//! greedy parameters retry with shorter spans ending at earlier occurrences of
//! their compare part, and optional parameters retry empty.
//!
//! A parameter segment that has exhausted its candidates at some offset is
//! remembered, so later branches reaching the same segment and offset fail
//! at once. That keeps patterns with many greedy parameters polynomial.

use crate::pattern::{ParamSegment, RoutePattern, Segment, MAX_PARAMS};

const SLASH: char = '/';

impl RoutePattern {
    /// Matches a request path, writing parameter values into `values`.
    ///
    /// `detection` is the string compared against constants (the path itself,
    /// or its lowercased form for case-insensitive routing) and must have the
    /// same length as `path`. Values are sliced from `path`, so they keep the
    /// original casing. With `partial`, a prefix match ending at a `/`
    /// boundary is enough.
    ///
    /// On a failed match the contents of `values` are unspecified. A pair
    /// whose character boundaries disagree never matches.
    ///
    /// Matching allocates nothing unless a parameter has to give up all of
    /// its candidate spans; the failure memo is then sized by segment count
    /// and path length.
    pub fn matches<'p>(
        &self,
        detection: &str,
        path: &'p str,
        values: &mut [&'p str; MAX_PARAMS],
        partial: bool,
    ) -> bool {
        if detection.len() != path.len() {
            return false;
        }

        let mut state = MatchState {
            detection,
            path,
            values,
            partial,
            total: self.segments.len(),
            failed: Vec::new(),
        };
        state.run(&self.segments, 0, 0)
    }

    /// Matches `path` exactly and returns `(name, value)` pairs in pattern
    /// order, or `None` when the path does not match.
    pub fn match_path<'p>(&self, path: &'p str) -> Option<Vec<(&str, &'p str)>> {
        let mut values = [""; MAX_PARAMS];
        if !self.matches(path, path, &mut values, false) {
            return None;
        }
        Some(self.params().iter().map(String::as_str).zip(values).collect())
    }
}

struct MatchState<'a, 'p> {
    detection: &'a str,
    path: &'p str,
    values: &'a mut [&'p str; MAX_PARAMS],
    partial: bool,
    total: usize,
    /// Bitset of `(segment, offset)` pairs known not to match.
    failed: Vec<u64>,
}

impl MatchState<'_, '_> {
    fn run(&mut self, segments: &[Segment], pos: usize, param: usize) -> bool {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.finished(pos);
        };
        let detection = self.detection;
        let rest = &detection[pos..];

        match segment {
            Segment::Const(c) => {
                if rest.starts_with(c.value.as_str()) {
                    return self.run(remaining, pos + c.len(), param);
                }
                // `/a/` also matches `/a` when the slash is optional.
                if c.has_optional_slash && rest == &c.value[..c.len() - 1] {
                    return self.run(remaining, detection.len(), param);
                }
                false
            }
            Segment::Param(p) => {
                let key = self.key(segments.len(), pos);
                if self.has_failed(key) {
                    return false;
                }
                let mut len = find_param_len(rest, p);
                loop {
                    if self.capture(p, pos, len, param) && self.run(remaining, pos + len, param + 1)
                    {
                        return true;
                    }
                    match shorter_len(rest, p, len) {
                        Some(next) => len = next,
                        None => break,
                    }
                }
                self.mark_failed(key);
                false
            }
        }
    }

    fn key(&self, remaining: usize, pos: usize) -> usize {
        (self.total - remaining) * (self.path.len() + 1) + pos
    }

    fn has_failed(&self, key: usize) -> bool {
        self.failed
            .get(key / 64)
            .is_some_and(|word| word & (1 << (key % 64)) != 0)
    }

    fn mark_failed(&mut self, key: usize) {
        if self.failed.is_empty() {
            let bits = self.total * (self.path.len() + 1);
            self.failed = vec![0; bits.div_ceil(64)];
        }
        if let Some(word) = self.failed.get_mut(key / 64) {
            *word |= 1 << (key % 64);
        }
    }

    /// Records `path[pos..pos + len]` for `p` if the span is acceptable.
    fn capture(&mut self, p: &ParamSegment, pos: usize, len: usize, param: usize) -> bool {
        if len == 0 && !p.is_optional {
            return false;
        }

        let Some(value) = self.path.get(pos..pos + len) else {
            return false;
        };
        // Empty optional captures skip their constraints.
        if len > 0 && !p.check(value) {
            return false;
        }

        match self.values.get_mut(param) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    fn finished(&self, pos: usize) -> bool {
        let rest = &self.detection[pos..];
        if rest.is_empty() {
            return true;
        }
        self.partial && (rest.starts_with(SLASH) || self.detection[..pos].ends_with(SLASH))
    }
}

/// First candidate length for a parameter at the start of `s`.
fn find_param_len(s: &str, p: &ParamSegment) -> usize {
    if p.is_last {
        return if p.is_greedy { s.len() } else { up_to_slash(s) };
    }

    if p.length != 0 {
        return s.chars().next().map_or(0, char::len_utf8);
    }

    let compare = p.compare_part.as_str();
    if compare.is_empty() {
        return if p.is_greedy { s.len() } else { up_to_slash(s) };
    }

    if p.is_greedy {
        let occurrences = s.matches(compare).count();
        if occurrences > 1 {
            return greedy_len(s, occurrences, p);
        }
    }

    match s.find(compare) {
        // A plain parameter never spans a path segment.
        Some(i) if !p.is_greedy && s[..i].contains(SLASH) => 0,
        Some(i) => i,
        None => s.len(),
    }
}

/// Leaves `part_count` occurrences of the compare part to the rest of the
/// pattern and takes everything before them.
fn greedy_len(s: &str, mut occurrences: usize, p: &ParamSegment) -> usize {
    let mut s = s;
    for _ in 0..p.part_count {
        if occurrences == 0 {
            break;
        }
        occurrences -= 1;
        match s.rfind(p.compare_part.as_str()) {
            Some(i) => s = &s[..i],
            None => break,
        }
    }
    s.len()
}

/// Next candidate after `len` failed, if any.
fn shorter_len(s: &str, p: &ParamSegment, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }

    if p.is_greedy {
        let head = &s[..len];
        let next = if p.compare_part.is_empty() {
            head.char_indices().next_back().map(|(i, _)| i)
        } else {
            head.rfind(p.compare_part.as_str())
        };
        return next.or_else(|| p.is_optional.then_some(0));
    }

    p.is_optional.then_some(0)
}

fn up_to_slash(s: &str) -> usize {
    s.find(SLASH).unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn values(pattern: &str, path: &str) -> Option<Vec<String>> {
        let pattern = RoutePattern::compile(pattern).unwrap();
        pattern
            .match_path(path)
            .map(|params| params.into_iter().map(|(_, v)| v.to_string()).collect())
    }

    fn partial(pattern: &str, path: &str) -> bool {
        let pattern = RoutePattern::compile(pattern).unwrap();
        let mut values = [""; MAX_PARAMS];
        pattern.matches(path, path, &mut values, true)
    }

    #[test]
    fn test_static_paths() {
        assert_eq!(values("/api/v1", "/api/v1"), Some(vec![]));
        assert_eq!(values("/api/v1", "/api/v2"), None);
        assert_eq!(values("/api/v1", "/api/v1/x"), None);
        assert_eq!(values("/", "/"), Some(vec![]));
    }

    #[test]
    fn test_named_param() {
        assert_eq!(values("/test/:user", "/test/john"), Some(vec!["john".into()]));
        assert_eq!(values("/test/:user", "/test/"), None);
        assert_eq!(values("/test/:user", "/test/john/doe"), None);
    }

    #[test]
    fn test_optional_param() {
        assert_eq!(values("/test/:user?", "/test/john"), Some(vec!["john".into()]));
        assert_eq!(values("/test/:user?", "/test/"), Some(vec![String::new()]));
        assert_eq!(values("/test/:user?", "/test"), Some(vec![String::new()]));
    }

    #[test]
    fn test_wildcard_then_optional() {
        assert_eq!(
            values("/api/*/:param?", "/api/joker/batman/robin/1"),
            Some(vec!["joker/batman/robin".into(), "1".into()])
        );
        assert_eq!(
            values("/api/*/:param?", "/api"),
            Some(vec![String::new(), String::new()])
        );
    }

    #[test]
    fn test_wildcard_and_plus() {
        assert_eq!(values("/api/*", "/api/a/b"), Some(vec!["a/b".into()]));
        assert_eq!(values("/api/*", "/api/"), Some(vec![String::new()]));
        assert_eq!(values("/api/*", "/api"), Some(vec![String::new()]));
        assert_eq!(values("/api/+", "/api/a/b"), Some(vec!["a/b".into()]));
        assert_eq!(values("/api/+", "/api/"), None);
        assert_eq!(values("/api/+", "/api"), None);
    }

    #[test]
    fn test_int_max_constraint() {
        let pattern = "/api/v1/:n<int;max(3000)>";
        assert_eq!(values(pattern, "/api/v1/123"), Some(vec!["123".into()]));
        assert_eq!(values(pattern, "/api/v1/8728382"), None);
        assert_eq!(values(pattern, "/api/v1/true"), None);
    }

    #[test]
    fn test_datetime_and_regex_constraints() {
        let pattern = r"/day/:d<datetime(2006\-01\-02)>";
        assert!(values(pattern, "/day/2005-11-01").is_some());
        assert!(values(pattern, "/day/2005-1-x").is_none());

        let pattern = "/u/:name<regex(^[a-z]+$)>";
        assert!(values(pattern, "/u/joe").is_some());
        assert!(values(pattern, "/u/Joe1").is_none());
    }

    #[test]
    fn test_adjacent_params() {
        let pattern = "/:day.:month?.:year?";
        assert_eq!(
            values(pattern, "/1.2.3"),
            Some(vec!["1".into(), "2".into(), "3".into()])
        );
        assert_eq!(
            values(pattern, "/1.."),
            Some(vec!["1".into(), String::new(), String::new()])
        );
        assert_eq!(
            values(pattern, "/1.2."),
            Some(vec!["1".into(), "2".into(), String::new()])
        );
        // Only slashes become optional; other delimiters stay literal.
        assert_eq!(values(pattern, "/1"), None);
        assert_eq!(values(pattern, "/1."), None);
        assert_eq!(values(pattern, "/1-"), None);
        assert_eq!(
            values(pattern, "/1.1.1.1"),
            Some(vec!["1".into(), "1".into(), "1.1".into()])
        );

        assert_eq!(
            values("/:file.:ext", "/report.pdf"),
            Some(vec!["report".into(), "pdf".into()])
        );
        assert_eq!(
            values("/flights/:from-:to", "/flights/LAX-SFO"),
            Some(vec!["LAX".into(), "SFO".into()])
        );
    }

    #[test]
    fn test_single_char_before_adjacent_param() {
        assert_eq!(
            values("/:a:b", "/xyz"),
            Some(vec!["x".into(), "yz".into()])
        );
    }

    #[test]
    fn test_plain_param_does_not_span_segments() {
        let pattern = "/api/:param/fixedEnd";
        assert_eq!(values(pattern, "/api/123/fixedEnd"), Some(vec!["123".into()]));
        assert_eq!(values(pattern, "/api/123/456/fixedEnd"), None);
    }

    #[test]
    fn test_greedy_backtracks_on_constraint_failure() {
        assert_eq!(
            values("/*.:a<int>.:b", "/x.1.y.z"),
            Some(vec!["x".into(), "1".into(), "y.z".into()])
        );
    }

    #[test]
    fn test_greedy_leaves_later_constants() {
        assert_eq!(
            values("/files/*/raw/:name", "/files/a/raw/b/raw/c"),
            Some(vec!["a/raw/b".into(), "c".into()])
        );
    }

    #[test]
    fn test_escaped_bytes_match_literally() {
        assert_eq!(values(r"/v1/some/resource/name\:customVerb", "/v1/some/resource/name:customVerb"), Some(vec![]));
        assert_eq!(values(r"/v1/:name\:verb", "/v1/thing:verb"), Some(vec!["thing".into()]));
        assert_eq!(values(r"/a\*b", "/a*b"), Some(vec![]));
    }

    #[test]
    fn test_partial_match_boundary() {
        assert!(partial("/api", "/api"));
        assert!(partial("/api", "/api/users"));
        assert!(!partial("/api", "/apiv2"));
        assert!(partial("/", "/anything"));
        assert!(partial("", "/anything"));
        assert!(partial("/api/:v", "/api/v1/users"));
    }

    #[test]
    fn test_case_insensitive_detection() {
        let pattern = RoutePattern::compile("/API/users/:id")
            .unwrap()
            .to_case_insensitive();
        let path = "/Api/USERS/AbC";
        let detection = path.to_ascii_lowercase();
        let mut values = [""; MAX_PARAMS];
        assert!(pattern.matches(&detection, path, &mut values, false));
        assert_eq!(values[0], "AbC");
    }

    #[test]
    fn test_mismatched_detection_length() {
        let pattern = RoutePattern::compile("/a").unwrap();
        let mut values = [""; MAX_PARAMS];
        assert!(!pattern.matches("/a/", "/a", &mut values, false));
    }

    #[test]
    fn test_mismatched_char_boundaries() {
        let pattern = RoutePattern::compile("/:a:b").unwrap();
        let mut values = [""; MAX_PARAMS];
        assert!(!pattern.matches("/ab", "/\u{e9}", &mut values, false));

        let pattern = RoutePattern::compile("/x:a").unwrap();
        assert!(!pattern.matches("/xy", "/\u{e9}", &mut values, false));
    }

    #[test]
    fn test_many_greedy_params_fail_fast() {
        let pattern = RoutePattern::compile("/files/*/*/*/*/raw").unwrap();
        let path = format!("/files{}/nope", "/a".repeat(100));

        let started = Instant::now();
        assert_eq!(pattern.match_path(&path), None);
        assert!(started.elapsed() < Duration::from_secs(1));

        let path = format!("/files{}/raw", "/a".repeat(100));
        let params = pattern.match_path(&path).unwrap();
        assert_eq!(params.len(), 4);
        assert_eq!(params[3].1.len(), 1);
    }

    #[test]
    fn test_multibyte_values() {
        assert_eq!(values("/w/:word", "/w/héllo"), Some(vec!["héllo".into()]));
        assert_eq!(values("/:a:b", "/éa"), Some(vec!["é".into(), "a".into()]));
    }
}
