//! Matching scenarios for compiled path patterns.

mod common;
use common::*;

use oxide_express_path::MAX_PARAMS;

#[test]
fn simple_named_param() {
    check_cases(
        "/test/:user",
        &[
            ("/test/john", Some(&["john"])),
            ("/test/", None),
            ("/test", None),
            ("/test/john/x", None),
        ],
    );
}

#[test]
fn wildcard_followed_by_optional_param() {
    check_cases(
        "/api/*/:param?",
        &[
            ("/api/joker/batman/robin/1", Some(&["joker/batman/robin", "1"])),
            ("/api/joker/batman/robin/1/", Some(&["joker/batman/robin/1", ""])),
            ("/api/joker", Some(&["joker", ""])),
            ("/api/", Some(&["", ""])),
            ("/api", Some(&["", ""])),
            ("/apix", None),
        ],
    );
}

#[test]
fn integer_constraint_with_max() {
    check_cases(
        "/api/v1/:n<int;max(3000)>",
        &[
            ("/api/v1/123", Some(&["123"])),
            ("/api/v1/3000", Some(&["3000"])),
            ("/api/v1/8728382", None),
            ("/api/v1/true", None),
            ("/api/v1/", None),
        ],
    );
}

#[test]
fn optional_param_with_constraint() {
    check_cases(
        "/api/v1/:n<int>?",
        &[
            ("/api/v1/12", Some(&["12"])),
            ("/api/v1/", Some(&[""])),
            ("/api/v1", Some(&[""])),
            ("/api/v1/x", None),
        ],
    );
}

#[test]
fn range_and_length_constraints() {
    check_cases(
        "/r/:n<range(5,10)>",
        &[("/r/5", Some(&["5"])), ("/r/10", Some(&["10"])), ("/r/11", None)],
    );
    check_cases(
        "/l/:s<betweenLen(2,3)>",
        &[("/l/ab", Some(&["ab"])), ("/l/abcd", None), ("/l/a", None)],
    );
    check_cases(
        "/m/:s<minLen(2);maxLen(4)>",
        &[("/m/ab", Some(&["ab"])), ("/m/abcde", None)],
    );
}

#[test]
fn guid_and_alpha_constraints() {
    check_cases(
        "/g/:id<guid>",
        &[
            ("/g/f0fa66cc-d22e-445b-866d-1d76e776371d", Some(&["f0fa66cc-d22e-445b-866d-1d76e776371d"])),
            ("/g/not-a-guid", None),
        ],
    );
    check_cases("/a/:s<alpha>", &[("/a/abc", Some(&["abc"])), ("/a/ab1", None)]);
}

#[test]
fn escaped_constraint_argument() {
    check_cases(
        r"/d/:date<datetime(2006\-01\-02)>",
        &[("/d/2005-11-01", Some(&["2005-11-01"])), ("/d/2005-11", None)],
    );
    check_cases(
        r"/re/:code<regex(\d{3})>",
        &[("/re/123", Some(&["123"])), ("/re/abc", None)],
    );
}

#[test]
fn adjacent_parameters() {
    check_cases(
        "/:day.:month?.:year?",
        &[
            ("/1", None),
            ("/1.", None),
            ("/1-", None),
            ("/1.1", None),
            ("/1..", Some(&["1", "", ""])),
            ("/1.1.", Some(&["1", "1", ""])),
            ("/1.1.1", Some(&["1", "1", "1"])),
            ("/1.1.1.1", Some(&["1", "1", "1.1"])),
        ],
    );
    check_cases(
        "/shop/product/color::color/size::size",
        &[
            ("/shop/product/color:blue/size:xs", Some(&["blue", "xs"])),
            ("/shop/product/color:blue/size:", None),
        ],
    );
}

#[test]
fn plus_needs_at_least_one_byte() {
    check_cases(
        "/config/+.json",
        &[
            ("/config/abc.json", Some(&["abc"])),
            ("/config/a/b.json", Some(&["a/b"])),
            ("/config/.json", None),
        ],
    );
}

#[test]
fn several_wildcards() {
    check_cases(
        "/*/ok/*",
        &[
            ("/a/ok/b", Some(&["a", "b"])),
            ("/a/b/ok/c/d", Some(&["a/b", "c/d"])),
            ("/ok/x", None),
        ],
    );
}

#[test]
fn names_follow_pattern_order() {
    let pattern = compile("/users/:id/*/files/+");
    assert_eq!(pattern.params(), ["id", "*1", "+1"]);
    assert_eq!(pattern.wildcard_count(), 1);
    assert_eq!(pattern.plus_count(), 1);

    let params = pattern.match_path("/users/7/a/b/files/x.txt").unwrap();
    assert_eq!(params, vec![("id", "7"), ("*1", "a/b"), ("+1", "x.txt")]);
}

#[test]
fn matching_is_deterministic() {
    let pattern = compile("/api/*/:param?");
    let path = "/api/joker/batman/robin/1";
    let first = pattern.match_path(path);
    for _ in 0..10 {
        assert_eq!(pattern.match_path(path), first);
    }
}

#[test]
fn unrelated_patterns_do_not_interfere() {
    let before = capture("/a/:x", "/a/1");
    let _others: Vec<_> = (0..20).map(|i| compile(&format!("/b{i}/:y/*"))).collect();
    assert_eq!(capture("/a/:x", "/a/1"), before);
}

#[test]
fn concurrent_matching_on_one_pattern() {
    let pattern = compile("/api/:version/users/:id<int>");

    std::thread::scope(|scope| {
        for t in 0..8 {
            let pattern = &pattern;
            scope.spawn(move || {
                for i in 0..200 {
                    let path = format!("/api/v{t}/users/{i}");
                    let mut values = [""; MAX_PARAMS];
                    assert!(pattern.matches(&path, &path, &mut values, false));
                    assert_eq!(values[0], format!("v{t}"));
                    assert_eq!(values[1], i.to_string());
                }
            });
        }
    });
}

#[test]
fn build_path_from_values() {
    let pattern = compile("/posts/:id/comments/:comment?");
    let path = pattern
        .build_path(|name| match name {
            "id" => Some("42"),
            _ => None,
        })
        .unwrap();
    assert_eq!(path, "/posts/42/comments");

    let path = pattern
        .build_path(|name| match name {
            "id" => Some("42"),
            "comment" => Some("7"),
            _ => None,
        })
        .unwrap();
    assert_eq!(path, "/posts/42/comments/7");
}
