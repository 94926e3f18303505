#![no_main]

use libfuzzer_sys::fuzz_target;
use planpost_core::{parse_comment_body, render_comment_body};

const ISSUE_URL: &str = "https://api.github.com/repos/o/r/issues/1";

fuzz_target!(|data: &[u8]| {
    let body = String::from_utf8_lossy(data);
    if let Some(comment) = parse_comment_body(ISSUE_URL, "https://api.github.com/c/1", &body) {
        assert_eq!(comment.issue_url(), ISSUE_URL);
        assert!(comment.comment_url().is_some());
        let _ = render_comment_body(&comment);
    }
});
