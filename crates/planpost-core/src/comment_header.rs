//! Structured header token embedded as the first line of a plan comment.
//!
//! The token is an HTML comment so it stays invisible when GitHub renders the
//! markdown: `<!-- dflook/terraform-github-actions {"label":"x"} -->`.

use std::collections::BTreeMap;

use serde_json::Value;

pub const COMMENT_NAMESPACE: &str = "dflook/terraform-github-actions";
pub const HEADER_MARKER_PREFIX: &str = "<!--";
pub const HEADER_MARKER_SUFFIX: &str = "-->";

/// Header keys written by the driver.
pub mod keys {
    pub const WORKSPACE: &str = "workspace";
    pub const BACKEND: &str = "backend";
    pub const LABEL: &str = "label";
    pub const BACKEND_TYPE: &str = "backend_type";
    pub const PLAN_MODIFIER: &str = "plan_modifier";
    pub const PLAN_JOB_REF: &str = "plan_job_ref";
    pub const PLAN_HASHES: &str = "plan_hashes";
    pub const VARIABLES_HASH: &str = "variables_hash";
    pub const TRUNCATED: &str = "truncated";
    pub const VERSION: &str = "version";
}

/// Headers as stored on a comment. Ordered so encoding is deterministic.
pub type HeaderMap = BTreeMap<String, Value>;

/// Headers a comment must carry. `None` means the key must be absent.
pub type RequiredHeaders = BTreeMap<String, Option<Value>>;

pub fn encode_comment_header(headers: &HeaderMap) -> String {
    let json = serde_json::to_string(headers).unwrap_or_else(|_| "{}".to_string());
    format!("{HEADER_MARKER_PREFIX} {COMMENT_NAMESPACE} {json} {HEADER_MARKER_SUFFIX}")
}

/// Decodes a header token line. Anything that is not a well-formed token
/// carrying a JSON object decodes to an empty map.
pub fn decode_comment_header(line: &str) -> HeaderMap {
    let Some(args) = header_token_args(line) else {
        return HeaderMap::new();
    };
    match serde_json::from_str::<Value>(args) {
        Ok(Value::Object(object)) => object.into_iter().collect(),
        _ => HeaderMap::new(),
    }
}

/// True when `line` looks like a single-line HTML comment, regardless of
/// whether it belongs to this namespace.
pub fn is_header_line(line: &str) -> bool {
    let line = line.trim_end();
    line.starts_with(HEADER_MARKER_PREFIX) && line.ends_with(HEADER_MARKER_SUFFIX)
}

fn header_token_args(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(HEADER_MARKER_PREFIX)?;
    let rest = strip_one_whitespace_prefix(rest)?;
    let rest = rest.strip_prefix(COMMENT_NAMESPACE)?;
    let rest = strip_one_whitespace_prefix(rest)?;
    let end = rest.rfind(HEADER_MARKER_SUFFIX)?;
    strip_one_whitespace_suffix(&rest[..end])
}

fn strip_one_whitespace_prefix(text: &str) -> Option<&str> {
    let mut chars = text.chars();
    let first = chars.next()?;
    first.is_whitespace().then(|| chars.as_str())
}

fn strip_one_whitespace_suffix(text: &str) -> Option<&str> {
    let last = text.chars().next_back()?;
    last.is_whitespace().then(|| &text[..text.len() - last.len_utf8()])
}

/// Does `headers` satisfy every requirement?
///
/// Keys with a value must be present and equal; keys with `None` must be
/// absent. Keys not mentioned in `required` are ignored.
pub fn matches_headers(headers: &HeaderMap, required: &RequiredHeaders) -> bool {
    required.iter().all(|(key, value)| match value {
        None => !headers.contains_key(key),
        Some(expected) => headers.get(key) == Some(expected),
    })
}

/// The concrete headers a fresh or migrated comment starts with.
pub fn present_headers(required: &RequiredHeaders) -> HeaderMap {
    required
        .iter()
        .filter_map(|(key, value)| value.clone().map(|value| (key.clone(), value)))
        .collect()
}
