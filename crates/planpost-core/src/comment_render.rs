use crate::comment::Comment;
use crate::comment_header::encode_comment_header;

pub const DETAILS_OPEN_TAG: &str = "<details open>";
pub const DETAILS_CLOSED_TAG: &str = "<details>";
pub const DETAILS_END_TAG: &str = "</details>";
pub const FENCE_CHAR: char = '`';
pub const MIN_FENCE_LEN: usize = 3;

/// Serializes a comment into the markdown layout read back by
/// [`crate::comment_parser::parse_comment_body`].
pub fn render_comment_body(comment: &Comment) -> String {
    let mut body = String::new();
    if !comment.headers().is_empty() {
        body.push_str(&encode_comment_header(comment.headers()));
        body.push('\n');
    }
    body.push_str(comment.description());
    body.push('\n');

    let mut error_seen = false;
    for section in comment.sections() {
        if section.body.starts_with("Error") {
            error_seen = true;
        }
        let details_tag = if error_seen || section.summary.is_none() {
            DETAILS_OPEN_TAG
        } else {
            DETAILS_CLOSED_TAG
        };
        let summary = section
            .summary
            .as_deref()
            .map(|summary| format!("<summary>{summary}</summary>"))
            .unwrap_or_default();
        let language = if section.body.contains("Plan:") {
            "hcl"
        } else {
            ""
        };
        let fence = code_fence(&section.body);
        body.push_str(&format!(
            "\n{details_tag}\n{summary}\n\n{fence}{language}\n{}\n{fence}\n{DETAILS_END_TAG}\n",
            section.body
        ));
    }

    if !comment.status().is_empty() {
        body.push('\n');
        body.push_str(comment.status());
    }
    body
}

/// A fence one backtick longer than any backtick run opening a body line, so
/// the body can never close it early.
fn code_fence(section_body: &str) -> String {
    let longest_run = section_body
        .lines()
        .map(|line| {
            line.trim_start()
                .chars()
                .take_while(|ch| *ch == FENCE_CHAR)
                .count()
        })
        .max()
        .unwrap_or(0);
    FENCE_CHAR.to_string().repeat(MIN_FENCE_LEN.max(longest_run + 1))
}
