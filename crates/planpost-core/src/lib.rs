//! Core model and algorithms for the pull-request plan comment.
//!
//! Provides the comment value type, the markdown wire codec (header token,
//! body parser and renderer), the three-tier comment matcher, plan-file
//! section building, and the fingerprint-based approval evaluator. Nothing in
//! this crate talks to the network.

pub mod approval;
pub mod comment;
pub mod comment_header;
pub mod comment_matcher;
pub mod comment_parser;
pub mod comment_render;
pub mod fingerprint;
pub mod plan_description;
pub mod plan_sections;

pub use approval::{evaluate_approval, ApprovalError, ApprovalOutcome};
pub use comment::{Comment, CommentError, CommentLink, CommentUpdate, PlanHashRecord, Section};
pub use comment_header::{
    decode_comment_header, encode_comment_header, matches_headers, HeaderMap, RequiredHeaders,
    COMMENT_NAMESPACE,
};
pub use comment_matcher::{find_comment, RemoteComment};
pub use comment_parser::parse_comment_body;
pub use comment_render::render_comment_body;
pub use fingerprint::{fingerprint, sha256_hex};
