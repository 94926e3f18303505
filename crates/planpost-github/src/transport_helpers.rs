use std::time::Duration;

use reqwest::header::HeaderMap;

const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
const MAX_RETRY_DELAY_MS: u64 = 30_000;

pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    let seconds = raw.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds))
}

pub fn retry_delay(base_delay_ms: u64, attempt: usize, retry_after: Option<Duration>) -> Duration {
    if let Some(delay) = retry_after {
        return delay.max(Duration::from_millis(base_delay_ms));
    }
    let exponent = attempt.saturating_sub(1).min(10) as u32;
    let scaled = base_delay_ms.saturating_mul(2_u64.saturating_pow(exponent));
    Duration::from_millis(scaled.min(MAX_RETRY_DELAY_MS))
}

pub fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

/// Server errors, 429, and the 403 GitHub answers once the rate limit is
/// exhausted are worth another attempt.
pub fn is_retryable_github_response(status: u16, headers: &HeaderMap) -> bool {
    match status {
        429 => true,
        403 => headers
            .get(RATE_LIMIT_REMAINING_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|remaining| remaining.trim() == "0"),
        _ => status >= 500,
    }
}

pub fn truncate_for_error(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::{
        is_retryable_github_response, parse_retry_after, retry_delay, truncate_for_error,
    };
    use reqwest::header::{HeaderMap, HeaderValue};
    use std::time::Duration;

    #[test]
    fn unit_retry_delay_doubles_and_caps() {
        assert_eq!(retry_delay(100, 1, None), Duration::from_millis(100));
        assert_eq!(retry_delay(100, 3, None), Duration::from_millis(400));
        assert_eq!(retry_delay(10_000, 9, None), Duration::from_millis(30_000));
        assert_eq!(
            retry_delay(100, 1, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn unit_parse_retry_after_reads_whole_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn regression_retryable_response_excludes_client_errors() {
        let none = HeaderMap::new();
        assert!(is_retryable_github_response(429, &none));
        assert!(is_retryable_github_response(502, &none));
        assert!(!is_retryable_github_response(404, &none));
        assert!(!is_retryable_github_response(422, &none));
        assert!(!is_retryable_github_response(403, &none));
    }

    #[test]
    fn functional_retryable_response_accepts_exhausted_rate_limit() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        assert!(is_retryable_github_response(403, &headers));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("12"));
        assert!(!is_retryable_github_response(403, &headers));
    }

    #[test]
    fn unit_truncate_for_error_appends_ellipsis() {
        assert_eq!(truncate_for_error("abcdef", 3), "abc...");
        assert_eq!(truncate_for_error("abc", 3), "abc");
    }
}
