use std::time::Duration;

use chat_api::retry::{is_quota_exhausted, RetryPolicy};

#[test]
fn gateway_and_rate_limit_statuses_are_retried() {
    let policy = RetryPolicy::default();
    for status in [429, 500, 502, 503, 504] {
        assert!(policy.should_retry_status(status, ""), "status {status}");
    }
    assert!(!policy.should_retry_status(400, "bad request"));
    assert!(!policy.should_retry_status(401, ""));
}

#[test]
fn transient_error_text_is_retried_on_other_statuses() {
    let policy = RetryPolicy::default();
    assert!(policy.should_retry_status(400, "rate limit exceeded"));
    assert!(policy.should_retry_status(400, "upstream connect error"));
}

#[test]
fn exhausted_quota_is_never_retried() {
    let body = r#"{"error":{"code":"insufficient_quota","message":"You exceeded your current quota"}}"#;
    assert!(is_quota_exhausted(body));
    assert!(!RetryPolicy::default().should_retry_status(429, body));
    assert!(!is_quota_exhausted("rate limit exceeded"));
}

#[test]
fn delay_doubles_per_attempt() {
    let policy = RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(250),
    };
    assert_eq!(policy.delay(0), Duration::from_millis(250));
    assert_eq!(policy.delay(1), Duration::from_millis(500));
    assert_eq!(policy.delay(2), Duration::from_millis(1000));
    assert!(policy.has_attempts_left(2));
    assert!(!policy.has_attempts_left(3));
    assert!(!RetryPolicy::none().has_attempts_left(0));
}
