//! Input validation helpers shared by services.

use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

static PHONE_KR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^01[0-9]-\d{3,4}-\d{4}$").expect("valid KR phone regex"));

static PHONE_US_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?1?\d{10}$").expect("valid US phone regex"));

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").expect("valid url regex"));

static HTML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid html tag regex"));

static QUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['";]"#).expect("valid quote regex"));

/// True if `value` parses as a UUID.
#[must_use]
pub fn validate_uuid(value: &str) -> bool {
    Uuid::parse_str(value).is_ok()
}

/// True if `email` looks like `local@domain.tld`.
#[must_use]
pub fn validate_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// True if `phone` matches the format of `country_code` (`"KR"` or `"US"`).
///
/// Unknown country codes never validate.
#[must_use]
pub fn validate_phone(phone: &str, country_code: &str) -> bool {
    match country_code {
        "KR" => PHONE_KR_RE.is_match(phone),
        "US" => PHONE_US_RE.is_match(phone),
        _ => false,
    }
}

/// True if `url` is an absolute http(s) URL.
#[must_use]
pub fn validate_url(url: &str) -> bool {
    URL_RE.is_match(url)
}

/// Strips HTML tags and quote/semicolon characters, trims, and truncates to
/// `max_length` characters. A limit of zero means no limit.
#[must_use]
pub fn sanitize_string(value: &str, max_length: Option<usize>) -> String {
    let without_tags = HTML_TAG_RE.replace_all(value, "");
    let without_quotes = QUOTE_RE.replace_all(&without_tags, "");
    let trimmed = without_quotes.trim();

    match max_length {
        Some(max) if max > 0 && trimmed.chars().count() > max => {
            trimmed.chars().take(max).collect()
        }
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_validation() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!validate_uuid("invalid-uuid"));
    }

    #[test]
    fn email_validation() {
        assert!(validate_email("user@example.com"));
        assert!(!validate_email("invalid-email"));
        assert!(!validate_email("user@host"));
    }

    #[test]
    fn phone_validation_per_country() {
        assert!(validate_phone("010-1234-5678", "KR"));
        assert!(!validate_phone("123", "KR"));
        assert!(validate_phone("+12025550123", "US"));
        assert!(!validate_phone("010-1234-5678", "FR"));
    }

    #[test]
    fn url_validation() {
        assert!(validate_url("https://example.com"));
        assert!(validate_url("http://localhost:8080/path"));
        assert!(!validate_url("not a url"));
        assert!(!validate_url("ftp://example.com"));
    }

    #[test]
    fn sanitize_strips_tags_and_quotes() {
        assert_eq!(
            sanitize_string("<script>alert('xss')</script>", None),
            "alert(xss)"
        );
        assert_eq!(sanitize_string("  a;b\"c  ", None), "abc");
    }

    #[test]
    fn sanitize_truncates_by_characters() {
        assert_eq!(sanitize_string("Hello World", Some(5)), "Hello");
        assert_eq!(sanitize_string("한국어입니다", Some(3)), "한국어");
        assert_eq!(sanitize_string("short", Some(10)), "short");
    }

    #[test]
    fn zero_max_length_does_not_truncate() {
        assert_eq!(sanitize_string("  hello  ", Some(0)), "hello");
    }

    proptest::proptest! {
        #[test]
        fn sanitized_output_is_bounded_and_unquoted(
            value in "\\PC{0,64}",
            max in 1usize..32,
        ) {
            let out = sanitize_string(&value, Some(max));
            proptest::prop_assert!(out.chars().count() <= max);
            proptest::prop_assert!(!out.contains(['\'', '"', ';']));
        }
    }
}
