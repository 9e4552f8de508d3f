//! Input rules for account forms
//!
//! The same rules back the registration form, login and the resend flow.
//! Messages are returned verbatim to the client.

use regex::Regex;
use std::sync::LazyLock;

pub const MSG_ALL_FIELDS_REQUIRED: &str = "All fields are required";
pub const MSG_INVALID_USERNAME: &str =
    "Username must be 3–30 characters, letters/numbers/underscores only.";
pub const MSG_INVALID_EMAIL: &str = "Invalid email format.";
pub const MSG_WEAK_PASSWORD: &str = "Password must be at least 12 characters and include uppercase, lowercase, number, and special character.";

/// Special characters accepted (and one of which is required) in passwords
pub const PASSWORD_SPECIALS: &str = "@$!%*?&";

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{3,30}$").expect("valid username regex"));

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+@\S+\.\S+$").expect("valid email regex"));

static PASSWORD_CHARSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9@$!%*?&]{12,}$").expect("valid password regex"));

static HTML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

pub fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// At least 12 characters drawn from letters, digits and `@$!%*?&`, with at
/// least one of each class
pub fn is_strong_password(password: &str) -> bool {
    PASSWORD_CHARSET_RE.is_match(password)
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c))
}

/// Removes HTML tags and control characters and trims whitespace
pub fn sanitize_text(input: &str) -> String {
    HTML_TAG_RE
        .replace_all(input, "")
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Checks a registration form in order, returning the first failure
///
/// Expects `username` and `email` to be sanitized already.
pub fn validate_registration(username: &str, email: &str, password: &str) -> Result<(), &'static str> {
    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(MSG_ALL_FIELDS_REQUIRED);
    }

    if !is_valid_username(username) {
        return Err(MSG_INVALID_USERNAME);
    }

    if !is_valid_email(email) {
        return Err(MSG_INVALID_EMAIL);
    }

    if !is_strong_password(password) {
        return Err(MSG_WEAK_PASSWORD);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_rules() {
        assert!(is_valid_username("abc"));
        assert!(is_valid_username("pet_owner_42"));
        assert!(is_valid_username(&"a".repeat(30)));

        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username(&"a".repeat(31)));
        assert!(!is_valid_username("has space"));
        assert!(!is_valid_username("dash-ed"));
        assert!(!is_valid_username("ünïcode"));
    }

    #[test]
    fn test_email_rules() {
        assert!(is_valid_email("owner@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.co"));

        assert!(!is_valid_email("owner@example"));
        assert!(!is_valid_email("owner example.com"));
        assert!(!is_valid_email("@example.com"));
    }

    #[test]
    fn test_strong_password() {
        assert!(is_strong_password("Fluffy&Rex2024"));
        assert!(is_strong_password("Aa1@Aa1@Aa1@"));

        // too short
        assert!(!is_strong_password("Aa1@Aa1@Aa1"));
        // missing special
        assert!(!is_strong_password("FluffyRex20245"));
        // missing upper
        assert!(!is_strong_password("fluffy&rex2024"));
        // missing lower
        assert!(!is_strong_password("FLUFFY&REX2024"));
        // missing digit
        assert!(!is_strong_password("Fluffy&RexRex"));
        // special outside the allowed set
        assert!(!is_strong_password("Fluffy#Rex2024"));
    }

    #[test]
    fn test_sanitize_text() {
        assert_eq!(sanitize_text("  <b>Rex</b>  "), "Rex");
        assert_eq!(sanitize_text("<script>alert(1)</script>bob"), "alert(1)bob");
        assert_eq!(sanitize_text("line\u{0007}bell"), "linebell");
        assert_eq!(sanitize_text("plain"), "plain");
    }

    #[test]
    fn test_validate_registration_order() {
        assert_eq!(
            validate_registration("", "a@b.co", "x"),
            Err(MSG_ALL_FIELDS_REQUIRED)
        );
        assert_eq!(
            validate_registration("x", "bad", "weak"),
            Err(MSG_INVALID_USERNAME)
        );
        assert_eq!(
            validate_registration("pet_owner", "bad", "weak"),
            Err(MSG_INVALID_EMAIL)
        );
        assert_eq!(
            validate_registration("pet_owner", "owner@example.com", "weak"),
            Err(MSG_WEAK_PASSWORD)
        );
        assert_eq!(
            validate_registration("pet_owner", "owner@example.com", "Fluffy&Rex2024"),
            Ok(())
        );
    }
}
