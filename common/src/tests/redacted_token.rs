use crate::RedactedToken;

/// **VALUE**: Verifies the token never appears in Debug or Display output.
///
/// **WHY THIS MATTERS**: Bridge config is logged at startup. A leaked token grants
/// remote access to the card reader, including PIN verification.
///
/// **BUG THIS CATCHES**: Deriving `Debug` instead of the manual redacting impl.
#[test]
fn given_token_when_formatted_then_value_is_hidden() {
    // GIVEN: A token
    let token = RedactedToken::new("s3cret-value");

    // WHEN: Formatting both ways
    let debug = format!("{token:?}");
    let display = format!("{token}");

    // THEN: Neither contains the secret
    assert!(!debug.contains("s3cret"));
    assert!(!display.contains("s3cret"));
    assert_eq!(token.expose(), "s3cret-value");
    assert_eq!(token.len(), 12);
}

#[test]
fn given_token_when_serialized_then_fails() {
    let token = RedactedToken::new("abc");

    let result = serde_json::to_string(&token);

    assert!(result.is_err(), "Token must refuse implicit serialization");
}

#[test]
fn given_token_when_matching_then_only_exact_value_matches() {
    let token = RedactedToken::new("abc123");

    assert!(token.matches("abc123"));
    assert!(!token.matches("abc124"));
    assert!(!token.matches("abc12"));
    assert!(!token.matches(""));
}
