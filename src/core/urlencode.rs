//! # Form Encoding
//!
//! Helpers for `application/x-www-form-urlencoded` bodies. Request types
//! flatten themselves to ordered name/value pairs (nested objects are
//! JSON-encoded and then URL-encoded), so bodies serialize byte-for-byte
//! deterministically.

/// Serialize form pairs to an `application/x-www-form-urlencoded` string,
/// preserving pair order.
#[must_use]
pub fn to_string(form: &[(String, String)]) -> String {
    serde_urlencoded::to_string(form).unwrap_or_default()
}

/// Parse an `application/x-www-form-urlencoded` body into name/value
/// pairs.
///
/// # Errors
///
/// Returns an error when the body is not valid form encoding.
pub fn parse(body: &str) -> anyhow::Result<Vec<(String, String)>> {
    Ok(serde_urlencoded::from_str(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let form = vec![
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("code".to_string(), "a/b c".to_string()),
        ];
        let encoded = to_string(&form);
        assert_eq!(encoded, "grant_type=authorization_code&code=a%2Fb+c");
        assert_eq!(parse(&encoded).expect("should parse"), form);
    }
}
