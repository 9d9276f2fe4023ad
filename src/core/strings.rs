//! Utilities for dealing with strings and URLs.

use url::Url;

/// Compare two byte strings in constant time.
///
/// Used wherever a secret is compared against caller-supplied input:
/// pre-authorized codes, transaction codes, PKCE challenges, `jti` lookups.
/// The comparison always touches every byte of both inputs so timing does
/// not leak the position of the first mismatch.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let mut diff = a.len() ^ b.len();
    let max = a.len().max(b.len());
    for i in 0..max {
        let x = a.get(i).copied().unwrap_or_default();
        let y = b.get(i).copied().unwrap_or_default();
        diff |= usize::from(x ^ y);
    }
    diff == 0
}

/// Canonicalize a URL for identifier comparison: lowercase scheme and host,
/// drop any trailing slash.
///
/// Used to compare `credential_issuer` and authorization-server `issuer`
/// values against the URLs they were discovered from.
#[must_use]
pub fn canonicalize_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    Some(parsed.to_string().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_same_and_different() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(!constant_time_eq(b"", b"a"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn canonical_urls() {
        assert_eq!(
            canonicalize_url("HTTPS://Issuer.Example.COM/path/").as_deref(),
            Some("https://issuer.example.com/path")
        );
        assert_eq!(
            canonicalize_url("https://issuer.example.com").as_deref(),
            Some("https://issuer.example.com")
        );
        assert!(canonicalize_url("not a url").is_none());
    }
}
