//! Subdomain sanitization for published sites.

use thiserror::Error;

const MAX_LEN: usize = 63;

/// Labels that can never be claimed as a site subdomain.
const RESERVED: &[&str] = &[
    "www", "api", "app", "admin", "mail", "dashboard", "preview", "static",
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SlugError {
    #[error("subdomain cannot be empty")]
    Empty,
    #[error("subdomain '{0}' is reserved")]
    Reserved(String),
}

/// Normalize a requested subdomain into a valid DNS label: lowercase ASCII
/// alphanumerics and hyphens, no leading/trailing hyphen, at most 63 chars.
pub fn sanitize_subdomain(input: &str) -> Result<String, SlugError> {
    let mut out = String::with_capacity(input.len());
    let mut last_hyphen = true; // swallow leading separators

    for ch in input.trim().to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_hyphen = false;
        } else if !last_hyphen && (ch == '-' || ch == ' ' || ch == '_' || ch == '.') {
            out.push('-');
            last_hyphen = true;
        }
    }

    while out.ends_with('-') {
        out.pop();
    }
    out.truncate(MAX_LEN);
    while out.ends_with('-') {
        out.pop();
    }

    if out.is_empty() {
        return Err(SlugError::Empty);
    }
    if RESERVED.contains(&out.as_str()) {
        return Err(SlugError::Reserved(out));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_basic() {
        assert_eq!(sanitize_subdomain("My Cool Site").unwrap(), "my-cool-site");
    }

    #[test]
    fn test_sanitize_collapses_separators() {
        assert_eq!(sanitize_subdomain("a__b..c  d").unwrap(), "a-b-c-d");
    }

    #[test]
    fn test_sanitize_strips_edge_hyphens() {
        assert_eq!(sanitize_subdomain("--hello--").unwrap(), "hello");
    }

    #[test]
    fn test_sanitize_rejects_empty() {
        assert_eq!(sanitize_subdomain("!!!"), Err(SlugError::Empty));
    }

    #[test]
    fn test_sanitize_rejects_reserved() {
        assert_eq!(
            sanitize_subdomain("WWW"),
            Err(SlugError::Reserved("www".to_string()))
        );
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "a".repeat(100);
        assert_eq!(sanitize_subdomain(&long).unwrap().len(), 63);
    }
}
