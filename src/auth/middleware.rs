//! Bearer token handling for incoming requests
//!
//! Provides functions for:
//! - Extracting the session token from an `Authorization` header
//! - Resolving it to a principal through the access service

use super::service::{AccessError, AccessResult, AccessService};
use super::types::Principal;

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn extract_bearer_token(auth_header: Option<&str>) -> AccessResult<&str> {
    let header = auth_header.ok_or_else(|| {
        AccessError::Unauthorized("Authorization header required".to_string())
    })?;

    let (scheme, token) = header.split_once(' ').ok_or_else(|| {
        AccessError::Unauthorized("Invalid authentication scheme: expected 'Bearer'".to_string())
    })?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AccessError::Unauthorized(
            "Invalid authentication scheme: expected 'Bearer'".to_string(),
        ));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AccessError::Unauthorized("Empty bearer token".to_string()));
    }

    Ok(token)
}

/// Full authentication flow: extract the token from the header and resolve it
pub async fn authenticate(
    service: &AccessService,
    auth_header: Option<&str>,
) -> AccessResult<Principal> {
    let token = extract_bearer_token(auth_header)?;
    service.authenticate(token).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token(Some("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(extract_bearer_token(Some("bearer  abc ")).unwrap(), "abc");
    }

    #[test]
    fn test_extract_bearer_token_rejects() {
        for header in [None, Some("abc"), Some("Basic dXNlcjpwYXNz"), Some("Bearer   ")] {
            assert!(matches!(
                extract_bearer_token(header),
                Err(AccessError::Unauthorized(_))
            ));
        }
    }
}
