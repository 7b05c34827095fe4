//! Bearer-token authentication.
//!
//! Every API route requires a JWT whose subject identifies the tenant;
//! the subject drives namespace allocation. Bypass mode skips
//! verification for local development.

use axum::http::StatusCode;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the tenant identifier.
    pub sub: Option<String>,
    /// Expiration time (Unix timestamp).
    pub exp: Option<u64>,
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub subject: String,
}

/// Verify a JWT and extract the caller identity.
pub fn verify_token(token: &str, secret: &str, algorithm: &str) -> Result<AuthContext, String> {
    let algo = match algorithm {
        "HS256" => jsonwebtoken::Algorithm::HS256,
        "HS384" => jsonwebtoken::Algorithm::HS384,
        "HS512" => jsonwebtoken::Algorithm::HS512,
        _ => return Err(format!("Unsupported algorithm: {algorithm}")),
    };

    let mut validation = Validation::new(algo);
    // Allow some clock drift.
    validation.leeway = 60;
    validation.required_spec_claims = std::collections::HashSet::new();

    let key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<Claims>(token, &key, &validation)
        .map_err(|e| format!("Token validation failed: {e}"))?;

    let subject = token_data
        .claims
        .sub
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "Token has no subject".to_string())?;

    Ok(AuthContext { subject })
}

/// Extract the caller from an Authorization header.
pub fn extract_auth_from_header(
    auth_header: Option<&str>,
    config: &AuthConfig,
) -> Result<AuthContext, (StatusCode, String)> {
    if config.bypass_mode {
        return Ok(AuthContext {
            subject: config.dev_subject.clone(),
        });
    }

    let header = auth_header.ok_or_else(|| {
        (
            StatusCode::UNAUTHORIZED,
            "Missing Authorization header".to_string(),
        )
    })?;

    let token = header.strip_prefix("Bearer ").ok_or_else(|| {
        (
            StatusCode::UNAUTHORIZED,
            "Invalid Authorization header format".to_string(),
        )
    })?;

    verify_token(token, &config.jwt_secret, &config.jwt_algorithm)
        .map_err(|e| (StatusCode::UNAUTHORIZED, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn make_token(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn config(bypass: bool) -> AuthConfig {
        AuthConfig {
            jwt_secret: "secret".to_string(),
            jwt_algorithm: "HS256".to_string(),
            bypass_mode: bypass,
            dev_subject: "dev".to_string(),
        }
    }

    fn now() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    #[test]
    fn valid_token_yields_its_subject() {
        let token = make_token(
            &Claims {
                sub: Some("tenant-1".to_string()),
                exp: Some(now() + 3600),
            },
            "secret",
        );
        let ctx = verify_token(&token, "secret", "HS256").unwrap();
        assert_eq!(ctx.subject, "tenant-1");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = make_token(
            &Claims {
                sub: Some("tenant-1".to_string()),
                exp: Some(now() + 3600),
            },
            "other",
        );
        assert!(verify_token(&token, "secret", "HS256").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = make_token(
            &Claims {
                sub: Some("tenant-1".to_string()),
                exp: Some(now() - 3600),
            },
            "secret",
        );
        assert!(verify_token(&token, "secret", "HS256").is_err());
    }

    #[test]
    fn token_without_subject_is_rejected() {
        let token = make_token(
            &Claims {
                sub: None,
                exp: Some(now() + 3600),
            },
            "secret",
        );
        assert!(verify_token(&token, "secret", "HS256").is_err());
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let err = extract_auth_from_header(None, &config(false)).unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn non_bearer_header_is_unauthorized() {
        let err = extract_auth_from_header(Some("Basic abc"), &config(false)).unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn bypass_mode_uses_the_dev_subject() {
        let ctx = extract_auth_from_header(None, &config(true)).unwrap();
        assert_eq!(ctx.subject, "dev");
    }
}
