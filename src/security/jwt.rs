//! Tenant credential verification.
//!
//! Tenants present `Authorization: Bearer <token>`; the token is an HS256 JWT
//! whose issuer claim is the tenant's app id. Expiry is enforced when the
//! token carries one.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Claims carried by a tenant token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantClaims {
    /// Tenant app id.
    #[serde(default)]
    pub iss: String,

    /// Expiry as a unix timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// HS256 token verifier.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims = HashSet::new();
        validation.validate_aud = false;

        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Decode and verify a token, returning its claims.
    pub fn verify(&self, token: &str) -> jsonwebtoken::errors::Result<TenantClaims> {
        decode::<TenantClaims>(token, &self.decoding, &self.validation).map(|data| data.claims)
    }

    /// Sign a token for `app_id`.
    pub fn issue(&self, app_id: &str, exp: Option<u64>) -> jsonwebtoken::errors::Result<String> {
        let claims = TenantClaims {
            iss: app_id.to_string(),
            exp,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }
}

/// Extract the token from an `Authorization` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let header = header.trim();
    let token = match header.strip_prefix("Bearer") {
        Some(rest) if rest.is_empty() || rest.starts_with(' ') => rest.trim(),
        _ => header,
    };
    (!token.is_empty()).then_some(token)
}
