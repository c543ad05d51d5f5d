//! Access token service
//!
//! Issues and verifies HS256 tokens carrying the caller's id, username and role.

use crate::error::AuthError;
use crate::security::types::{TokenData, UserId, UserRole};
use crate::util::SecretString;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    id: UserId,
    username: String,
    role: UserRole,
    exp: i64,
}

/// Token issuer and verifier
#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime_secs: i64,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("lifetime_secs", &self.lifetime_secs)
            .finish_non_exhaustive()
    }
}

impl JwtService {
    /// Create a service signing with `secret`, or with 32 random bytes when absent
    ///
    /// Tokens issued with a generated secret do not survive a restart.
    pub fn new(secret: Option<&SecretString>, lifetime_secs: u64) -> Self {
        let key: Vec<u8> = match secret {
            Some(secret) => secret.expose_secret().as_bytes().to_vec(),
            None => {
                info!("No token secret configured, generating one for this process");
                rand::random::<[u8; 32]>().to_vec()
            }
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(&key),
            decoding: DecodingKey::from_secret(&key),
            validation,
            lifetime_secs: i64::try_from(lifetime_secs).unwrap_or(i64::MAX),
        }
    }

    /// Issue a token for `data`, expiring after the configured lifetime
    pub fn generate_token(&self, data: &TokenData) -> Result<String, AuthError> {
        let exp = Utc::now().timestamp().saturating_add(self.lifetime_secs);
        self.encode_claims(data, exp)
    }

    fn encode_claims(&self, data: &TokenData, exp: i64) -> Result<String, AuthError> {
        let claims = Claims {
            id: data.id,
            username: data.username.clone(),
            role: data.role,
            exp,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Crypto(format!("token encoding failed: {e}")))
    }

    /// Verify signature and expiry, then return the embedded identity
    pub fn parse_and_verify_token(&self, token: &str) -> Result<TokenData, AuthError> {
        let decoded =
            decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => {
                    debug!(error = %e, "Rejected access token");
                    AuthError::InvalidToken
                }
            })?;

        Ok(TokenData {
            id: decoded.claims.id,
            username: decoded.claims.username,
            role: decoded.claims.role,
        })
    }
}

/// Hash a plaintext password into an Argon2 PHC string with a random salt
pub fn hash_password(password: &str) -> Result<SecretString, AuthError> {
    use argon2::password_hash::SaltString;
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())
        .map_err(|e| AuthError::Crypto(format!("salt error: {e}")))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Crypto(format!("hash error: {e}")))?;
    Ok(SecretString::new(hash.to_string()))
}

/// Verify a plaintext password against an Argon2 PHC-format hash
///
/// Returns `Ok(false)` on mismatch and `Err(AuthError::Crypto)` if the stored
/// hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let parsed = PasswordHash::new(hash)
        .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
    }
}
