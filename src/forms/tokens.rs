//! Signed, expiring newsletter tokens.
//!
//! Tokens are HS256 JWTs whose subject is the normalized subscriber email.
//! Confirmation tokens are additionally single-use: the subscriber record keeps
//! the last issued one and confirming clears it.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TokenError;

/// Confirmation link lifetime in hours
const CONFIRM_TOKEN_EXPIRY_HOURS: i64 = 48;

/// Unsubscribe / preferences link lifetime in days
const UNSUBSCRIBE_TOKEN_EXPIRY_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    Confirm,
    Unsubscribe,
}

impl TokenPurpose {
    fn lifetime(self) -> Duration {
        match self {
            Self::Confirm => Duration::hours(CONFIRM_TOKEN_EXPIRY_HOURS),
            Self::Unsubscribe => Duration::days(UNSUBSCRIBE_TOKEN_EXPIRY_DAYS),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    pub sub: String,
    pub purpose: TokenPurpose,
    pub exp: i64,
    pub iat: i64,
    /// Unique per issue, so two tokens minted in the same second differ.
    pub jti: String,
}

/// Issues and verifies tokens with the server secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(&self, email: &str, purpose: TokenPurpose) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: email.to_string(),
            purpose,
            exp: (now + purpose.lifetime()).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Check signature, expiry and purpose; returns the email the token was issued for.
    pub fn verify(&self, token: &str, purpose: TokenPurpose) -> Result<String, TokenError> {
        let data = decode::<TokenClaims>(token, &self.decoding, &Validation::new(Algorithm::HS256))?;
        if data.claims.purpose != purpose {
            return Err(TokenError::WrongPurpose);
        }
        Ok(data.claims.sub)
    }

    /// [`verify`](Self::verify), and require the token to belong to `email`.
    pub fn verify_for(
        &self,
        token: &str,
        email: &str,
        purpose: TokenPurpose,
    ) -> Result<(), TokenError> {
        if self.verify(token, purpose)? != email {
            return Err(TokenError::WrongSubject);
        }
        Ok(())
    }
}
