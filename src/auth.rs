use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::ApiError, models::User, repository::users, serving::AppState};

pub const ACCESS_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;
#[cfg(test)]
pub const RESET_PASSWORD_TOKEN_TTL_SECS: i64 = 60 * 60;
#[cfg(test)]
pub const RESET_PASSWORD_TOKEN_TYPE: &str = "reset_password";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Email of the user the token was issued to.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Issues and verifies signed tokens.
#[derive(Clone)]
pub struct Auth {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl Auth {
    pub fn new(secret: &str, algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn create_access_token(
        &self,
        subject: &str,
        expires_in: Option<Duration>,
    ) -> anyhow::Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in.unwrap_or(Duration::seconds(ACCESS_TOKEN_TTL_SECS))).timestamp(),
            token_type: None,
        };
        self.encode_claims(&claims)
    }

    #[cfg(test)]
    pub fn create_reset_password_token(&self, email: &str) -> anyhow::Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: email.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(RESET_PASSWORD_TOKEN_TTL_SECS)).timestamp(),
            token_type: Some(RESET_PASSWORD_TOKEN_TYPE.to_string()),
        };
        self.encode_claims(&claims)
    }

    /// Returns the claims of a valid, unexpired reset-password token, or `None`.
    #[cfg(test)]
    pub fn decode_reset_password_token(&self, token: &str) -> Option<Claims> {
        let claims = self.decode_claims(token).ok()?;
        (claims.token_type.as_deref() == Some(RESET_PASSWORD_TOKEN_TYPE)).then_some(claims)
    }

    /// Verifies an access token and returns the subject it was issued to.
    pub fn verify_access_token(&self, token: &str) -> Result<String, ApiError> {
        let claims = self.decode_claims(token).map_err(|e| {
            debug!("JWT verification failed: {}", e);
            ApiError::Unauthorized
        })?;
        if claims.token_type.is_some() {
            debug!("Rejected non-access token of type {:?}", claims.token_type);
            return Err(ApiError::Unauthorized);
        }
        Ok(claims.sub)
    }

    fn encode_claims(&self, claims: &Claims) -> anyhow::Result<String> {
        let token = encode(&Header::new(self.algorithm), claims, &self.encoding_key)?;
        Ok(token)
    }

    fn decode_claims(&self, token: &str) -> jsonwebtoken::errors::Result<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_required_spec_claims(&["exp", "sub"]);
        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("could not hash password: {}", e))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            debug!("Stored password hash is not a valid PHC string: {}", e);
            false
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty())
}

/// The authenticated caller, resolved from the `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthorized)?;
        let email = state.auth.verify_access_token(token)?;
        let user = users::get_user_by_email(&state.pool, &email)
            .await?
            .ok_or(ApiError::Unauthorized)?;
        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn auth() -> Auth {
        Auth::new("test-secret", Algorithm::HS256)
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert_ne!(hash, "correct horse");
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
    }

    #[test]
    fn test_verify_password_rejects_garbage_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_access_token_roundtrip() {
        let auth = auth();
        let token = auth.create_access_token("reader@pdfchat.xyz", None).unwrap();
        assert_eq!(auth.verify_access_token(&token).unwrap(), "reader@pdfchat.xyz");
    }

    #[test]
    fn test_access_token_default_lifetime_is_one_day() {
        let auth = auth();
        let token = auth.create_access_token("reader@pdfchat.xyz", None).unwrap();
        let claims = auth.decode_claims(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, ACCESS_TOKEN_TTL_SECS);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let auth = auth();
        let now = Utc::now();
        let token = auth
            .encode_claims(&Claims {
                sub: "reader@pdfchat.xyz".to_string(),
                iat: (now - Duration::hours(3)).timestamp(),
                exp: (now - Duration::hours(2)).timestamp(),
                token_type: None,
            })
            .unwrap();
        assert!(matches!(
            auth.verify_access_token(&token),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let token = Auth::new("other-secret", Algorithm::HS256)
            .create_access_token("reader@pdfchat.xyz", None)
            .unwrap();
        assert!(auth().verify_access_token(&token).is_err());
    }

    fn parts_with_authorization(value: &str) -> Parts {
        let (parts, _) = http::Request::builder()
            .header(http::header::AUTHORIZATION, value)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn test_bearer_scheme_is_case_insensitive() {
        for value in ["Bearer abc.def", "bearer abc.def", "BEARER  abc.def"] {
            assert_eq!(bearer_token(&parts_with_authorization(value)), Some("abc.def"));
        }
        assert!(bearer_token(&parts_with_authorization("Basic abc.def")).is_none());
        assert!(bearer_token(&parts_with_authorization("Bearer ")).is_none());
        assert!(bearer_token(&parts_with_authorization("abc.def")).is_none());
    }

    #[test]
    fn test_reset_password_token() {
        let auth = auth();
        let token = auth.create_reset_password_token("reader@pdfchat.xyz").unwrap();
        let claims = auth.decode_reset_password_token(&token).unwrap();
        assert_eq!(claims.sub, "reader@pdfchat.xyz");
        assert_eq!(claims.exp - claims.iat, RESET_PASSWORD_TOKEN_TTL_SECS);
        // a reset token must not work as a login token, and vice versa
        assert!(auth.verify_access_token(&token).is_err());
        let access = auth.create_access_token("reader@pdfchat.xyz", None).unwrap();
        assert!(auth.decode_reset_password_token(&access).is_none());
        assert!(auth.decode_reset_password_token("garbage").is_none());
    }
}
