// src/utils/jwt.rs

use axum::{
    body::Body,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AuthError};

/// Admission token claims.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject - the admission credential ID (as string).
    pub sub: String,
    /// Examinations the credential may access.
    pub examination_ids: Vec<i64>,
    /// Expiration time as Unix timestamp.
    pub exp: i64,
}

impl Claims {
    /// Credential ID carried in `sub`.
    pub fn credential_id(&self) -> Result<i64, AuthError> {
        self.sub.parse::<i64>().map_err(|_| AuthError::Malformed)
    }

    pub fn authorizes(&self, examination_id: i64) -> bool {
        self.examination_ids.contains(&examination_id)
    }
}

/// Signs and verifies admission tokens with a process-wide HMAC key.
/// Pure: no store access, no I/O.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Signs a token for `identity` covering `examination_ids`, valid for `ttl`.
    ///
    /// The examination IDs are embedded as given; checking that they exist is
    /// the caller's job.
    pub fn issue(
        &self,
        identity: &str,
        examination_ids: &[i64],
        ttl: Duration,
    ) -> Result<String, AppError> {
        let claims = Claims {
            sub: identity.to_owned(),
            examination_ids: examination_ids.to_vec(),
            exp: (Utc::now() + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    /// Verifies the signature first, then the expiry. The payload is never
    /// returned unless both hold.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::Invalid,
                _ => AuthError::Malformed,
            })
    }
}

/// Extracts `<token>` from an `Authorization: <scheme> <token>` value.
/// The scheme is discarded.
pub fn bearer_token(header_value: &str) -> Result<&str, AuthError> {
    match header_value.trim().split_once(' ') {
        Some((_scheme, token)) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AuthError::Malformed),
    }
}

/// Raw token taken from the Authorization header, verified later by the engine.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

/// Axum Middleware: Authentication header.
///
/// Rejects requests without a usable 'Authorization: <scheme> <token>' header
/// and injects the raw `BearerToken` for handlers. Signature, expiry and
/// examination checks happen per operation in the session engine.
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::Malformed)
        .and_then(bearer_token)?
        .to_owned();

    req.extensions_mut().insert(BearerToken(token));
    Ok(next.run(req).await)
}
