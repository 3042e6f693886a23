//! Viewer capability check.
//!
//! Credentials are minted by the external identity service as
//! `<owner_id>.<hex(HMAC-SHA256(secret, owner_id))>`. This service only
//! verifies them.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::api::{errors::AppError, AppState};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing bearer credential")]
    Missing,
    #[error("malformed bearer credential")]
    Malformed,
    #[error("credential signature does not match")]
    BadSignature,
}

#[derive(Clone)]
pub struct CapabilityVerifier {
    secret: Vec<u8>,
}

impl std::fmt::Debug for CapabilityVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityVerifier").finish_non_exhaustive()
    }
}

impl CapabilityVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self, owner_id: &str) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(owner_id.as_bytes());
        mac
    }

    /// Lowercase hex signature the identity service attaches for `owner_id`.
    pub fn signature(&self, owner_id: &str) -> String {
        hex::encode(self.mac(owner_id).finalize().into_bytes())
    }

    /// Verify a raw credential and return the owner it grants access to.
    pub fn verify(&self, credential: &str) -> Result<String, AuthError> {
        let (owner_id, sig_hex) = credential.rsplit_once('.').ok_or(AuthError::Malformed)?;
        if owner_id.is_empty() {
            return Err(AuthError::Malformed);
        }
        let sig = hex::decode(sig_hex).map_err(|_| AuthError::Malformed)?;
        self.mac(owner_id)
            .verify_slice(&sig)
            .map_err(|_| AuthError::BadSignature)?;
        Ok(owner_id.to_owned())
    }
}

/// Extracts and verifies `Authorization: Bearer <credential>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedOwner(pub String);

impl FromRequestParts<AppState> for AuthenticatedOwner {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::Missing)?
            .to_str()
            .map_err(|_| AuthError::Malformed)?;
        let credential = bearer_credential(header).ok_or(AuthError::Malformed)?;

        let owner_id = state.verifier.verify(credential)?;
        Ok(Self(owner_id))
    }
}

/// The credential after a `Bearer` scheme, matched case-insensitively.
fn bearer_credential(header: &str) -> Option<&str> {
    let (scheme, credential) = header.trim().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| credential.trim())
}
