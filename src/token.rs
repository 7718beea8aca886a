use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::host::Role;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("failed to encode token metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

/// Media server permissions carried in the `video` claim.
///
/// Field names follow the media server's camelCase grant format; unset
/// permissions are left out of the token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub room_create: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub room_list: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub room_record: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub room_admin: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub room_join: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

impl VideoGrant {
    /// Permission to join exactly `room`.
    pub fn join(room: &str) -> Self {
        Self {
            room_join: true,
            room: Some(room.to_string()),
            ..Self::default()
        }
    }
}

/// Structured payload stored (serialized) in the `metadata` claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantMetadata {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// API key that signed the token.
    pub iss: String,
    /// Participant identity (empty for service tokens).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sub: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub jti: String,
    pub nbf: i64,
    pub exp: i64,
    pub video: VideoGrant,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub metadata: String,
}

impl AccessClaims {
    /// Decode the `metadata` claim back into its structured form.
    pub fn participant_metadata(&self) -> Option<ParticipantMetadata> {
        serde_json::from_str(&self.metadata).ok()
    }
}

// ---------------------------------------------------------------------------
// TokenIssuer
// ---------------------------------------------------------------------------

/// Signs room access credentials.
pub trait TokenIssuer: Send + Sync {
    /// Mint a credential allowing `identity` to join `room`, carrying `role`
    /// in its metadata.
    fn issue(&self, room: &str, identity: &str, role: Role) -> Result<String, TokenError>;
}

/// HS256 signer keyed by the media server's API key/secret pair.
#[derive(Clone)]
pub struct JwtTokenIssuer {
    api_key: String,
    api_secret: String,
    ttl_secs: i64,
}

/// Lifetime of the tokens the gateway signs for its own server API calls.
const SERVICE_TOKEN_TTL_SECS: i64 = 600;

impl JwtTokenIssuer {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX / 2),
        }
    }

    /// Short-lived token authorizing a server API call with `grant`.
    pub fn service_token(&self, grant: VideoGrant) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            iss: self.api_key.clone(),
            sub: String::new(),
            jti: String::new(),
            nbf: now,
            exp: now + SERVICE_TOKEN_TTL_SECS,
            video: grant,
            metadata: String::new(),
        };
        self.sign(&claims)
    }

    /// Verify signature, `exp` and `nbf`, returning the claims.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let mut validation = Validation::default(); // HS256 + exp
        validation.validate_nbf = true;
        validation.set_issuer(&[&self.api_key]);

        let data = decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(self.api_secret.as_bytes()),
            &validation,
        )?;
        Ok(data.claims)
    }

    fn sign(&self, claims: &AccessClaims) -> Result<String, TokenError> {
        let token = encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.api_secret.as_bytes()),
        )?;
        Ok(token)
    }
}

impl TokenIssuer for JwtTokenIssuer {
    fn issue(&self, room: &str, identity: &str, role: Role) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let metadata = serde_json::to_string(&ParticipantMetadata { role })?;

        let claims = AccessClaims {
            iss: self.api_key.clone(),
            sub: identity.to_string(),
            jti: identity.to_string(),
            nbf: now,
            exp: now + self.ttl_secs,
            video: VideoGrant::join(room),
            metadata,
        };
        self.sign(&claims)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> JwtTokenIssuer {
        JwtTokenIssuer::new("APIkey123", "a-long-enough-test-secret", 3600)
    }

    #[test]
    fn participant_token_carries_join_grant_and_role() {
        let issuer = issuer();
        let token = issuer.issue("alpha", "u1", Role::Host).unwrap();
        let claims = issuer.verify(&token).unwrap();

        assert_eq!(claims.iss, "APIkey123");
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.video, VideoGrant::join("alpha"));
        assert_eq!(claims.exp - claims.nbf, 3600);
        assert_eq!(
            claims.participant_metadata(),
            Some(ParticipantMetadata { role: Role::Host })
        );
    }

    #[test]
    fn metadata_is_structured_json() {
        let issuer = issuer();
        let token = issuer.issue("alpha", "u2", Role::Participant).unwrap();
        let claims = issuer.verify(&token).unwrap();

        let value: serde_json::Value = serde_json::from_str(&claims.metadata).unwrap();
        assert_eq!(value, serde_json::json!({ "role": "participant" }));
    }

    #[test]
    fn grant_serializes_camel_case_without_unset_permissions() {
        let json = serde_json::to_value(VideoGrant::join("alpha")).unwrap();
        assert_eq!(json, serde_json::json!({ "roomJoin": true, "room": "alpha" }));

        let admin = VideoGrant {
            room_admin: true,
            room: Some("alpha".into()),
            ..VideoGrant::default()
        };
        let json = serde_json::to_value(admin).unwrap();
        assert_eq!(json, serde_json::json!({ "roomAdmin": true, "room": "alpha" }));
    }

    #[test]
    fn service_token_has_no_identity() {
        let issuer = issuer();
        let token = issuer
            .service_token(VideoGrant {
                room_create: true,
                ..VideoGrant::default()
            })
            .unwrap();
        let claims = issuer.verify(&token).unwrap();

        assert!(claims.sub.is_empty());
        assert!(claims.video.room_create);
        assert!(claims.participant_metadata().is_none());
    }

    #[test]
    fn wrong_secret_rejects() {
        let token = issuer().issue("alpha", "u1", Role::Host).unwrap();
        let other = JwtTokenIssuer::new("APIkey123", "another-secret", 3600);
        assert!(other.verify(&token).is_err());
    }
}
