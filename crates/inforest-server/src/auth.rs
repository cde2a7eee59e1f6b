//! Bearer-token authentication.
//!
//! A token has the form `<user>.<mac>` where `<mac>` is the hex keyed
//! BLAKE3 hash of the user id under a key derived from the server secret.
//! Tokens carry no expiry; rotating the secret revokes all of them.

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use inforest_coordinator::Identity;
use inforest_types::UserId;

const KEY_CONTEXT: &str = "inforest 2024 bearer token v1";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Anonymous,
}

impl Credentials {
    /// Read the `Authorization: Bearer ...` header, if any.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| Self::Bearer(t.trim().to_string()))
            .unwrap_or(Self::Anonymous)
    }
}

/// Resolves request credentials to a caller identity.
///
/// `None` means the caller is anonymous; operations that need a user then
/// fail with `InvalidIdentity`.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Option<Identity>;
}

/// Validates tokens minted with the shared server secret.
pub struct SignedTokenAuth {
    key: [u8; 32],
}

impl SignedTokenAuth {
    pub fn new(secret: &str) -> Self {
        Self {
            key: blake3::derive_key(KEY_CONTEXT, secret.as_bytes()),
        }
    }

    fn mac(&self, user: &UserId) -> blake3::Hash {
        blake3::keyed_hash(&self.key, user.as_str().as_bytes())
    }

    /// Issue a bearer token for `user`.
    pub fn mint(&self, user: &UserId) -> String {
        format!("{}.{}", user, self.mac(user).to_hex())
    }

    /// The user a token was minted for, if its mac checks out.
    pub fn verify(&self, token: &str) -> Option<UserId> {
        let (user, mac) = token.rsplit_once('.')?;
        let user = UserId::new(user).ok()?;
        let bytes: [u8; 32] = hex::decode(mac).ok()?.try_into().ok()?;
        // blake3::Hash equality is constant-time.
        (self.mac(&user) == blake3::Hash::from(bytes)).then_some(user)
    }
}

#[async_trait]
impl AuthProvider for SignedTokenAuth {
    async fn authenticate(&self, credentials: &Credentials) -> Option<Identity> {
        match credentials {
            Credentials::Bearer(token) => {
                let identity = self.verify(token).map(Identity::new);
                if identity.is_none() {
                    tracing::debug!("rejected bearer token");
                }
                identity
            }
            Credentials::Anonymous => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn alice() -> UserId {
        UserId::new("alice").unwrap()
    }

    #[test]
    fn minted_token_verifies() {
        let auth = SignedTokenAuth::new("secret");
        let token = auth.mint(&alice());
        assert!(token.starts_with("alice."));
        assert_eq!(auth.verify(&token), Some(alice()));
    }

    #[test]
    fn foreign_or_tampered_tokens_fail() {
        let auth = SignedTokenAuth::new("secret");
        let other = SignedTokenAuth::new("another secret");
        assert_eq!(auth.verify(&other.mint(&alice())), None);

        let token = auth.mint(&alice());
        let forged = token.replacen("alice", "mallory", 1);
        assert_eq!(auth.verify(&forged), None);
        assert_eq!(auth.verify("alice"), None);
        assert_eq!(auth.verify("alice.zz"), None);
        assert_eq!(auth.verify(".abcd"), None);
    }

    #[test]
    fn dotted_user_ids_round_trip() {
        let auth = SignedTokenAuth::new("secret");
        let user = UserId::new("first.last").unwrap();
        assert_eq!(auth.verify(&auth.mint(&user)), Some(user));
    }

    #[test]
    fn credentials_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(Credentials::from_headers(&headers), Credentials::Anonymous);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(Credentials::from_headers(&headers), Credentials::Bearer("abc.def".into()));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert_eq!(Credentials::from_headers(&headers), Credentials::Anonymous);
    }

    #[tokio::test]
    async fn provider_resolves_identity() {
        let auth = SignedTokenAuth::new("secret");
        let token = auth.mint(&alice());
        let id = auth.authenticate(&Credentials::Bearer(token)).await.unwrap();
        assert_eq!(id.user_id, alice());
        assert!(auth.authenticate(&Credentials::Anonymous).await.is_none());
        assert!(auth.authenticate(&Credentials::Bearer("junk".into())).await.is_none());
    }
}
