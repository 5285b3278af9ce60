use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use custody_types::Identity;

use crate::error::{ServerError, ServerResult};

/// Credentials presented with a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Anonymous,
}

impl Credentials {
    /// Read `Authorization: Bearer <token>`; anything else is anonymous.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| Self::Bearer(token.to_string()))
            .unwrap_or(Self::Anonymous)
    }
}

/// Resolves request credentials to the identity the ledger sees as caller.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> ServerResult<Identity>;
}

/// Every request acts as the operator identity.
///
/// This is the relayer model: the service holds the writer's account and
/// submits every mutation on its behalf.
pub struct OperatorAuth {
    operator: Identity,
}

impl OperatorAuth {
    pub fn new(operator: Identity) -> Self {
        Self { operator }
    }
}

#[async_trait]
impl AuthProvider for OperatorAuth {
    async fn authenticate(&self, _credentials: &Credentials) -> ServerResult<Identity> {
        Ok(self.operator)
    }
}

/// Bearer tokens mapped to identities.
///
/// Unknown tokens are refused outright. Requests without a token act as the
/// zero identity, which can read but never write.
pub struct TokenAuth {
    tokens: HashMap<String, Identity>,
}

impl TokenAuth {
    pub fn new(tokens: HashMap<String, Identity>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl AuthProvider for TokenAuth {
    async fn authenticate(&self, credentials: &Credentials) -> ServerResult<Identity> {
        match credentials {
            Credentials::Anonymous => Ok(Identity::zero()),
            Credentials::Bearer(token) => self
                .tokens
                .get(token)
                .copied()
                .ok_or_else(|| ServerError::AuthFailed("unknown bearer token".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_is_parsed() {
        assert_eq!(
            Credentials::from_headers(&headers("Bearer abc123")),
            Credentials::Bearer("abc123".into())
        );
    }

    #[test]
    fn other_schemes_are_anonymous() {
        assert_eq!(
            Credentials::from_headers(&headers("Basic dXNlcg==")),
            Credentials::Anonymous
        );
        assert_eq!(Credentials::from_headers(&headers("Bearer ")), Credentials::Anonymous);
        assert_eq!(Credentials::from_headers(&HeaderMap::new()), Credentials::Anonymous);
    }

    #[tokio::test]
    async fn operator_auth_ignores_credentials() {
        let operator = Identity::from_raw([5; 20]);
        let auth = OperatorAuth::new(operator);
        assert_eq!(auth.authenticate(&Credentials::Anonymous).await.unwrap(), operator);
        assert_eq!(
            auth.authenticate(&Credentials::Bearer("x".into())).await.unwrap(),
            operator
        );
    }

    #[tokio::test]
    async fn token_auth_maps_known_tokens() {
        let writer = Identity::from_raw([6; 20]);
        let auth = TokenAuth::new(HashMap::from([("secret".to_string(), writer)]));

        assert_eq!(
            auth.authenticate(&Credentials::Bearer("secret".into()))
                .await
                .unwrap(),
            writer
        );
        assert_eq!(
            auth.authenticate(&Credentials::Anonymous).await.unwrap(),
            Identity::zero()
        );
        assert!(matches!(
            auth.authenticate(&Credentials::Bearer("wrong".into())).await,
            Err(ServerError::AuthFailed(_))
        ));
    }
}
