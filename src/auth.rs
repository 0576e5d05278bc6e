use axum::{
    RequestPartsExt, async_trait,
    extract::{FromRequestParts, Query},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::warn;

use crate::api::AppState;
use crate::errors::ErpError;
use crate::models::{Identity, Role, RoleProfile};
use crate::roles::current_profile;

/// Claims of the bearer tokens this API issues. `session_id` is the
/// backend access token; revoking it invalidates the JWT as well.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthClaims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub session_id: String,
    pub role: Role,
}

#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, identity: &Identity, session_id: &str, role: Role) -> Result<String, AuthError> {
        let iat = Utc::now().timestamp();
        let claims = AuthClaims {
            sub: identity.id.clone(),
            exp: iat + self.ttl.as_secs() as i64,
            iat,
            session_id: session_id.to_string(),
            role,
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(|err| {
            warn!(error = %err, "failed to sign token");
            AuthError::Signing
        })
    }

    pub fn verify(&self, token: &str) -> Result<AuthClaims, AuthError> {
        decode::<AuthClaims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }
}

/// Rejection type returned when auth fails.
#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    SessionEnded,
    Signing,
    Backend(ErpError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "missing bearer token".to_string()),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid token".to_string()),
            AuthError::SessionEnded => (StatusCode::UNAUTHORIZED, "session ended, sign in again".to_string()),
            AuthError::Signing => (StatusCode::INTERNAL_SERVER_ERROR, "could not issue token".to_string()),
            AuthError::Backend(err) => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        };
        (status, axum::Json(json!({"error": msg, "class": "auth"}))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    access_token: Option<String>,
}

async fn bearer_token(parts: &mut Parts) -> Option<String> {
    if let Ok(TypedHeader(Authorization(bearer))) =
        parts.extract::<TypedHeader<Authorization<Bearer>>>().await
    {
        return Some(bearer.token().to_string()).filter(|t| !t.is_empty());
    }
    // EventSource cannot set headers, so the badge stream passes the token in the query.
    let Query(query) = parts.extract::<Query<TokenQuery>>().await.ok()?;
    query.access_token.filter(|t| !t.is_empty())
}

/// The signed-in user behind a request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub claims: AuthClaims,
    pub identity: Identity,
    pub profile: RoleProfile,
}

impl CurrentUser {
    pub fn role(&self) -> Role {
        self.profile.role()
    }

    pub fn require(&self, role: Role) -> Result<(), ErpError> {
        if self.role() == role {
            Ok(())
        } else {
            Err(ErpError::Forbidden(format!(
                "{} access required",
                role.as_str()
            )))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).await.ok_or(AuthError::MissingToken)?;
        let claims = state.keys.verify(&token)?;

        let (identity, profile) = match current_profile(state.backend.as_ref(), &claims.session_id).await {
            Ok(resolved) => resolved,
            Err(err) if err.clears_session() => return Err(AuthError::SessionEnded),
            Err(err) => return Err(AuthError::Backend(err)),
        };
        if identity.id != claims.sub {
            return Err(AuthError::InvalidToken);
        }
        Ok(Self {
            claims,
            identity,
            profile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn issued_tokens_verify() {
        let keys = TokenKeys::new("test-secret", Duration::from_secs(60));
        let identity = Identity {
            id: "u-1".into(),
            email: "a@b.co".into(),
        };
        let token = keys.issue(&identity, "sess-1", Role::Staff).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, "u-1");
        assert_eq!(claims.session_id, "sess-1");
        assert_eq!(claims.role, Role::Staff);

        let other = TokenKeys::new("other-secret", Duration::from_secs(60));
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn token_from_header_or_query() {
        let mut with_header = parts(Request::builder().uri("/auth/me").header("Authorization", "Bearer abc"));
        assert_eq!(bearer_token(&mut with_header).await.as_deref(), Some("abc"));

        let mut with_query = parts(Request::builder().uri("/admissions/events?access_token=xyz"));
        assert_eq!(bearer_token(&mut with_query).await.as_deref(), Some("xyz"));

        let mut neither = parts(Request::builder().uri("/auth/me"));
        assert!(bearer_token(&mut neither).await.is_none());
    }

    #[tokio::test]
    async fn query_token_is_percent_decoded() {
        let mut encoded = parts(Request::builder().uri("/admissions/events?access_token=a%2Eb%2Dc&x=1"));
        assert_eq!(bearer_token(&mut encoded).await.as_deref(), Some("a.b-c"));

        let mut empty = parts(Request::builder().uri("/admissions/events?access_token="));
        assert!(bearer_token(&mut empty).await.is_none());
    }

    #[tokio::test]
    async fn non_bearer_header_falls_back_to_query() {
        let mut basic = parts(
            Request::builder()
                .uri("/admissions/events?access_token=q")
                .header("Authorization", "Basic dXNlcjpwYXNz"),
        );
        assert_eq!(bearer_token(&mut basic).await.as_deref(), Some("q"));
    }
}
