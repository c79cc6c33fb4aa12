use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::{AppState, AuthConfig};

/// Claims of an access token issued by the identity provider.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: usize,
}

pub fn verify_token(token: &str, auth: &AuthConfig) -> Result<UserClaims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    match &auth.audience {
        Some(aud) => validation.set_audience(&[aud]),
        None => validation.validate_aud = false,
    }

    let token_data = decode::<UserClaims>(
        token,
        &DecodingKey::from_secret(auth.secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!("Token rejected: {}", e);
        AppError::AuthenticationError("Unauthorized: Invalid token.".to_string())
    })?;

    if token_data.claims.sub.trim().is_empty() {
        return Err(AppError::AuthenticationError("Unauthorized: Invalid token.".to_string()));
    }

    Ok(token_data.claims)
}

/// Requires a valid bearer token and injects its [`UserClaims`] into the request.
pub async fn user_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::AuthenticationError("Unauthorized: No token provided.".to_string()))?;

    let claims = verify_token(token, &state.auth)?;
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn auth(audience: Option<&str>) -> AuthConfig {
        AuthConfig {
            secret: "test-secret".to_string(),
            audience: audience.map(str::to_string),
        }
    }

    fn token(secret: &str, sub: &str, exp_offset: i64, aud: Option<&str>) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset) as usize;
        let mut claims = serde_json::json!({ "sub": sub, "exp": exp, "role": "authenticated" });
        if let Some(aud) = aud {
            claims["aud"] = aud.into();
        }
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_valid_token() {
        let claims = verify_token(&token("test-secret", "user-1", 3600, None), &auth(None)).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role.as_deref(), Some("authenticated"));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let result = verify_token(&token("other", "user-1", 3600, None), &auth(None));
        assert!(matches!(result, Err(AppError::AuthenticationError(_))));
    }

    #[test]
    fn test_expired_token_rejected() {
        let result = verify_token(&token("test-secret", "user-1", -3600, None), &auth(None));
        assert!(result.is_err());
    }

    #[test]
    fn test_audience_enforced_when_configured() {
        let config = auth(Some("authenticated"));
        assert!(verify_token(&token("test-secret", "u", 3600, Some("authenticated")), &config).is_ok());
        assert!(verify_token(&token("test-secret", "u", 3600, Some("anon")), &config).is_err());
    }

    #[test]
    fn test_empty_subject_rejected() {
        assert!(verify_token(&token("test-secret", " ", 3600, None), &auth(None)).is_err());
    }
}
