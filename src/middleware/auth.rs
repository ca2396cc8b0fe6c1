use crate::{
    error::AppError,
    models::{user, User},
    services::Actor,
    utils::{
        cookie::{extract_cookie, SESSION_COOKIE},
        jwt::decode_jwt,
    },
};
use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
    Extension,
};
use sea_orm::{DatabaseConnection, EntityTrait};

/// The signed-in user, inserted into request extensions by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i32,
    pub username: String,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == user::ROLE_ADMIN
    }

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            username: self.username.clone(),
            is_admin: self.is_admin(),
        }
    }
}

/// Requires a valid token for a non-banned user.
pub async fn auth_middleware(
    Extension(db): Extension<DatabaseConnection>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request_token(&headers).ok_or(AppError::Unauthorized)?;
    let claims = decode_jwt(&token).map_err(|_| AppError::Unauthorized)?;
    let user_id = claims.user_id().ok_or(AppError::Unauthorized)?;

    let user = User::find_by_id(user_id)
        .one(&db)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if user.role == user::ROLE_BANNED {
        return Err(AppError::forbidden("Account is banned"));
    }

    request.extensions_mut().insert(AuthUser {
        user_id: user.id,
        username: user.username,
        role: user.role,
    });

    Ok(next.run(request).await)
}

/// Prefer `Authorization: Bearer`, fall back to the session cookie.
fn request_token(headers: &HeaderMap) -> Option<String> {
    extract_bearer_token(headers).or_else(|| extract_cookie(headers, SESSION_COOKIE))
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// Optional identity on public routes. Never rejects: a missing or invalid
/// token just means an anonymous viewer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Viewer {
    pub user_id: Option<i32>,
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = request_token(&parts.headers)
            .and_then(|token| decode_jwt(&token).ok())
            .and_then(|claims| claims.user_id());
        Ok(Viewer { user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(request_token(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn empty_bearer_falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        headers.insert(header::COOKIE, HeaderValue::from_static("forum_session=tok123"));
        assert_eq!(request_token(&headers).as_deref(), Some("tok123"));
    }

    #[test]
    fn no_credentials_no_token() {
        assert!(request_token(&HeaderMap::new()).is_none());
    }

    #[test]
    fn actor_reflects_role() {
        let admin = AuthUser {
            user_id: 1,
            username: "root".into(),
            role: user::ROLE_ADMIN.into(),
        };
        assert!(admin.actor().is_admin);

        let member = AuthUser {
            role: user::ROLE_USER.into(),
            ..admin
        };
        assert!(!member.actor().is_admin);
        assert_eq!(member.actor().username, "root");
    }
}
