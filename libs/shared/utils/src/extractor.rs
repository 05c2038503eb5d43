use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::typed_header::{TypedHeader, TypedHeaderRejection};
use headers::{authorization::Bearer, Authorization};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Validates the bearer token and stores the caller's [`User`] in request extensions.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(auth) = bearer.map_err(|rejection| {
        AppError::Auth(format!("Missing or malformed authorization header: {}", rejection))
    })?;

    let user = validate_token(auth.token(), &config.supabase_jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// The caller's normalized email; the only identity the core trusts.
pub fn caller_email(user: &User) -> Result<String, AppError> {
    user.normalized_email()
        .ok_or_else(|| AppError::Auth("Token carries no email claim".to_string()))
}
