// src/handlers/auth.rs

use axum::{Json, extract::State, response::IntoResponse};
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::admin::{AdminLoginRequest, LoginResponse},
    utils::{
        hash::verify_password,
        jwt::{ADMIN_ROLE, sign_jwt},
    },
};

/// Authenticates the admin and returns a JWT token.
///
/// The email is compared case-insensitively with `ADMIN_EMAIL`, the password
/// is verified against the configured argon2 hash.
pub async fn admin_login(
    State(config): State<Config>,
    Json(payload): Json<AdminLoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let invalid = || AppError::AuthError("Invalid email or password".to_string());

    let Some(password_hash) = config.admin_password_hash.as_deref() else {
        tracing::warn!("Admin login attempted but no admin password is configured");
        return Err(invalid());
    };

    if !payload.email.trim().eq_ignore_ascii_case(&config.admin_email) {
        return Err(invalid());
    }

    if !verify_password(&payload.password, password_hash)? {
        tracing::warn!("Failed admin login for {}", config.admin_email);
        return Err(invalid());
    }

    let token = sign_jwt(
        &config.admin_email,
        ADMIN_ROLE,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    tracing::info!("Admin {} logged in", config.admin_email);

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer",
        expires_in: config.jwt_expiration,
    }))
}
