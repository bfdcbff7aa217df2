// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::Config, error::AppError, models::user::Role};

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    pub email: String,
    /// User's role (e.g., 'student', 'admin').
    pub role: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::AuthError("Invalid token".to_string()))
    }

    pub fn role(&self) -> Option<Role> {
        self.role.parse().ok()
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    pub fn is_staff(&self) -> bool {
        self.role().is_some_and(|r| r.is_staff())
    }

    /// Allows the request when it targets the caller's own account or the caller is an admin.
    pub fn ensure_self_or_admin(&self, user_id: Uuid) -> Result<(), AppError> {
        if self.is_admin() || self.user_id()? == user_id {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Not allowed to access another user's data".to_string(),
            ))
        }
    }
}

/// Claims of a signed file link. `purpose` keeps these apart from login tokens.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FileClaims {
    pub sub: String,
    pub purpose: String,
    pub exp: usize,
}

const FILE_PURPOSE: &str = "file";

fn expires_in(seconds: u64) -> Result<usize, AppError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs();
    Ok((now + seconds) as usize)
}

/// Signs a new JWT for the user.
pub fn sign_jwt(
    id: Uuid,
    email: &str,
    role: Role,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let claims = Claims {
        sub: id.to_string(), // Store User ID in 'sub' claim
        email: email.to_owned(),
        role: role.as_str().to_owned(),
        exp: expires_in(expiration_seconds)?,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Signs a short-lived download token for one stored file.
pub fn sign_file_token(public_id: &str, secret: &str, ttl_seconds: u64) -> Result<String, AppError> {
    let claims = FileClaims {
        sub: public_id.to_owned(),
        purpose: FILE_PURPOSE.to_owned(),
        exp: expires_in(ttl_seconds)?,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Returns the file id a download token was issued for.
pub fn verify_file_token(token: &str, secret: &str) -> Result<String, AppError> {
    let claims = decode::<FileClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid or expired link".to_string()))?
    .claims;

    if claims.purpose != FILE_PURPOSE {
        return Err(AppError::AuthError("Invalid or expired link".to_string()));
    }
    Ok(claims.sub)
}

/// Axum Middleware: Authentication.
///
/// Intercepts requests, validates the 'Authorization: Bearer <token>' header.
/// If valid, injects `Claims` into the request extensions for handlers to use.
/// If invalid, returns 401 Unauthorized.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token.trim(),
        None => return Err(StatusCode::UNAUTHORIZED),
    };

    match verify_jwt(token, &config.jwt_secret) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            Ok(next.run(req).await)
        }
        Err(_) => {
            tracing::debug!("Rejected bearer token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Axum Middleware: Admin Authorization.
///
/// Must be used AFTER `auth_middleware`. Checks if the injected `Claims` has 'admin' role.
/// If not, returns 403 Forbidden.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !claims.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}

/// Axum Middleware: Staff Authorization (admin or teacher).
///
/// Same contract as `admin_middleware`.
pub async fn staff_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !claims.is_staff() {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}
