// src/services/users.rs

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{LoginRequest, RegisterRequest, Role, User},
    store::Store,
    utils::{
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
    },
};

/// Emails are matched case-insensitively; the store only ever sees lower case.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Creates an unapproved account. Admin accounts cannot be self-registered.
pub async fn register_user(store: &dyn Store, payload: RegisterRequest) -> Result<User, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if payload.password != payload.confirm_password {
        return Err(AppError::BadRequest("Passwords do not match".to_string()));
    }

    let role: Role = payload
        .role
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Unknown role '{}'", payload.role)))?;
    if role == Role::Admin {
        return Err(AppError::BadRequest(
            "Admin accounts cannot be registered".to_string(),
        ));
    }

    let user = User {
        id: Uuid::new_v4(),
        first_name: payload.first_name.trim().to_string(),
        last_name: payload.last_name.trim().to_string(),
        email: normalize_email(&payload.email),
        birth_date: payload.birth_date,
        role,
        password: hash_password(&payload.password)?,
        approved: false,
        profile_image_url: None,
        created_at: Utc::now(),
    };

    store.insert_user(&user).await?;
    tracing::info!("Registered {} account {}", user.role, user.email);

    Ok(user)
}

/// Checks credentials and signs a session token.
///
/// Unknown email and wrong password share one message. Accounts still
/// waiting for approval get 403.
pub async fn authenticate(
    store: &dyn Store,
    config: &Config,
    payload: LoginRequest,
) -> Result<(String, User), AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let invalid = || AppError::AuthError("Invalid email or password".to_string());

    let user = store
        .find_user_by_email(&normalize_email(&payload.email))
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(invalid());
    }

    if !user.approved {
        return Err(AppError::Forbidden(
            "Account is pending approval".to_string(),
        ));
    }

    let token = sign_jwt(
        user.id,
        &user.email,
        user.role,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok((token, user))
}

/// Creates the configured admin account on first start.
pub async fn seed_admin_user(store: &dyn Store, config: &Config) -> Result<(), AppError> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };
    let email = normalize_email(email);

    if store.find_user_by_email(&email).await?.is_some() {
        return Ok(());
    }

    tracing::info!("Seeding admin user: {}", email);
    let admin = User {
        id: Uuid::new_v4(),
        first_name: "Admin".to_string(),
        last_name: String::new(),
        email,
        birth_date: None,
        role: Role::Admin,
        password: hash_password(password)?,
        approved: true,
        profile_image_url: None,
        created_at: Utc::now(),
    };
    store.insert_user(&admin).await?;
    tracing::info!("Admin user created successfully.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn request(role: &str) -> RegisterRequest {
        RegisterRequest {
            first_name: "Lucia".to_string(),
            last_name: "Mendez".to_string(),
            email: "Lucia@Example.org".to_string(),
            birth_date: None,
            role: role.to_string(),
            password: "secret123".to_string(),
            confirm_password: "secret123".to_string(),
        }
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    fn config() -> Config {
        Config {
            admin_email: Some("Root@Example.org".to_string()),
            admin_password: Some("rootpass".to_string()),
            ..Config::new("postgres://unused", "test_secret")
        }
    }

    #[tokio::test]
    async fn test_register_normalizes_and_waits_for_approval() {
        let store = MemoryStore::new();
        let user = register_user(&store, request("student")).await.unwrap();

        assert_eq!(user.email, "lucia@example.org");
        assert!(!user.approved);
        assert_ne!(user.password, "secret123");
    }

    #[tokio::test]
    async fn test_register_rejects_admin_and_unknown_roles() {
        let store = MemoryStore::new();
        assert!(matches!(
            register_user(&store, request("admin")).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            register_user(&store, request("wizard")).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_register_password_mismatch() {
        let store = MemoryStore::new();
        let mut req = request("teacher");
        req.confirm_password = "other".to_string();
        assert!(register_user(&store, req).await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        register_user(&store, request("student")).await.unwrap();
        assert!(matches!(
            register_user(&store, request("student")).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_login_requires_approval() {
        let store = MemoryStore::new();
        let config = config();
        let user = register_user(&store, request("student")).await.unwrap();

        let pending = authenticate(&store, &config, login("lucia@example.org", "secret123")).await;
        assert!(matches!(pending, Err(AppError::Forbidden(_))));

        store.set_user_approved(user.id, true).await.unwrap();
        let (token, logged_in) =
            authenticate(&store, &config, login("LUCIA@example.org", "secret123"))
                .await
                .unwrap();
        assert!(!token.is_empty());
        assert_eq!(logged_in.id, user.id);

        let wrong = authenticate(&store, &config, login("lucia@example.org", "nope")).await;
        assert!(matches!(wrong, Err(AppError::AuthError(_))));
    }

    #[tokio::test]
    async fn test_seed_admin_once() {
        let store = MemoryStore::new();
        let config = config();

        seed_admin_user(&store, &config).await.unwrap();
        seed_admin_user(&store, &config).await.unwrap();

        let users = store.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, Role::Admin);
        assert!(users[0].approved);
        assert_eq!(users[0].email, "root@example.org");
    }
}
