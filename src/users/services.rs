use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    dto::{LoginRequest, RegisterRequest, TokenResponse, UpdateUserRequest},
    repo::{Duplicate, UserStore},
    repo_types::{NewUser, User},
};
use crate::{
    auth::{jwt::JwtKeys, password},
    error::AppError,
};

pub const MAX_USERNAME_CHARS: usize = 50;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_username(username: &str) -> Result<(), AppError> {
    if username.is_empty() {
        return Err(AppError::Validation("username is required".into()));
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err(AppError::Validation(format!(
            "username cannot be longer than {} characters",
            MAX_USERNAME_CHARS
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    if email.is_empty() {
        return Err(AppError::Validation("email is required".into()));
    }
    if !is_valid_email(email) {
        return Err(AppError::Validation("invalid email format".into()));
    }
    Ok(())
}

fn conflict_or_persistence(err: anyhow::Error) -> AppError {
    match err.downcast::<Duplicate>() {
        Ok(dup) => AppError::Conflict(dup.to_string()),
        Err(err) => AppError::Persistence(err),
    }
}

pub(crate) fn validate_register(req: &RegisterRequest) -> Result<(), AppError> {
    validate_username(&req.username)?;
    validate_email(&req.email)?;
    if req.password.is_empty() {
        return Err(AppError::Validation("password is required".into()));
    }
    Ok(())
}

pub async fn register(store: &dyn UserStore, mut req: RegisterRequest) -> Result<User, AppError> {
    req.email = normalize_email(&req.email);
    validate_register(&req)?;

    if store.find_by_username(&req.username).await?.is_some() {
        warn!(username = %req.username, "username already registered");
        return Err(AppError::Conflict("username already taken".into()));
    }

    let RegisterRequest {
        username,
        email,
        password,
        bio,
    } = req;
    let password_hash = password::hash_blocking(password).await?;

    let user = store
        .create(&NewUser {
            username,
            email,
            password_hash,
            bio,
        })
        .await
        .map_err(conflict_or_persistence)?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(user)
}

pub async fn login(
    store: &dyn UserStore,
    keys: &JwtKeys,
    req: LoginRequest,
) -> Result<TokenResponse, AppError> {
    let Some(user) = store.find_by_username(&req.username).await? else {
        warn!(username = %req.username, "login unknown username");
        return Err(AppError::InvalidCredentials);
    };

    if !password::verify_blocking(req.password, user.password_hash.clone()).await? {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let (token, expires_at) = keys.sign(user.id)?;
    info!(user_id = user.id, "user logged in");
    Ok(TokenResponse { token, expires_at })
}

pub async fn get_user(store: &dyn UserStore, id: i64) -> Result<User, AppError> {
    store.find_by_id(id).await?.ok_or(AppError::NotFound("user"))
}

pub async fn update_user(
    store: &dyn UserStore,
    id: i64,
    changes: UpdateUserRequest,
) -> Result<User, AppError> {
    let email = changes.email.as_deref().map(normalize_email);
    if let Some(username) = &changes.username {
        validate_username(username)?;
    }
    if let Some(email) = &email {
        validate_email(email)?;
    }

    let mut user = get_user(store, id).await?;
    if let Some(username) = changes.username {
        user.username = username;
    }
    if let Some(email) = email {
        user.email = email;
    }
    if let Some(bio) = changes.bio {
        user.bio = bio;
    }

    user.updated_at = store
        .update(&user)
        .await
        .map_err(conflict_or_persistence)?
        .ok_or(AppError::NotFound("user"))?;
    info!(user_id = id, "user updated");
    Ok(user)
}
