use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::user::{
    AuthResponse, BoardMember, ChangePasswordRequest, LoginRequest, SignupRequest,
    UpdateProfileRequest, User,
};
use crate::validation;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Authenticated caller, placed in request extensions by the middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

pub fn create_jwt(user_id: &str, secret: &str, ttl_hours: i64) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = Utc::now() + Duration::hours(ttl_hours);
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration.timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// The caller's uid, or 401 when the request carried no valid token.
pub fn current_user(req: &HttpRequest) -> Result<String, ApiError> {
    req.extensions()
        .get::<AuthUser>()
        .map(|user| user.0.clone())
        .ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string()))
}

fn auth_response(user: &User, data: &AppState) -> Result<AuthResponse, ApiError> {
    let token = create_jwt(&user.user_id, &data.config.jwt_secret, data.config.token_ttl_hours)?;
    Ok(AuthResponse {
        token,
        user: BoardMember::from(user),
    })
}

/// POST /auth/signup
pub async fn signup(
    data: web::Data<AppState>,
    payload: web::Json<SignupRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let email = validation::normalize_email(&payload.email)?;
    validation::password(&payload.password)?;

    if data.store.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::conflict(
            "This email is already in use. Please use a different email or log in.",
        ));
    }

    let user = User {
        user_id: Uuid::new_v4().to_string(),
        email,
        display_name: validation::optional_text(payload.display_name),
        photo_url: None,
        password_hash: hash(&payload.password, data.config.bcrypt_cost)?,
        created_at: Utc::now(),
    };
    data.store.insert_user(&user).await?;
    info!("User created: {}", user.user_id);

    Ok(HttpResponse::Ok().json(auth_response(&user, &data)?))
}

/// POST /auth/login
pub async fn login(
    data: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());
    let email = payload.email.trim().to_lowercase();

    let user = match data.store.find_user_by_email(&email).await? {
        Some(user) => user,
        None => {
            debug!("Login for unknown email {}", email);
            return Err(invalid());
        }
    };
    if !verify(&payload.password, &user.password_hash).unwrap_or(false) {
        warn!("Failed login for user {}", user.user_id);
        return Err(invalid());
    }

    Ok(HttpResponse::Ok().json(auth_response(&user, &data)?))
}

async fn load_self(req: &HttpRequest, data: &AppState) -> Result<User, ApiError> {
    let uid = current_user(req)?;
    data.store
        .find_user(&uid)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// GET /users/me
pub async fn get_profile(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user = load_self(&req, &data).await?;
    Ok(HttpResponse::Ok().json(BoardMember::from(&user)))
}

/// PUT /users/me
pub async fn update_profile(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    let mut user = load_self(&req, &data).await?;
    let payload = payload.into_inner();

    if let Some(display_name) = payload.display_name {
        user.display_name = validation::optional_text(display_name);
    }
    if let Some(photo_url) = payload.photo_url {
        user.photo_url = validation::optional_text(photo_url);
    }
    data.store.update_user(&user).await?;
    info!("Profile updated: {}", user.user_id);

    Ok(HttpResponse::Ok().json(BoardMember::from(&user)))
}

/// PUT /users/me/password
pub async fn change_password(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    let mut user = load_self(&req, &data).await?;
    if !verify(&payload.current_password, &user.password_hash).unwrap_or(false) {
        return Err(ApiError::Unauthorized("Current password is incorrect".to_string()));
    }
    validation::password(&payload.new_password)?;

    user.password_hash = hash(&payload.new_password, data.config.bcrypt_cost)?;
    data.store.update_user(&user).await?;
    info!("Password changed: {}", user.user_id);

    Ok(HttpResponse::NoContent().finish())
}

/// GET /users/{uid}
pub async fn get_user(
    req: HttpRequest,
    data: web::Data<AppState>,
    uid: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    current_user(&req)?;
    match data.store.find_user(&uid).await? {
        Some(user) => Ok(HttpResponse::Ok().json(BoardMember::from(&user))),
        None => Err(ApiError::not_found("User not found")),
    }
}
