//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: signup, login, token refresh and token validation.

use axum::{extract::State, Extension, Form, Json};
use mindi_core::domain::{NewUser, SubscriptionTier, User};
use mindi_core::ports::{PortError, PHONE_TAKEN};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::TokenPair;
use crate::error::{ApiError, ApiResult};
use crate::web::state::AppState;
use crate::web::user::UserResponse;

/// Message for a failed login. It does not say which of the two was wrong.
pub const LOGIN_FAILED: &str = "Incorrect phone number or password";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub phone: String,
    pub password: String,
    pub name: String,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub birth_year: Option<i32>,
    pub birth_month: Option<i32>,
    pub birth_day: Option<i32>,
    pub education: Option<String>,
    /// Defaults to `standard`.
    pub subscription_type: Option<String>,
}

/// OAuth2 password form: `username` carries the phone number.
#[derive(Deserialize, ToSchema)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "bearer".to_string(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize, ToSchema)]
pub struct ValidateResponse {
    pub id: Uuid,
    pub phone: String,
    pub name: String,
    pub email: Option<String>,
    pub is_active: bool,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/user/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/api/user/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "User created", body = UserResponse),
        (status = 400, description = "Phone number already registered or invalid input"),
        (status = 500, description = "Internal server error")
    ),
    tag = "User"
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<Json<UserResponse>> {
    if req.phone.trim().is_empty() || req.password.is_empty() || req.name.trim().is_empty() {
        return Err(ApiError::Validation(
            "phone, password and name are required".to_string(),
        ));
    }
    let subscription = match req.subscription_type.as_deref() {
        Some(tier) => tier
            .parse::<SubscriptionTier>()
            .map_err(|e| ApiError::Validation(e.to_string()))?,
        None => SubscriptionTier::default(),
    };

    // 1. Reject a phone number that is already registered
    match state.db.get_user_by_phone(&req.phone).await {
        Ok(_) => return Err(ApiError::Validation(PHONE_TAKEN.to_string())),
        Err(PortError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    // 2. Hash the password and create the user
    let password_hash = hash_password(&req.password)?;
    let new_user = NewUser {
        phone: req.phone,
        email: req.email,
        name: req.name,
        gender: req.gender,
        birth_year: req.birth_year,
        birth_month: req.birth_month,
        birth_day: req.birth_day,
        education: req.education,
        subscription,
    };
    let user = state.db.create_user(new_user, &password_hash).await?;
    info!(user_id = %user.id, "User signed up");

    Ok(Json(UserResponse::from(&user)))
}

/// POST /api/user/login - Exchange phone and password for a token pair
#[utoipa::path(
    post,
    path = "/api/user/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Incorrect phone number or password")
    ),
    tag = "User"
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> ApiResult<Json<TokenResponse>> {
    // 1. Look up the credentials by phone
    let creds = match state.db.get_credentials_by_phone(&form.username).await {
        Ok(creds) => creds,
        Err(PortError::NotFound(_)) => {
            return Err(ApiError::InvalidCredentials(LOGIN_FAILED.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    // 2. Verify the password
    let valid = verify_password(&form.password, &creds.hashed_password).map_err(|e| {
        error!("Stored password hash is unreadable: {:?}", e);
        ApiError::Port(e)
    })?;
    if !valid {
        return Err(ApiError::InvalidCredentials(LOGIN_FAILED.to_string()));
    }

    // 3. Issue the token pair
    let pair = state.tokens.issue_pair(&creds.user.phone)?;
    Ok(Json(pair.into()))
}

/// POST /api/auth/refresh - Trade a refresh token for a new pair
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenResponse),
        (status = 401, description = "Invalid, expired or non-refresh token")
    ),
    tag = "Auth"
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let claims = state.tokens.verify_refresh(&req.refresh_token)?;
    let user = state
        .db
        .get_user_by_phone(&claims.sub)
        .await
        .map_err(|_| ApiError::Unauthorized)?;

    let pair = state.tokens.issue_pair(&user.phone)?;
    Ok(Json(pair.into()))
}

/// POST /api/auth/validate - Confirm the access token and return its user
#[utoipa::path(
    post,
    path = "/api/auth/validate",
    responses(
        (status = 200, description = "Token is valid", body = ValidateResponse),
        (status = 401, description = "Could not validate credentials")
    ),
    security(("bearer" = [])),
    tag = "Auth"
)]
pub async fn validate_handler(Extension(user): Extension<User>) -> Json<ValidateResponse> {
    Json(ValidateResponse {
        id: user.id,
        phone: user.phone,
        name: user.name,
        email: user.email,
        is_active: user.is_active,
    })
}
