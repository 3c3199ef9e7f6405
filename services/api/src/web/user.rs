//! services/api/src/web/user.rs
//!
//! Profile endpoints for the authenticated user.

use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use mindi_core::domain::{ProfileUpdate, SubscriptionTier, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub phone: String,
    pub email: Option<String>,
    pub name: String,
    pub gender: Option<String>,
    pub birth_year: Option<i32>,
    pub birth_month: Option<i32>,
    pub birth_day: Option<i32>,
    pub education: Option<String>,
    pub subscription_type: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            phone: user.phone.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            gender: user.gender.clone(),
            birth_year: user.birth_year,
            birth_month: user.birth_month,
            birth_day: user.birth_day,
            education: user.education.clone(),
            subscription_type: user.subscription.to_string(),
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

/// Omitted fields are left unchanged.
#[derive(Deserialize, ToSchema, Default)]
pub struct ProfileUpdateRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub gender: Option<String>,
    pub birth_year: Option<i32>,
    pub birth_month: Option<i32>,
    pub birth_day: Option<i32>,
    pub education: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SubscriptionRequest {
    /// One of `standard`, `plus`, `premium`, `premium_plus`.
    pub subscription_type: String,
}

#[utoipa::path(
    get,
    path = "/api/user/me",
    responses(
        (status = 200, description = "The caller's profile", body = UserResponse),
        (status = 401, description = "Could not validate credentials")
    ),
    security(("bearer" = [])),
    tag = "User"
)]
pub async fn get_me_handler(Extension(user): Extension<User>) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}

#[utoipa::path(
    patch,
    path = "/api/user/me",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserResponse),
        (status = 400, description = "Invalid field value"),
        (status = 401, description = "Could not validate credentials")
    ),
    security(("bearer" = [])),
    tag = "User"
)]
pub async fn update_me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<ProfileUpdateRequest>,
) -> ApiResult<Json<UserResponse>> {
    if matches!(req.birth_month, Some(m) if !(1..=12).contains(&m))
        || matches!(req.birth_day, Some(d) if !(1..=31).contains(&d))
    {
        return Err(ApiError::Validation("birth date is out of range".to_string()));
    }
    if req.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::Validation("name must not be empty".to_string()));
    }

    let update = ProfileUpdate {
        email: req.email,
        name: req.name,
        gender: req.gender,
        birth_year: req.birth_year,
        birth_month: req.birth_month,
        birth_day: req.birth_day,
        education: req.education,
    };
    let updated = state.db.update_profile(user.id, update).await?;
    Ok(Json(UserResponse::from(&updated)))
}

#[utoipa::path(
    put,
    path = "/api/user/me/subscription",
    request_body = SubscriptionRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserResponse),
        (status = 400, description = "Unknown subscription type"),
        (status = 401, description = "Could not validate credentials")
    ),
    security(("bearer" = [])),
    tag = "User"
)]
pub async fn update_subscription_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<SubscriptionRequest>,
) -> ApiResult<Json<UserResponse>> {
    let tier = req
        .subscription_type
        .parse::<SubscriptionTier>()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let updated = state.db.update_subscription(user.id, tier).await?;
    info!(user_id = %user.id, tier = %tier, "Subscription changed");
    Ok(Json(UserResponse::from(&updated)))
}
