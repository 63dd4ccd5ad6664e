//! 认证相关的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext, error::AuthError, middleware::AppState, models::auth::*,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

/// 注册
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    req.validate()?;

    let account = state.auth_service.register(req).await?;

    Ok((StatusCode::CREATED, Json(account)))
}

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    // 长度不合法的凭据按凭据错误处理，不暴露校验细节
    req.validate().map_err(|_| AuthError::CredentialMismatch)?;

    let response = state.auth_service.login(req).await?;

    Ok(Json(response))
}

/// 刷新令牌
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let token_pair = state.auth_service.refresh_token(req).await?;

    Ok(Json(token_pair))
}

/// 获取当前账户信息
pub async fn get_current_account(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AuthError> {
    let account = state
        .auth_service
        .get_account(&auth_context.account_id)
        .await?;

    Ok(Json(account))
}

/// 修改密码
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AuthError> {
    req.validate()?;

    state
        .auth_service
        .change_password(&auth_context.account_id, req)
        .await?;

    Ok(Json(json!({"message": "Password changed"})))
}
