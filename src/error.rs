//! 统一错误模型
//! 定义认证错误类型和错误响应格式

use crate::auth::{jwt::TokenKind, lockout::format_retry_after, policy::ValidationError};
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 认证错误类型
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// 密码错误与账户不存在不做区分，防止账户枚举
    #[error("Invalid credentials")]
    CredentialMismatch,

    /// 缺少 Bearer 令牌
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("{kind} token expired")]
    TokenExpired { kind: TokenKind },

    #[error("Token kind mismatch: expected {expected}, got {actual}")]
    TokenKindMismatch {
        expected: TokenKind,
        actual: TokenKind,
    },

    #[error("Account locked for another {retry_after_secs}s")]
    AccountLocked { retry_after_secs: u64 },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AuthError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) | AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::CredentialMismatch
            | AuthError::Unauthorized
            | AuthError::TokenInvalid
            | AuthError::TokenExpired { .. }
            | AuthError::TokenKindMismatch { .. } => StatusCode::UNAUTHORIZED,
            AuthError::AccountLocked { .. } => StatusCode::LOCKED,
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::Config(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Validation(e) => e.to_string(),
            AuthError::CredentialMismatch => "Invalid credentials".to_string(),
            AuthError::Unauthorized => "Authentication required".to_string(),
            AuthError::TokenInvalid | AuthError::TokenKindMismatch { .. } => {
                "Invalid token, please sign in again".to_string()
            }
            AuthError::TokenExpired {
                kind: TokenKind::Access,
            } => "Access token expired, please refresh".to_string(),
            AuthError::TokenExpired {
                kind: TokenKind::Refresh,
            } => "Session expired, please sign in again".to_string(),
            AuthError::AccountLocked { retry_after_secs } => format!(
                "Account is temporarily locked, try again in {}",
                format_retry_after(std::time::Duration::from_secs(*retry_after_secs))
            ),
            AuthError::BadRequest(msg) | AuthError::Conflict(msg) => msg.clone(),
            AuthError::Config(_) => "Configuration error".to_string(),
            AuthError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> u16 {
        self.status_code().as_u16()
    }

    /// 是否需要重新完整登录
    ///
    /// 过期的访问令牌可以用刷新令牌透明续期，其余令牌错误都需要重新登录。
    pub fn requires_reauthentication(&self) -> bool {
        match self {
            AuthError::TokenExpired { kind } => *kind == TokenKind::Refresh,
            AuthError::Unauthorized
            | AuthError::TokenInvalid
            | AuthError::TokenKindMismatch { .. } => true,
            _ => false,
        }
    }

    // 便捷方法
    pub fn internal_error(msg: &str) -> Self {
        AuthError::Internal(msg.to_string())
    }

    pub fn conflict(msg: &str) -> Self {
        AuthError::Conflict(msg.to_string())
    }
}

/// 错误响应 DTO
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub message: String,
    pub request_id: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code(),
                message: self.user_message(),
                request_id,
            },
        };

        // 服务端错误记 error，客户端错误只记 debug
        if status.is_server_error() {
            tracing::error!(
                code = self.code(),
                message = %self,
                request_id = %error_response.error.request_id,
                "Application error"
            );
        } else {
            tracing::debug!(
                code = self.code(),
                message = %self,
                request_id = %error_response.error.request_id,
                "Request rejected"
            );
        }

        let mut response = (status, Json(error_response)).into_response();

        if let AuthError::AccountLocked { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

/// 从请求体校验错误转换
impl From<validator::ValidationErrors> for AuthError {
    fn from(e: validator::ValidationErrors) -> Self {
        AuthError::BadRequest(e.to_string())
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AuthError {
    fn from(e: config::ConfigError) -> Self {
        AuthError::Config(e.to_string())
    }
}
