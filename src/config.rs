//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use crate::auth::{
    jwt::{DEFAULT_AUDIENCE, DEFAULT_ISSUER, MIN_SECRET_LENGTH},
    lockout::{LOCKOUT_DURATION_SECS, MAX_FAILED_ATTEMPTS},
};
use config::{Config, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:3000"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// JWT 签名密钥（使用 Secret 包装，防止日志泄露）
    /// 未配置时使用进程级随机密钥，重启后所有令牌失效
    pub jwt_secret: Option<Secret<String>>,
    /// 令牌签发者（iss）
    pub jwt_issuer: String,
    /// 令牌受众（aud）
    pub jwt_audience: String,
    /// 访问令牌过期时间（秒）
    pub access_token_exp_secs: u64,
    /// 刷新令牌过期时间（秒）
    pub refresh_token_exp_secs: u64,
    /// 最大登录失败次数
    pub max_login_attempts: u32,
    /// 登录锁定持续时间（秒）
    pub login_lockout_duration_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("server.addr", "0.0.0.0:3000")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("security.jwt_issuer", DEFAULT_ISSUER)?
            .set_default("security.jwt_audience", DEFAULT_AUDIENCE)?
            .set_default("security.access_token_exp_secs", 900)?
            .set_default("security.refresh_token_exp_secs", 604800)?
            .set_default("security.max_login_attempts", MAX_FAILED_ATTEMPTS as i64)?
            .set_default("security.login_lockout_duration_secs", LOCKOUT_DURATION_SECS as i64)?;

        // 从环境变量加载配置（前缀为 AUTH_）
        settings = settings.add_source(
            Environment::with_prefix("AUTH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: AppConfig = settings.build()?.try_deserialize()?;

        // 空白密钥视为未配置，走告警与随机密钥回退
        config.security.jwt_secret = config
            .security
            .jwt_secret
            .take()
            .filter(|secret| !secret.expose_secret().trim().is_empty());

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 验证端口范围
        if let Some(port_str) = self.server.addr.split(':').next_back() {
            if let Ok(port) = port_str.parse::<u16>() {
                if port != 0 && port < 1024 {
                    return Err(ConfigError::Message("Server port should be >= 1024".to_string()));
                }
            }
        }

        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        // 验证 JWT 密钥长度（至少 32 字符）；缺失时由 JwtService 告警并回退
        if let Some(secret) = &self.security.jwt_secret {
            if secret.expose_secret().len() < MIN_SECRET_LENGTH {
                return Err(ConfigError::Message(format!(
                    "JWT secret must be at least {} characters long",
                    MIN_SECRET_LENGTH
                )));
            }
        }

        if self.security.jwt_issuer.trim().is_empty() || self.security.jwt_audience.trim().is_empty() {
            return Err(ConfigError::Message(
                "jwt_issuer and jwt_audience must not be empty".to_string(),
            ));
        }

        // 验证令牌过期时间
        if self.security.access_token_exp_secs < 60 || self.security.access_token_exp_secs > 86400 {
            return Err(ConfigError::Message(
                "access_token_exp_secs must be between 60 and 86400 (1 minute to 24 hours)"
                    .to_string(),
            ));
        }

        if self.security.refresh_token_exp_secs < 3600
            || self.security.refresh_token_exp_secs > 2592000
        {
            return Err(ConfigError::Message(
                "refresh_token_exp_secs must be between 3600 and 2592000 (1 hour to 30 days)"
                    .to_string(),
            ));
        }

        if self.security.refresh_token_exp_secs <= self.security.access_token_exp_secs {
            return Err(ConfigError::Message(
                "refresh_token_exp_secs must be greater than access_token_exp_secs".to_string(),
            ));
        }

        // 验证登录失败锁定配置
        if self.security.max_login_attempts < 1 || self.security.max_login_attempts > 20 {
            return Err(ConfigError::Message(
                "max_login_attempts must be between 1 and 20".to_string(),
            ));
        }

        if self.security.login_lockout_duration_secs < 60 {
            return Err(ConfigError::Message(
                "login_lockout_duration_secs must be at least 60".to_string(),
            ));
        }

        Ok(())
    }
}
