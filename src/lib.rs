//! 认证与账户安全核心
//! 密码策略、凭据哈希、访问/刷新令牌与登录失败锁定

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod telemetry;
