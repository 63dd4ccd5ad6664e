//! 测试公共模块
//! 提供测试辅助函数和测试工具

#![allow(dead_code)]

use auth_core::{
    auth::{
        jwt::{JwtService, TokenSettings},
        lockout::LockoutPolicy,
        password::{CredentialHasher, PasswordHasher},
    },
    clock::ManualClock,
    error::AuthError,
    config::{AppConfig, LoggingConfig, SecurityConfig, ServerConfig},
    middleware::AppState,
    models::auth::RegisterRequest,
    services::AuthService,
    store::InMemoryAccountStore,
};
use secrecy::Secret;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const TEST_SECRET: &str = "test-secret-key-for-testing-only-min-32-chars";
pub const TEST_EMAIL: &str = "user@example.com";
pub const TEST_PASSWORD: &str = "TestPass123!";

/// 创建测试配置
pub fn create_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            addr: "127.0.0.1:0".to_string(), // 使用随机端口
            graceful_shutdown_timeout_secs: 5,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            jwt_secret: Some(Secret::new(TEST_SECRET.to_string())),
            jwt_issuer: "auth-core".to_string(),
            jwt_audience: "auth-core-clients".to_string(),
            access_token_exp_secs: 900,
            refresh_token_exp_secs: 604800,
            max_login_attempts: 5,
            login_lockout_duration_secs: 1800,
        },
    }
}

/// 创建测试 JWT 服务
pub fn create_jwt_service(clock: &ManualClock) -> Arc<JwtService> {
    Arc::new(
        JwtService::new(
            Some(&Secret::new(TEST_SECRET.to_string())),
            TokenSettings::default(),
            Arc::new(clock.clone()),
        )
        .expect("Failed to create JWT service"),
    )
}

/// 测试上下文：服务、存储与可控时钟
pub struct TestContext {
    pub clock: ManualClock,
    pub store: Arc<InMemoryAccountStore>,
    pub jwt_service: Arc<JwtService>,
    pub auth_service: Arc<AuthService>,
}

/// 创建测试上下文
pub fn create_test_context() -> TestContext {
    create_test_context_with_hasher(Arc::new(PasswordHasher::new()))
}

/// 使用指定哈希器创建测试上下文
pub fn create_test_context_with_hasher(hasher: Arc<dyn CredentialHasher>) -> TestContext {
    let config = create_test_config();
    let clock = ManualClock::starting_now();
    let store = Arc::new(InMemoryAccountStore::new());
    let jwt_service = Arc::new(
        JwtService::from_config(&config, Arc::new(clock.clone()))
            .expect("Failed to create JWT service"),
    );
    let auth_service = Arc::new(
        AuthService::with_hasher(
            store.clone(),
            jwt_service.clone(),
            LockoutPolicy::from_config(&config, Arc::new(clock.clone())),
            Arc::new(clock.clone()),
            hasher,
        )
        .expect("Failed to create auth service"),
    );

    TestContext {
        clock,
        store,
        jwt_service,
        auth_service,
    }
}

/// 创建测试应用状态
pub fn create_test_app_state(ctx: &TestContext) -> Arc<AppState> {
    Arc::new(AppState {
        config: create_test_config(),
        auth_service: ctx.auth_service.clone(),
        jwt_service: ctx.jwt_service.clone(),
    })
}

/// 统计校验次数的哈希器
#[derive(Default)]
pub struct CountingHasher {
    inner: PasswordHasher,
    hashes: AtomicUsize,
    verifications: AtomicUsize,
}

impl CountingHasher {
    pub fn hashes(&self) -> usize {
        self.hashes.load(Ordering::SeqCst)
    }

    pub fn verifications(&self) -> usize {
        self.verifications.load(Ordering::SeqCst)
    }
}

impl CredentialHasher for CountingHasher {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        self.hashes.fetch_add(1, Ordering::SeqCst);
        self.inner.hash(password)
    }

    fn verify(&self, password: &str, digest: &str) -> bool {
        self.verifications.fetch_add(1, Ordering::SeqCst);
        self.inner.verify(password, digest)
    }
}

/// 注册测试账户
pub async fn register_test_account(ctx: &TestContext) -> uuid::Uuid {
    ctx.auth_service
        .register(RegisterRequest {
            email: TEST_EMAIL.to_string(),
            password: TEST_PASSWORD.to_string(),
        })
        .await
        .expect("Failed to register test account")
        .id
}
