//! 认证服务：注册、登录、令牌刷新、修改密码
//!
//! 登录流程即锁定状态机的调用方：先查锁定，再校验密码，失败计数与锁定时间
//! 由本服务写回账户存储。密码哈希运算放在阻塞线程池执行。

use crate::{
    auth::{
        jwt::{Claims, JwtService, TokenPair},
        lockout::{LockoutPolicy, LockoutState},
        password::{CredentialHasher, PasswordHasher},
        policy::{validate_email, validate_password},
    },
    clock::SharedClock,
    error::AuthError,
    models::{account::*, auth::*},
    store::AccountStore,
};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::sync::Arc;
use uuid::Uuid;

pub struct AuthService {
    store: Arc<dyn AccountStore>,
    jwt_service: Arc<JwtService>,
    lockout: LockoutPolicy,
    hasher: Arc<dyn CredentialHasher>,
    clock: SharedClock,
    /// 用于不存在账户的等时校验
    dummy_digest: String,
}

impl AuthService {
    /// 使用默认 Argon2id 哈希器创建服务
    pub fn new(
        store: Arc<dyn AccountStore>,
        jwt_service: Arc<JwtService>,
        lockout: LockoutPolicy,
        clock: SharedClock,
    ) -> Result<Self, AuthError> {
        Self::with_hasher(
            store,
            jwt_service,
            lockout,
            clock,
            Arc::new(PasswordHasher::new()),
        )
    }

    /// 指定哈希器创建服务
    ///
    /// 构造时即生成一次假摘要，首个未知账户请求与普通失败耗时一致。
    pub fn with_hasher(
        store: Arc<dyn AccountStore>,
        jwt_service: Arc<JwtService>,
        lockout: LockoutPolicy,
        clock: SharedClock,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Result<Self, AuthError> {
        let dummy_digest = hasher.hash(&random_filler())?;

        Ok(Self {
            store,
            jwt_service,
            lockout,
            hasher,
            clock,
            dummy_digest,
        })
    }

    /// 注册账户
    pub async fn register(&self, req: RegisterRequest) -> Result<AccountResponse, AuthError> {
        validate_email(req.email.trim())?;
        validate_password(&req.password)?;

        if self.store.find_by_email(&req.email).await?.is_some() {
            return Err(AuthError::conflict("Email is already registered"));
        }

        let password_hash = self.hash_password(&req.password).await?;
        let account = Account::new(&req.email, password_hash, self.clock.now());
        let response = AccountResponse {
            id: account.id,
            email: account.email.clone(),
            created_at: account.created_at,
        };

        self.store.insert(account).await?;

        tracing::info!(account_id = %response.id, "Account registered");

        Ok(response)
    }

    /// 用户登录
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AuthError> {
        let account = match self.store.find_by_email(&req.email).await? {
            Some(account) => account,
            None => {
                // 与真实账户耗时一致，防止账户枚举
                self.verify_against_dummy(&req.password).await?;
                tracing::info!("Login failed: unknown account");
                return Err(AuthError::CredentialMismatch);
            }
        };

        // 锁定期间直接拒绝，不做密码校验
        self.ensure_not_locked(&account)?;

        if !self
            .verify_password(&req.password, &account.password_hash)
            .await?
        {
            self.record_failure(&account.id).await?;
            return Err(AuthError::CredentialMismatch);
        }

        // 重置失败次数
        if account.lockout.is_dirty() {
            self.store
                .update_lockout(&account.id, &LockoutState::reset())
                .await?;
        }

        let token_pair = self
            .jwt_service
            .generate_token_pair(&account.id, &account.email)?;

        tracing::info!(account_id = %account.id, "Login succeeded");

        Ok(LoginResponse {
            access_token: token_pair.access_token,
            refresh_token: token_pair.refresh_token,
            token_type: token_pair.token_type,
            expires_in: token_pair.expires_in,
            account: AccountResponse::from(account),
        })
    }

    /// 刷新令牌
    pub async fn refresh_token(&self, req: RefreshTokenRequest) -> Result<TokenPair, AuthError> {
        let claims = self
            .jwt_service
            .validate_refresh_token(&req.refresh_token)?;

        let account = self
            .store
            .find_by_id(&claims.subject_id()?)
            .await?
            .ok_or(AuthError::TokenInvalid)?;

        self.jwt_service
            .generate_token_pair(&account.id, &account.email)
    }

    /// 校验访问令牌
    pub fn authenticate(&self, access_token: &str) -> Result<Claims, AuthError> {
        self.jwt_service.validate_access_token(access_token)
    }

    /// 获取当前账户
    pub async fn get_account(&self, account_id: &Uuid) -> Result<AccountResponse, AuthError> {
        self.store
            .find_by_id(account_id)
            .await?
            .map(AccountResponse::from)
            .ok_or(AuthError::TokenInvalid)
    }

    /// 修改密码
    pub async fn change_password(
        &self,
        account_id: &Uuid,
        req: ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        let account = self
            .store
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::CredentialMismatch)?;

        // 当前密码校验与登录共用失败计数和锁定
        self.ensure_not_locked(&account)?;

        if !self
            .verify_password(&req.current_password, &account.password_hash)
            .await?
        {
            self.record_failure(&account.id).await?;
            return Err(AuthError::CredentialMismatch);
        }

        validate_password(&req.new_password)?;

        let password_hash = self.hash_password(&req.new_password).await?;
        self.store
            .update_password_hash(&account.id, &password_hash, self.clock.now())
            .await?;

        tracing::info!(account_id = %account.id, "Password changed");

        Ok(())
    }

    fn ensure_not_locked(&self, account: &Account) -> Result<(), AuthError> {
        if !self.lockout.is_account_locked(account.lockout.locked_until) {
            return Ok(());
        }

        let retry_after_secs = self
            .lockout
            .retry_after_secs(account.lockout.locked_until)
            .unwrap_or(1);
        tracing::warn!(
            account_id = %account.id,
            retry_after_secs,
            "Request rejected: account locked"
        );
        Err(AuthError::AccountLocked { retry_after_secs })
    }

    /// 记录一次失败，达到阈值时写入锁定时间
    ///
    /// 基于存储中的最新状态原子递增，不使用校验前读到的快照。
    async fn record_failure(&self, account_id: &Uuid) -> Result<(), AuthError> {
        let next = self
            .store
            .record_failed_attempt(account_id, &self.lockout)
            .await?;

        if self.lockout.is_account_locked(next.locked_until) {
            tracing::warn!(
                account_id = %account_id,
                failed_attempts = next.failed_attempts,
                locked_until = ?next.locked_until,
                "Account locked after repeated failures"
            );
        } else {
            tracing::info!(
                account_id = %account_id,
                failed_attempts = next.failed_attempts,
                "Password check failed"
            );
        }

        Ok(())
    }

    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    async fn verify_password(&self, password: &str, digest: &str) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let digest = digest.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| {
                AuthError::Internal(format!("Password verification task failed: {}", e))
            })
    }

    async fn verify_against_dummy(&self, password: &str) -> Result<(), AuthError> {
        self.verify_password(password, &self.dummy_digest).await?;
        Ok(())
    }
}

fn random_filler() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}
