//! 登录流程端到端测试
//!
//! 使用可控时钟驱动令牌过期与账户锁定

use auth_core::{
    auth::{lockout::LockoutState, policy::ValidationError, TokenKind},
    clock::Clock,
    error::AuthError,
    models::auth::{ChangePasswordRequest, LoginRequest, RefreshTokenRequest, RegisterRequest},
    store::AccountStore,
};
use chrono::Duration;
use std::sync::Arc;

mod common;
use common::{
    create_test_context, create_test_context_with_hasher, register_test_account, CountingHasher,
    TEST_EMAIL, TEST_PASSWORD,
};

fn login_request(password: &str) -> LoginRequest {
    LoginRequest {
        email: TEST_EMAIL.to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn test_login_issues_tokens_with_expected_lifetimes() {
    let ctx = create_test_context();
    register_test_account(&ctx).await;

    let response = ctx
        .auth_service
        .login(login_request(TEST_PASSWORD))
        .await
        .expect("Login should succeed");

    assert_eq!(response.expires_in, 900);
    assert_eq!(response.account.email, TEST_EMAIL);

    let now = ctx.clock.now().timestamp();
    let access = ctx
        .jwt_service
        .validate_access_token(&response.access_token)
        .unwrap();
    let refresh = ctx
        .jwt_service
        .validate_refresh_token(&response.refresh_token)
        .unwrap();
    assert_eq!(access.exp, now + 15 * 60);
    assert_eq!(refresh.exp, now + 7 * 24 * 60 * 60);

    // 16 分钟后访问令牌过期，刷新令牌仍然有效
    ctx.clock.advance(Duration::minutes(16));

    let err = ctx
        .auth_service
        .authenticate(&response.access_token)
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::TokenExpired {
            kind: TokenKind::Access
        }
    ));
    assert!(!err.requires_reauthentication());

    let pair = ctx
        .auth_service
        .refresh_token(RefreshTokenRequest {
            refresh_token: response.refresh_token,
        })
        .await
        .expect("Refresh should succeed");
    assert!(ctx.auth_service.authenticate(&pair.access_token).is_ok());
}

#[tokio::test]
async fn test_expired_refresh_token_requires_login() {
    let ctx = create_test_context();
    register_test_account(&ctx).await;

    let response = ctx
        .auth_service
        .login(login_request(TEST_PASSWORD))
        .await
        .unwrap();

    ctx.clock.advance(Duration::days(8));

    let err = ctx
        .auth_service
        .refresh_token(RefreshTokenRequest {
            refresh_token: response.refresh_token,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::TokenExpired {
            kind: TokenKind::Refresh
        }
    ));
    assert!(err.requires_reauthentication());
}

#[tokio::test]
async fn test_access_token_cannot_refresh() {
    let ctx = create_test_context();
    register_test_account(&ctx).await;

    let response = ctx
        .auth_service
        .login(login_request(TEST_PASSWORD))
        .await
        .unwrap();

    let result = ctx
        .auth_service
        .refresh_token(RefreshTokenRequest {
            refresh_token: response.access_token,
        })
        .await;
    assert!(matches!(result, Err(AuthError::TokenKindMismatch { .. })));

    assert!(matches!(
        ctx.auth_service.authenticate(&response.refresh_token),
        Err(AuthError::TokenKindMismatch { .. })
    ));
}

#[tokio::test]
async fn test_fifth_failure_locks_account() {
    let ctx = create_test_context();
    let account_id = register_test_account(&ctx).await;

    // 已有 4 次失败
    ctx.store
        .update_lockout(
            &account_id,
            &LockoutState {
                failed_attempts: 4,
                locked_until: None,
            },
        )
        .await
        .unwrap();

    let result = ctx.auth_service.login(login_request("WrongPass1!")).await;
    assert!(matches!(result, Err(AuthError::CredentialMismatch)));

    let account = ctx.store.find_by_id(&account_id).await.unwrap().unwrap();
    assert_eq!(account.lockout.failed_attempts, 5);
    assert_eq!(
        account.lockout.locked_until,
        Some(ctx.clock.now() + Duration::minutes(30))
    );

    // 立即用正确密码重试也被拒绝，且失败计数不变
    match ctx.auth_service.login(login_request(TEST_PASSWORD)).await {
        Err(AuthError::AccountLocked { retry_after_secs }) => {
            assert_eq!(retry_after_secs, 30 * 60);
        }
        other => panic!("expected AccountLocked, got {:?}", other.map(|r| r.account.id)),
    }
    let account = ctx.store.find_by_id(&account_id).await.unwrap().unwrap();
    assert_eq!(account.lockout.failed_attempts, 5);
}

#[tokio::test]
async fn test_locked_login_skips_password_check() {
    let hasher = Arc::new(CountingHasher::default());
    let ctx = create_test_context_with_hasher(hasher.clone());
    let account_id = register_test_account(&ctx).await;

    let locked = LockoutState {
        failed_attempts: 5,
        locked_until: Some(ctx.clock.now() + Duration::minutes(30)),
    };
    ctx.store.update_lockout(&account_id, &locked).await.unwrap();

    let verifications = hasher.verifications();
    for password in [TEST_PASSWORD, "WrongPass1!"] {
        let result = ctx.auth_service.login(login_request(password)).await;
        assert!(matches!(result, Err(AuthError::AccountLocked { .. })));
    }

    // 锁定期间不调用哈希器，状态也不变
    assert_eq!(hasher.verifications(), verifications);
    let account = ctx.store.find_by_id(&account_id).await.unwrap().unwrap();
    assert_eq!(account.lockout, locked);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_wrong_passwords_lock_account() {
    let ctx = create_test_context();
    let account_id = register_test_account(&ctx).await;

    let attempts: Vec<_> = (0..20)
        .map(|_| {
            let service = ctx.auth_service.clone();
            tokio::spawn(async move { service.login(login_request("WrongPass1!")).await })
        })
        .collect();

    for attempt in attempts {
        let result = attempt.await.unwrap();
        assert!(matches!(
            result,
            Err(AuthError::CredentialMismatch) | Err(AuthError::AccountLocked { .. })
        ));
    }

    let account = ctx.store.find_by_id(&account_id).await.unwrap().unwrap();
    assert!(account.lockout.failed_attempts >= 5);
    assert_eq!(
        account.lockout.locked_until,
        Some(ctx.clock.now() + Duration::minutes(30))
    );

    assert!(matches!(
        ctx.auth_service.login(login_request(TEST_PASSWORD)).await,
        Err(AuthError::AccountLocked { .. })
    ));
}

#[tokio::test]
async fn test_failures_below_threshold_do_not_lock() {
    let ctx = create_test_context();
    let account_id = register_test_account(&ctx).await;

    for expected in 1..=4 {
        let result = ctx.auth_service.login(login_request("WrongPass1!")).await;
        assert!(matches!(result, Err(AuthError::CredentialMismatch)));

        let account = ctx.store.find_by_id(&account_id).await.unwrap().unwrap();
        assert_eq!(account.lockout.failed_attempts, expected);
        assert_eq!(account.lockout.locked_until, None);
    }

    // 成功登录重置计数
    ctx.auth_service
        .login(login_request(TEST_PASSWORD))
        .await
        .expect("Login should succeed");
    let account = ctx.store.find_by_id(&account_id).await.unwrap().unwrap();
    assert_eq!(account.lockout, LockoutState::default());
}

#[tokio::test]
async fn test_login_after_lock_expires_resets_state() {
    let ctx = create_test_context();
    let account_id = register_test_account(&ctx).await;

    ctx.store
        .update_lockout(
            &account_id,
            &LockoutState {
                failed_attempts: 5,
                locked_until: Some(ctx.clock.now() + Duration::minutes(30)),
            },
        )
        .await
        .unwrap();

    ctx.clock.advance(Duration::minutes(30));

    ctx.auth_service
        .login(login_request(TEST_PASSWORD))
        .await
        .expect("Login should succeed once the lock has expired");

    let account = ctx.store.find_by_id(&account_id).await.unwrap().unwrap();
    assert_eq!(account.lockout, LockoutState::default());
}

#[tokio::test]
async fn test_unknown_account_is_indistinguishable() {
    let ctx = create_test_context();
    register_test_account(&ctx).await;

    let unknown = ctx
        .auth_service
        .login(LoginRequest {
            email: "nobody@example.com".to_string(),
            password: TEST_PASSWORD.to_string(),
        })
        .await
        .unwrap_err();
    let wrong = ctx
        .auth_service
        .login(login_request("WrongPass1!"))
        .await
        .unwrap_err();

    assert!(matches!(unknown, AuthError::CredentialMismatch));
    assert!(matches!(wrong, AuthError::CredentialMismatch));
    assert_eq!(unknown.user_message(), wrong.user_message());
}

#[tokio::test]
async fn test_unknown_account_uses_prebuilt_dummy_digest() {
    let hasher = Arc::new(CountingHasher::default());
    let ctx = create_test_context_with_hasher(hasher.clone());

    // 假摘要在构造服务时生成
    assert_eq!(hasher.hashes(), 1);

    let result = ctx
        .auth_service
        .login(LoginRequest {
            email: "nobody@example.com".to_string(),
            password: TEST_PASSWORD.to_string(),
        })
        .await;
    assert!(matches!(result, Err(AuthError::CredentialMismatch)));

    assert_eq!(hasher.hashes(), 1);
    assert_eq!(hasher.verifications(), 1);
}

#[tokio::test]
async fn test_register_validation() {
    let ctx = create_test_context();

    let weak = ctx
        .auth_service
        .register(RegisterRequest {
            email: TEST_EMAIL.to_string(),
            password: "abcdefgh".to_string(),
        })
        .await;
    assert!(matches!(
        weak,
        Err(AuthError::Validation(
            ValidationError::PasswordMissingUppercase
        ))
    ));

    let bad_email = ctx
        .auth_service
        .register(RegisterRequest {
            email: "not-an-email".to_string(),
            password: TEST_PASSWORD.to_string(),
        })
        .await;
    assert!(matches!(
        bad_email,
        Err(AuthError::Validation(ValidationError::EmailInvalidFormat))
    ));

    register_test_account(&ctx).await;
    let duplicate = ctx
        .auth_service
        .register(RegisterRequest {
            email: TEST_EMAIL.to_uppercase(),
            password: TEST_PASSWORD.to_string(),
        })
        .await;
    assert!(matches!(duplicate, Err(AuthError::Conflict(_))));
}

#[tokio::test]
async fn test_change_password() {
    let ctx = create_test_context();
    let account_id = register_test_account(&ctx).await;
    let new_password = "N3w-Password";

    let wrong_current = ctx
        .auth_service
        .change_password(
            &account_id,
            ChangePasswordRequest {
                current_password: "WrongPass1!".to_string(),
                new_password: new_password.to_string(),
            },
        )
        .await;
    assert!(matches!(wrong_current, Err(AuthError::CredentialMismatch)));

    let weak_new = ctx
        .auth_service
        .change_password(
            &account_id,
            ChangePasswordRequest {
                current_password: TEST_PASSWORD.to_string(),
                new_password: "short".to_string(),
            },
        )
        .await;
    assert!(matches!(
        weak_new,
        Err(AuthError::Validation(ValidationError::PasswordTooShort))
    ));

    ctx.auth_service
        .change_password(
            &account_id,
            ChangePasswordRequest {
                current_password: TEST_PASSWORD.to_string(),
                new_password: new_password.to_string(),
            },
        )
        .await
        .expect("Password change should succeed");

    assert!(ctx
        .auth_service
        .login(login_request(TEST_PASSWORD))
        .await
        .is_err());
    assert!(ctx
        .auth_service
        .login(login_request(new_password))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_change_password_failures_lock_account() {
    let ctx = create_test_context();
    let account_id = register_test_account(&ctx).await;

    let change = |current: &str| ChangePasswordRequest {
        current_password: current.to_string(),
        new_password: "N3w-Password".to_string(),
    };

    for _ in 0..5 {
        let result = ctx
            .auth_service
            .change_password(&account_id, change("WrongPass1!"))
            .await;
        assert!(matches!(result, Err(AuthError::CredentialMismatch)));
    }

    let account = ctx.store.find_by_id(&account_id).await.unwrap().unwrap();
    assert_eq!(account.lockout.failed_attempts, 5);

    // 锁定后正确的当前密码也被拒绝，登录同样被锁
    let result = ctx
        .auth_service
        .change_password(&account_id, change(TEST_PASSWORD))
        .await;
    assert!(matches!(result, Err(AuthError::AccountLocked { .. })));
    assert!(matches!(
        ctx.auth_service.login(login_request(TEST_PASSWORD)).await,
        Err(AuthError::AccountLocked { .. })
    ));
}
