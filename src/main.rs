//! 认证服务主入口

use auth_core::{
    auth::{jwt::JwtService, lockout::LockoutPolicy},
    clock::{SharedClock, SystemClock},
    config::AppConfig,
    handlers::health,
    middleware::AppState,
    routes,
    services::AuthService,
    store::InMemoryAccountStore,
    telemetry,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("auth-core {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("未知参数: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    // 加载 .env 文件（开发环境）
    // 生产环境应该直接设置环境变量，不依赖 .env 文件
    if let Ok(path) = std::env::var("AUTH_ENV") {
        dotenv::from_filename(format!(".env.{}", path)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志
    telemetry::init_telemetry(&config)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Auth core starting...");

    // 3. 构建服务（签名密钥在此处一次性注入，之后只读共享）
    let clock: SharedClock = Arc::new(SystemClock);
    let jwt_service = Arc::new(JwtService::from_config(&config, clock.clone())?);
    if jwt_service.uses_ephemeral_secret() {
        tracing::warn!("Running with an ephemeral JWT secret: this is a deployment misconfiguration");
    }

    let auth_service = Arc::new(AuthService::new(
        Arc::new(InMemoryAccountStore::new()),
        jwt_service.clone(),
        LockoutPolicy::from_config(&config, clock.clone()),
        clock,
    )?);

    let app_state = Arc::new(AppState {
        config: config.clone(),
        auth_service,
        jwt_service,
    });

    // 4. 构建路由
    let app = routes::create_router(app_state);

    // 5. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    // 6. 优雅关闭
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.graceful_shutdown_timeout_secs))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }

    // 超时后强制退出
    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(timeout_secs)).await;
        tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        std::process::exit(1);
    });
}

/// 打印帮助信息
fn print_help() {
    println!("auth-core {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: auth-core [选项]");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 AUTH_ 前缀的环境变量完成，例如:");
    println!("  AUTH_SECURITY__JWT_SECRET      令牌签名密钥（至少 32 字符）");
    println!("  AUTH_SERVER__ADDR              监听地址，默认 0.0.0.0:3000");
    println!("  AUTH_LOGGING__LEVEL            日志级别，默认 info");
}
