//! 数据库查询网关
//!
//! 单一入口：
//! - `run`（默认）启动工具调用 HTTP 服务
//! - 其余子命令直接操作连接注册表或执行一次查询

mod cli;
mod routes;
mod state;
mod tools;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use common::config::AppConfig;

use cli::{Cli, Command, ServeArgs};
use state::AppState;

const SERVICE_NAME: &str = "db-gateway";

#[tokio::main]
async fn main() -> ExitCode {
    // 日志输出到 stderr，stdout 留给命令结果
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::load_with_service(SERVICE_NAME);
    if let Some(url) = &cli.registry_url {
        config.registry_url = url.clone();
    }

    let state = AppState::open(config).await?;
    match cli.command() {
        Command::Run(args) => serve(state, args).await,
        command => {
            let output = cli::execute(&state, command).await?;
            println!("{}", output);
            Ok(())
        }
    }
}

async fn serve(mut state: AppState, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(host) = args.host {
        state.config.host = host;
    }
    if let Some(port) = args.port {
        state.config.port = port;
    }

    let addr = state.config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(service = SERVICE_NAME, address = %addr, registry = %state.config.registry_url, "Starting tool server");

    axum::serve(listener, routes::create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated unexpectedly")?;
    info!("Tool server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }
}
