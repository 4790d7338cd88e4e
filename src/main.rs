//! AutoSwap - 单账户测试网自动化工具
//!
//! 入口：加载配置、初始化日志、创建编排器与 TUI，并运行主循环直到退出或收到信号。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use autoswap::{
    config::{load_config, AppConfig},
    core::{create_controller, shutdown::run_until_shutdown, ShutdownManager},
    observability,
    ui::run_app,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var_os("AUTOSWAP_CONFIG").map(PathBuf::from);
    let (cfg, config_err) = match load_config(config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    // TUI 占用终端，日志写入文件
    observability::init(&cfg.log.file).context("Failed to initialize logging")?;
    if let Some(e) = config_err {
        tracing::warn!("Failed to load config, using defaults: {}", e);
    }

    let shutdown = Arc::new(ShutdownManager::new());
    let (cmd_tx, controller) =
        create_controller(cfg, shutdown.token()).context("Failed to create controller")?;

    // 启动时先拉一次余额
    let _ = controller.refresh();

    let outcome = run_until_shutdown(Arc::clone(&shutdown), run_app(controller, cmd_tx)).await;
    match outcome {
        Some(result) => result.context("App run failed")?,
        None => tracing::info!(reason = ?shutdown.reason(), "exited on shutdown signal"),
    }
    Ok(())
}
