//! AutoSwap - 单账户测试网自动化工具
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排、任务状态与互斥、取消、交易日志、关闭信号
//! - **ledger**: 账本抽象与实现（JSON-RPC / 离线 Mock）
//! - **observability**: tracing 初始化
//! - **recipients**: 批量转账的收款地址来源
//! - **tasks**: 领取水龙头、兑换循环、批量转账三类编排器
//! - **ui**: Ratatui TUI 界面

pub mod config;
pub mod core;
pub mod ledger;
pub mod observability;
pub mod recipients;
pub mod tasks;
pub mod ui;
