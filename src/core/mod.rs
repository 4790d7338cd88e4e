//! 核心编排层：随机延迟、任务状态与忙碌闸门、交易日志、菜单投影、关闭信号、编排管理器

pub mod delay;
pub mod error;
pub mod log_sink;
pub mod menu;
pub mod orchestrator;
pub mod shutdown;
pub mod state;

pub use delay::{DelayRange, WaitOutcome};
pub use error::{RunOutcome, TaskError};
pub use log_sink::{LogEntry, LogSink};
pub use menu::{derive_available_actions, Action};
pub use orchestrator::{create_controller, create_ledger_from_config, Command, Controller};
pub use shutdown::{ShutdownManager, ShutdownReason};
pub use state::{ClaimLock, ExclusionPolicy, ExclusionScope, FamilyState, Lane, TaskBoard, TaskFamily, TaskState};
