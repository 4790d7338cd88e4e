//! 交易日志：只追加、有界、可观察
//!
//! 每条记录带本地时间戳；超过容量时丢弃最旧的记录。写入后递增 revision 并通过 watch 通知 UI。
//! 同一条消息也会镜像到 tracing，便于写入日志文件。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use tokio::sync::watch;

/// 清空后写入的标记
pub const CLEARED_MARKER: &str = "Transaction logs have been cleared.";

/// 默认保留条数
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// 单条日志（不可变）
#[derive(Clone, Debug)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl LogEntry {
    /// UI 展示格式：`HH:MM:SS  message`
    pub fn render(&self) -> String {
        format!("{}  {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

struct Inner {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Inner {
    fn push(&mut self, message: String) {
        self.entries.push_back(LogEntry {
            timestamp: Local::now(),
            message,
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }
}

/// 共享日志句柄，克隆开销很小
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<Mutex<Inner>>,
    revision: Arc<watch::Sender<u64>>,
}

impl LogSink {
    pub fn new(capacity: usize) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY)),
                capacity: capacity.max(1),
            })),
            revision: Arc::new(revision),
        }
    }

    pub fn append(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(target: "autoswap::log", "{}", message);
        self.lock().push(message);
        self.bump();
    }

    /// 清空全部记录并写入一条清空标记；两步在同一临界区内完成，并发写入只能排在标记之后
    pub fn clear(&self) {
        tracing::info!(target: "autoswap::log", "{}", CLEARED_MARKER);
        {
            let mut inner = self.lock();
            inner.entries.clear();
            inner.push(CLEARED_MARKER.to_string());
        }
        self.bump();
    }

    /// 按插入顺序返回所有记录的拷贝
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lock().entries.iter().map(|e| e.message.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 订阅变更通知（值为单调递增的 revision）
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // 持锁期间不会 panic，中毒时直接取回数据
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}
