//! 随机发送的地址来源
//!
//! 每行一个地址；文件缺失或不可读时返回空列表并写一条警告，由调用方决定是否中止。

use std::path::PathBuf;

use async_trait::async_trait;

use crate::core::log_sink::LogSink;

/// 地址列表来源；每次 Send-Random 运行只加载一次
#[async_trait]
pub trait RecipientSource: Send + Sync {
    async fn load(&self, log: &LogSink) -> Vec<String>;
}

/// 从文本文件读取
pub struct FileRecipients {
    path: PathBuf,
}

impl FileRecipients {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// 按行切分，去掉空白行
pub fn parse_recipients(data: &str) -> Vec<String> {
    data.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl RecipientSource for FileRecipients {
    async fn load(&self, log: &LogSink) -> Vec<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => parse_recipients(&data),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "recipient file unreadable: {}", e);
                log.append(format!("Failed to read {}: {}", self.path.display(), e));
                Vec::new()
            }
        }
    }
}

/// 固定列表（测试与嵌入用）
pub struct StaticRecipients(pub Vec<String>);

#[async_trait]
impl RecipientSource for StaticRecipients {
    async fn load(&self, _log: &LogSink) -> Vec<String> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_blank_lines() {
        let parsed = parse_recipients("0xaaa\n\n  0xbbb  \r\n\n");
        assert_eq!(parsed, vec!["0xaaa", "0xbbb"]);
    }

    #[tokio::test]
    async fn test_file_source_reads_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("randomaddress.txt");
        std::fs::write(&path, "0x01\n0x02\n").unwrap();
        let log = LogSink::default();
        let list = FileRecipients::new(&path).load(&log).await;
        assert_eq!(list, vec!["0x01", "0x02"]);
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let log = LogSink::default();
        let list = FileRecipients::new(dir.path().join("nope.txt")).load(&log).await;
        assert!(list.is_empty());
        assert_eq!(log.len(), 1);
        assert!(log.messages()[0].starts_with("Failed to read"));
    }
}
