//! 引擎配置

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 引擎进程配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 引擎可执行文件路径（不含路径分隔符时按 PATH 查找）
    pub path: PathBuf,
    /// 置换表大小（MB）
    pub hash_mb: u32,
    /// 搜索线程数
    pub threads: u32,
    /// 发送 quit 后等待进程退出的时间（毫秒）
    pub shutdown_timeout_ms: u64,
    /// 取消搜索后等待 bestmove 的时间（毫秒）
    pub drain_timeout_ms: u64,
}

impl EngineConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("stockfish"),
            hash_mb: 64,
            threads: 1,
            shutdown_timeout_ms: 2000,
            drain_timeout_ms: 2000,
        }
    }
}
