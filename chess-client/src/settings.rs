//! 客户端设置
//!
//! 设置以 JSON 形式保存在系统配置目录下，读取失败时回退到默认值。

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use chess_engine::EngineConfig;
use protocol::{CONNECT_TIMEOUT_SECS, DEFAULT_PORT};

/// AI 思考时间预设
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ThinkTime {
    /// 0.5 秒
    HalfSecond,
    /// 1 秒
    #[default]
    OneSecond,
    /// 2 秒
    TwoSeconds,
    /// 3 秒
    ThreeSeconds,
}

impl ThinkTime {
    /// 转换为毫秒
    pub fn to_millis(self) -> u64 {
        match self {
            ThinkTime::HalfSecond => 500,
            ThinkTime::OneSecond => 1000,
            ThinkTime::TwoSeconds => 2000,
            ThinkTime::ThreeSeconds => 3000,
        }
    }

    /// 按秒数匹配预设，如 `0.5`、`2`
    pub fn from_seconds(text: &str) -> Option<ThinkTime> {
        let secs: f64 = text.trim().parse().ok()?;
        ThinkTime::all()
            .iter()
            .copied()
            .find(|t| (t.to_millis() as f64 - secs * 1000.0).abs() < 1.0)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ThinkTime::HalfSecond => "0.5 秒",
            ThinkTime::OneSecond => "1 秒",
            ThinkTime::TwoSeconds => "2 秒",
            ThinkTime::ThreeSeconds => "3 秒",
        }
    }

    /// 所有选项
    pub fn all() -> &'static [ThinkTime] {
        &[
            ThinkTime::HalfSecond,
            ThinkTime::OneSecond,
            ThinkTime::TwoSeconds,
            ThinkTime::ThreeSeconds,
        ]
    }

    /// 下一档，最长之后回到最短
    pub fn next(self) -> Self {
        match self {
            ThinkTime::HalfSecond => ThinkTime::OneSecond,
            ThinkTime::OneSecond => ThinkTime::TwoSeconds,
            ThinkTime::TwoSeconds => ThinkTime::ThreeSeconds,
            ThinkTime::ThreeSeconds => ThinkTime::HalfSecond,
        }
    }
}

/// 客户端设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    // === 网络设置 ===
    /// 默认服务器地址
    pub server_address: String,
    /// 连接超时（秒）
    pub connect_timeout_secs: u64,

    // === 引擎设置 ===
    /// UCI 引擎可执行文件
    pub engine_path: PathBuf,
    /// AI 思考时间
    pub think_time: ThinkTime,
    /// 单次引擎查询上限（秒），超时即取消
    pub ai_timeout_secs: u64,
    /// 引擎哈希表大小（MB）
    pub engine_hash_mb: u32,
    /// 引擎线程数
    pub engine_threads: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_address: format!("127.0.0.1:{}", DEFAULT_PORT),
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,

            engine_path: PathBuf::from("stockfish"),
            think_time: ThinkTime::default(),
            ai_timeout_secs: 10,
            engine_hash_mb: 64,
            engine_threads: 1,
        }
    }
}

impl ClientSettings {
    /// 获取设置文件路径
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push("online-chess");
            path.push("settings.json");
            path
        })
    }

    /// 从默认位置加载设置
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            tracing::warn!("无法获取配置目录，使用默认设置");
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// 从指定文件加载设置，任何失败都回退到默认设置
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("设置文件不存在，使用默认设置");
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => {
                    tracing::info!("已加载设置: {:?}", path);
                    settings
                }
                Err(e) => {
                    tracing::warn!("设置文件格式无效: {}，使用默认设置", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("无法读取设置文件: {}，使用默认设置", e);
                Self::default()
            }
        }
    }

    /// 保存设置到指定文件
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("无法创建配置目录: {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self).context("序列化设置失败")?;
        std::fs::write(path, content)
            .with_context(|| format!("写入设置文件失败: {:?}", path))?;

        tracing::info!("设置已保存: {:?}", path);
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }

    /// 提示查询的搜索深度：思考时间每秒一层，至少 5 层
    pub fn hint_depth(&self) -> u32 {
        hint_depth(self.think_time.to_millis())
    }

    /// 由设置生成引擎配置
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            hash_mb: self.engine_hash_mb,
            threads: self.engine_threads,
            ..EngineConfig::new(self.engine_path.clone())
        }
    }
}

/// 提示查询的搜索深度
pub fn hint_depth(think_ms: u64) -> u32 {
    ((think_ms / 1000) as u32).max(5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_think_time_cycle() {
        // 依次切换四次回到原档
        for &t in ThinkTime::all() {
            assert_eq!(t.next().next().next().next(), t);
        }
        assert_eq!(ThinkTime::OneSecond.next(), ThinkTime::TwoSeconds);
        assert_eq!(ThinkTime::ThreeSeconds.next(), ThinkTime::HalfSecond);
        assert_eq!(ThinkTime::default().to_millis(), 1000);
    }

    #[test]
    fn test_think_time_from_seconds() {
        assert_eq!(ThinkTime::from_seconds("0.5"), Some(ThinkTime::HalfSecond));
        assert_eq!(ThinkTime::from_seconds("1"), Some(ThinkTime::OneSecond));
        assert_eq!(ThinkTime::from_seconds(" 2.0 "), Some(ThinkTime::TwoSeconds));
        assert_eq!(ThinkTime::from_seconds("3"), Some(ThinkTime::ThreeSeconds));
        assert_eq!(ThinkTime::from_seconds("1.5"), None);
        assert_eq!(ThinkTime::from_seconds("fast"), None);
    }

    #[test]
    fn test_hint_depth() {
        assert_eq!(hint_depth(500), 5);
        assert_eq!(hint_depth(3000), 5);
        assert_eq!(hint_depth(8000), 8);
    }

    #[test]
    fn test_defaults() {
        let settings = ClientSettings::default();
        assert_eq!(settings.server_address, "127.0.0.1:8000");
        assert_eq!(settings.connect_timeout(), Duration::from_secs(10));

        let config = settings.engine_config();
        assert_eq!(config.path, PathBuf::from("stockfish"));
        assert_eq!(config.hash_mb, 64);
        assert_eq!(config.threads, 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = ClientSettings {
            server_address: "10.0.0.2:9000".to_string(),
            think_time: ThinkTime::ThreeSeconds,
            ..ClientSettings::default()
        };
        settings.save_to(&path).unwrap();

        assert_eq!(ClientSettings::load_from(&path), settings);
    }

    #[test]
    fn test_invalid_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(ClientSettings::load_from(&path), ClientSettings::default());

        // 缺失字段取默认值
        std::fs::write(&path, r#"{"ai_timeout_secs": 30}"#).unwrap();
        let loaded = ClientSettings::load_from(&path);
        assert_eq!(loaded.ai_timeout_secs, 30);
        assert_eq!(loaded.server_address, "127.0.0.1:8000");
    }
}
