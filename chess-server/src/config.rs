//! 服务器配置
//!
//! 从环境变量读取，缺省值与客户端默认连接的地址一致：
//!
//! - `CHESS_BIND_ADDR` (默认 "0.0.0.0")
//! - `CHESS_PORT`      (默认 8000)

use std::env;
use std::str::FromStr;

use anyhow::Context;
use protocol::DEFAULT_PORT;

/// 服务器配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// 绑定的网卡地址
    pub bind_addr: String,
    /// 监听端口
    pub port: u16,
}

impl ServerConfig {
    /// 从环境变量构造，未设置的项使用默认值
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let bind_addr = env::var("CHESS_BIND_ADDR").unwrap_or(defaults.bind_addr);
        let port = read_env_or_default("CHESS_PORT", defaults.port)?;

        Ok(Self { bind_addr, port })
    }

    /// `addr:port` 形式的监听地址
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

fn read_env_or_default<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .with_context(|| format!("环境变量 {} 的值无效: {:?}", key, val)),
        Err(_) => Ok(default),
    }
}
