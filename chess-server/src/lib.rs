//! 国际象棋联机服务端
//!
//! 包含:
//! - 双席位对局会话（入座、开局、走法与聊天转发、重开、断线）
//! - TCP 接入与每连接读写任务
//! - 环境变量配置

pub mod config;
pub mod server;
pub mod session;

pub use config::ServerConfig;
pub use server::{run, serve};
pub use session::{AdmitError, ConnId, Session, SessionPhase, SessionSnapshot};
