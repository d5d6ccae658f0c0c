//! UCI 引擎适配器
//!
//! 启动外部引擎子进程（如 Stockfish），完成握手后提供最佳走法与局面评估查询。
//! 查询可通过 [`CancelHandle`] 中止，进程可通过 [`EngineProcess::shutdown`] 回收。

mod cancel;
mod config;
mod error;
mod process;
pub mod uci;

pub use cancel::{CancelHandle, CancelToken};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use process::{EngineProcess, EngineRequest, EngineResponse};
