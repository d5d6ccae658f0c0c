//! 引擎错误类型

use thiserror::Error;

/// 引擎适配器错误
#[derive(Error, Debug)]
pub enum EngineError {
    /// 可执行文件不存在或进程启动失败
    #[error("Engine unavailable at {path}: {source}")]
    Unavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 输出流结束前没有等到预期应答
    #[error("Engine never answered '{expected}'")]
    Protocol { expected: String },

    /// 与引擎进程通信的 IO 错误
    #[error("Engine IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 查询被调用方取消
    #[error("Engine query cancelled")]
    Cancelled,

    /// 引擎进程已退出
    #[error("Engine process exited")]
    Exited,

    /// 引擎与适配器状态失去同步，无法继续查询
    #[error("Engine is out of sync after an aborted search")]
    Desynced,
}

/// 引擎操作结果类型
pub type Result<T> = std::result::Result<T, EngineError>;
