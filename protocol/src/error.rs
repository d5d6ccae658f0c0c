//! 错误类型定义

use thiserror::Error;

/// 国际象棋规则错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChessError {
    /// 无效的 FEN 字符串
    #[error("Invalid FEN string: {reason}")]
    InvalidFen { reason: String },

    /// 无法解析的走法记号
    #[error("Invalid move token: {token}")]
    InvalidMove { token: String },

    /// 走法在当前局面下不合法
    #[error("Illegal move {token} in position {fen}")]
    IllegalMove { token: String, fen: String },
}

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 单行超长
    #[error("Line too long: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },

    /// 无法识别的消息行
    #[error("Malformed line: {line:?}")]
    Malformed { line: String },

    /// 连接超时
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// 规则错误
    #[error("Chess error: {0}")]
    Chess(#[from] ChessError),
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
