//! 客户端错误类型

use protocol::{ChessError, Move, ProtocolError};
use thiserror::Error;

/// 连接与握手错误
#[derive(Error, Debug)]
pub enum ClientError {
    /// 无法建立连接（拒绝或超时）
    #[error("Connection failed: {0}")]
    Connection(#[source] ProtocolError),

    /// 首行不是 `COLOR:`，或未收到任何行
    #[error("Handshake failed: {reason}")]
    Handshake { reason: String },

    /// 服务端回复 `GAME_FULL`
    #[error("Both seats are taken")]
    SeatUnavailable,

    /// 握手之后的读写错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 尚未连接
    #[error("Not connected")]
    NotConnected,

    /// 已连接服务器，不能开始人机对弈
    #[error("Already connected to a server")]
    AlreadyConnected,

    /// 未启动引擎或引擎已失效
    #[error("Engine is not available")]
    EngineUnavailable,
}

/// 走子状态机拒绝的操作
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    #[error("Not your turn")]
    NotYourTurn,

    /// 未通过本地合法性检查，不会发送
    #[error("Illegal move: {0}")]
    IllegalMove(Move),

    #[error("Game has ended")]
    GameEnded,

    /// 尚未分配阵营
    #[error("No side assigned yet")]
    NoSide,

    /// 收到不该在此时出现的对方走法
    #[error("Move arrived out of sequence")]
    OutOfSequence,
}

/// 终端命令解析错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Command '{command}' needs an argument")]
    MissingArgument { command: &'static str },

    #[error("Invalid argument for '{command}': {value}")]
    InvalidArgument { command: &'static str, value: String },

    #[error("Invalid move: {0}")]
    InvalidMove(#[from] ChessError),
}
