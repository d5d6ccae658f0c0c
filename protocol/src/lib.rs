//! 国际象棋联机共享协议库
//!
//! 包含:
//! - 阵营、走法、FEN 局面快照等核心数据结构
//! - 规则引擎接口（合法性判定、终局探测）
//! - 行协议消息定义 (Message)
//! - 传输层抽象 (Connector, Connection, Listener traits)
//! - 行编解码 (LineReader, LineWriter)

mod constants;
mod error;
mod fen;
mod message;
mod moves;
mod piece;
mod rules;
mod transport;

pub use constants::*;
pub use error::{ChessError, ProtocolError, Result};
pub use fen::{Fen, INITIAL_FEN};
pub use message::Message;
pub use moves::Move;
pub use piece::{Promotion, Side};
pub use rules::{PositionProbe, RulesEngine, StandardRules};
pub use shakmaty::Square;
pub use transport::{
    Connection, Connector, LineReader, LineWriter, Listener, TcpConnection, TcpConnector,
    TcpListener,
};
