//! 消息类型定义
//!
//! 线协议为以换行结尾的 UTF-8 文本行：
//!
//! | 消息 | 方向 | 负载 |
//! |---|---|---|
//! | `COLOR:<white\|black>` | 服务端→客户端，握手首行 | 座位颜色 |
//! | `START` | 服务端→客户端 | 无 |
//! | `YOUR_TURN` | 服务端→客户端 | 无 |
//! | `MOVE:<coord4-5>` | 双向 | 坐标走法 |
//! | `CHAT:<text>` | 双向 | 不透明文本 |
//! | `RESET` | 双向 | 无 |
//! | `GAME_FULL` | 服务端→客户端，随后断开 | 无 |
//! | `LOADFEN:<fen>` | 经服务端转发给对方 | 完整局面 |

use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;
use crate::fen::Fen;
use crate::moves::Move;
use crate::piece::Side;

/// 协议消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// 座位颜色（握手）
    Color(Side),
    /// 双方就位，对局开始
    Start,
    /// 轮到你走
    YourTurn,
    /// 走棋
    Move(Move),
    /// 聊天
    Chat(String),
    /// 重新开局
    Reset,
    /// 座位已满
    GameFull,
    /// 加载局面
    LoadFen(Fen),
}

impl Message {
    /// 仅允许服务端发出的消息
    pub fn is_server_only(&self) -> bool {
        matches!(
            self,
            Message::Color(_) | Message::Start | Message::YourTurn | Message::GameFull
        )
    }

    /// 编码为一行（不含换行）
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// 解析一行，末尾的 `\r`/`\n` 会被忽略
    pub fn parse(line: &str) -> Result<Message, ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let malformed = || ProtocolError::Malformed {
            line: line.to_string(),
        };

        match line {
            "START" => return Ok(Message::Start),
            "YOUR_TURN" => return Ok(Message::YourTurn),
            "RESET" => return Ok(Message::Reset),
            "GAME_FULL" => return Ok(Message::GameFull),
            _ => {}
        }

        let (tag, payload) = line.split_once(':').ok_or_else(malformed)?;
        match tag {
            "COLOR" => payload.parse().map(Message::Color).map_err(|_| malformed()),
            "MOVE" => Ok(Message::Move(Move::parse(payload)?)),
            // 聊天内容不做任何处理，原样转发
            "CHAT" => Ok(Message::Chat(payload.to_string())),
            "LOADFEN" => Ok(Message::LoadFen(Fen::parse(payload)?)),
            _ => Err(malformed()),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Color(side) => write!(f, "COLOR:{}", side),
            Message::Start => f.write_str("START"),
            Message::YourTurn => f.write_str("YOUR_TURN"),
            Message::Move(mv) => write!(f, "MOVE:{}", mv.to_wire()),
            Message::Chat(text) => write!(f, "CHAT:{}", text),
            Message::Reset => f.write_str("RESET"),
            Message::GameFull => f.write_str("GAME_FULL"),
            Message::LoadFen(fen) => write!(f, "LOADFEN:{}", fen),
        }
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::parse(s)
    }
}
