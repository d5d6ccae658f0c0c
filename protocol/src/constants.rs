//! 协议常量定义

/// 默认服务端端口
pub const DEFAULT_PORT: u16 = 8000;

/// 单行消息最大长度（字节，含换行）
pub const MAX_LINE_LEN: usize = 4096;

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 五十回合规则：半回合计数上限
pub const FIFTY_MOVE_HALFMOVES: u32 = 100;

/// 重复局面判和所需出现次数
pub const REPETITION_COUNT: usize = 3;
