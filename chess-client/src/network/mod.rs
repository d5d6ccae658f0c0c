//! 网络通信模块
//!
//! 握手完成后由独立的读任务把服务端消息转成 [`ClientEvent`](crate::ClientEvent)。

mod connection;

pub use connection::*;
