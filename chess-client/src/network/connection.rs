//! 网络连接管理
//!
//! 使用 protocol 库的传输层抽象

use std::time::Duration;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use protocol::{
    Connection, Connector, LineReader, LineWriter, Message, Side, TcpConnection, TcpConnector,
};

use crate::error::ClientError;
use crate::event::ClientEvent;

/// 已完成握手的连接端点
pub struct Endpoint {
    side: Side,
    peer_addr: Option<String>,
    writer: LineWriter<OwnedWriteHalf>,
    read_task: JoinHandle<()>,
}

impl Endpoint {
    /// 连接服务器并完成握手，不自动重试
    pub async fn connect(
        addr: &str,
        connect_timeout: Duration,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) -> Result<Self, ClientError> {
        let conn = TcpConnector
            .connect(addr, connect_timeout)
            .await
            .map_err(ClientError::Connection)?;

        tracing::info!("已连接服务器: {}", addr);
        Self::handshake(conn, events).await
    }

    /// 读取首行 `COLOR:`，成功后启动读任务
    ///
    /// 失败时连接随之关闭。
    pub async fn handshake(
        conn: TcpConnection,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) -> Result<Self, ClientError> {
        let peer_addr = conn.peer_addr();
        let (mut reader, writer) = conn.split();

        let first = match reader.read_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                return Err(ClientError::Handshake {
                    reason: "connection closed before handshake".to_string(),
                })
            }
            Err(e) => {
                return Err(ClientError::Handshake {
                    reason: e.to_string(),
                })
            }
        };

        let side = match Message::parse(&first) {
            Ok(Message::Color(side)) => side,
            Ok(Message::GameFull) => return Err(ClientError::SeatUnavailable),
            _ => {
                return Err(ClientError::Handshake {
                    reason: format!("unexpected first line {:?}", first),
                })
            }
        };

        tracing::info!("握手完成，执 {}", side);
        let read_task = tokio::spawn(read_loop(reader, events));

        Ok(Self {
            side,
            peer_addr,
            writer,
            read_task,
        })
    }

    /// 服务端分配的阵营
    pub fn side(&self) -> Side {
        self.side
    }

    pub fn peer_addr(&self) -> Option<&str> {
        self.peer_addr.as_deref()
    }

    /// 发送一条消息；失败只返回给调用方，不影响读任务
    pub async fn send(&mut self, msg: &Message) -> Result<(), ClientError> {
        tracing::debug!("-> {}", msg);
        self.writer.send(msg).await?;
        Ok(())
    }

    /// 关闭连接
    pub async fn close(mut self) {
        let _ = self.writer.shutdown().await;
        self.read_task.abort();
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.read_task.abort();
    }
}

async fn read_loop(mut reader: LineReader<OwnedReadHalf>, events: mpsc::UnboundedSender<ClientEvent>) {
    loop {
        let line = match reader.read_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::info!("服务端关闭了连接");
                break;
            }
            Err(e) => {
                tracing::warn!("读取服务端消息失败: {}", e);
                break;
            }
        };

        tracing::debug!("<- {}", line);
        match Message::parse(&line) {
            Ok(msg) => {
                if events.send(ClientEvent::Server(msg)).is_err() {
                    // 控制器已退出
                    return;
                }
            }
            Err(e) => tracing::warn!("忽略无法解析的消息: {}", e),
        }
    }

    let _ = events.send(ClientEvent::Disconnected);
}
