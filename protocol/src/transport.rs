//! 传输层抽象
//!
//! 提供 Connector/Connection/Listener traits 使上层协议与具体传输实现解耦。
//! 线协议为换行分隔的文本行，由 [`LineReader`]/[`LineWriter`] 负责编解码。

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{ProtocolError, Result};
use crate::message::Message;
use crate::MAX_LINE_LEN;

/// 连接抽象 trait（核心抽象，用于业务层）
#[async_trait]
pub trait Connection: Send + Sync {
    /// 发送消息
    async fn send(&mut self, msg: &Message) -> Result<()>;

    /// 接收消息，对端关闭时返回 `None`
    async fn recv(&mut self) -> Result<Option<Message>>;

    /// 关闭连接
    async fn close(&mut self) -> Result<()>;

    /// 获取远端地址
    fn peer_addr(&self) -> Option<String>;
}

/// 连接器 trait（客户端使用）
#[async_trait]
pub trait Connector: Send + Sync {
    type Conn: Connection;

    /// 建立连接，超时返回 [`ProtocolError::ConnectionTimeout`]
    async fn connect(&self, addr: &str, connect_timeout: Duration) -> Result<Self::Conn>;
}

/// 监听器 trait（服务端使用）
#[async_trait]
pub trait Listener: Send + Sync + Sized {
    type Conn: Connection;

    /// 绑定地址
    async fn bind(addr: &str) -> Result<Self>;

    /// 接受连接
    async fn accept(&mut self) -> Result<Self::Conn>;

    /// 获取本地地址
    fn local_addr(&self) -> Option<String>;
}

// ============================================================================
// TCP 实现
// ============================================================================

/// TCP 连接器
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Conn = TcpConnection;

    async fn connect(&self, addr: &str, connect_timeout: Duration) -> Result<Self::Conn> {
        let stream = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ProtocolError::ConnectionTimeout)?
            .map_err(ProtocolError::Io)?;

        tracing::debug!("已连接 {}", addr);
        TcpConnection::from_stream(stream)
    }
}

/// TCP 连接
pub struct TcpConnection {
    reader: LineReader<OwnedReadHalf>,
    writer: LineWriter<OwnedWriteHalf>,
    peer_addr: Option<String>,
}

impl TcpConnection {
    /// 从 TcpStream 创建（服务端使用）
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr().ok().map(|a| a.to_string());
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: LineReader::new(read_half),
            writer: LineWriter::new(write_half),
            peer_addr,
        })
    }

    /// 分离读写端
    pub fn split(self) -> (LineReader<OwnedReadHalf>, LineWriter<OwnedWriteHalf>) {
        (self.reader, self.writer)
    }
}

#[async_trait]
impl Connection for TcpConnection {
    async fn send(&mut self, msg: &Message) -> Result<()> {
        self.writer.send(msg).await
    }

    async fn recv(&mut self) -> Result<Option<Message>> {
        self.reader.recv().await
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await
    }

    fn peer_addr(&self) -> Option<String> {
        self.peer_addr.clone()
    }
}

/// TCP 监听器
pub struct TcpListener {
    listener: tokio::net::TcpListener,
}

#[async_trait]
impl Listener for TcpListener {
    type Conn = TcpConnection;

    async fn bind(addr: &str) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(ProtocolError::Io)?;
        tracing::debug!("已绑定 {}", addr);
        Ok(Self { listener })
    }

    async fn accept(&mut self) -> Result<Self::Conn> {
        let (stream, addr) = self.listener.accept().await.map_err(ProtocolError::Io)?;
        tracing::debug!("接受连接: {}", addr);
        TcpConnection::from_stream(stream)
    }

    fn local_addr(&self) -> Option<String> {
        self.listener.local_addr().ok().map(|a| a.to_string())
    }
}

// ============================================================================
// 行编解码
// ============================================================================

/// 行读取器
pub struct LineReader<R> {
    reader: BufReader<R>,
    buffer: String,
}

impl<R: AsyncRead + Unpin + Send> LineReader<R> {
    /// 创建新的行读取器
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buffer: String::with_capacity(256),
        }
    }

    /// 读取一行（去掉行尾），对端关闭时返回 `None`
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        self.buffer.clear();

        let limit = (MAX_LINE_LEN + 1) as u64;
        let n = (&mut self.reader)
            .take(limit)
            .read_line(&mut self.buffer)
            .await?;

        if n == 0 {
            return Ok(None);
        }

        if !self.buffer.ends_with('\n') && n > MAX_LINE_LEN {
            tracing::warn!("收到超长的行（>{} 字节）", MAX_LINE_LEN);
            return Err(ProtocolError::LineTooLong {
                size: n,
                max: MAX_LINE_LEN,
            });
        }

        let line = self.buffer.trim_end_matches(['\r', '\n']);
        Ok(Some(line.to_string()))
    }

    /// 读取并解析一条消息，对端关闭时返回 `None`
    pub async fn recv(&mut self) -> Result<Option<Message>> {
        match self.read_line().await? {
            Some(line) => Message::parse(&line).map(Some),
            None => Ok(None),
        }
    }
}

/// 行写入器
pub struct LineWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> LineWriter<W> {
    /// 创建新的行写入器
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// 写入一行并刷新；内容中不能有换行符，否则一条消息会变成多行
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        if line.contains(['\r', '\n']) {
            tracing::warn!("拒绝发送含换行符的消息: {:?}", line);
            return Err(ProtocolError::Malformed {
                line: line.to_string(),
            });
        }
        if line.len() + 1 > MAX_LINE_LEN {
            return Err(ProtocolError::LineTooLong {
                size: line.len() + 1,
                max: MAX_LINE_LEN,
            });
        }

        let mut data = String::with_capacity(line.len() + 1);
        data.push_str(line);
        data.push('\n');

        self.writer.write_all(data.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// 编码并发送一条消息
    pub async fn send(&mut self, msg: &Message) -> Result<()> {
        self.write_line(&msg.encode()).await
    }

    /// 关闭写端
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::Side;

    #[tokio::test]
    async fn test_tcp_connection() {
        // 启动监听
        let mut listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // 客户端连接
        let client_handle = tokio::spawn(async move {
            let connector = TcpConnector;
            let mut conn = connector
                .connect(&addr, Duration::from_secs(2))
                .await
                .unwrap();

            // 接收握手
            let msg = conn.recv().await.unwrap();
            assert_eq!(msg, Some(Message::Color(Side::White)));

            conn.send(&Message::Chat("hello".to_string())).await.unwrap();
        });

        // 服务端接受连接
        let mut conn = listener.accept().await.unwrap();
        conn.send(&Message::Color(Side::White)).await.unwrap();

        let msg = conn.recv().await.unwrap();
        assert_eq!(msg, Some(Message::Chat("hello".to_string())));

        client_handle.await.unwrap();

        // 对端关闭后读到流结束
        assert_eq!(conn.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_line_too_long() {
        let data = vec![b'x'; MAX_LINE_LEN + 10];
        let mut reader = LineReader::new(&data[..]);
        assert!(matches!(
            reader.read_line().await,
            Err(ProtocolError::LineTooLong { .. })
        ));
    }

    #[tokio::test]
    async fn test_crlf_lines() {
        let data = b"START\r\nYOUR_TURN\n";
        let mut reader = LineReader::new(&data[..]);
        assert_eq!(reader.recv().await.unwrap(), Some(Message::Start));
        assert_eq!(reader.recv().await.unwrap(), Some(Message::YourTurn));
        assert_eq!(reader.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_embedded_newline_rejected() {
        let mut buf = Vec::new();
        let mut writer = LineWriter::new(&mut buf);

        let msg = Message::Chat("hi\nMOVE:E2E4".to_string());
        assert!(matches!(
            writer.send(&msg).await,
            Err(ProtocolError::Malformed { .. })
        ));
        assert!(writer
            .send(&Message::Chat("a\rb".to_string()))
            .await
            .is_err());
        writer.send(&Message::Chat("ok".to_string())).await.unwrap();

        // 被拒绝的消息一个字节也没有写出
        assert_eq!(buf, b"CHAT:ok\n");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // 先占用端口再释放，确保无人监听
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = TcpConnector.connect(&addr, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(ProtocolError::Io(_))));
    }
}
