//! 服务器主逻辑
//!
//! 每个连接一个读任务和一个写任务。读任务解析行协议并交给 [`Session`]，
//! 写任务消费该连接的出站通道。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use protocol::{
    Connection, LineReader, LineWriter, Listener, Message, ProtocolError, Side, TcpConnection,
    TcpListener,
};

use crate::config::ServerConfig;
use crate::session::{ConnId, Session};

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

fn next_conn_id() -> ConnId {
    NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed)
}

/// 按配置绑定地址并运行服务器
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("服务器监听于 {}", listener.local_addr().unwrap_or(addr));

    serve(listener, Arc::new(Session::new())).await;
    Ok(())
}

/// 在已绑定的监听器上接受连接
pub async fn serve(mut listener: TcpListener, session: Arc<Session>) {
    loop {
        let conn = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("接受连接失败: {}", e);
                continue;
            }
        };

        let conn_id = next_conn_id();
        info!(
            "接受连接 {} 来自 {}",
            conn_id,
            conn.peer_addr().unwrap_or_else(|| "?".to_string())
        );

        let session = Arc::clone(&session);
        tokio::spawn(async move {
            handle_connection(conn_id, conn, session).await;
        });
    }
}

async fn handle_connection(conn_id: ConnId, conn: TcpConnection, session: Arc<Session>) {
    let (reader, writer) = conn.split();
    let (tx, rx) = mpsc::unbounded_channel();
    let writer_handle = tokio::spawn(write_loop(conn_id, writer, rx));

    let side = match session.admit(conn_id, tx).await {
        Ok(side) => side,
        Err(e) => {
            // 写任务发出 GAME_FULL 后关闭写端
            debug!("连接 {} 入座失败: {}", conn_id, e);
            let _ = writer_handle.await;
            return;
        }
    };

    if let Err(e) = read_loop(conn_id, side, reader, &session).await {
        warn!("连接 {} 读取失败: {}", conn_id, e);
    }

    // 释放席位后出站通道随之关闭，写任务自行结束
    session.on_disconnect(side, conn_id).await;
    let _ = writer_handle.await;
}

async fn read_loop(
    conn_id: ConnId,
    side: Side,
    mut reader: LineReader<OwnedReadHalf>,
    session: &Session,
) -> Result<(), ProtocolError> {
    while let Some(line) = reader.read_line().await? {
        debug!("<- {} [{}]: {}", side, conn_id, line);

        match Message::parse(&line) {
            Ok(msg) => session.on_message(side, conn_id, msg).await,
            Err(e) => warn!("连接 {} 发来无法解析的消息: {}", conn_id, e),
        }
    }

    debug!("连接 {} 对端关闭", conn_id);
    Ok(())
}

async fn write_loop(
    conn_id: ConnId,
    mut writer: LineWriter<OwnedWriteHalf>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = writer.send(&msg).await {
            warn!("连接 {} 写入失败: {}", conn_id, e);
            break;
        }
    }

    let _ = writer.shutdown().await;
}
