//! 查询取消信号

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// 取消端，可克隆后交给任意任务
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

/// 接收端，传给 [`EngineProcess::run`](crate::EngineProcess::run)
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelHandle {
    /// 创建一对取消端与接收端
    pub fn new() -> (CancelHandle, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx: Arc::new(tx) }, CancelToken { rx })
    }

    /// 发出取消信号（幂等）
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// 在指定时长后取消
    pub fn cancel_after(&self, delay: Duration) -> JoinHandle<()> {
        let tx = Arc::clone(&self.tx);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tx.send_replace(true);
        })
    }
}

impl CancelToken {
    /// 永不触发的接收端
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        CancelToken { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// 等待取消信号；取消端全部丢弃且未取消时永远挂起
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
