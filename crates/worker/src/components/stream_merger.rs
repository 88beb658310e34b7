use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::TailItem;

/// 多个数据源汇合成一个输出流
///
/// 每个数据源对应一个转发任务，输出通道有界，写入方在读取方就绪前阻塞。
/// 数据源之间不保证顺序，同一数据源内保持原有顺序。
pub struct StreamMerger {
    capacity: usize,
    cancel: CancellationToken,
}

impl StreamMerger {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// 数据源生产者应当共用此令牌，以便 `stop()` 一并终止
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn merge<T: Send + 'static>(self, sources: Vec<mpsc::Receiver<T>>) -> MergedStream<T> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let source_count = sources.len();

        let tasks = sources
            .into_iter()
            .map(|source| tokio::spawn(forward(source, tx.clone(), self.cancel.clone())))
            .collect();
        debug!("Merging {} sources", source_count);

        MergedStream {
            rx,
            cancel: self.cancel,
            tasks,
        }
    }
}

async fn forward<T>(mut source: mpsc::Receiver<T>, out: mpsc::Sender<T>, cancel: CancellationToken) {
    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => break,
            item = source.recv() => item,
        };
        let Some(item) = item else {
            break;
        };
        tokio::select! {
            _ = cancel.cancelled() => break,
            sent = out.send(item) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
}

/// 合并后的输出流
///
/// 调用 `stop()` 会取消所有转发任务和已登记的生产者任务，并等待它们结束。
/// 直接 drop 时只发出取消信号，不等待。
pub struct MergedStream<T> {
    rx: mpsc::Receiver<T>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

pub type MergedLogStream = MergedStream<TailItem>;

impl<T> MergedStream<T> {
    /// 登记一个生产者任务，`stop()` 时一并等待
    pub fn track(&mut self, handle: JoinHandle<()>) {
        self.tasks.push(handle);
    }

    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub async fn stop(mut self) {
        self.cancel.cancel();
        self.rx.close();

        let tasks = std::mem::take(&mut self.tasks);
        let total = tasks.len();
        for handle in tasks {
            let _ = handle.await;
        }
        debug!("Merged stream stopped, {} tasks joined", total);
    }
}

impl<T> Stream for MergedStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl<T> Drop for MergedStream<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
