use std::sync::Arc;
use std::time::Duration;

use mesoslog_config::{AppConfig, RetryConfig};
use mesoslog_domain::{LogDecorator, LogKind, SandboxFileReader, SandboxLocation, TaskInstance};
use mesoslog_errors::{MesosLogError, MesosLogResult};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::RetryPolicy;

/// 跟踪任务输出的一项：装饰后的日志块，或重试耗尽后的错误
pub type TailItem = MesosLogResult<String>;

/// 读取失败的旁路通知
pub trait TailObserver: Send + Sync {
    fn on_read_failure(&self, task_id: &str, offset: u64, attempt: u32, error: &MesosLogError);
}

/// 默认观察者，仅记录日志
pub struct TracingObserver;

impl TailObserver for TracingObserver {
    fn on_read_failure(&self, task_id: &str, offset: u64, attempt: u32, error: &MesosLogError) {
        warn!(
            "Read failed for task {} at offset {} (attempt {}): {}",
            task_id, offset, attempt, error
        );
    }
}

#[derive(Debug, Clone)]
pub struct TailSettings {
    pub page_length: usize,
    pub min_content_bytes: usize,
    pub poll_interval: Duration,
    pub channel_capacity: usize,
    pub retry: RetryConfig,
}

impl Default for TailSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl TailSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            page_length: config.tail.page_length,
            min_content_bytes: config.tail.min_content_bytes,
            poll_interval: config.tail.poll_interval(),
            channel_capacity: config.tail.channel_capacity.max(1),
            retry: config.retry.clone(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// 单个跟踪任务独占的读取状态
#[derive(Debug, Clone)]
pub struct TailCursor {
    pub offset: u64,
    pub decorator: LogDecorator,
    pub kind: LogKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// 读到新内容，已装饰
    Emit(String),
    /// 没有新内容，需要等待轮询间隔
    Idle,
}

/// 对单个任务的某个日志文件做分页轮询
pub struct LogTailer {
    task_id: String,
    location: SandboxLocation,
    path: String,
    cursor: TailCursor,
    reader: Arc<dyn SandboxFileReader>,
    settings: TailSettings,
    retry_policy: RetryPolicy,
    observer: Arc<dyn TailObserver>,
}

impl LogTailer {
    /// 任务标识不符合 `<app>.<uuid>-<epoch>` 时返回 `MalformedIdentifier`
    pub fn new(
        task: &TaskInstance,
        location: SandboxLocation,
        kind: LogKind,
        reader: Arc<dyn SandboxFileReader>,
        settings: TailSettings,
    ) -> MesosLogResult<Self> {
        let decorator = LogDecorator::for_task(&task.id)?;
        let path = location.file_path(kind);
        let retry_policy = RetryPolicy::new(settings.retry.clone());

        Ok(Self {
            task_id: task.id.clone(),
            location,
            path,
            cursor: TailCursor {
                offset: 0,
                decorator,
                kind,
            },
            reader,
            settings,
            retry_policy,
            observer: Arc::new(TracingObserver),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn TailObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn cursor(&self) -> &TailCursor {
        &self.cursor
    }

    /// 执行一次分页读取；只有读到足够内容时才推进偏移量
    pub async fn poll_once(&mut self) -> MesosLogResult<PollOutcome> {
        let page = self
            .reader
            .read_page(
                self.location.host(),
                &self.path,
                self.cursor.offset,
                self.settings.page_length,
            )
            .await?;

        if page.data.is_empty() || page.data.len() < self.settings.min_content_bytes {
            return Ok(PollOutcome::Idle);
        }

        // 按原始字节数推进，而不是按解码后的字符或行数
        self.cursor.offset += page.data.len() as u64;
        debug!(
            "Task {} read {} bytes, next offset {}",
            self.task_id,
            page.data.len(),
            self.cursor.offset
        );
        Ok(PollOutcome::Emit(self.cursor.decorator.decorate(&page.data)))
    }

    pub fn spawn(self, cancel: CancellationToken) -> (mpsc::Receiver<TailItem>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(self.settings.channel_capacity.max(1));
        let handle = tokio::spawn(self.run(tx, cancel));
        (rx, handle)
    }

    /// 轮询循环，直到被取消、输出端关闭或重试次数耗尽
    pub async fn run(mut self, tx: mpsc::Sender<TailItem>, cancel: CancellationToken) {
        info!(
            "Tailing {} of task {} on {}",
            self.cursor.kind,
            self.task_id,
            self.location.host()
        );
        let mut failures: u32 = 0;

        loop {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = self.poll_once() => outcome,
            };

            match outcome {
                Ok(PollOutcome::Emit(chunk)) => {
                    failures = 0;
                    if !send_or_cancel(&tx, Ok(chunk), &cancel).await {
                        break;
                    }
                }
                Ok(PollOutcome::Idle) => {
                    failures = 0;
                    if !sleep_or_cancel(self.settings.poll_interval, &cancel).await {
                        break;
                    }
                }
                Err(e) => {
                    failures += 1;
                    self.observer
                        .on_read_failure(&self.task_id, self.cursor.offset, failures, &e);

                    if !e.is_retryable() {
                        error!("Stopped tailing task {}: {}", self.task_id, e);
                        send_or_cancel(&tx, Err(e), &cancel).await;
                        break;
                    }

                    if !self.retry_policy.should_retry(failures) {
                        error!(
                            "Giving up tailing task {} after {} consecutive failures",
                            self.task_id, failures
                        );
                        let err = MesosLogError::transport(format!(
                            "tailing {} failed {} times in a row: {}",
                            self.task_id, failures, e
                        ));
                        send_or_cancel(&tx, Err(err), &cancel).await;
                        break;
                    }

                    let delay = self.retry_policy.delay_for(failures - 1);
                    if !sleep_or_cancel(delay, &cancel).await {
                        break;
                    }
                }
            }
        }

        debug!("Tailer for task {} stopped", self.task_id);
    }
}

/// 返回 false 表示已取消或接收端已关闭
async fn send_or_cancel(
    tx: &mpsc::Sender<TailItem>,
    item: TailItem,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}

async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mesoslog_domain::{NodeRecord, ReadPage};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    /// 按脚本依次返回结果的读取器，脚本耗尽后一直返回空页
    struct ScriptedReader {
        script: Mutex<VecDeque<MesosLogResult<String>>>,
        requests: Mutex<Vec<(String, String, u64, usize, Instant)>>,
    }

    impl ScriptedReader {
        fn new(script: Vec<MesosLogResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn offsets(&self) -> Vec<u64> {
            self.requests.lock().unwrap().iter().map(|r| r.2).collect()
        }
    }

    #[async_trait]
    impl SandboxFileReader for ScriptedReader {
        async fn read_page(
            &self,
            host: &str,
            path: &str,
            offset: u64,
            length: usize,
        ) -> MesosLogResult<ReadPage> {
            self.requests.lock().unwrap().push((
                host.to_string(),
                path.to_string(),
                offset,
                length,
                Instant::now(),
            ));
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(data)) => Ok(ReadPage { offset, data }),
                Some(Err(e)) => Err(e),
                None => Ok(ReadPage {
                    offset,
                    data: String::new(),
                }),
            }
        }

        async fn download(&self, _host: &str, _path: &str) -> MesosLogResult<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        failures: AtomicU32,
    }

    impl TailObserver for CountingObserver {
        fn on_read_failure(&self, _: &str, _: u64, _: u32, _: &MesosLogError) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn task(id: &str) -> TaskInstance {
        TaskInstance {
            id: id.to_string(),
            name: "webapp".to_string(),
            slave_id: "S1".to_string(),
            framework_id: "F1".to_string(),
            executor_id: String::new(),
            state: "TASK_RUNNING".to_string(),
            statuses: vec![],
        }
    }

    fn location() -> SandboxLocation {
        SandboxLocation::new(
            NodeRecord {
                id: "S1".to_string(),
                hostname: "node-1".to_string(),
                pid: "slave(1)@10.0.0.1:5051".to_string(),
            },
            "/sandbox/run-1",
        )
    }

    fn settings() -> TailSettings {
        TailSettings {
            page_length: 5000,
            min_content_bytes: 5,
            poll_interval: Duration::from_millis(50),
            channel_capacity: 1,
            retry: RetryConfig {
                base_interval_ms: 5,
                max_interval_ms: 20,
                backoff_multiplier: 2.0,
                jitter_factor: 0.0,
                max_retries: 2,
            },
        }
    }

    fn tailer(reader: Arc<ScriptedReader>) -> LogTailer {
        LogTailer::new(
            &task("webapp.1234abcd-5678"),
            location(),
            LogKind::Stdout,
            reader,
            settings(),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_malformed_task_id() {
        let reader = ScriptedReader::new(vec![]);
        let result = LogTailer::new(&task("webapp"), location(), LogKind::Stdout, reader, settings());
        assert!(matches!(result, Err(MesosLogError::MalformedIdentifier { .. })));
    }

    #[tokio::test]
    async fn test_poll_advances_offset_by_byte_length() {
        let reader = ScriptedReader::new(vec![
            Ok("line1\nline2\n".to_string()),
            Ok("héllo wörld\n".to_string()),
        ]);
        let mut tailer = tailer(reader.clone());

        let outcome = tailer.poll_once().await.unwrap();
        assert_eq!(
            outcome,
            PollOutcome::Emit("[webapp.1234abcd] line1\n[webapp.1234abcd] line2\n".to_string())
        );
        assert_eq!(tailer.cursor().offset, 12);

        tailer.poll_once().await.unwrap();
        // 多字节字符按字节计数
        assert_eq!(tailer.cursor().offset, 12 + "héllo wörld\n".len() as u64);

        assert_eq!(reader.offsets(), vec![0, 12]);
        let requests = reader.requests.lock().unwrap();
        assert_eq!(requests[0].0, "node-1");
        assert_eq!(requests[0].1, "/sandbox/run-1/stdout");
        assert_eq!(requests[0].3, 5000);
    }

    #[tokio::test]
    async fn test_short_read_does_not_advance() {
        let reader = ScriptedReader::new(vec![Ok("abc\n".to_string())]);
        let mut tailer = tailer(reader.clone());

        assert_eq!(tailer.poll_once().await.unwrap(), PollOutcome::Idle);
        assert_eq!(tailer.cursor().offset, 0);
    }

    #[tokio::test]
    async fn test_empty_page_is_idle_without_min_content() {
        let reader = ScriptedReader::new(vec![Ok(String::new()), Ok("ok\n".to_string())]);
        let mut settings = settings();
        settings.min_content_bytes = 0;
        let mut tailer = LogTailer::new(
            &task("webapp.1234abcd-5678"),
            location(),
            LogKind::Stdout,
            reader.clone(),
            settings,
        )
        .unwrap();

        assert_eq!(tailer.poll_once().await.unwrap(), PollOutcome::Idle);
        assert_eq!(tailer.cursor().offset, 0);
        assert_eq!(
            tailer.poll_once().await.unwrap(),
            PollOutcome::Emit("[webapp.1234abcd] ok\n".to_string())
        );
        assert_eq!(tailer.cursor().offset, 3);
    }

    #[tokio::test]
    async fn test_failed_read_keeps_offset() {
        let reader = ScriptedReader::new(vec![Err(MesosLogError::transport("boom"))]);
        let mut tailer = tailer(reader.clone());

        assert!(tailer.poll_once().await.is_err());
        assert_eq!(tailer.cursor().offset, 0);
    }

    #[tokio::test]
    async fn test_run_emits_and_backs_off_at_same_offset() {
        let reader = ScriptedReader::new(vec![
            Ok("first line\n".to_string()),
            Ok("".to_string()),
            Ok("second line\n".to_string()),
        ]);
        let cancel = CancellationToken::new();
        let (mut rx, handle) = tailer(reader.clone()).spawn(cancel.clone());

        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first, "[webapp.1234abcd] first line\n");
        let second = rx.recv().await.unwrap().unwrap();
        assert_eq!(second, "[webapp.1234abcd] second line\n");

        cancel.cancel();
        handle.await.unwrap();

        let requests = reader.requests.lock().unwrap();
        assert_eq!(requests[0].2, 0);
        assert_eq!(requests[1].2, 11);
        assert_eq!(requests[2].2, 11);
        // 空页之后至少等待一个轮询间隔
        assert!(requests[2].4.duration_since(requests[1].4) >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let reader = ScriptedReader::new(vec![
            Err(MesosLogError::transport("timeout")),
            Err(MesosLogError::transport("timeout")),
            Ok("recovered\n".to_string()),
        ]);
        let observer = Arc::new(CountingObserver::default());
        let cancel = CancellationToken::new();
        let (mut rx, handle) = tailer(reader.clone())
            .with_observer(observer.clone())
            .spawn(cancel.clone());

        let chunk = rx.recv().await.unwrap().unwrap();
        assert_eq!(chunk, "[webapp.1234abcd] recovered\n");
        assert_eq!(observer.failures.load(Ordering::SeqCst), 2);
        assert_eq!(reader.offsets()[..3].to_vec(), vec![0u64, 0, 0]);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_transport_error() {
        let reader = ScriptedReader::new(vec![
            Err(MesosLogError::transport("down")),
            Err(MesosLogError::transport("down")),
            Err(MesosLogError::transport("down")),
        ]);
        let cancel = CancellationToken::new();
        let (mut rx, handle) = tailer(reader.clone()).spawn(cancel);

        let item = rx.recv().await.unwrap();
        assert!(matches!(item, Err(MesosLogError::Transport(_))));
        // 报告错误后该跟踪任务结束
        assert!(rx.recv().await.is_none());
        handle.await.unwrap();
        assert_eq!(reader.offsets().len(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let reader = ScriptedReader::new(vec![
            Err(MesosLogError::Internal("bad request".to_string())),
            Ok("never read\n".to_string()),
        ]);
        let observer = Arc::new(CountingObserver::default());
        let (mut rx, handle) = tailer(reader.clone())
            .with_observer(observer.clone())
            .spawn(CancellationToken::new());

        let item = rx.recv().await.unwrap();
        assert!(matches!(item, Err(MesosLogError::Internal(_))));
        assert!(rx.recv().await.is_none());
        handle.await.unwrap();
        assert_eq!(reader.offsets().len(), 1);
        assert_eq!(observer.failures.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_pages_wait_for_poll_interval() {
        let reader = ScriptedReader::new(vec![]);
        let mut settings = settings();
        settings.min_content_bytes = 0;
        let tailer = LogTailer::new(
            &task("webapp.1234abcd-5678"),
            location(),
            LogKind::Stdout,
            reader.clone(),
            settings,
        )
        .unwrap();

        let cancel = CancellationToken::new();
        let (mut rx, handle) = tailer.spawn(cancel.clone());
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(rx.try_recv().is_err());

        cancel.cancel();
        handle.await.unwrap();
        // 轮询间隔 50ms，120ms 内最多读取 3 次
        assert!(reader.offsets().len() <= 4, "{:?}", reader.offsets().len());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff_sleep() {
        let reader = ScriptedReader::new(vec![]);
        let mut settings = settings();
        settings.poll_interval = Duration::from_secs(3600);
        let tailer = LogTailer::new(
            &task("webapp.1234abcd-5678"),
            location(),
            LogKind::Stderr,
            reader,
            settings,
        )
        .unwrap();

        let cancel = CancellationToken::new();
        let (_rx, handle) = tailer.spawn(cancel.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("tailer should stop promptly")
            .unwrap();
    }

    #[test]
    fn test_settings_from_config() {
        let settings = TailSettings::default().with_poll_interval(Duration::from_secs(2));
        assert_eq!(settings.page_length, 5000);
        assert_eq!(settings.min_content_bytes, 5);
        assert_eq!(settings.poll_interval, Duration::from_secs(2));
        assert_eq!(settings.channel_capacity, 1);
    }
}
