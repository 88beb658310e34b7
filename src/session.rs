use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mesoslog_config::{AppConfig, ConfigValidator};
use mesoslog_domain::{
    ClusterStateSource, LogKind, LogOutput, MasterState, ResolveOptions, SandboxFileReader,
    SandboxLocation, SandboxLocator, TaskInstance, TaskResolver,
};
use mesoslog_errors::{MesosLogError, MesosLogResult};
use mesoslog_infrastructure::MesosHttpClient;
use mesoslog_worker::{LogTailer, MergedLogStream, StreamMerger, TailSettings};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// 一次集群会话：持有已解析的 leading master 及其最近一次状态快照
///
/// 所有查询都基于该快照；需要最新状态时显式调用 [`MesosSession::refresh`]。
pub struct MesosSession {
    config: AppConfig,
    state_source: Arc<dyn ClusterStateSource>,
    file_reader: Arc<dyn SandboxFileReader>,
    master_url: String,
    state: MasterState,
}

impl MesosSession {
    pub async fn connect(config: AppConfig) -> MesosLogResult<Self> {
        validate_config(&config)?;
        let client = Arc::new(MesosHttpClient::from_config(&config)?);
        Self::with_clients(config, client.clone(), client).await
    }

    pub async fn with_clients(
        config: AppConfig,
        state_source: Arc<dyn ClusterStateSource>,
        file_reader: Arc<dyn SandboxFileReader>,
    ) -> MesosLogResult<Self> {
        validate_config(&config)?;
        let (master_url, state) = fetch_cluster_state(&config, state_source.as_ref()).await?;
        Ok(Self {
            config,
            state_source,
            file_reader,
            master_url,
            state,
        })
    }

    /// 重新解析 leading master 并拉取状态
    pub async fn refresh(&mut self) -> MesosLogResult<()> {
        let (master_url, state) =
            fetch_cluster_state(&self.config, self.state_source.as_ref()).await?;
        self.master_url = master_url;
        self.state = state;
        Ok(())
    }

    pub fn master_url(&self) -> &str {
        &self.master_url
    }

    pub fn state(&self) -> &MasterState {
        &self.state
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 集群中没有任何任务时返回 `NotFound`
    pub fn list_application_names(&self) -> MesosLogResult<BTreeMap<String, usize>> {
        let apps = TaskResolver::new(&self.state).application_counts();
        if apps.is_empty() {
            return Err(MesosLogError::not_found("*"));
        }
        Ok(apps)
    }

    pub fn resolve_instances(
        &self,
        identifier: &str,
        options: ResolveOptions,
    ) -> MesosLogResult<Vec<TaskInstance>> {
        TaskResolver::new(&self.state).resolve(identifier, options)
    }

    pub fn app_name_for_task_id(
        &self,
        task_id: &str,
        include_completed: bool,
    ) -> MesosLogResult<String> {
        TaskResolver::new(&self.state).app_name_for_task_id(task_id, include_completed)
    }

    /// 跟踪所有运行中实例的日志并合并输出
    pub async fn tail_merged(
        &self,
        identifier: &str,
        kind: LogKind,
        poll_interval: Duration,
    ) -> MesosLogResult<MergedLogStream> {
        self.tail_merged_with(identifier, kind, poll_interval, ResolveOptions::default())
            .await
    }

    /// 解析阶段任何一步失败都直接返回，此时不会启动任何跟踪任务
    pub async fn tail_merged_with(
        &self,
        identifier: &str,
        kind: LogKind,
        poll_interval: Duration,
        options: ResolveOptions,
    ) -> MesosLogResult<MergedLogStream> {
        let located = self.locate_all(identifier, options).await?;
        let settings = TailSettings::from_config(&self.config).with_poll_interval(poll_interval);

        let tailers = located
            .iter()
            .map(|(task, location)| {
                LogTailer::new(
                    task,
                    location.clone(),
                    kind,
                    Arc::clone(&self.file_reader),
                    settings.clone(),
                )
            })
            .collect::<MesosLogResult<Vec<_>>>()?;

        let merger = StreamMerger::new(self.config.tail.channel_capacity);
        let cancel = merger.token();
        let (sources, handles): (Vec<_>, Vec<_>) = tailers
            .into_iter()
            .map(|tailer| tailer.spawn(cancel.clone()))
            .unzip();

        info!(
            "Tailing {} of {} instance(s) of {}",
            kind,
            sources.len(),
            identifier
        );
        let mut merged = merger.merge(sources);
        for handle in handles {
            merged.track(handle);
        }
        Ok(merged)
    }

    /// 一次性下载每个匹配实例的完整日志文件
    pub async fn fetch_logs(
        &self,
        identifier: &str,
        kind: LogKind,
        options: ResolveOptions,
    ) -> MesosLogResult<Vec<LogOutput>> {
        let located = self.locate_all(identifier, options).await?;

        let mut outputs = Vec::with_capacity(located.len());
        for (task, location) in located {
            let content = self
                .file_reader
                .download(location.host(), &location.file_path(kind))
                .await?;
            debug!("Downloaded {} bytes of {} for {}", content.len(), kind, task.id);
            outputs.push(LogOutput {
                task_id: task.id,
                app_id: identifier.to_string(),
                content,
            });
        }
        Ok(outputs)
    }

    async fn locate_all(
        &self,
        identifier: &str,
        options: ResolveOptions,
    ) -> MesosLogResult<Vec<(TaskInstance, SandboxLocation)>> {
        let tasks = self.resolve_instances(identifier, options)?;
        let locator = SandboxLocator::new(Arc::clone(&self.state_source));

        let mut located = Vec::with_capacity(tasks.len());
        for task in tasks {
            let location = locator
                .locate(&self.state, &task, options.include_completed)
                .await?;
            debug!("Task {} sandbox at {}:{}", task.id, location.host(), location.directory);
            located.push((task, location));
        }
        Ok(located)
    }
}

fn validate_config(config: &AppConfig) -> MesosLogResult<()> {
    config
        .validate()
        .map_err(|e| MesosLogError::config_error(e.to_string()))
}

async fn fetch_cluster_state(
    config: &AppConfig,
    source: &dyn ClusterStateSource,
) -> MesosLogResult<(String, MasterState)> {
    let master_url = source
        .resolve_leader(&config.master.host, config.master.port)
        .await?;
    let state = source.master_state(&master_url).await?;
    info!(
        "Loaded state from {}: {} frameworks, {} nodes",
        master_url,
        state.frameworks.len(),
        state.slaves.len()
    );
    Ok((master_url, state))
}

/// 将下载的日志写入 `<dir>/<task_id>_<kind>.txt`
pub async fn write_logs(
    outputs: &[LogOutput],
    dir: &Path,
    kind: LogKind,
) -> MesosLogResult<Vec<PathBuf>> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(dir).await?;

    let mut paths = Vec::with_capacity(outputs.len());
    for output in outputs {
        let path = dir.join(format!("{}_{}.txt", output.task_id, kind));
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&path).await?;
        file.write_all(&output.content).await?;
        file.flush().await?;
        paths.push(path);
    }
    Ok(paths)
}
