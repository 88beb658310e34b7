use std::fmt;

use serde::{Deserialize, Serialize};

use mesoslog_errors::{MesosLogError, MesosLogResult};

/// 沙箱中的日志文件种类
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Stdout,
    Stderr,
}

impl LogKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            LogKind::Stdout => "stdout",
            LogKind::Stderr => "stderr",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// 任务实例的选择策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// 只在已完成的任务中查找
    pub include_completed: bool,
    /// 只保留最新的一个实例
    pub latest_only: bool,
}

impl ResolveOptions {
    pub fn completed() -> Self {
        Self {
            include_completed: true,
            ..Self::default()
        }
    }

    pub fn latest(mut self) -> Self {
        self.latest_only = true;
        self
    }
}

/// 节点进程定位串 `<service-name>@<host>:<port>` 的解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessLocator {
    pub service_name: String,
    pub host: String,
    pub port: u16,
}

impl ProcessLocator {
    pub const DEFAULT_PORT: u16 = 80;

    pub fn parse(pid: &str) -> MesosLogResult<Self> {
        let (service_name, address) = pid
            .split_once('@')
            .ok_or_else(|| MesosLogError::malformed_address(pid))?;

        let mut parts = address.split(':');
        let host = parts.next().unwrap_or_default().to_string();
        let port = match parts.next() {
            Some(port) => port
                .parse::<u16>()
                .map_err(|_| MesosLogError::malformed_address(pid))?,
            None => Self::DEFAULT_PORT,
        };

        Ok(Self {
            service_name: service_name.to_string(),
            host,
            port,
        })
    }

    /// 节点状态地址使用节点记录中的 hostname，端口和服务名取自定位串
    pub fn state_url(&self, hostname: &str) -> String {
        format!(
            "http://{}:{}/{}/state.json",
            hostname, self.port, self.service_name
        )
    }
}

/// 日志行前缀装饰器
///
/// 任务标识须符合 `<app-name>.<uuid>-<epoch>` 的格式，前缀取
/// `<app-name>.<uuid 中第一个 '-' 之前的部分>`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDecorator {
    prefix: String,
}

impl LogDecorator {
    pub fn for_task(task_id: &str) -> MesosLogResult<Self> {
        let (app, instance) = task_id
            .split_once('.')
            .ok_or_else(|| MesosLogError::malformed_identifier(task_id))?;
        let (short, _) = instance
            .split_once('-')
            .ok_or_else(|| MesosLogError::malformed_identifier(task_id))?;

        Ok(Self {
            prefix: format!("{app}.{short}"),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 为每个非空行加上 `[prefix] ` 前缀，空行被丢弃
    pub fn decorate(&self, data: &str) -> String {
        let mut out = String::with_capacity(data.len() + 32);
        for line in data.split('\n').filter(|l| !l.is_empty()) {
            out.push('[');
            out.push_str(&self.prefix);
            out.push_str("] ");
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}
