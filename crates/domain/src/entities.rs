use serde::{Deserialize, Serialize};

use crate::value_objects::LogKind;

/// 任务状态记录，按照上游状态流的插入顺序排列
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskStatus {
    #[serde(default)]
    pub state: String,
    pub timestamp: f64,
}

/// 集群中的一个任务实例（运行中或已完成）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskInstance {
    pub id: String,
    pub name: String,
    pub slave_id: String,
    pub framework_id: String,
    #[serde(default)]
    pub executor_id: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub statuses: Vec<TaskStatus>,
}

impl TaskInstance {
    /// 最新状态是状态序列的最后一个元素
    pub fn latest_status(&self) -> Option<&TaskStatus> {
        self.statuses.last()
    }

    pub fn latest_timestamp(&self) -> Option<f64> {
        self.latest_status().map(|s| s.timestamp)
    }

    pub fn matches(&self, identifier: &str) -> bool {
        self.id == identifier || self.name == identifier
    }
}

/// Mesos 节点（agent/slave）记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeRecord {
    pub id: String,
    pub hostname: String,
    /// 进程定位串，形如 `slave(1)@10.0.0.1:5051`
    pub pid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutorRecord {
    pub id: String,
    #[serde(default)]
    pub directory: String,
}

/// 框架记录，master 状态和节点状态共用同一结构
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FrameworkRecord {
    pub id: String,
    #[serde(default)]
    pub tasks: Vec<TaskInstance>,
    #[serde(default)]
    pub completed_tasks: Vec<TaskInstance>,
    #[serde(default)]
    pub executors: Vec<ExecutorRecord>,
    #[serde(default)]
    pub completed_executors: Vec<ExecutorRecord>,
}

impl FrameworkRecord {
    pub fn executors_for(&self, completed: bool) -> &[ExecutorRecord] {
        if completed {
            &self.completed_executors
        } else {
            &self.executors
        }
    }
}

/// master 的完整状态快照
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MasterState {
    #[serde(default)]
    pub frameworks: Vec<FrameworkRecord>,
    #[serde(default, alias = "agents")]
    pub slaves: Vec<NodeRecord>,
}

impl MasterState {
    pub fn find_node(&self, node_id: &str) -> Option<&NodeRecord> {
        self.slaves.iter().find(|slave| slave.id == node_id)
    }

    pub fn task_count(&self) -> usize {
        self.frameworks.iter().map(|f| f.tasks.len()).sum()
    }
}

/// 单个节点自身的状态文档
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeState {
    #[serde(default)]
    pub frameworks: Vec<FrameworkRecord>,
}

/// 已解析的沙箱位置：节点 + 沙箱目录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxLocation {
    pub node: NodeRecord,
    pub directory: String,
}

impl SandboxLocation {
    pub fn new(node: NodeRecord, directory: impl Into<String>) -> Self {
        Self {
            node,
            directory: directory.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.node.hostname
    }

    pub fn file_path(&self, kind: LogKind) -> String {
        format!("{}/{}", self.directory, kind.file_name())
    }
}

/// `files/read.json` 的一页数据
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadPage {
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub data: String,
}

/// 按运行中/已完成划分的匹配结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskMatches {
    pub active: Vec<TaskInstance>,
    pub completed: Vec<TaskInstance>,
}

impl TaskMatches {
    pub fn group(&self, completed: bool) -> &[TaskInstance] {
        if completed {
            &self.completed
        } else {
            &self.active
        }
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.completed.is_empty()
    }
}

/// 一次性下载得到的完整日志
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOutput {
    pub task_id: String,
    pub app_id: String,
    pub content: Vec<u8>,
}
