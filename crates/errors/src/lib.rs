use thiserror::Error;

#[derive(Debug, Error)]
pub enum MesosLogError {
    #[error("应用未找到: {identifier}")]
    NotFound { identifier: String },
    #[error("状态不一致: 任务引用的节点不存在: {node_id}")]
    NodeNotFound { node_id: String },
    #[error("无效的节点地址: {pid}")]
    MalformedAddress { pid: String },
    #[error("无法在节点上定位任务沙箱目录: {task_id}")]
    DirectoryNotFound { task_id: String },
    #[error("无效的任务标识: {id}")]
    MalformedIdentifier { id: String },
    #[error("网络错误: {0}")]
    Transport(String),
    #[error("响应格式错误: {0}")]
    MalformedResponse(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("IO错误: {0}")]
    Io(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type MesosLogResult<T> = Result<T, MesosLogError>;

impl MesosLogError {
    pub fn not_found<S: Into<String>>(identifier: S) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
        }
    }
    pub fn node_not_found<S: Into<String>>(node_id: S) -> Self {
        Self::NodeNotFound {
            node_id: node_id.into(),
        }
    }
    pub fn malformed_address<S: Into<String>>(pid: S) -> Self {
        Self::MalformedAddress { pid: pid.into() }
    }
    pub fn directory_not_found<S: Into<String>>(task_id: S) -> Self {
        Self::DirectoryNotFound {
            task_id: task_id.into(),
        }
    }
    pub fn malformed_identifier<S: Into<String>>(id: S) -> Self {
        Self::MalformedIdentifier { id: id.into() }
    }
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }
    pub fn malformed_response<S: Into<String>>(msg: S) -> Self {
        Self::MalformedResponse(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    /// 解析阶段的错误（找不到任务、状态不一致等）不可重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MesosLogError::Transport(_) | MesosLogError::MalformedResponse(_)
        )
    }
    pub fn user_message(&self) -> &str {
        match self {
            MesosLogError::NotFound { .. } => "请求的应用不存在",
            MesosLogError::NodeNotFound { .. } => "集群状态不一致，请稍后重试",
            MesosLogError::MalformedAddress { .. } => "节点地址格式有误",
            MesosLogError::DirectoryNotFound { .. } => "无法定位任务的沙箱目录",
            MesosLogError::MalformedIdentifier { .. } => "任务标识格式有误",
            MesosLogError::Transport(_) => "网络连接失败，请稍后重试",
            MesosLogError::Configuration(_) => "配置有误",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for MesosLogError {
    fn from(err: serde_json::Error) -> Self {
        MesosLogError::MalformedResponse(err.to_string())
    }
}

impl From<std::io::Error> for MesosLogError {
    fn from(err: std::io::Error) -> Self {
        MesosLogError::Io(err.to_string())
    }
}

impl From<anyhow::Error> for MesosLogError {
    fn from(err: anyhow::Error) -> Self {
        MesosLogError::Internal(err.to_string())
    }
}
