use async_trait::async_trait;
use mesoslog_errors::MesosLogResult;

use crate::entities::{MasterState, NodeState};

/// 集群状态获取接口
#[async_trait]
pub trait ClusterStateSource: Send + Sync {
    /// 解析给定入口当前的 leading master，返回其基础地址
    async fn resolve_leader(&self, host: &str, port: u16) -> MesosLogResult<String>;
    async fn master_state(&self, master_url: &str) -> MesosLogResult<MasterState>;
    async fn node_state(&self, state_url: &str) -> MesosLogResult<NodeState>;
}
