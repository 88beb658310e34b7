//! # 领域服务模块
//!
//! 任务解析与沙箱定位的核心逻辑。
//!
//! - [`TaskResolver`]: 在 master 状态快照中按 id 或 name 查找任务实例，
//!   按最新状态时间倒序排列，并支持只取最新实例
//! - [`SandboxLocator`]: 将任务实例映射为所在节点及其沙箱目录
//!
//! 两者都只读取状态快照，不缓存任何结果；解析阶段的错误直接返回给调用方。

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use mesoslog_errors::{MesosLogError, MesosLogResult};
use tracing::debug;

use crate::entities::{MasterState, NodeState, SandboxLocation, TaskInstance, TaskMatches};
use crate::ports::ClusterStateSource;
use crate::value_objects::{ProcessLocator, ResolveOptions};

pub struct TaskResolver<'a> {
    state: &'a MasterState,
}

impl<'a> TaskResolver<'a> {
    pub fn new(state: &'a MasterState) -> Self {
        Self { state }
    }

    /// 收集所有 id 或 name 匹配的任务实例，按运行中/已完成分组并排序
    pub fn find(&self, identifier: &str) -> TaskMatches {
        let mut matches = TaskMatches::default();
        for framework in &self.state.frameworks {
            matches.active.extend(
                framework
                    .tasks
                    .iter()
                    .filter(|task| task.matches(identifier))
                    .cloned(),
            );
            matches.completed.extend(
                framework
                    .completed_tasks
                    .iter()
                    .filter(|task| task.matches(identifier))
                    .cloned(),
            );
        }

        sort_by_latest_status(&mut matches.active);
        sort_by_latest_status(&mut matches.completed);
        debug!(
            "Identifier {} matched {} active and {} completed tasks",
            identifier,
            matches.active.len(),
            matches.completed.len()
        );
        matches
    }

    pub fn resolve(
        &self,
        identifier: &str,
        options: ResolveOptions,
    ) -> MesosLogResult<Vec<TaskInstance>> {
        let matches = self.find(identifier);
        let mut tasks = if options.include_completed {
            matches.completed
        } else {
            matches.active
        };

        if tasks.is_empty() {
            return Err(MesosLogError::not_found(identifier));
        }
        if options.latest_only {
            tasks.truncate(1);
        }
        Ok(tasks)
    }

    /// 统计每个应用名称下运行中的任务实例数量
    pub fn application_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for framework in &self.state.frameworks {
            for task in &framework.tasks {
                *counts.entry(task.name.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn app_name_for_task_id(
        &self,
        task_id: &str,
        include_completed: bool,
    ) -> MesosLogResult<String> {
        self.find(task_id)
            .group(include_completed)
            .first()
            .map(|task| task.name.clone())
            .ok_or_else(|| MesosLogError::not_found(task_id))
    }
}

/// 按最新状态时间倒序排列；没有状态的实例排在最后，稳定排序
pub fn sort_by_latest_status(tasks: &mut [TaskInstance]) {
    tasks.sort_by(|a, b| match (a.latest_timestamp(), b.latest_timestamp()) {
        (Some(ta), Some(tb)) => tb.total_cmp(&ta),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Marathon 应用路径转换为 Mesos 任务名: `/prod/web` -> `web.prod`
pub fn app_name_for_path(path: &str) -> String {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let mut segments: Vec<&str> = trimmed.split('/').collect();
    segments.reverse();
    segments.join(".")
}

/// 在节点状态中查找任务所属 executor 的沙箱目录
pub fn find_directory<'s>(
    node_state: &'s NodeState,
    task: &TaskInstance,
    completed: bool,
) -> Option<&'s str> {
    node_state
        .frameworks
        .iter()
        .filter(|framework| framework.id == task.framework_id)
        .flat_map(|framework| framework.executors_for(completed))
        .find(|executor| executor.id == task.executor_id || executor.id == task.id)
        .map(|executor| executor.directory.as_str())
}

pub struct SandboxLocator {
    source: Arc<dyn ClusterStateSource>,
}

impl SandboxLocator {
    pub fn new(source: Arc<dyn ClusterStateSource>) -> Self {
        Self { source }
    }

    /// 定位任务实例的沙箱，不做重试
    pub async fn locate(
        &self,
        state: &MasterState,
        task: &TaskInstance,
        completed: bool,
    ) -> MesosLogResult<SandboxLocation> {
        let node = state
            .find_node(&task.slave_id)
            .ok_or_else(|| MesosLogError::node_not_found(&task.slave_id))?;

        let locator = ProcessLocator::parse(&node.pid)?;
        let state_url = locator.state_url(&node.hostname);
        debug!("Fetching node state for task {} from {}", task.id, state_url);

        let node_state = self.source.node_state(&state_url).await?;
        let directory = find_directory(&node_state, task, completed)
            .filter(|dir| !dir.is_empty())
            .ok_or_else(|| MesosLogError::directory_not_found(&task.id))?;

        Ok(SandboxLocation::new(node.clone(), directory))
    }
}
