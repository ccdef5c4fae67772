// 节点依赖的外部领域服务

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::flow::FlowRegistry;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateGroupRequest {
    pub group_name: String,
    pub owner_id: String,
    #[serde(default)]
    pub member_ids: Vec<String>,
    #[serde(default)]
    pub organization_code: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub group_id: String,
    pub group_name: String,
    pub owner_id: String,
    pub member_ids: Vec<String>,
    pub organization_code: String,
}

/// 群聊服务
#[async_trait]
pub trait GroupService: Send + Sync {
    async fn create_group(&self, request: CreateGroupRequest) -> Result<GroupInfo>;
}

/// 内存实现，供命令行与测试使用
#[derive(Default)]
pub struct InMemoryGroupService {
    groups: Mutex<Vec<GroupInfo>>,
    next_id: AtomicU64,
}

impl InMemoryGroupService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> Vec<GroupInfo> {
        self.groups.lock().clone()
    }
}

#[async_trait]
impl GroupService for InMemoryGroupService {
    async fn create_group(&self, request: CreateGroupRequest) -> Result<GroupInfo> {
        let seq = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let group = GroupInfo {
            group_id: format!("group-{seq}"),
            group_name: request.group_name,
            owner_id: request.owner_id,
            member_ids: request.member_ids,
            organization_code: request.organization_code,
        };
        self.groups.lock().push(group.clone());
        Ok(group)
    }
}

/// 内置节点构造时注入的服务
#[derive(Clone)]
pub struct RunnerServices {
    pub groups: Arc<dyn GroupService>,
    pub flows: Arc<FlowRegistry>,
}

impl RunnerServices {
    pub fn new(groups: Arc<dyn GroupService>, flows: Arc<FlowRegistry>) -> Self {
        Self { groups, flows }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryGroupService::new()),
            Arc::new(FlowRegistry::new()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_service_assigns_sequential_ids() {
        let service = InMemoryGroupService::new();
        for name in ["a", "b"] {
            service
                .create_group(CreateGroupRequest {
                    group_name: name.into(),
                    owner_id: "u-1".into(),
                    member_ids: vec![],
                    organization_code: "org".into(),
                })
                .await
                .unwrap();
        }
        let ids: Vec<_> = service.groups().into_iter().map(|g| g.group_id).collect();
        assert_eq!(ids, vec!["group-1", "group-2"]);
    }
}
