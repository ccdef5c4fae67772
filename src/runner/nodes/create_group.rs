use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{ErrorCode, ExecuteError, Result};
use crate::execution::{ExecutionData, VertexResult};
use crate::expression::render_text;
use crate::flow::Node;
use crate::runner::params::{evaluate_param, optional, required_text};
use crate::runner::{FrontResults, NodeRunner, RunContext};
use crate::services::{CreateGroupRequest, GroupService};

/// 创建群聊
///
/// `group_name`、`owner_id` 必填；`member_ids` 可以是数组或求值为数组的组件，
/// `include_agent` 为真时把当前助理加入成员。
pub struct CreateGroupRunner {
    node: Node,
    groups: Arc<dyn GroupService>,
}

impl CreateGroupRunner {
    pub fn new(node: &Node, groups: Arc<dyn GroupService>) -> Self {
        Self {
            node: node.clone(),
            groups,
        }
    }
}

fn member_ids(raw: Value) -> Result<Vec<String>> {
    let items = match raw {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        Value::String(text) if text.trim().is_empty() => return Ok(Vec::new()),
        single @ Value::String(_) => vec![single],
        _ => {
            return Err(ExecuteError::throw(
                ErrorCode::FlowNodeValidateFailed,
                "flow.node.param_format_error",
            )
            .with_param("label", "member_ids")
            .into())
        }
    };
    Ok(items
        .iter()
        .map(|item| render_text(item).trim().to_string())
        .filter(|id| !id.is_empty())
        .collect())
}

#[async_trait]
impl NodeRunner for CreateGroupRunner {
    fn node(&self) -> &Node {
        &self.node
    }

    async fn run(
        &self,
        vertex: &mut VertexResult,
        data: &mut ExecutionData,
        _front: &FrontResults,
        _ctx: &RunContext<'_>,
    ) -> Result<()> {
        let fields = data.expression_field_data();
        let group_name = required_text(&self.node, "group_name", "group_name", &fields)?;
        let owner_id = required_text(&self.node, "owner_id", "owner_id", &fields)?;
        let mut members =
            member_ids(evaluate_param(&self.node, "member_ids", "member_ids", &fields)?)?;

        let include_agent: Option<bool> = optional(&self.node, "include_agent", "include_agent")?;
        if include_agent.unwrap_or(false) {
            if let Some(agent_user_id) = data.agent_user_id() {
                members.push(agent_user_id.to_string());
            }
        }
        // 群主不重复出现在成员里
        let mut seen = HashSet::new();
        members.retain(|id| id != &owner_id && seen.insert(id.clone()));

        let group = self
            .groups
            .create_group(CreateGroupRequest {
                group_name,
                owner_id,
                member_ids: members,
                organization_code: data.operator().organization_code.clone(),
            })
            .await?;
        info!(node_id = %self.node.node_id, group_id = %group.group_id, "group created");

        let payload = json!({
            "group_id": group.group_id,
            "group_name": group.group_name,
            "owner_id": group.owner_id,
            "member_ids": group.member_ids,
        });
        vertex.add_debug_log("group_id", group.group_id.clone());
        data.save_node_context(self.node.node_id.clone(), payload.clone());
        vertex.set_result(payload);
        Ok(())
    }
}
