use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::Result;
use crate::execution::{ExecutionData, VertexResult};
use crate::expression::ConditionExpression;
use crate::flow::Node;
use crate::runner::params::required;
use crate::runner::{FrontResults, NodeRunner, RunContext};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum BranchType {
    If,
    Else,
}

#[derive(Clone, Debug, Deserialize)]
struct Branch {
    branch_id: String,
    branch_type: BranchType,
    #[serde(default)]
    condition: Option<ConditionExpression>,
    #[serde(default)]
    next_nodes: Vec<String>,
}

/// 条件分支：命中第一个成立的 `if` 分支，否则走 `else`
pub struct IfRunner {
    node: Node,
}

impl IfRunner {
    pub fn new(node: &Node) -> Self {
        Self { node: node.clone() }
    }
}

#[async_trait]
impl NodeRunner for IfRunner {
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
        let branches: Vec<Branch> = required(&self.node, "branches", "branches")?;
        let fields = data.expression_field_data();

        let mut chosen = None;
        for branch in branches.iter().filter(|b| b.branch_type == BranchType::If) {
            let holds = match &branch.condition {
                Some(condition) => condition.evaluate(&fields)?,
                None => true,
            };
            if holds {
                chosen = Some(branch);
                break;
            }
        }
        let chosen = chosen.or_else(|| {
            branches
                .iter()
                .find(|b| b.branch_type == BranchType::Else)
        });

        let branch_id = chosen.map(|branch| branch.branch_id.clone());
        let children = chosen
            .map(|branch| branch.next_nodes.clone())
            .unwrap_or_default();

        vertex.add_debug_log("branch_id", json!(branch_id));
        let payload = json!({ "branch_id": branch_id });
        data.save_node_context(self.node.node_id.clone(), payload.clone());
        vertex.set_result(payload);
        vertex.set_children_ids(children);
        Ok(())
    }
}
