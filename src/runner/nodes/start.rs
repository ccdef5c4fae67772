use async_trait::async_trait;
use serde_json::json;

use crate::error::Result;
use crate::execution::{ExecutionData, VertexResult};
use crate::flow::Node;
use crate::runner::{FrontResults, NodeRunner, RunContext};

/// 开始节点：把触发载荷写入节点上下文
pub struct StartRunner {
    node: Node,
}

impl StartRunner {
    pub fn new(node: &Node) -> Self {
        Self { node: node.clone() }
    }
}

#[async_trait]
impl NodeRunner for StartRunner {
    fn node(&self) -> &Node {
        &self.node
    }

    async fn run(
        &self,
        vertex: &mut VertexResult,
        data: &mut ExecutionData,
        _front: &FrontResults,
        ctx: &RunContext<'_>,
    ) -> Result<()> {
        let trigger = data.trigger_data();
        // 子流程调用时以调用方传入的参数为准
        let params = ctx
            .input
            .cloned()
            .unwrap_or_else(|| trigger.params.clone());
        let payload = json!({
            "message": trigger.message,
            "params": params,
            "agent_key": trigger.agent_key,
            "agent_user_id": trigger.agent_user_id,
            "conversation_id": data.conversation_id(),
            "operator_id": data.operator().uid,
        });

        vertex.add_debug_log("params", params);
        data.save_node_context(self.node.node_id.clone(), payload.clone());
        vertex.set_result(payload);
        Ok(())
    }
}
