use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{ErrorCode, ExecuteError, Result};
use crate::execution::{ExecutionData, VertexResult};
use crate::flow::Node;
use crate::runner::{FrontResults, NodeRunner, RunContext};

/// 循环体的跳出标记变量名
pub fn break_key(body_id: &str) -> String {
    format!("{body_id}_break")
}

/// 循环体：每轮迭代的入口，本身不做计算
pub struct LoopBodyRunner {
    node: Node,
}

impl LoopBodyRunner {
    pub fn new(node: &Node) -> Self {
        Self { node: node.clone() }
    }
}

#[async_trait]
impl NodeRunner for LoopBodyRunner {
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
        let body_id = self.node.node_id.as_str();
        vertex.add_debug_log(
            "break",
            data.variable_get(&break_key(body_id), Value::Bool(false)),
        );
        vertex.set_result(json!({ "body_id": body_id }));
        Ok(())
    }
}

/// 跳出循环：只在循环体内有效，置位所在循环体的跳出标记
///
/// 标记在本轮迭代结束后才被检查，同一轮中它之后的节点仍会执行。
pub struct LoopStopRunner {
    node: Node,
}

impl LoopStopRunner {
    pub fn new(node: &Node) -> Self {
        Self { node: node.clone() }
    }
}

#[async_trait]
impl NodeRunner for LoopStopRunner {
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
        let body_id = ctx.in_loop.ok_or_else(|| {
            ExecuteError::throw(
                ErrorCode::ExecuteValidateFailed,
                "flow.node.loop.stop_outside_loop",
            )
        })?;
        data.variable_save(break_key(body_id), Value::Bool(true));
        vertex.set_result(json!({ "body_id": body_id, "break": true }));
        Ok(())
    }
}
