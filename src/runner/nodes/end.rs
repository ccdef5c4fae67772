use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::execution::{ExecutionData, VertexResult};
use crate::flow::Node;
use crate::runner::params::evaluate_map;
use crate::runner::{FrontResults, NodeRunner, RunContext};

/// 结束节点：按 `output` 映射求值出流程输出
pub struct EndRunner {
    node: Node,
}

impl EndRunner {
    pub fn new(node: &Node) -> Self {
        Self { node: node.clone() }
    }
}

#[async_trait]
impl NodeRunner for EndRunner {
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
        let output = Value::Object(evaluate_map(
            &self.node,
            "output",
            &data.expression_field_data(),
        )?);
        data.save_node_context(self.node.node_id.clone(), output.clone());
        vertex.set_result(output);
        Ok(())
    }
}
