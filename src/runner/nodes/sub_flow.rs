use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::error::{ErrorCode, ExecuteError, Result};
use crate::execution::{ExecutionData, FlowExecutor, VertexResult};
use crate::flow::{FlowRegistry, Node, NodeType, TriggerType};
use crate::runner::params::{evaluate_map, required_str};
use crate::runner::{FrontResults, NodeRunner, RunContext};

/// 子流程调用：按 `flow_code` 从注册表取出流程，以 `ParamCall` 触发执行
///
/// 子流程与调用方共享 [`ExecutionData`]，结果取自子流程中最后执行的结束节点。
pub struct SubFlowRunner {
    node: Node,
    flows: Arc<FlowRegistry>,
}

impl SubFlowRunner {
    pub fn new(node: &Node, flows: Arc<FlowRegistry>) -> Self {
        Self {
            node: node.clone(),
            flows,
        }
    }
}

#[async_trait]
impl NodeRunner for SubFlowRunner {
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
        let flow_code = required_str(&self.node, "flow_code", "flow_code")?;
        let depth = ctx.depth + 1;
        if depth > ctx.config.max_sub_flow_depth {
            return Err(ExecuteError::throw(
                ErrorCode::ExecuteValidateFailed,
                "flow.node.sub_flow.depth_exceeded",
            )
            .with_param("flow_code", flow_code)
            .with_param("max_depth", ctx.config.max_sub_flow_depth)
            .into());
        }
        let flow = self.flows.get(flow_code).ok_or_else(|| {
            ExecuteError::throw(ErrorCode::ExecuteValidateFailed, "flow.node.sub_flow.not_found")
                .with_param("flow_code", flow_code)
        })?;

        let fields = data.expression_field_data();
        let input = Value::Object(evaluate_map(&self.node, "input", &fields)?);
        vertex.add_debug_log("input", input.clone());

        let mut executor = FlowExecutor::new(flow.clone(), Arc::clone(ctx.factory))
            .with_config(ctx.config.clone())
            .with_input(input)
            .with_depth(depth);
        let report = executor.execute(data, TriggerType::ParamCall).await?;
        if let Some(failure) = report.failed {
            return Err(ExecuteError::throw(
                ErrorCode::ExecuteFailed,
                "flow.node.sub_flow.execute_failed",
            )
            .with_param("flow_code", flow_code)
            .with_param("error", failure.message)
            .with_param("error_params", failure.params)
            .with_param("node_id", failure.node_id)
            .into());
        }

        let output = report
            .executed
            .iter()
            .rev()
            .filter_map(|node_id| executor.flow().get_node_by_id(node_id))
            .find(|node| node.node_type == NodeType::End)
            .and_then(|node| node.debug_result())
            .and_then(|result| result.result())
            .cloned()
            .unwrap_or(Value::Null);
        info!(
            node_id = %self.node.node_id,
            flow_code,
            executed = report.executed.len(),
            "sub flow finished"
        );

        data.save_node_context(self.node.node_id.clone(), output.clone());
        vertex.set_result(output);
        Ok(())
    }
}
