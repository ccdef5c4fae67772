use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::MAX_LOOP_COUNT_LIMIT;
use crate::error::{ErrorCode, ExecuteError, FlowError, Result};
use crate::execution::{ExecutionData, FlowExecutor, VertexResult};
use crate::expression::{as_numeric, truthy, Component};
use crate::flow::{Flow, Node, TriggerType};
use crate::runner::params::{evaluate_param, required_component, required_str};
use crate::runner::{FrontResults, NodeRunner, RunContext};

use super::loop_control::break_key;

const LOOP_TYPE_COUNT: &str = "count";
const LOOP_TYPE_ARRAY: &str = "array";
const LOOP_TYPE_CONDITION: &str = "condition";

fn loop_error(key: &str) -> ExecuteError {
    ExecuteError::throw(ErrorCode::FlowNodeValidateFailed, key)
}

/// 循环节点
///
/// 通过 `relation_id` 找到循环体，派生出只含循环体及其后代的循环流程，
/// 按次数、数组或条件反复执行。每轮都新建一个执行器，但共享同一个
/// [`ExecutionData`]，迭代内写入的变量与节点上下文对外层立即可见。
///
/// 参数：
/// - `loop_type`: `count` | `array` | `condition`
/// - `count` / `array`: 取值组件或字面量
/// - `condition`: 条件组件
/// - `max_loop_count`: 条件循环的最大次数，取值 1..=9999
pub struct LoopMainRunner {
    node: Node,
}

impl LoopMainRunner {
    pub fn new(node: &Node) -> Self {
        Self { node: node.clone() }
    }

    /// 执行一轮迭代，返回是否已置位跳出标记
    async fn run_iteration(
        &self,
        loop_flow: &Flow,
        body_id: &str,
        iteration: u64,
        data: &mut ExecutionData,
        ctx: &RunContext<'_>,
    ) -> Result<bool> {
        debug!(node_id = %self.node.node_id, body_id, iteration, "loop iteration started");
        let mut executor = FlowExecutor::new(loop_flow.clone(), Arc::clone(ctx.factory))
            .in_loop(body_id)
            .with_config(ctx.config.clone())
            .with_depth(ctx.depth);
        let report = executor.execute(data, TriggerType::LoopStart).await?;

        if let Some(failure) = report.failed {
            return Err(ExecuteError::throw(
                ErrorCode::ExecuteFailed,
                "flow.node.loop.loop_flow_execute_failed",
            )
            .with_param("error", failure.message)
            .with_param("error_params", failure.params)
            .with_param("node_id", failure.node_id)
            .into());
        }

        Ok(truthy(&data.variable_get(&break_key(body_id), Value::Bool(false))))
    }

    async fn run_count(
        &self,
        loop_flow: &Flow,
        body_id: &str,
        data: &mut ExecutionData,
        ctx: &RunContext<'_>,
    ) -> Result<u64> {
        let raw = evaluate_param(&self.node, "count", "count", &data.expression_field_data())?;
        // 先截断再校验，0.5 这类截断后为 0 的值同样报错
        let total = as_numeric(&raw)
            .map(f64::trunc)
            .filter(|count| *count >= 1.0)
            .map(|count| count as u64)
            .ok_or_else(|| {
                loop_error("flow.node.loop.count_format_error").with_param("count", raw.clone())
            })?;

        let mut iterations = 0;
        for index in 0..total {
            data.save_node_context(self.node.node_id.clone(), json!({ "index": index }));
            iterations += 1;
            if self.run_iteration(loop_flow, body_id, index, data, ctx).await? {
                break;
            }
        }
        Ok(iterations)
    }

    async fn run_array(
        &self,
        loop_flow: &Flow,
        body_id: &str,
        data: &mut ExecutionData,
        ctx: &RunContext<'_>,
    ) -> Result<u64> {
        let raw = evaluate_param(&self.node, "array", "array", &data.expression_field_data())?;
        let Value::Array(items) = raw else {
            return Err(loop_error("flow.node.loop.array_format_error").into());
        };

        let mut iterations = 0;
        for (index, item) in items.into_iter().enumerate() {
            // 写入循环节点自身的上下文，而不是循环体的
            data.save_node_context(
                self.node.node_id.clone(),
                json!({ "item": item, "index": index }),
            );
            iterations += 1;
            if self.run_iteration(loop_flow, body_id, index as u64, data, ctx).await? {
                break;
            }
        }
        Ok(iterations)
    }

    async fn run_condition(
        &self,
        loop_flow: &Flow,
        body_id: &str,
        data: &mut ExecutionData,
        ctx: &RunContext<'_>,
    ) -> Result<u64> {
        let condition = self.condition_component()?;
        let max_loop_count = self.max_loop_count(data)?;

        let mut iterations = 0;
        let mut holds = truthy(&condition.evaluate(&data.expression_field_data())?);
        while holds && iterations < max_loop_count {
            data.save_node_context(self.node.node_id.clone(), json!({ "index": iterations }));
            let index = iterations;
            iterations += 1;
            if self.run_iteration(loop_flow, body_id, index, data, ctx).await? {
                break;
            }
            holds = truthy(&condition.evaluate(&data.expression_field_data())?);
        }
        Ok(iterations)
    }

    fn condition_component(&self) -> Result<Component> {
        let component = required_component(&self.node, "condition", "condition")?;
        if !component.is_condition() {
            return Err(ExecuteError::throw(
                ErrorCode::FlowNodeValidateFailed,
                "flow.component.format_error",
            )
            .with_param("label", "condition")
            .into());
        }
        Ok(component)
    }

    /// 必须是 1..=9999 的数值，小数部分截断
    fn max_loop_count(&self, data: &ExecutionData) -> Result<u64> {
        let raw = evaluate_param(
            &self.node,
            "max_loop_count",
            "max_loop_count",
            &data.expression_field_data(),
        )?;
        as_numeric(&raw)
            .map(f64::trunc)
            .filter(|count| (1.0..=MAX_LOOP_COUNT_LIMIT as f64).contains(count))
            .map(|count| count as u64)
            .ok_or_else(|| {
                FlowError::from(
                    loop_error("flow.node.loop.max_loop_count_format_error")
                        .with_param("max_loop_count", raw.clone())
                        .with_param("max", MAX_LOOP_COUNT_LIMIT),
                )
            })
    }
}

#[async_trait]
impl NodeRunner for LoopMainRunner {
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
        let body_id = self
            .node
            .relation_id()
            .ok_or_else(|| loop_error("flow.node.loop.relation_id_empty"))?;

        let Some(loop_flow) = ctx.flow.create_loop_flow(body_id) else {
            debug!(node_id = %self.node.node_id, body_id, "loop body missing or empty, skipped");
            vertex.add_debug_log("skipped", "loop body has no children");
            return Ok(());
        };

        data.variable_save(break_key(body_id), Value::Bool(false));

        let loop_type = required_str(&self.node, "loop_type", "loop_type")?;
        let iterations = match loop_type {
            LOOP_TYPE_COUNT => self.run_count(&loop_flow, body_id, data, ctx).await?,
            LOOP_TYPE_ARRAY => self.run_array(&loop_flow, body_id, data, ctx).await?,
            LOOP_TYPE_CONDITION => self.run_condition(&loop_flow, body_id, data, ctx).await?,
            other => {
                return Err(loop_error("flow.node.loop.loop_type_error")
                    .with_param("loop_type", other)
                    .into())
            }
        };

        info!(node_id = %self.node.node_id, loop_type, iterations, "loop finished");
        vertex.add_debug_log("iterations", iterations);
        vertex.set_result(json!({ "loop_type": loop_type, "iterations": iterations }));
        Ok(())
    }
}
