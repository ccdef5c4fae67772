// 节点执行器：按节点类型分发到具体实现

pub mod factory;
pub mod nodes;
pub mod params;

pub use factory::{NodeRunnerFactory, RunnerFactoryFn};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::execution::{ExecutionData, VertexResult};
use crate::flow::{Flow, Node};

/// 前驱节点 id 到其结果载荷
pub type FrontResults = HashMap<String, Value>;

/// 执行器传给节点的上下文
pub struct RunContext<'a> {
    /// 当前正在执行的流程（循环体执行时为派生出的循环流程）
    pub flow: &'a Flow,
    pub factory: &'a Arc<NodeRunnerFactory>,
    pub config: &'a EngineConfig,
    /// 所在循环体 id
    pub in_loop: Option<&'a str>,
    pub input: Option<&'a Value>,
    pub depth: usize,
}

#[async_trait]
pub trait NodeRunner: Send + Sync {
    fn node(&self) -> &Node;

    async fn run(
        &self,
        vertex: &mut VertexResult,
        data: &mut ExecutionData,
        front: &FrontResults,
        ctx: &RunContext<'_>,
    ) -> Result<()>;

    /// 公共执行流程：计时、日志，并把 `run` 的错误记录到 `vertex` 上而不是向上传播
    async fn execute(
        &self,
        vertex: &mut VertexResult,
        data: &mut ExecutionData,
        front: &FrontResults,
        ctx: &RunContext<'_>,
    ) {
        let node = self.node();
        let started = Instant::now();
        if ctx.config.debug {
            info!(
                node_id = %node.node_id,
                node_type = %node.node_type,
                params = %node.params,
                in_loop = ?ctx.in_loop,
                "node started"
            );
        } else {
            debug!(node_id = %node.node_id, node_type = %node.node_type, "node started");
        }
        if !front.is_empty() {
            vertex.add_debug_log(
                "front_results",
                Value::Object(front.clone().into_iter().collect()),
            );
        }

        let outcome = self.run(vertex, data, front, ctx).await;
        vertex.set_elapsed(started.elapsed());
        match outcome {
            Ok(()) => debug!(
                node_id = %node.node_id,
                elapsed_ms = vertex.elapsed_ms(),
                "node finished"
            ),
            Err(err) => {
                warn!(
                    node_id = %node.node_id,
                    node_type = %node.node_type,
                    error = %err,
                    "node failed"
                );
                vertex.fail(&err);
            }
        }
        if !ctx.config.record_debug_logs {
            vertex.clear_debug_log();
        }
    }
}
