use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{ErrorCode, ExecuteError, Result};
use crate::flow::{Flow, Node, NodeType, TriggerType};
use crate::runner::{FrontResults, NodeRunnerFactory, RunContext};

use super::data::ExecutionData;
use super::vertex::VertexResult;

/// 失败节点
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeFailure {
    pub node_id: String,
    pub node_type: NodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    pub message: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

/// 一次调用的执行摘要
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub flow_code: String,
    pub executed: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<NodeFailure>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_none()
    }
}

/// Flow 执行器
///
/// 从触发类型对应的开始节点出发按 FIFO 遍历，每个节点在一次调用内最多执行一次。
/// 汇合节点要等所有被激活的前驱都执行完才会入队。
/// 节点失败不会以 `Err` 返回：结果挂在节点的 `debug_result` 上，并写入
/// [`ExecutionReport::failed`]。
pub struct FlowExecutor {
    flow: Flow,
    factory: Arc<NodeRunnerFactory>,
    config: EngineConfig,
    in_loop: Option<String>,
    input: Option<Value>,
    depth: usize,
}

impl FlowExecutor {
    pub fn new(flow: Flow, factory: Arc<NodeRunnerFactory>) -> Self {
        Self {
            flow,
            factory,
            config: EngineConfig::default(),
            in_loop: None,
            input: None,
            depth: 0,
        }
    }

    /// 标记为循环体执行器，`body_id` 为所属循环体
    pub fn in_loop(mut self, body_id: impl Into<String>) -> Self {
        self.in_loop = Some(body_id.into());
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// 覆盖开始节点看到的入参（子流程调用时使用）
    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    pub fn into_flow(self) -> Flow {
        self.flow
    }

    /// 执行流程
    ///
    /// 循环节点会在自身执行过程中再次调用执行器，返回值因此需要装箱。
    pub fn execute<'a>(
        &'a mut self,
        data: &'a mut ExecutionData,
        trigger: TriggerType,
    ) -> BoxFuture<'a, Result<ExecutionReport>> {
        async move { self.traverse(data, trigger).await }.boxed()
    }

    async fn traverse(
        &mut self,
        data: &mut ExecutionData,
        trigger: TriggerType,
    ) -> Result<ExecutionReport> {
        self.flow.clear_debug_results();
        let start_id = self
            .flow
            .start_node(trigger)
            .map(|node| node.node_id.clone())
            .ok_or_else(|| {
                ExecuteError::throw(ErrorCode::ExecuteValidateFailed, "flow.start_node_not_found")
                    .with_param("trigger", trigger.as_str())
                    .with_param("flow_code", self.flow.code.as_str())
            })?;

        info!(
            flow_code = %self.flow.code,
            trigger = %trigger,
            in_loop = ?self.in_loop,
            depth = self.depth,
            "flow execution started"
        );

        let mut report = ExecutionReport {
            flow_code: self.flow.code.clone(),
            ..ExecutionReport::default()
        };
        let mut schedule = Schedule::new(&self.flow, &start_id);

        while let Some(node_id) = schedule.next() {
            let Some(node) = self.flow.get_node_by_id(&node_id) else {
                warn!(
                    flow_code = %self.flow.code,
                    node_id = %node_id,
                    "next node not found, skipped"
                );
                continue;
            };
            if !node.is_top_level() {
                debug!(node_id = %node_id, "node belongs to a nested body, skipped");
                continue;
            }

            let front = self.front_results(&node_id, &schedule.predecessors);
            let mut vertex = VertexResult::new();
            let ctx = RunContext {
                flow: &self.flow,
                factory: &self.factory,
                config: &self.config,
                in_loop: self.in_loop.as_deref(),
                input: self.input.as_ref(),
                depth: self.depth,
            };
            match self.factory.make(node) {
                Ok(runner) => runner.execute(&mut vertex, data, &front, &ctx).await,
                Err(err) => {
                    warn!(
                        node_id = %node_id,
                        node_type = %node.node_type,
                        error = %err,
                        "no runner for node"
                    );
                    vertex.fail(&err);
                }
            }
            let node_type = node.node_type;
            let next: Vec<String> = match vertex.children_ids() {
                Some(children) => children.to_vec(),
                None => node.next_nodes.clone(),
            };

            report.executed.push(node_id.clone());
            let failure = (!vertex.is_success()).then(|| NodeFailure {
                node_id: node_id.clone(),
                node_type,
                code: vertex.error_code(),
                message: vertex.error_message().unwrap_or_default().to_string(),
                params: vertex.error_params().clone(),
            });
            if let Some(target) = self.flow.get_node_by_id_mut(&node_id) {
                target.debug_result = Some(vertex);
            }

            if let Some(failure) = failure {
                warn!(
                    flow_code = %self.flow.code,
                    node_id = %failure.node_id,
                    error = %failure.message,
                    "flow execution stopped on failed node"
                );
                report.failed = Some(failure);
                break;
            }

            schedule.complete(&self.flow, &node_id, &next);
        }

        info!(
            flow_code = %self.flow.code,
            executed = report.executed.len(),
            success = report.is_success(),
            "flow execution finished"
        );
        Ok(report)
    }

    fn front_results(
        &self,
        node_id: &str,
        predecessors: &HashMap<String, Vec<String>>,
    ) -> FrontResults {
        let mut front = FrontResults::new();
        for predecessor in predecessors.get(node_id).into_iter().flatten() {
            let result = self
                .flow
                .get_node_by_id(predecessor)
                .and_then(|node| node.debug_result())
                .and_then(|vertex| vertex.result())
                .cloned()
                .unwrap_or(Value::Null);
            front.insert(predecessor.clone(), result);
        }
        front
    }
}

/// 依赖调度
///
/// 入度只统计从开始节点静态可达的顶层节点之间的边。一条边在前驱执行完成时结束：
/// 前驱激活了它就记为有效前驱，没激活（分支未选中）就只计数。节点的入边全部结束后，
/// 有有效前驱则入队，否则整条支路不执行，并继续结束它的出边。
#[derive(Default)]
struct Schedule {
    edges: HashMap<String, Vec<String>>,
    in_degree: HashMap<String, usize>,
    settled: HashMap<String, usize>,
    predecessors: HashMap<String, Vec<String>>,
    queue: VecDeque<String>,
    scheduled: HashSet<String>,
    waiting: Vec<String>,
}

impl Schedule {
    fn new(flow: &Flow, start_id: &str) -> Self {
        let mut schedule = Self::default();
        let mut seen = HashSet::from([start_id.to_string()]);
        let mut frontier = VecDeque::from([start_id.to_string()]);
        while let Some(node_id) = frontier.pop_front() {
            let Some(node) = flow.get_node_by_id(&node_id) else {
                continue;
            };
            let mut targets = Vec::new();
            for child in unique(&node.next_nodes) {
                if !is_tracked(flow, child) {
                    continue;
                }
                *schedule.in_degree.entry(child.clone()).or_default() += 1;
                targets.push(child.clone());
                if seen.insert(child.clone()) {
                    frontier.push_back(child.clone());
                }
            }
            schedule.edges.insert(node_id, targets);
        }
        schedule.scheduled.insert(start_id.to_string());
        schedule.queue.push_back(start_id.to_string());
        schedule
    }

    fn next(&mut self) -> Option<String> {
        if let Some(node_id) = self.queue.pop_front() {
            return Some(node_id);
        }
        // 剩下的节点入边无法全部结束（回边），按激活顺序放行
        self.waiting.retain(|node_id| !self.scheduled.contains(node_id));
        if self.waiting.is_empty() {
            return None;
        }
        let node_id = self.waiting.remove(0);
        self.scheduled.insert(node_id.clone());
        Some(node_id)
    }

    /// `node_id` 执行成功，`activated` 为它实际激活的后继
    fn complete(&mut self, flow: &Flow, node_id: &str, activated: &[String]) {
        let activated = unique(activated);
        let edges = self.edges.get(node_id).cloned().unwrap_or_default();
        for child in &edges {
            if !activated.contains(&child) {
                self.settle(child, None);
            }
        }
        for child in activated {
            if edges.contains(child) {
                self.settle(child, Some(node_id));
            } else if is_tracked(flow, child) {
                // 分支激活了一个没有静态连线的节点
                *self.in_degree.entry(child.clone()).or_default() += 1;
                self.settle(child, Some(node_id));
            } else if self.scheduled.insert(child.clone()) {
                self.queue.push_back(child.clone());
            }
        }
    }

    fn settle(&mut self, child: &str, from: Option<&str>) {
        let mut pending = vec![(child.to_string(), from.map(str::to_string))];
        while let Some((node_id, from)) = pending.pop() {
            if self.scheduled.contains(&node_id) {
                continue;
            }
            let settled = self.settled.entry(node_id.clone()).or_default();
            *settled += 1;
            let settled = *settled;
            if let Some(from) = from {
                let predecessors = self.predecessors.entry(node_id.clone()).or_default();
                predecessors.push(from);
                if predecessors.len() == 1 {
                    self.waiting.push(node_id.clone());
                }
            }
            if settled < self.in_degree.get(&node_id).copied().unwrap_or_default() {
                continue;
            }

            self.scheduled.insert(node_id.clone());
            if self.predecessors.contains_key(&node_id) {
                self.queue.push_back(node_id);
            } else {
                for next in self.edges.get(&node_id).into_iter().flatten() {
                    pending.push((next.clone(), None));
                }
            }
        }
    }
}

fn is_tracked(flow: &Flow, node_id: &str) -> bool {
    flow.get_node_by_id(node_id).is_some_and(Node::is_top_level)
}

fn unique(ids: &[String]) -> Vec<&String> {
    let mut seen = HashSet::new();
    ids.iter().filter(|id| seen.insert(id.as_str())).collect()
}
