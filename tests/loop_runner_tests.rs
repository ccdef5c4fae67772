use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use magicflow::{
    ErrorCode, ExecutionData, ExecutionReport, Flow, FlowBuilder, FlowExecutor, FrontResults,
    Node, NodeRunner, NodeRunnerFactory, NodeType, Operator, RunContext, RunnerServices,
    TriggerData, TriggerType, VertexResult,
};

/// 记录每次执行时所在循环体与循环节点上下文
struct RecorderRunner {
    node: Node,
    log: Arc<Mutex<Vec<Value>>>,
}

#[async_trait::async_trait]
impl NodeRunner for RecorderRunner {
    fn node(&self) -> &Node {
        &self.node
    }

    async fn run(
        &self,
        vertex: &mut VertexResult,
        data: &mut ExecutionData,
        _front: &FrontResults,
        ctx: &RunContext<'_>,
    ) -> magicflow::Result<()> {
        let watch = self
            .node
            .param("watch")
            .and_then(Value::as_str)
            .unwrap_or("loop");
        let entry = json!({
            "node": self.node.node_id,
            "in_loop": ctx.in_loop,
            "loop": data.get_node_context(watch),
        });
        self.log.lock().push(entry.clone());
        vertex.set_result(entry);
        Ok(())
    }
}

fn factory(log: &Arc<Mutex<Vec<Value>>>) -> Arc<NodeRunnerFactory> {
    let mut factory = NodeRunnerFactory::with_builtin_runners(RunnerServices::in_memory());
    let log = Arc::clone(log);
    factory.register(NodeType::Code, move |node| {
        Ok(Box::new(RecorderRunner {
            node: node.clone(),
            log: Arc::clone(&log),
        }) as Box<dyn NodeRunner>)
    });
    Arc::new(factory)
}

fn execution_data() -> ExecutionData {
    ExecutionData::new(
        TriggerType::ChatMessage,
        TriggerData {
            message: Some("hi".into()),
            ..TriggerData::default()
        },
        Operator::new("u-1", "org-1"),
    )
}

/// start -> loop -> end，循环体 body 下挂一个记录节点 step
fn loop_flow(params: Value) -> FlowBuilder {
    let mut builder = FlowBuilder::new("loop_test");
    builder
        .add_start_node("start")
        .add_loop_node("loop", "body", params)
        .add_node("step", NodeType::Code, json!({}))
        .add_end_node("end")
        .set_parent("step", "body")
        .connect("start", "loop")
        .connect("loop", "end")
        .connect("body", "step");
    builder
}

/// 在 step 之后加一个分支：`loop.index == at` 时走到 `target`
fn branch_at(builder: &mut FlowBuilder, at: u64, target: &str, target_type: NodeType) {
    builder
        .add_node(
            "check",
            NodeType::If,
            json!({
                "branches": [
                    {
                        "branch_id": "hit",
                        "branch_type": "if",
                        "condition": { "conditions": [{
                            "left": { "kind": "field", "path": "loop.index" },
                            "operator": "equals",
                            "right": { "kind": "const", "value": at }
                        }] },
                        "next_nodes": [target]
                    },
                    { "branch_id": "miss", "branch_type": "else", "next_nodes": [] }
                ]
            }),
        )
        .add_node(target, target_type, Value::Null)
        .set_parent("check", "body")
        .set_parent(target, "body")
        .connect("step", "check")
        .connect("check", target);
}

fn const_value(value: Value) -> Value {
    json!({ "type": "value", "value": { "kind": "const", "value": value } })
}

async fn run(
    flow: Flow,
    factory: Arc<NodeRunnerFactory>,
) -> anyhow::Result<(FlowExecutor, ExecutionReport, ExecutionData)> {
    let mut data = execution_data();
    let mut executor = FlowExecutor::new(flow, factory);
    let report = executor.execute(&mut data, TriggerType::ChatMessage).await?;
    Ok((executor, report, data))
}

fn vertex<'a>(executor: &'a FlowExecutor, node_id: &str) -> &'a VertexResult {
    executor
        .flow()
        .get_node_by_id(node_id)
        .and_then(|node| node.debug_result())
        .unwrap_or_else(|| panic!("node `{node_id}` should have executed"))
}

#[tokio::test]
async fn count_loop_runs_body_exactly_count_times() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let flow = loop_flow(json!({ "loop_type": "count", "count": const_value(json!(3)) })).build();

    let (executor, report, _) = run(flow, factory(&log)).await?;

    assert!(report.is_success());
    assert_eq!(report.executed, vec!["start", "loop", "end"]);
    let entries = log.lock().clone();
    assert_eq!(entries.len(), 3);
    for (index, entry) in entries.iter().enumerate() {
        assert_eq!(entry["in_loop"], json!("body"));
        assert_eq!(entry["loop"], json!({ "index": index }));
    }
    assert_eq!(
        vertex(&executor, "loop").result(),
        Some(&json!({ "loop_type": "count", "iterations": 3 }))
    );
    Ok(())
}

#[tokio::test]
async fn count_accepts_numeric_strings_and_literals() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let flow = loop_flow(json!({ "loop_type": "count", "count": "2" })).build();

    let (_, report, _) = run(flow, factory(&log)).await?;

    assert!(report.is_success());
    assert_eq!(log.lock().len(), 2);
    Ok(())
}

#[tokio::test]
async fn loop_stop_breaks_after_current_iteration() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut builder = loop_flow(json!({ "loop_type": "count", "count": const_value(json!(5)) }));
    branch_at(&mut builder, 1, "stop", NodeType::LoopStop);

    let (executor, report, data) = run(builder.build(), factory(&log)).await?;

    assert!(report.is_success());
    assert_eq!(log.lock().len(), 2);
    assert_eq!(data.variable_get("body_break", json!(false)), json!(true));
    assert_eq!(
        vertex(&executor, "loop").result(),
        Some(&json!({ "loop_type": "count", "iterations": 2 }))
    );
    Ok(())
}

#[tokio::test]
async fn array_loop_exposes_item_and_index_on_loop_node() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let flow = loop_flow(json!({ "loop_type": "array", "array": const_value(json!(["a", "b"])) }))
        .build();

    let (_, report, data) = run(flow, factory(&log)).await?;

    assert!(report.is_success());
    let seen: Vec<Value> = log.lock().iter().map(|entry| entry["loop"].clone()).collect();
    assert_eq!(
        seen,
        vec![
            json!({ "item": "a", "index": 0 }),
            json!({ "item": "b", "index": 1 })
        ]
    );
    // 循环体的上下文不会被写入
    assert!(data.get_node_context("body").is_none());
    Ok(())
}

#[tokio::test]
async fn array_loop_reads_array_from_start_params() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let flow = loop_flow(json!({
        "loop_type": "array",
        "array": { "type": "value", "value": { "kind": "field", "path": "start.params.items" } }
    }))
    .build();

    let mut data = ExecutionData::new(
        TriggerType::ChatMessage,
        TriggerData {
            params: json!({ "items": [10, 20, 30] }),
            ..TriggerData::default()
        },
        Operator::new("u-1", "org-1"),
    );
    let mut executor = FlowExecutor::new(flow, factory(&log));
    let report = executor.execute(&mut data, TriggerType::ChatMessage).await?;

    assert!(report.is_success());
    let items: Vec<Value> = log.lock().iter().map(|entry| entry["loop"]["item"].clone()).collect();
    assert_eq!(items, vec![json!(10), json!(20), json!(30)]);
    Ok(())
}

#[tokio::test]
async fn condition_loop_stops_at_max_loop_count() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let flow = loop_flow(json!({
        "loop_type": "condition",
        "condition": { "type": "condition", "condition": { "conditions": [] } },
        "max_loop_count": 5
    }))
    .build();

    let (executor, report, _) = run(flow, factory(&log)).await?;

    assert!(report.is_success());
    assert_eq!(log.lock().len(), 5);
    assert!(vertex(&executor, "end").is_success());
    Ok(())
}

#[tokio::test]
async fn condition_is_reevaluated_after_each_iteration() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut builder = loop_flow(json!({
        "loop_type": "condition",
        "condition": { "type": "condition", "condition": { "conditions": [{
            "left": { "kind": "field", "path": "variables.done" },
            "operator": "not_equals",
            "right": { "kind": "const", "value": true }
        }] } },
        "max_loop_count": const_value(json!(10))
    }));
    builder
        .add_node(
            "mark",
            NodeType::VariableSave,
            json!({ "variables": [{ "name": "done", "value": true }] }),
        )
        .set_parent("mark", "body")
        .connect("step", "mark");

    let (_, report, data) = run(builder.build(), factory(&log)).await?;

    assert!(report.is_success());
    assert_eq!(log.lock().len(), 1);
    assert_eq!(data.variable_get("done", Value::Null), json!(true));
    Ok(())
}

#[tokio::test]
async fn invalid_max_loop_count_fails_before_any_iteration() -> anyhow::Result<()> {
    for max in [json!(0), json!(10000), json!("abc"), json!(0.5), Value::Null] {
        let log = Arc::new(Mutex::new(Vec::new()));
        let flow = loop_flow(json!({
            "loop_type": "condition",
            "condition": { "type": "condition", "condition": { "conditions": [] } },
            "max_loop_count": max
        }))
        .build();

        let (executor, report, _) = run(flow, factory(&log)).await?;

        let failure = report.failed.expect("loop should fail");
        assert_eq!(failure.node_id, "loop");
        assert_eq!(failure.message, "flow.node.loop.max_loop_count_format_error");
        assert!(log.lock().is_empty(), "no iteration may run for {max}");
        assert!(executor.flow().get_node_by_id("end").and_then(|n| n.debug_result()).is_none());
    }
    Ok(())
}

#[tokio::test]
async fn max_loop_count_upper_bound_is_inclusive() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut builder = loop_flow(json!({
        "loop_type": "condition",
        "condition": { "type": "condition", "condition": { "conditions": [] } },
        "max_loop_count": 9999
    }));
    branch_at(&mut builder, 2, "stop", NodeType::LoopStop);
    let flow = builder.build();

    let (_, report, _) = run(flow, factory(&log)).await?;

    assert!(report.is_success());
    assert_eq!(log.lock().len(), 3);
    Ok(())
}

#[tokio::test]
async fn invalid_count_and_array_are_rejected() -> anyhow::Result<()> {
    let cases = [
        (json!({ "loop_type": "count", "count": 0 }), "flow.node.loop.count_format_error"),
        (json!({ "loop_type": "count", "count": -2 }), "flow.node.loop.count_format_error"),
        (json!({ "loop_type": "count", "count": 0.5 }), "flow.node.loop.count_format_error"),
        (json!({ "loop_type": "count", "count": "three" }), "flow.node.loop.count_format_error"),
        (json!({ "loop_type": "count" }), "flow.node.loop.count_format_error"),
        (json!({ "loop_type": "array", "array": "a,b" }), "flow.node.loop.array_format_error"),
        (json!({ "loop_type": "array", "array": { "a": 1 } }), "flow.component.format_error"),
        (json!({ "loop_type": "while" }), "flow.node.loop.loop_type_error"),
        (json!({}), "common.empty"),
    ];
    for (params, expected) in cases {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (executor, report, _) = run(loop_flow(params.clone()).build(), factory(&log)).await?;

        assert_eq!(
            report.failed.map(|failure| failure.message),
            Some(expected.to_string()),
            "params: {params}"
        );
        assert!(log.lock().is_empty());
        let loop_vertex = vertex(&executor, "loop");
        assert_eq!(loop_vertex.error_code(), Some(ErrorCode::FlowNodeValidateFailed));
    }
    Ok(())
}

#[tokio::test]
async fn missing_relation_is_an_error() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut builder = FlowBuilder::new("no_relation");
    builder
        .add_start_node("start")
        .add_node("loop", NodeType::Loop, json!({ "loop_type": "count", "count": 2 }))
        .connect("start", "loop");

    let (_, report, _) = run(builder.build(), factory(&log)).await?;

    let failure = report.failed.expect("loop should fail");
    assert_eq!(failure.message, "flow.node.loop.relation_id_empty");
    Ok(())
}

#[tokio::test]
async fn empty_body_is_a_silent_noop() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut builder = FlowBuilder::new("empty_body");
    builder
        .add_start_node("start")
        .add_loop_node(
            "loop",
            "body",
            json!({ "loop_type": "count", "count": "not even a number" }),
        )
        .add_end_node("end")
        .connect("start", "loop")
        .connect("loop", "end");

    let (executor, report, data) = run(builder.build(), factory(&log)).await?;

    assert!(report.is_success());
    assert_eq!(report.executed, vec!["start", "loop", "end"]);
    assert!(log.lock().is_empty());
    assert!(vertex(&executor, "loop").result().is_none());
    assert!(!data.variable_exists("body_break"));
    Ok(())
}

#[tokio::test]
async fn failed_child_stops_loop_with_child_message() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut builder = loop_flow(json!({ "loop_type": "count", "count": 4 }));
    // llm 没有注册执行器，命中时该节点失败
    branch_at(&mut builder, 1, "llm", NodeType::Llm);

    let (executor, report, _) = run(builder.build(), factory(&log)).await?;

    assert_eq!(log.lock().len(), 2);
    let failure = report.failed.expect("loop should fail");
    assert_eq!(failure.node_id, "loop");
    assert_eq!(failure.code, Some(ErrorCode::ExecuteFailed));
    assert_eq!(failure.message, "flow.node.loop.loop_flow_execute_failed");
    assert_eq!(failure.params.get("error"), Some(&json!("flow.node.type_unsupported")));
    assert_eq!(failure.params.get("node_id"), Some(&json!("llm")));
    let child_params = failure.params.get("error_params").expect("child params forwarded");
    assert_eq!(child_params.get("type"), Some(&json!("llm")));
    assert!(executor.flow().get_node_by_id("end").and_then(|n| n.debug_result()).is_none());
    Ok(())
}

#[tokio::test]
async fn loop_failure_keeps_child_error_params() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut builder = loop_flow(json!({ "loop_type": "count", "count": 2 }));
    builder
        .add_node("grp", NodeType::CreateGroup, json!({ "owner_id": "u-1" }))
        .set_parent("grp", "body")
        .connect("step", "grp");

    let (_, report, _) = run(builder.build(), factory(&log)).await?;

    let failure = report.failed.expect("group name is required");
    assert_eq!(failure.message, "flow.node.loop.loop_flow_execute_failed");
    assert_eq!(failure.params.get("error"), Some(&json!("common.empty")));
    assert_eq!(failure.params.get("node_id"), Some(&json!("grp")));
    assert_eq!(
        failure.params.get("error_params"),
        Some(&json!({ "label": "group_name" }))
    );
    Ok(())
}

#[tokio::test]
async fn loop_leaves_original_flow_grouping_untouched() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let flow = loop_flow(json!({ "loop_type": "count", "count": 2 })).build();

    let (executor, _, _) = run(flow, factory(&log)).await?;

    let flow = executor.flow();
    assert_eq!(flow.get_node_by_id("step").and_then(|n| n.parent_id()), Some("body"));
    assert_eq!(flow.get_node_by_id("body").and_then(|n| n.parent_id()), Some("loop"));
    // 循环体内的节点在派生流程中执行，不挂到主流程上
    assert!(flow.get_node_by_id("step").and_then(|n| n.debug_result()).is_none());
    Ok(())
}

#[tokio::test]
async fn inner_break_does_not_break_outer_loop() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut builder = FlowBuilder::new("nested");
    builder
        .add_start_node("start")
        .add_loop_node("outer", "outer_body", json!({ "loop_type": "count", "count": 2 }))
        .add_loop_node("inner", "inner_body", json!({ "loop_type": "count", "count": 3 }))
        .add_node("step", NodeType::Code, json!({ "watch": "inner" }))
        .add_node(
            "check",
            NodeType::If,
            json!({
                "branches": [{
                    "branch_id": "hit",
                    "branch_type": "if",
                    "condition": { "conditions": [{
                        "left": { "kind": "field", "path": "inner.index" },
                        "operator": "gte",
                        "right": { "kind": "const", "value": 1 }
                    }] },
                    "next_nodes": ["stop"]
                }]
            }),
        )
        .add_node("stop", NodeType::LoopStop, Value::Null)
        .set_parent("inner", "outer_body")
        .set_parent("step", "inner_body")
        .set_parent("check", "inner_body")
        .set_parent("stop", "inner_body")
        .connect("start", "outer")
        .connect("outer_body", "inner")
        .connect("inner_body", "step")
        .connect("step", "check")
        .connect("check", "stop");

    let (executor, report, data) = run(builder.build(), factory(&log)).await?;

    assert!(report.is_success());
    let entries = log.lock().clone();
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().all(|entry| entry["in_loop"] == json!("inner_body")));
    let inner_indexes: Vec<Value> = entries.iter().map(|e| e["loop"]["index"].clone()).collect();
    assert_eq!(inner_indexes, vec![json!(0), json!(1), json!(0), json!(1)]);
    assert_eq!(
        vertex(&executor, "outer").result(),
        Some(&json!({ "loop_type": "count", "iterations": 2 }))
    );
    assert_eq!(data.variable_get("outer_body_break", Value::Null), json!(false));
    Ok(())
}

#[tokio::test]
async fn loop_stop_outside_loop_fails() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut builder = FlowBuilder::new("stray_stop");
    builder
        .add_start_node("start")
        .add_node("stop", NodeType::LoopStop, Value::Null)
        .connect("start", "stop");

    let (_, report, _) = run(builder.build(), factory(&log)).await?;

    let failure = report.failed.expect("stop should fail");
    assert_eq!(failure.message, "flow.node.loop.stop_outside_loop");
    assert_eq!(failure.code, Some(ErrorCode::ExecuteValidateFailed));
    Ok(())
}
