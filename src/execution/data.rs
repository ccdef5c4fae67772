use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::expression::{ExpressionFieldData, VARIABLES_KEY};
use crate::flow::TriggerType;

/// 操作人
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub uid: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub organization_code: String,
}

impl Operator {
    pub fn new(uid: impl Into<String>, organization_code: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            nickname: String::new(),
            organization_code: organization_code.into(),
        }
    }
}

/// 执行来源
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    #[default]
    ImChat,
    Api,
    Debug,
    SubFlow,
    Routine,
}

/// 触发载荷
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub params: Value,
}

static NEXT_EXECUTION_SEQ: AtomicU64 = AtomicU64::new(1);

fn execution_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let seq = NEXT_EXECUTION_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("exec-{}-{}-{}", now.as_secs(), now.subsec_nanos(), seq)
}

/// 一次顶层执行的全部可变状态
///
/// 顶层执行器持有它，循环体与子流程拿到的是同一个 `&mut ExecutionData`：
/// 循环迭代内写入的变量和节点上下文对父级立即可见。节点上下文按节点 id 存放，
/// 因此循环体内的节点 id 不能与外层节点重复。
#[derive(Clone, Debug)]
pub struct ExecutionData {
    execution_id: String,
    conversation_id: String,
    operator: Operator,
    execution_type: ExecutionType,
    trigger_type: TriggerType,
    trigger_data: TriggerData,
    variables: HashMap<String, Value>,
    node_contexts: HashMap<String, Value>,
}

impl ExecutionData {
    pub fn new(trigger_type: TriggerType, trigger_data: TriggerData, operator: Operator) -> Self {
        Self {
            execution_id: execution_id(),
            conversation_id: String::new(),
            operator,
            execution_type: ExecutionType::default(),
            trigger_type,
            trigger_data,
            variables: HashMap::new(),
            node_contexts: HashMap::new(),
        }
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = conversation_id.into();
        self
    }

    pub fn with_execution_type(mut self, execution_type: ExecutionType) -> Self {
        self.execution_type = execution_type;
        self
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn execution_type(&self) -> ExecutionType {
        self.execution_type
    }

    pub fn trigger_type(&self) -> TriggerType {
        self.trigger_type
    }

    pub fn trigger_data(&self) -> &TriggerData {
        &self.trigger_data
    }

    pub fn agent_key(&self) -> Option<&str> {
        self.trigger_data.agent_key.as_deref()
    }

    pub fn agent_user_id(&self) -> Option<&str> {
        self.trigger_data.agent_user_id.as_deref()
    }

    pub fn variable_save(&mut self, key: impl Into<String>, value: Value) {
        self.variables.insert(key.into(), value);
    }

    pub fn variable_get(&self, key: &str, default: Value) -> Value {
        self.variables.get(key).cloned().unwrap_or(default)
    }

    pub fn variable_exists(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    pub fn variables(&self) -> &HashMap<String, Value> {
        &self.variables
    }

    /// 同一节点再次执行（如每轮循环）时覆盖旧值
    pub fn save_node_context(&mut self, node_id: impl Into<String>, payload: Value) {
        self.node_contexts.insert(node_id.into(), payload);
    }

    pub fn get_node_context(&self, node_id: &str) -> Option<&Value> {
        self.node_contexts.get(node_id)
    }

    pub fn expression_field_data(&self) -> ExpressionFieldData {
        let mut fields: Map<String, Value> = self
            .node_contexts
            .iter()
            .map(|(node_id, payload)| (node_id.clone(), payload.clone()))
            .collect();
        let variables: Map<String, Value> = self
            .variables
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        fields.insert(VARIABLES_KEY.to_string(), Value::Object(variables));
        ExpressionFieldData::new(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data() -> ExecutionData {
        ExecutionData::new(
            TriggerType::ChatMessage,
            TriggerData {
                agent_key: Some("agent-1".into()),
                agent_user_id: Some("u-agent".into()),
                message: Some("hi".into()),
                params: json!({}),
            },
            Operator::new("u-1", "org-1"),
        )
    }

    #[test]
    fn variables_fall_back_to_default() {
        let mut data = data();
        assert_eq!(data.variable_get("missing", json!(false)), json!(false));
        data.variable_save("body_break", json!(true));
        assert_eq!(data.variable_get("body_break", json!(false)), json!(true));
        assert!(data.variable_exists("body_break"));
    }

    #[test]
    fn node_context_is_overwritten() {
        let mut data = data();
        data.save_node_context("loop", json!({ "index": 0 }));
        data.save_node_context("loop", json!({ "index": 1 }));
        assert_eq!(data.get_node_context("loop"), Some(&json!({ "index": 1 })));
    }

    #[test]
    fn field_data_exposes_contexts_and_variables() {
        let mut data = data();
        data.save_node_context("start", json!({ "message": "hi" }));
        data.save_node_context("variables", json!({ "shadowed": true }));
        data.variable_save("name", json!("ada"));

        let fields = data.expression_field_data();
        assert_eq!(fields.get_path("start.message"), Some(&json!("hi")));
        assert_eq!(fields.get_path("variables.name"), Some(&json!("ada")));
        assert_eq!(fields.get_path("variables.shadowed"), None);
    }

    #[test]
    fn execution_ids_are_unique() {
        assert_ne!(data().execution_id(), data().execution_id());
        assert_eq!(data().agent_user_id(), Some("u-agent"));
    }
}
