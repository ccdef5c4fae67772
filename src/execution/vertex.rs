use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ErrorCode, FlowError};

/// 单个节点一次执行的结果：调试日志、结果载荷、成功标记与错误信息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VertexResult {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    error_params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    debug_log: Vec<(String, Value)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    children_ids: Option<Vec<String>>,
    #[serde(default)]
    elapsed_ms: u64,
}

impl Default for VertexResult {
    fn default() -> Self {
        Self::new()
    }
}

impl VertexResult {
    pub fn new() -> Self {
        Self {
            success: true,
            error_code: None,
            error_message: None,
            error_params: Map::new(),
            result: None,
            debug_log: Vec::new(),
            children_ids: None,
            elapsed_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn add_debug_log(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.debug_log.push((key.into(), value.into()));
    }

    pub fn debug_log(&self) -> &[(String, Value)] {
        &self.debug_log
    }

    pub fn clear_debug_log(&mut self) {
        self.debug_log.clear();
    }

    pub fn set_result(&mut self, result: Value) {
        self.result = Some(result);
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// 分支节点用它选择实际要走的后续节点
    pub fn set_children_ids(&mut self, children_ids: Vec<String>) {
        self.children_ids = Some(children_ids);
    }

    pub fn children_ids(&self) -> Option<&[String]> {
        self.children_ids.as_deref()
    }

    /// 记录失败；错误信息只保存本地化 key，不保存内部错误文本
    pub fn fail(&mut self, error: &FlowError) {
        self.success = false;
        self.error_code = Some(error.code());
        self.error_message = Some(error.message_key().to_string());
        self.error_params = error
            .as_execute()
            .map(|execute| execute.params.clone())
            .unwrap_or_default();
        self.children_ids = None;
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error_code
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn error_params(&self) -> &Map<String, Value> {
        &self.error_params
    }

    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed_ms = elapsed.as_millis() as u64;
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecuteError;

    #[test]
    fn failure_keeps_key_and_params() {
        let mut vertex = VertexResult::new();
        vertex.set_children_ids(vec!["next".into()]);
        vertex.fail(&ExecuteError::empty("owner_id").into());

        assert!(!vertex.is_success());
        assert_eq!(vertex.error_code(), Some(ErrorCode::FlowNodeValidateFailed));
        assert_eq!(vertex.error_message(), Some("common.empty"));
        assert_eq!(vertex.error_params().get("label"), Some(&Value::from("owner_id")));
        assert!(vertex.children_ids().is_none());
    }

    #[test]
    fn debug_log_preserves_insertion_order() {
        let mut vertex = VertexResult::new();
        vertex.add_debug_log("b", 1);
        vertex.add_debug_log("a", 2);
        let keys: Vec<_> = vertex.debug_log().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }
}
