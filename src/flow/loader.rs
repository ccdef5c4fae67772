use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::Result;

use super::types::Flow;

/// 从 JSON 值加载并校验 Flow
pub fn load_flow_from_value(value: &Value) -> Result<Flow> {
    let flow: Flow = serde_json::from_value(value.clone())?;
    flow.validate()?;
    debug!(flow_code = %flow.code, nodes = flow.nodes.len(), "flow loaded");
    Ok(flow)
}

pub fn load_flow_from_str(config: &str) -> Result<Flow> {
    let value: Value = serde_json::from_str(config)?;
    load_flow_from_value(&value)
}

pub fn load_flow_from_path(path: impl AsRef<Path>) -> Result<Flow> {
    let content = std::fs::read_to_string(path.as_ref())?;
    load_flow_from_str(&content)
}
