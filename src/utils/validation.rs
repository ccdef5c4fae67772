use crate::error::{FlowError, Result};

/// 配置校验器
pub struct ConfigValidator;

impl ConfigValidator {
    /// 节点 ID 只允许字母、数字、下划线和短横线
    pub fn validate_node_id(node_id: &str) -> Result<()> {
        if node_id.is_empty() {
            return Err(FlowError::InvalidFlow("node id must not be empty".into()));
        }

        if !node_id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            return Err(FlowError::InvalidFlow(format!(
                "node id `{}` contains invalid characters",
                node_id
            )));
        }

        Ok(())
    }

    pub fn validate_flow_code(code: &str) -> Result<()> {
        if code.is_empty() {
            return Err(FlowError::InvalidFlow("flow code must not be empty".into()));
        }

        if code.len() > 100 {
            return Err(FlowError::InvalidFlow(format!(
                "flow code `{}` is too long (max 100 chars)",
                code
            )));
        }

        Ok(())
    }
}
