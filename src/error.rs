use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlowError>;

/// 业务错误码
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ValidateFailed,
    FlowNodeValidateFailed,
    ExecuteValidateFailed,
    ExecuteFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidateFailed => "validate_failed",
            ErrorCode::FlowNodeValidateFailed => "flow_node_validate_failed",
            ErrorCode::ExecuteValidateFailed => "execute_validate_failed",
            ErrorCode::ExecuteFailed => "execute_failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结构化执行错误：错误码 + 多语言 key + 参数，文案由展示层渲染
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExecuteError {
    pub code: ErrorCode,
    pub key: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

impl ExecuteError {
    pub fn throw(code: ErrorCode, key: impl Into<String>) -> Self {
        Self {
            code,
            key: key.into(),
            params: Map::new(),
        }
    }

    /// `common.empty` 的快捷方式，`label` 指出缺失的字段
    pub fn empty(label: impl Into<String>) -> Self {
        Self::throw(ErrorCode::FlowNodeValidateFailed, "common.empty")
            .with_param("label", label.into())
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }
}

impl fmt::Display for ExecuteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{} {}", self.key, Value::Object(self.params.clone()))
        }
    }
}

impl std::error::Error for ExecuteError {}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Execute(#[from] ExecuteError),
    #[error("invalid flow: {0}")]
    InvalidFlow(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FlowError {
    pub fn as_execute(&self) -> Option<&ExecuteError> {
        match self {
            FlowError::Execute(error) => Some(error),
            _ => None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            FlowError::Execute(error) => error.code,
            FlowError::InvalidFlow(_) => ErrorCode::ValidateFailed,
            _ => ErrorCode::ExecuteFailed,
        }
    }

    /// 展示层使用的 key；非业务错误统一折叠为 `flow.execute.unknown_error`，不暴露内部文本
    pub fn message_key(&self) -> &str {
        match self {
            FlowError::Execute(error) => &error.key,
            FlowError::InvalidFlow(_) => "flow.validate_failed",
            _ => "flow.execute.unknown_error",
        }
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(error: serde_json::Error) -> Self {
        FlowError::Serialization(error.to_string())
    }
}
