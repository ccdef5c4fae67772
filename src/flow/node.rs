use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::execution::VertexResult;

/// Flow 节点类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Start,
    End,
    ReplyMessage,
    Llm,
    If,
    Code,
    Loop,
    LoopBody,
    LoopStop,
    VariableSave,
    Http,
    CreateGroup,
    KnowledgeSearch,
    SubFlow,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Start => "start",
            NodeType::End => "end",
            NodeType::ReplyMessage => "reply_message",
            NodeType::Llm => "llm",
            NodeType::If => "if",
            NodeType::Code => "code",
            NodeType::Loop => "loop",
            NodeType::LoopBody => "loop_body",
            NodeType::LoopStop => "loop_stop",
            NodeType::VariableSave => "variable_save",
            NodeType::Http => "http",
            NodeType::CreateGroup => "create_group",
            NodeType::KnowledgeSearch => "knowledge_search",
            NodeType::SubFlow => "sub_flow",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// 节点元数据
///
/// `parent_id` 表示节点属于某个循环体（或子流程分组），`relation_id` 由循环节点指向它的循环体。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// Flow 节点
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub node_id: String,
    pub node_type: NodeType,
    #[serde(default = "Node::default_version")]
    pub node_version: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default)]
    pub meta: NodeMeta,
    #[serde(default)]
    pub next_nodes: Vec<String>,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub debug_result: Option<VertexResult>,
}

impl Node {
    pub fn new(node_id: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            node_id: node_id.into(),
            node_type,
            node_version: Self::default_version(),
            name: String::new(),
            params: Value::Null,
            input: None,
            output: None,
            meta: NodeMeta::default(),
            next_nodes: Vec::new(),
            debug_result: None,
        }
    }

    fn default_version() -> String {
        "v0".into()
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.node_version = version.into();
        self
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next_nodes.push(next.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.meta.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_relation(mut self, relation_id: impl Into<String>) -> Self {
        self.meta.relation_id = Some(relation_id.into());
        self
    }

    /// 空字符串视为未设置
    pub fn parent_id(&self) -> Option<&str> {
        self.meta.parent_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn relation_id(&self) -> Option<&str> {
        self.meta.relation_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id().is_none()
    }

    pub fn param(&self, field: &str) -> Option<&Value> {
        self.params.get(field).filter(|value| !value.is_null())
    }

    pub fn debug_result(&self) -> Option<&VertexResult> {
        self.debug_result.as_ref()
    }
}
