use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};
use crate::utils::validation::ConfigValidator;

use super::node::{Node, NodeType};

/// Flow 类型
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    #[default]
    Main,
    Sub,
    Tools,
    CombinedNode,
    Loop,
}

/// 触发方式，决定从哪一类开始节点进入
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    #[default]
    ChatMessage,
    OpenChatWindow,
    ParamCall,
    Routine,
    LoopStart,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::ChatMessage => "chat_message",
            TriggerType::OpenChatWindow => "open_chat_window",
            TriggerType::ParamCall => "param_call",
            TriggerType::Routine => "routine",
            TriggerType::LoopStart => "loop_start",
        }
    }

    pub fn start_node_type(&self) -> NodeType {
        match self {
            TriggerType::LoopStart => NodeType::LoopBody,
            _ => NodeType::Start,
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flow 工作流
///
/// 节点按声明顺序保存；边由每个节点的 `next_nodes` 隐式给出。`Clone` 为深拷贝。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Flow {
    #[serde(default)]
    pub id: String,
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub flow_type: FlowType,
    #[serde(default)]
    pub nodes: Vec<Node>,
}

impl Flow {
    pub fn new(code: impl Into<String>, flow_type: FlowType) -> Self {
        Self {
            id: String::new(),
            code: code.into(),
            name: String::new(),
            flow_type,
            nodes: Vec::new(),
        }
    }

    pub fn get_node_by_id(&self, node_id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.node_id == node_id)
    }

    pub fn get_node_by_id_mut(&mut self, node_id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.node_id == node_id)
    }

    pub fn get_nodes_by_parent_id(&self, parent_id: &str) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|node| node.parent_id() == Some(parent_id))
            .collect()
    }

    pub fn start_node(&self, trigger: TriggerType) -> Option<&Node> {
        let wanted = trigger.start_node_type();
        self.nodes
            .iter()
            .find(|node| node.is_top_level() && node.node_type == wanted)
    }

    /// 清除所有节点上挂载的调试结果
    pub fn clear_debug_results(&mut self) {
        for node in &mut self.nodes {
            node.debug_result = None;
        }
    }

    /// 所有（直接或间接）以 `root_id` 为祖先的节点 id
    fn descendant_ids(&self, root_id: &str) -> HashSet<String> {
        let mut found: HashSet<String> = HashSet::new();
        let mut frontier = vec![root_id.to_string()];
        while let Some(parent) = frontier.pop() {
            for node in self.get_nodes_by_parent_id(&parent) {
                if found.insert(node.node_id.clone()) {
                    frontier.push(node.node_id.clone());
                }
            }
        }
        found
    }

    /// 以 `body_id` 为根派生循环子流程
    ///
    /// 循环体节点与其直接子节点会清除 `parent_id`，使子执行器把它们视为顶层节点；
    /// 更深层的后代保持原样，嵌套循环仍能找到自己的循环体。
    /// 循环体不存在或没有子节点时返回 `None`。
    pub fn create_loop_flow(&self, body_id: &str) -> Option<Flow> {
        let body = self.get_node_by_id(body_id)?;
        if self.get_nodes_by_parent_id(body_id).is_empty() {
            return None;
        }
        let descendants = self.descendant_ids(body_id);

        let mut nodes = Vec::with_capacity(descendants.len() + 1);
        let mut body = body.clone();
        body.meta.parent_id = None;
        body.debug_result = None;
        nodes.push(body);

        for node in self
            .nodes
            .iter()
            .filter(|node| descendants.contains(&node.node_id))
        {
            let mut node = node.clone();
            node.debug_result = None;
            if node.parent_id() == Some(body_id) {
                node.meta.parent_id = None;
            }
            nodes.push(node);
        }

        Some(Flow {
            id: self.id.clone(),
            code: format!("{}_loop_{}", self.code, body_id),
            name: self.name.clone(),
            flow_type: FlowType::Loop,
            nodes,
        })
    }

    /// 结构校验：节点 id 唯一、边与关联都指向已存在节点、主流程/子流程必须有开始节点
    pub fn validate(&self) -> Result<()> {
        ConfigValidator::validate_flow_code(&self.code)?;

        let mut ids = HashSet::new();
        for node in &self.nodes {
            ConfigValidator::validate_node_id(&node.node_id)?;
            if !ids.insert(node.node_id.as_str()) {
                return Err(FlowError::InvalidFlow(format!(
                    "duplicate node id `{}`",
                    node.node_id
                )));
            }
        }

        for node in &self.nodes {
            if let Some(next) = node.next_nodes.iter().find(|id| !ids.contains(id.as_str())) {
                return Err(FlowError::InvalidFlow(format!(
                    "node `{}` points to unknown next node `{}`",
                    node.node_id, next
                )));
            }
            if let Some(relation) = node.relation_id() {
                if !ids.contains(relation) {
                    return Err(FlowError::InvalidFlow(format!(
                        "node `{}` relates to unknown node `{}`",
                        node.node_id, relation
                    )));
                }
            }
        }

        if matches!(self.flow_type, FlowType::Main | FlowType::Sub)
            && self.start_node(TriggerType::ChatMessage).is_none()
        {
            return Err(FlowError::InvalidFlow(format!(
                "flow `{}` has no start node",
                self.code
            )));
        }
        Ok(())
    }
}
