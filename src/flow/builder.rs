use serde_json::Value;

use super::node::{Node, NodeType};
use super::types::{Flow, FlowType};

/// Flow 构建器
pub struct FlowBuilder {
    code: String,
    name: String,
    flow_type: FlowType,
    nodes: Vec<Node>,
}

impl FlowBuilder {
    pub fn new<T: Into<String>>(code: T) -> Self {
        Self {
            code: code.into(),
            name: String::new(),
            flow_type: FlowType::Main,
            nodes: Vec::new(),
        }
    }

    pub fn name(&mut self, name: &str) -> &mut Self {
        self.name = name.to_string();
        self
    }

    pub fn flow_type(&mut self, flow_type: FlowType) -> &mut Self {
        self.flow_type = flow_type;
        self
    }

    pub fn add_node(&mut self, node_id: &str, node_type: NodeType, params: Value) -> &mut Self {
        self.nodes
            .push(Node::new(node_id, node_type).with_params(params));
        self
    }

    pub fn add_start_node(&mut self, node_id: &str) -> &mut Self {
        self.add_node(node_id, NodeType::Start, Value::Null)
    }

    pub fn add_end_node(&mut self, node_id: &str) -> &mut Self {
        self.add_node(node_id, NodeType::End, Value::Null)
    }

    /// 添加循环节点及其循环体，循环体挂在循环节点下
    pub fn add_loop_node(&mut self, node_id: &str, body_id: &str, params: Value) -> &mut Self {
        self.nodes.push(
            Node::new(node_id, NodeType::Loop)
                .with_params(params)
                .with_relation(body_id),
        );
        self.nodes
            .push(Node::new(body_id, NodeType::LoopBody).with_parent(node_id));
        self
    }

    pub fn connect(&mut self, from: &str, to: &str) -> &mut Self {
        if let Some(node) = self.node_mut(from) {
            if !node.next_nodes.iter().any(|next| next == to) {
                node.next_nodes.push(to.to_string());
            }
        }
        self
    }

    pub fn set_parent(&mut self, node_id: &str, parent_id: &str) -> &mut Self {
        if let Some(node) = self.node_mut(node_id) {
            node.meta.parent_id = Some(parent_id.to_string());
        }
        self
    }

    pub fn set_relation(&mut self, node_id: &str, relation_id: &str) -> &mut Self {
        if let Some(node) = self.node_mut(node_id) {
            node.meta.relation_id = Some(relation_id.to_string());
        }
        self
    }

    fn node_mut(&mut self, node_id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.node_id == node_id)
    }

    pub fn build(self) -> Flow {
        Flow {
            id: String::new(),
            name: if self.name.is_empty() {
                self.code.clone()
            } else {
                self.name
            },
            code: self.code,
            flow_type: self.flow_type,
            nodes: self.nodes,
        }
    }
}
