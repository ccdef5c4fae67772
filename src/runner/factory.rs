use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ErrorCode, ExecuteError, Result};
use crate::flow::{Node, NodeType};
use crate::services::RunnerServices;

use super::nodes;
use super::NodeRunner;

pub type RunnerFactoryFn = Arc<dyn Fn(&Node) -> Result<Box<dyn NodeRunner>> + Send + Sync>;

/// 节点类型到执行器构造函数的注册表
#[derive(Clone, Default)]
pub struct NodeRunnerFactory {
    factories: HashMap<NodeType, RunnerFactoryFn>,
}

impl NodeRunnerFactory {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// 内置节点：开始、结束、分支、变量、循环、建群、子流程（以及启用 `http-node` 时的 HTTP）
    pub fn with_builtin_runners(services: RunnerServices) -> Self {
        let mut factory = Self::new();
        nodes::register_builtin_runners(&mut factory, services);
        factory
    }

    /// 同一类型重复注册时后者覆盖前者
    pub fn register<F>(&mut self, node_type: NodeType, factory: F)
    where
        F: Fn(&Node) -> Result<Box<dyn NodeRunner>> + Send + Sync + 'static,
    {
        self.factories.insert(node_type, Arc::new(factory));
    }

    pub fn has_runner(&self, node_type: NodeType) -> bool {
        self.factories.contains_key(&node_type)
    }

    pub fn make(&self, node: &Node) -> Result<Box<dyn NodeRunner>> {
        let builder = self.factories.get(&node.node_type).ok_or_else(|| {
            ExecuteError::throw(ErrorCode::FlowNodeValidateFailed, "flow.node.type_unsupported")
                .with_param("type", node.node_type.as_str())
                .with_param("version", node.node_version.as_str())
        })?;
        builder(node)
    }
}
