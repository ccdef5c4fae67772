use std::collections::HashMap;

use crate::flow::types::Flow;

/// Flow 注册表，按 code 索引，供子流程节点查找被调用的流程
#[derive(Default)]
pub struct FlowRegistry {
    flows: HashMap<String, Flow>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self {
            flows: HashMap::new(),
        }
    }

    pub fn register(&mut self, flow: Flow) {
        self.flows.insert(flow.code.clone(), flow);
    }

    pub fn get(&self, code: &str) -> Option<&Flow> {
        self.flows.get(code)
    }
}
