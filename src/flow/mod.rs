// Flow 模块 - 节点图模型与加载

pub mod builder;
pub mod loader;
pub mod node;
pub mod registry;
pub mod types;

pub use builder::FlowBuilder;
pub use loader::{load_flow_from_path, load_flow_from_str, load_flow_from_value};
pub use node::{Node, NodeMeta, NodeType, Position};
pub use registry::FlowRegistry;
pub use types::{Flow, FlowType, TriggerType};
