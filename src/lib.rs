pub mod config;
pub mod error;
pub mod execution;
pub mod expression;
pub mod flow;
pub mod runner;
pub mod services;
pub mod utils;

pub use config::{EngineConfig, MAX_LOOP_COUNT_LIMIT};
pub use error::{ErrorCode, ExecuteError, FlowError, Result};
pub use execution::{
    ExecutionData, ExecutionReport, ExecutionType, FlowExecutor, NodeFailure, Operator,
    TriggerData, VertexResult,
};
pub use expression::{
    CompareOperator, Component, ConditionExpression, ExpressionFieldData, LogicalOperator,
    ValueExpression,
};
pub use flow::{
    load_flow_from_path, load_flow_from_str, load_flow_from_value, Flow, FlowBuilder,
    FlowRegistry, FlowType, Node, NodeMeta, NodeType, TriggerType,
};
pub use runner::{FrontResults, NodeRunner, NodeRunnerFactory, RunContext};
pub use services::{
    CreateGroupRequest, GroupInfo, GroupService, InMemoryGroupService, RunnerServices,
};
pub use utils::{logging, validation};
