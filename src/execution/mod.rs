pub mod data;
pub mod executor;
pub mod vertex;

pub use data::{ExecutionData, ExecutionType, Operator, TriggerData};
pub use executor::{ExecutionReport, FlowExecutor, NodeFailure};
pub use vertex::VertexResult;
