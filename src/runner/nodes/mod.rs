pub mod branch;
pub mod create_group;
pub mod end;
#[cfg(feature = "http-node")]
pub mod http;
pub mod loop_control;
pub mod loop_main;
pub mod start;
pub mod sub_flow;
pub mod variable;

pub use branch::IfRunner;
pub use create_group::CreateGroupRunner;
pub use end::EndRunner;
#[cfg(feature = "http-node")]
pub use http::HttpRunner;
pub use loop_control::{break_key, LoopBodyRunner, LoopStopRunner};
pub use loop_main::LoopMainRunner;
pub use start::StartRunner;
pub use sub_flow::SubFlowRunner;
pub use variable::VariableSaveRunner;

use std::sync::Arc;

use crate::flow::NodeType;
use crate::services::RunnerServices;

use super::factory::NodeRunnerFactory;
use super::NodeRunner;

pub fn register_builtin_runners(factory: &mut NodeRunnerFactory, services: RunnerServices) {
    factory.register(NodeType::Start, |node| {
        Ok(Box::new(StartRunner::new(node)) as Box<dyn NodeRunner>)
    });
    factory.register(NodeType::End, |node| {
        Ok(Box::new(EndRunner::new(node)) as Box<dyn NodeRunner>)
    });
    factory.register(NodeType::If, |node| {
        Ok(Box::new(IfRunner::new(node)) as Box<dyn NodeRunner>)
    });
    factory.register(NodeType::VariableSave, |node| {
        Ok(Box::new(VariableSaveRunner::new(node)) as Box<dyn NodeRunner>)
    });
    factory.register(NodeType::Loop, |node| {
        Ok(Box::new(LoopMainRunner::new(node)) as Box<dyn NodeRunner>)
    });
    factory.register(NodeType::LoopBody, |node| {
        Ok(Box::new(LoopBodyRunner::new(node)) as Box<dyn NodeRunner>)
    });
    factory.register(NodeType::LoopStop, |node| {
        Ok(Box::new(LoopStopRunner::new(node)) as Box<dyn NodeRunner>)
    });

    let groups = Arc::clone(&services.groups);
    factory.register(NodeType::CreateGroup, move |node| {
        Ok(Box::new(CreateGroupRunner::new(node, Arc::clone(&groups))) as Box<dyn NodeRunner>)
    });

    let flows = Arc::clone(&services.flows);
    factory.register(NodeType::SubFlow, move |node| {
        Ok(Box::new(SubFlowRunner::new(node, Arc::clone(&flows))) as Box<dyn NodeRunner>)
    });

    #[cfg(feature = "http-node")]
    {
        let client = reqwest::Client::new();
        factory.register(NodeType::Http, move |node| {
            Ok(Box::new(HttpRunner::new(node, client.clone())) as Box<dyn NodeRunner>)
        });
    }
}
