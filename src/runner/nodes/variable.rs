use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{ExecuteError, Result};
use crate::execution::{ExecutionData, VertexResult};
use crate::flow::Node;
use crate::runner::params::{evaluate_value, required};
use crate::runner::{FrontResults, NodeRunner, RunContext};

#[derive(Clone, Debug, Deserialize)]
struct VariableAssignment {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: Value,
}

/// 变量保存：逐项求值后写入流程变量
pub struct VariableSaveRunner {
    node: Node,
}

impl VariableSaveRunner {
    pub fn new(node: &Node) -> Self {
        Self { node: node.clone() }
    }
}

#[async_trait]
impl NodeRunner for VariableSaveRunner {
    fn node(&self) -> &Node {
        &self.node
    }

    async fn run(
        &self,
        vertex: &mut VertexResult,
        data: &mut ExecutionData,
        _front: &FrontResults,
        _ctx: &RunContext<'_>,
    ) -> Result<()> {
        let assignments: Vec<VariableAssignment> =
            required(&self.node, "variables", "variables")?;

        let mut saved = Map::new();
        for assignment in assignments {
            let name = assignment.name.trim();
            if name.is_empty() {
                return Err(ExecuteError::empty("name").into());
            }
            // 逐项求值，后面的变量能看到前面刚保存的值
            let fields = data.expression_field_data();
            let value = evaluate_value(Some(&assignment.value), name, &fields)?;
            data.variable_save(name, value.clone());
            saved.insert(name.to_string(), value);
        }

        vertex.add_debug_log("saved", Value::Object(saved.clone()));
        vertex.set_result(Value::Object(saved));
        Ok(())
    }
}
