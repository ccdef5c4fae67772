// 表达式组件：按 `{node_id.field}` 路径从执行上下文取值并求值条件

mod component;
mod condition;

pub use component::{Component, ValueExpression};
pub use condition::{CompareOperator, ConditionExpression, ConditionItem, LogicalOperator};

use serde_json::{Map, Value};

/// 变量在字段数据中的保留命名空间
pub const VARIABLES_KEY: &str = "variables";

/// 表达式求值时可见的数据：节点上下文按节点 id 平铺，流程变量位于 `variables` 下
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExpressionFieldData {
    fields: Map<String, Value>,
}

impl ExpressionFieldData {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// 解析 `node_id.field.0.name` 形式的路径；数字段用于数组下标
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.trim().split('.').filter(|s| !s.is_empty());
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

/// 循环条件的真值判断
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !(text.is_empty() || text == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// 数字或数字字符串转为 f64，其余返回 `None`
pub fn as_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite()),
        _ => None,
    }
}

/// 渲染为模板文本：字符串原样输出，null 为空串
pub fn render_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
