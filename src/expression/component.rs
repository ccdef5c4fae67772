use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorCode, ExecuteError, Result};

use super::condition::ConditionExpression;
use super::{render_text, ExpressionFieldData};

/// 取值表达式
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueExpression {
    Const { value: Value },
    Field { path: String },
    Template { template: String },
}

impl ValueExpression {
    pub fn constant(value: impl Into<Value>) -> Self {
        ValueExpression::Const {
            value: value.into(),
        }
    }

    pub fn field(path: impl Into<String>) -> Self {
        ValueExpression::Field { path: path.into() }
    }

    pub fn evaluate(&self, data: &ExpressionFieldData) -> Result<Value> {
        match self {
            ValueExpression::Const { value } => Ok(value.clone()),
            ValueExpression::Field { path } => {
                Ok(data.get_path(path).cloned().unwrap_or(Value::Null))
            }
            ValueExpression::Template { template } => render_template(template, data),
        }
    }
}

/// 模板中的 `{{path}}` 替换为对应值；整个模板只有一个占位符时保留原始类型
fn render_template(template: &str, data: &ExpressionFieldData) -> Result<Value> {
    let trimmed = template.trim();
    if let Some(inner) = trimmed
        .strip_prefix("{{")
        .and_then(|rest| rest.strip_suffix("}}"))
    {
        if !inner.contains("{{") && !inner.contains("}}") {
            return Ok(data.get_path(inner).cloned().unwrap_or(Value::Null));
        }
    }

    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        output.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let close = after.find("}}").ok_or_else(|| {
            ExecuteError::throw(ErrorCode::ExecuteValidateFailed, "flow.expression.template_error")
                .with_param("template", template)
        })?;
        if let Some(value) = data.get_path(&after[..close]) {
            output.push_str(&render_text(value));
        }
        rest = &after[close + 2..];
    }
    output.push_str(rest);
    Ok(Value::String(output))
}

/// 表达式组件，形状为取值或条件之一
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Component {
    Value { value: ValueExpression },
    Condition { condition: ConditionExpression },
}

impl Component {
    pub fn value(value: ValueExpression) -> Self {
        Component::Value { value }
    }

    pub fn condition(condition: ConditionExpression) -> Self {
        Component::Condition { condition }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Component::Value { .. })
    }

    pub fn is_condition(&self) -> bool {
        matches!(self, Component::Condition { .. })
    }

    /// 条件组件求值为布尔值
    pub fn evaluate(&self, data: &ExpressionFieldData) -> Result<Value> {
        match self {
            Component::Value { value } => value.evaluate(data),
            Component::Condition { condition } => Ok(Value::Bool(condition.evaluate(data)?)),
        }
    }
}
