use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

use super::component::ValueExpression;
use super::{as_numeric, render_text, ExpressionFieldData};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOperator {
    Equals,
    NotEquals,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    NotContains,
    Empty,
    NotEmpty,
}

/// 条件项：比较或嵌套分组
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionItem {
    Compare {
        left: ValueExpression,
        operator: CompareOperator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        right: Option<ValueExpression>,
    },
    Group(ConditionExpression),
}

/// 条件表达式，空条件列表恒为真
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionExpression {
    #[serde(default)]
    pub ops: LogicalOperator,
    #[serde(default)]
    pub conditions: Vec<ConditionItem>,
}

impl ConditionExpression {
    pub fn always() -> Self {
        Self::default()
    }

    pub fn compare(
        left: ValueExpression,
        operator: CompareOperator,
        right: ValueExpression,
    ) -> Self {
        Self {
            ops: LogicalOperator::And,
            conditions: vec![ConditionItem::Compare {
                left,
                operator,
                right: Some(right),
            }],
        }
    }

    pub fn evaluate(&self, data: &ExpressionFieldData) -> Result<bool> {
        if self.conditions.is_empty() {
            return Ok(true);
        }
        for item in &self.conditions {
            let matched = item.evaluate(data)?;
            match self.ops {
                LogicalOperator::And if !matched => return Ok(false),
                LogicalOperator::Or if matched => return Ok(true),
                _ => {}
            }
        }
        Ok(matches!(self.ops, LogicalOperator::And))
    }
}

impl ConditionItem {
    fn evaluate(&self, data: &ExpressionFieldData) -> Result<bool> {
        match self {
            ConditionItem::Group(group) => group.evaluate(data),
            ConditionItem::Compare {
                left,
                operator,
                right,
            } => {
                let left = left.evaluate(data)?;
                let right = match right {
                    Some(expression) => expression.evaluate(data)?,
                    None => Value::Null,
                };
                Ok(compare(*operator, &left, &right))
            }
        }
    }
}

fn compare(operator: CompareOperator, left: &Value, right: &Value) -> bool {
    match operator {
        CompareOperator::Equals => loose_eq(left, right),
        CompareOperator::NotEquals => !loose_eq(left, right),
        CompareOperator::Gt => numeric(left, right, |l, r| l > r),
        CompareOperator::Gte => numeric(left, right, |l, r| l >= r),
        CompareOperator::Lt => numeric(left, right, |l, r| l < r),
        CompareOperator::Lte => numeric(left, right, |l, r| l <= r),
        CompareOperator::Contains => contains(left, right),
        CompareOperator::NotContains => !contains(left, right),
        CompareOperator::Empty => is_empty(left),
        CompareOperator::NotEmpty => !is_empty(left),
    }
}

fn numeric(left: &Value, right: &Value, apply: impl Fn(f64, f64) -> bool) -> bool {
    match (as_numeric(left), as_numeric(right)) {
        (Some(l), Some(r)) => apply(l, r),
        _ => false,
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    if let (Some(l), Some(r)) = (as_numeric(left), as_numeric(right)) {
        return l == r;
    }
    match (left, right) {
        (Value::String(_), Value::Bool(_) | Value::Number(_))
        | (Value::Bool(_) | Value::Number(_), Value::String(_)) => {
            render_text(left) == render_text(right)
        }
        _ => false,
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(text) => text.contains(&render_text(needle)),
        Value::Array(items) => items.iter().any(|item| loose_eq(item, needle)),
        Value::Object(map) => map.contains_key(&render_text(needle)),
        _ => false,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn data() -> ExpressionFieldData {
        let mut map = Map::new();
        map.insert("loop".into(), json!({ "index": 2, "item": "b" }));
        map.insert("variables".into(), json!({ "tags": ["vip"], "score": "10" }));
        ExpressionFieldData::new(map)
    }

    #[test]
    fn empty_condition_is_true() {
        assert!(ConditionExpression::always().evaluate(&data()).unwrap());
    }

    #[test]
    fn numeric_comparison_coerces_strings() {
        let cond = ConditionExpression::compare(
            ValueExpression::field("variables.score"),
            CompareOperator::Gte,
            ValueExpression::constant(9),
        );
        assert!(cond.evaluate(&data()).unwrap());

        let not_numeric = ConditionExpression::compare(
            ValueExpression::field("loop.item"),
            CompareOperator::Gt,
            ValueExpression::constant(1),
        );
        assert!(!not_numeric.evaluate(&data()).unwrap());
    }

    #[test]
    fn or_groups_and_contains() {
        let cond: ConditionExpression = serde_json::from_value(json!({
            "ops": "or",
            "conditions": [
                { "left": { "kind": "field", "path": "loop.index" }, "operator": "equals",
                  "right": { "kind": "const", "value": 5 } },
                { "ops": "and", "conditions": [
                    { "left": { "kind": "field", "path": "variables.tags" }, "operator": "contains",
                      "right": { "kind": "const", "value": "vip" } },
                    { "left": { "kind": "field", "path": "variables.none" }, "operator": "empty" }
                ] }
            ]
        }))
        .unwrap();
        assert!(cond.evaluate(&data()).unwrap());
    }

    #[test]
    fn equals_treats_numeric_strings_as_numbers() {
        assert!(compare(CompareOperator::Equals, &json!("2"), &json!(2)));
        assert!(compare(CompareOperator::Equals, &json!("true"), &json!(true)));
        assert!(compare(CompareOperator::NotEquals, &json!("a"), &json!(null)));
    }
}
