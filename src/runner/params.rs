// 节点参数读取：缺失报 `common.empty`，格式不对报对应的 format_error，不做静默默认

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{ErrorCode, ExecuteError, FlowError, Result};
use crate::expression::{render_text, Component, ExpressionFieldData};
use crate::flow::Node;

fn param_format_error(label: &str) -> FlowError {
    ExecuteError::throw(ErrorCode::FlowNodeValidateFailed, "flow.node.param_format_error")
        .with_param("label", label)
        .into()
}

fn component_format_error(label: &str) -> FlowError {
    ExecuteError::throw(ErrorCode::FlowNodeValidateFailed, "flow.component.format_error")
        .with_param("label", label)
        .into()
}

/// 必填的字符串字面量参数，去除首尾空白后不能为空
pub fn required_str<'a>(node: &'a Node, field: &str, label: &str) -> Result<&'a str> {
    node.param(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| FlowError::from(ExecuteError::empty(label)))
}

/// 必填参数，按 `T` 反序列化
pub fn required<T: DeserializeOwned>(node: &Node, field: &str, label: &str) -> Result<T> {
    let value = node.param(field).ok_or_else(|| ExecuteError::empty(label))?;
    serde_json::from_value(value.clone()).map_err(|_| param_format_error(label))
}

pub fn optional<T: DeserializeOwned>(node: &Node, field: &str, label: &str) -> Result<Option<T>> {
    node.param(field)
        .map(|value| serde_json::from_value(value.clone()).map_err(|_| param_format_error(label)))
        .transpose()
}

pub fn parse_component(value: &Value, label: &str) -> Result<Component> {
    serde_json::from_value(value.clone()).map_err(|_| component_format_error(label))
}

/// 必填的表达式组件
pub fn required_component(node: &Node, field: &str, label: &str) -> Result<Component> {
    let value = node.param(field).ok_or_else(|| ExecuteError::empty(label))?;
    parse_component(value, label)
}

/// 必须是取值型组件；条件型组件视为格式错误
pub fn value_component(value: &Value, label: &str) -> Result<Component> {
    let component = parse_component(value, label)?;
    if !component.is_value() {
        return Err(component_format_error(label));
    }
    Ok(component)
}

/// 参数求值：对象按取值组件求值，其余 JSON 值按字面量使用，缺失时为 `Null`
pub fn evaluate_param(
    node: &Node,
    field: &str,
    label: &str,
    fields: &ExpressionFieldData,
) -> Result<Value> {
    evaluate_value(node.param(field), label, fields)
}

pub fn evaluate_value(
    value: Option<&Value>,
    label: &str,
    fields: &ExpressionFieldData,
) -> Result<Value> {
    match value {
        None => Ok(Value::Null),
        Some(object) if object.is_object() => value_component(object, label)?.evaluate(fields),
        Some(literal) => Ok(literal.clone()),
    }
}

/// 求值后要求得到非空文本
pub fn required_text(
    node: &Node,
    field: &str,
    label: &str,
    fields: &ExpressionFieldData,
) -> Result<String> {
    let text = render_text(&evaluate_param(node, field, label, fields)?);
    let text = text.trim();
    if text.is_empty() {
        return Err(ExecuteError::empty(label).into());
    }
    Ok(text.to_string())
}

/// `{ name: 组件或字面量 }` 形式的映射逐项求值，保持声明顺序
pub fn evaluate_map(
    node: &Node,
    field: &str,
    fields: &ExpressionFieldData,
) -> Result<Map<String, Value>> {
    let Some(value) = node.param(field) else {
        return Ok(Map::new());
    };
    let Value::Object(entries) = value else {
        return Err(param_format_error(field));
    };
    let mut evaluated = Map::new();
    for (name, entry) in entries {
        evaluated.insert(name.clone(), evaluate_value(Some(entry), name, fields)?);
    }
    Ok(evaluated)
}
