use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ErrorCode, ExecuteError, FlowError, Result};
use crate::execution::{ExecutionData, VertexResult};
use crate::expression::render_text;
use crate::flow::Node;
use crate::runner::params::{evaluate_map, evaluate_param, required_str, required_text};
use crate::runner::{FrontResults, NodeRunner, RunContext};

/// HTTP 请求节点
///
/// `method`、`url` 必填，`headers` 与 `body` 可选；响应体能解析为 JSON 时按 JSON 保存。
pub struct HttpRunner {
    node: Node,
    client: reqwest::Client,
}

impl HttpRunner {
    pub fn new(node: &Node, client: reqwest::Client) -> Self {
        Self {
            node: node.clone(),
            client,
        }
    }
}

fn request_failed(url: &str, error: impl std::fmt::Display) -> FlowError {
    ExecuteError::throw(ErrorCode::ExecuteFailed, "flow.node.http.request_failed")
        .with_param("url", url)
        .with_param("error", error.to_string())
        .into()
}

#[async_trait]
impl NodeRunner for HttpRunner {
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
        let fields = data.expression_field_data();
        let method = required_str(&self.node, "method", "method")?;
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes()).map_err(|_| {
            ExecuteError::throw(ErrorCode::FlowNodeValidateFailed, "flow.node.http.method_error")
                .with_param("method", method)
        })?;
        let url = required_text(&self.node, "url", "url", &fields)?;
        let headers = evaluate_map(&self.node, "headers", &fields)?;
        let body = evaluate_param(&self.node, "body", "body", &fields)?;

        let mut request = self.client.request(method.clone(), &url);
        for (name, value) in &headers {
            request = request.header(name.as_str(), render_text(value));
        }
        if !body.is_null() {
            request = request.json(&body);
        }
        debug!(node_id = %self.node.node_id, %method, url = %url, "sending http request");

        let response = request.send().await.map_err(|err| request_failed(&url, err))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|err| request_failed(&url, err))?;
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        let payload = json!({ "status": status, "body": body });
        vertex.add_debug_log("status", status);
        data.save_node_context(self.node.node_id.clone(), payload.clone());
        vertex.set_result(payload);
        Ok(())
    }
}
