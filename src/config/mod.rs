// 引擎配置

mod env;

pub use env::EnvConfig;

use serde::{Deserialize, Serialize};

/// 条件循环 `max_loop_count` 的上限，防止失控循环
pub const MAX_LOOP_COUNT_LIMIT: u64 = 9999;

pub const DEBUG_ENV: &str = crate::utils::logging::DEBUG_ENV;
pub const RECORD_DEBUG_LOGS_ENV: &str = "MAGICFLOW_RECORD_DEBUG_LOGS";
pub const MAX_SUB_FLOW_DEPTH_ENV: &str = "MAGICFLOW_MAX_SUB_FLOW_DEPTH";

/// 执行引擎配置
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 输出每个节点的详细执行日志
    pub debug: bool,
    /// 节点执行时是否写入 VertexResult 的调试日志
    pub record_debug_logs: bool,
    /// 子流程最大嵌套深度
    pub max_sub_flow_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debug: false,
            record_debug_logs: true,
            max_sub_flow_depth: 8,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            debug: EnvConfig::get_flag(DEBUG_ENV).unwrap_or(defaults.debug),
            record_debug_logs: EnvConfig::get_flag(RECORD_DEBUG_LOGS_ENV)
                .unwrap_or(defaults.record_debug_logs),
            max_sub_flow_depth: EnvConfig::get_usize(MAX_SUB_FLOW_DEPTH_ENV)
                .filter(|depth| *depth > 0)
                .unwrap_or(defaults.max_sub_flow_depth),
        }
    }
}
