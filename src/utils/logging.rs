use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::EnvConfig;

pub const DEBUG_ENV: &str = "MAGICFLOW_DEBUG";

/// 日志配置
pub struct LoggingConfig;

impl LoggingConfig {
    /// 初始化日志系统
    ///
    /// 支持通过环境变量配置：
    /// - RUST_LOG: 设置日志级别（error, warn, info, debug, trace）
    /// - MAGICFLOW_DEBUG: 启用详细调试输出
    ///
    /// 重复初始化会被忽略。
    pub fn init() {
        let is_debug = Self::is_debug();

        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => {
                if is_debug {
                    EnvFilter::new("magicflow=debug,info")
                } else {
                    EnvFilter::new("magicflow=info,warn")
                }
            }
        };

        // 日志写 stderr，stdout 留给命令行的 JSON 输出
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(is_debug)
            .with_file(is_debug)
            .with_line_number(is_debug)
            .with_thread_ids(is_debug);

        let initialized = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .is_ok();

        if initialized && is_debug {
            tracing::debug!("调试模式已启用");
        }
    }

    /// 与 `EngineConfig::from_env` 使用同一套开关解析，`0`/`off` 视为关闭
    pub fn is_debug() -> bool {
        EnvConfig::get_flag(DEBUG_ENV).unwrap_or(false)
    }
}
