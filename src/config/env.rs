use std::env;

/// 环境变量读取
pub struct EnvConfig;

impl EnvConfig {
    pub fn get_env_optional(key: &str) -> Option<String> {
        env::var(key).ok()
    }

    /// 读取布尔开关；`1/true/yes/on` 为真，`0/false/no/off` 为假，其他值视为未设置
    pub fn get_flag(key: &str) -> Option<bool> {
        Self::get_env_optional(key).and_then(|value| parse_flag(&value))
    }

    pub fn get_usize(key: &str) -> Option<usize> {
        Self::get_env_optional(key).and_then(|value| value.trim().parse().ok())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
