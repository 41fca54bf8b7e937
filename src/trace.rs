//! 日志输出初始化
//!
//! 织入过程中的日志都通过 `tracing` 输出，这里负责安装全局 subscriber。

use anyhow::{anyhow, Result};
use garde::Validate;
use serde::Deserialize;
use smart_default::SmartDefault;
use std::sync::OnceLock;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// tracing subscriber 配置
#[derive(Debug, Clone, Deserialize, SmartDefault, Validate, PartialEq)]
#[serde(default)]
pub struct TraceConfig {
    /// 日志级别或过滤指令，如 "info"、"aopx=debug,warn"；设置了 RUST_LOG 时以环境变量为准
    #[default = "info"]
    #[garde(length(min = 1))]
    pub log_level: String,

    /// 是否输出可读日志到控制台
    #[default = true]
    #[garde(skip)]
    pub with_fmt_layer: bool,

    /// 日志中是否包含 target（模块路径）
    #[default = true]
    #[garde(skip)]
    pub with_target: bool,
}

impl TraceConfig {
    fn env_filter(&self) -> Result<EnvFilter> {
        if std::env::var(EnvFilter::DEFAULT_ENV).is_ok() {
            return Ok(EnvFilter::try_from_default_env()?);
        }
        Ok(EnvFilter::try_new(&self.log_level)?)
    }
}

/// 保证 init_tracing 只生效一次
static INIT_ONCE: OnceLock<Result<()>> = OnceLock::new();

/// 安装全局 tracing subscriber
///
/// 多次调用只会初始化一次，后续调用返回第一次初始化的结果
pub fn init_tracing(config: &TraceConfig) -> Result<()> {
    INIT_ONCE
        .get_or_init(|| init_tracing_inner(config))
        .as_ref()
        .map_err(|e| anyhow!("{}", e))
        .copied()
}

fn init_tracing_inner(config: &TraceConfig) -> Result<()> {
    config.validate()?;
    let filter = config.env_filter()?;
    let registry = tracing_subscriber::registry().with(filter);

    if config.with_fmt_layer {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(config.with_target)
            .with_level(true);
        registry.with(fmt_layer).try_init()?;
    } else {
        registry.try_init()?;
    }
    Ok(())
}
