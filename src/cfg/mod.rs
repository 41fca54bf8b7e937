//! cfg 模块 - 配置辅助
//!
//! 配置结构统一使用 serde + SmartDefault 声明默认值，garde 做校验，
//! 时长字段使用 [`HumanDur`] 以 "100ms"、"1m30s" 的形式书写。

pub mod duration;

pub use duration::{format_duration, parse_duration, serde_as, HumanDur};
