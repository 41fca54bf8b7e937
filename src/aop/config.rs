use crate::aop::advice::Advice;
use crate::aop::logging::{logging_advice, LoggingAdviceConfig};
use crate::aop::retry::{retry_advice, RetryAdviceConfig};
use anyhow::Result;
use garde::Validate;
use serde::Deserialize;
use smart_default::SmartDefault;

/// 代理配置
#[derive(Debug, Clone, Deserialize, SmartDefault, Validate)]
#[serde(default)]
pub struct ProxyConfig {
    /// 强制使用类代理，即使目标声明了接口
    #[garde(skip)]
    pub proxy_target_class: bool,

    /// 调用期间是否把当前连接点暴露给 `current_join_point()`
    #[default = true]
    #[garde(skip)]
    pub expose_invocation: bool,

    /// 创建代理时立即解析所有方法的调用链，只用于预热缓存
    ///
    /// 无论是否开启，切点求值错误都在创建代理时返回
    #[garde(skip)]
    pub eager_resolution: bool,
}

/// 织入配置
///
/// ```ignore
/// let config = AopConfig::from_json5(r#"{
///     proxy: { proxy_target_class: true },
///     logging: { info_sample_rate: 0.1 },
///     retry: { max_times: 3, strategy: "exponential", min_delay: "10ms" },
/// }"#)?;
/// ```
#[derive(Debug, Clone, Deserialize, SmartDefault, Validate)]
#[serde(default)]
pub struct AopConfig {
    #[garde(dive)]
    pub proxy: ProxyConfig,

    /// 内置日志通知，不配置则不启用
    #[garde(dive)]
    pub logging: Option<LoggingAdviceConfig>,

    /// 内置重试通知，不配置则不启用
    #[garde(dive)]
    pub retry: Option<RetryAdviceConfig>,
}

impl AopConfig {
    /// 从 json5 文本解析并校验
    pub fn from_json5(text: &str) -> Result<Self> {
        let config: AopConfig = json5::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 按配置创建内置通知，日志在外层，重试在内层
    pub fn builtin_advice(&self) -> Result<Vec<Advice>> {
        let mut advice = Vec::new();
        if let Some(logging) = &self.logging {
            advice.push(logging_advice(logging.clone())?);
        }
        if let Some(retry) = &self.retry {
            advice.push(retry_advice(retry.clone())?);
        }
        Ok(advice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aop::advice::AdviceType;
    use std::time::Duration;

    #[test]
    fn test_proxy_config_default() {
        let config = ProxyConfig::default();
        assert!(!config.proxy_target_class);
        assert!(config.expose_invocation);
        assert!(!config.eager_resolution);

        let config: ProxyConfig = json5::from_str("{}").unwrap();
        assert!(config.expose_invocation);
    }

    #[test]
    fn test_aop_config_from_json5() {
        let config = AopConfig::from_json5(
            r#"{
                // 类代理
                proxy: { proxy_target_class: true, expose_invocation: false },
                retry: { max_times: 2, strategy: "constant", delay: "10ms" },
            }"#,
        )
        .unwrap();
        assert!(config.proxy.proxy_target_class);
        assert!(!config.proxy.expose_invocation);
        assert!(config.logging.is_none());
        let retry = config.retry.as_ref().unwrap();
        assert_eq!(retry.max_times, 2);
        assert_eq!(retry.delay, Duration::from_millis(10));

        let advice = config.builtin_advice().unwrap();
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].advice_type(), AdviceType::Around);
    }

    #[test]
    fn test_aop_config_validation() {
        assert!(AopConfig::from_json5(r#"{ retry: { strategy: "random" } }"#).is_err());
        assert!(AopConfig::from_json5(r#"{ logging: { info_sample_rate: 2.0 } }"#).is_err());
        assert!(AopConfig::from_json5("{ proxy: ").is_err());

        let config = AopConfig::from_json5("{}").unwrap();
        assert!(config.builtin_advice().unwrap().is_empty());
    }
}
