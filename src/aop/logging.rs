//! 内置日志通知
//!
//! 环绕通知，每次调用结束后输出一条结构化的 tracing 事件，
//! 成功和失败分别按采样率采样。

use crate::aop::advice::Advice;
use crate::aop::join_point::DebugAny;
use anyhow::Result;
use garde::Validate;
use serde::Deserialize;
use smart_default::SmartDefault;
use std::time::Instant;

/// 日志通知配置
#[derive(Debug, Clone, Deserialize, SmartDefault, Validate)]
#[serde(default)]
pub struct LoggingAdviceConfig {
    /// 成功日志的级别，失败日志固定为 warn
    #[default = "info"]
    #[garde(pattern("^(trace|debug|info|warn|error)$"))]
    pub level: String,

    /// 成功日志的采样率（0.0 - 1.0），默认 1.0（总是记录）
    #[default = 1.0]
    #[garde(range(min = 0.0, max = 1.0))]
    pub info_sample_rate: f32,

    /// 失败日志的采样率（0.0 - 1.0），默认 1.0（总是记录）
    #[default = 1.0]
    #[garde(range(min = 0.0, max = 1.0))]
    pub warn_sample_rate: f32,

    /// 是否记录参数
    #[default = true]
    #[garde(skip)]
    pub log_args: bool,

    /// 是否记录返回值
    #[default = false]
    #[garde(skip)]
    pub log_result: bool,

    /// 通知顺序，默认在最外层
    #[default = 0]
    #[garde(skip)]
    pub order: i32,
}

fn emit_success(
    level: &str,
    operation: &str,
    args: Option<&str>,
    result: Option<&str>,
    duration_ms: u64,
) {
    macro_rules! completed {
        ($level:expr) => {
            tracing::event!(
                $level,
                operation,
                status = "success",
                duration_ms,
                args,
                result,
                "[AOP] {} completed",
                operation
            )
        };
    }

    match level {
        "trace" => completed!(tracing::Level::TRACE),
        "debug" => completed!(tracing::Level::DEBUG),
        "warn" => completed!(tracing::Level::WARN),
        "error" => completed!(tracing::Level::ERROR),
        _ => completed!(tracing::Level::INFO),
    }
}

/// 创建日志通知
pub fn logging_advice(config: LoggingAdviceConfig) -> Result<Advice> {
    config.validate()?;
    let order = config.order;

    let advice = Advice::around(move |pjp| {
        let start = Instant::now();
        let result = pjp.proceed();
        let duration_ms = start.elapsed().as_millis() as u64;

        let operation = pjp.signature();
        let args = config.log_args.then(|| format!("{:?}", pjp.args()));

        match &result {
            Ok(value) => {
                if rand::random::<f32>() < config.info_sample_rate {
                    let returned = config
                        .log_result
                        .then(|| format!("{:?}", DebugAny(&**value)));
                    emit_success(
                        &config.level,
                        &operation,
                        args.as_deref(),
                        returned.as_deref(),
                        duration_ms,
                    );
                }
            }
            Err(err) => {
                if rand::random::<f32>() < config.warn_sample_rate {
                    tracing::warn!(
                        operation = operation.as_str(),
                        status = "error",
                        duration_ms,
                        args = args.as_deref(),
                        error = %err,
                        "[AOP] {} failed",
                        operation
                    );
                }
            }
        }

        result
    });

    Ok(advice.with_order(order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aop::advisor::{Advisor, AdvisorCatalog};
    use crate::aop::config::ProxyConfig;
    use crate::aop::join_point::{Args, InvocationResult, MethodSignature, TypeInfo};
    use crate::aop::pointcut::Pointcut;
    use crate::aop::proxy::ProxyFactory;
    use crate::aop::target::Target;
    use crate::args;
    use std::fmt;
    use std::sync::{Arc, Mutex};
    use tracing::field::{Field, Visit};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, Layer};
    use tracing_subscriber::prelude::*;

    static METHODS: [MethodSignature; 1] = [MethodSignature::new("div", &["i32", "i32"])];
    static TYPE: TypeInfo = TypeInfo::new("Calculator", &METHODS);

    struct Calculator;

    impl Target for Calculator {
        fn type_info(&self) -> &'static TypeInfo {
            &TYPE
        }

        fn invoke(&self, _: &MethodSignature, args: &Args) -> InvocationResult {
            let a = *args.get::<i32>(0).unwrap_or(&0);
            let b = *args.get::<i32>(1).unwrap_or(&0);
            if b == 0 {
                anyhow::bail!("division by zero");
            }
            Ok(Box::new(a / b))
        }
    }

    /// 收集事件字段
    #[derive(Clone, Default)]
    struct Capture {
        events: Arc<Mutex<Vec<Vec<(String, String)>>>>,
    }

    struct FieldVisitor(Vec<(String, String)>);

    impl Visit for FieldVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.0.push((field.name().to_string(), format!("{:?}", value)));
        }

        fn record_str(&mut self, field: &Field, value: &str) {
            self.0.push((field.name().to_string(), value.to_string()));
        }
    }

    impl<S: Subscriber> Layer<S> for Capture {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = FieldVisitor(Vec::new());
            event.record(&mut visitor);
            self.events.lock().unwrap().push(visitor.0);
        }
    }

    impl Capture {
        fn field(&self, index: usize, name: &str) -> Option<String> {
            self.events.lock().unwrap()[index]
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        }

        fn len(&self) -> usize {
            self.events.lock().unwrap().len()
        }
    }

    fn run_with(config: LoggingAdviceConfig, a: i32, b: i32) -> (Capture, InvocationResult) {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let catalog = AdvisorCatalog::new(vec![Advisor::new(
            Pointcut::all(),
            logging_advice(config).unwrap(),
        )]);
        // 提前解析调用链，避免解析日志混进捕获结果
        let proxy_config = ProxyConfig {
            eager_resolution: true,
            ..Default::default()
        };
        let proxy = ProxyFactory::new(catalog, proxy_config)
            .unwrap()
            .wrap(Arc::new(Calculator))
            .unwrap();
        let result = tracing::subscriber::with_default(subscriber, || {
            proxy.invoke("div", args![a, b])
        });
        (capture, result)
    }

    #[test]
    fn test_logging_config_validation() {
        assert!(LoggingAdviceConfig::default().validate().is_ok());
        let config = LoggingAdviceConfig {
            level: "verbose".to_string(),
            ..Default::default()
        };
        assert!(logging_advice(config).is_err());
        let config = LoggingAdviceConfig {
            warn_sample_rate: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_logging_success_event() {
        let config = LoggingAdviceConfig {
            log_result: true,
            ..Default::default()
        };
        let (capture, result) = run_with(config, 9, 3);
        assert_eq!(*result.unwrap().downcast::<i32>().unwrap(), 3);
        assert_eq!(capture.len(), 1);
        assert_eq!(capture.field(0, "operation").as_deref(), Some("Calculator.div"));
        assert_eq!(capture.field(0, "status").as_deref(), Some("success"));
        assert_eq!(capture.field(0, "args").as_deref(), Some("[9, 3]"));
        assert_eq!(capture.field(0, "result").as_deref(), Some("3"));
    }

    #[test]
    fn test_logging_failure_event_keeps_error() {
        let (capture, result) = run_with(LoggingAdviceConfig::default(), 1, 0);
        assert_eq!(result.unwrap_err().to_string(), "division by zero");
        assert_eq!(capture.len(), 1);
        assert_eq!(capture.field(0, "status").as_deref(), Some("error"));
        assert!(capture.field(0, "result").is_none());
    }

    #[test]
    fn test_logging_sampled_out() {
        let config = LoggingAdviceConfig {
            info_sample_rate: 0.0,
            warn_sample_rate: 0.0,
            ..Default::default()
        };
        let (capture, _) = run_with(config.clone(), 4, 2);
        assert_eq!(capture.len(), 0);
        let (capture, _) = run_with(config, 4, 0);
        assert_eq!(capture.len(), 0);
    }
}
