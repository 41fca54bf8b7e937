//! init_tracing 的集成测试
//!
//! 全局 subscriber 只能安装一次，测试需要串行执行

use aopx::aop::{
    logging_advice, Advisor, AdvisorCatalog, Args, InvocationResult, LoggingAdviceConfig,
    MethodSignature, Pointcut, ProxyConfig, ProxyFactory, Target, TypeInfo,
};
use aopx::{args, init_tracing, TraceConfig};
use serial_test::serial;
use std::sync::Arc;

static METHODS: [MethodSignature; 1] = [MethodSignature::new("ping", &[])];
static TYPE: TypeInfo = TypeInfo::new("Pinger", &METHODS);

struct Pinger;

impl Target for Pinger {
    fn type_info(&self) -> &'static TypeInfo {
        &TYPE
    }

    fn invoke(&self, _: &MethodSignature, _: &Args) -> InvocationResult {
        Ok(Box::new("pong".to_string()))
    }
}

#[test]
#[serial]
fn test_init_tracing_is_idempotent() {
    let config = TraceConfig {
        log_level: "aopx=debug".to_string(),
        ..Default::default()
    };
    assert!(init_tracing(&config).is_ok());
    // 第二次调用直接返回第一次的结果
    assert!(init_tracing(&TraceConfig::default()).is_ok());
}

#[test]
#[serial]
fn test_logging_advice_after_init() {
    init_tracing(&TraceConfig::default()).unwrap();

    let advice = logging_advice(LoggingAdviceConfig::default()).unwrap();
    let proxy = ProxyFactory::new(
        AdvisorCatalog::new(vec![Advisor::new(Pointcut::all(), advice)]),
        ProxyConfig::default(),
    )
    .unwrap()
    .wrap(Arc::new(Pinger))
    .unwrap();

    assert_eq!(proxy.call::<String>("ping", args![]).unwrap(), "pong");
}
