//! aopx - 方法拦截运行时
//!
//! 在不修改目标对象的前提下，把日志、审计、权限检查、重试等横切逻辑织入到方法调用上。
//!
//! ## 模块
//!
//! - **aop**: 切点、通知、调用链、代理与循环引用处理
//! - **cfg**: 配置辅助（人类可读的时长等）
//! - **trace**: tracing subscriber 初始化

pub mod aop;
pub mod cfg;
pub mod trace;

// 重新导出主要的公共 API
pub use aop::{
    current_join_point, Advice, Advisor, AdvisorCatalog, AopConfig, AopError, Args,
    AspectInstanceFactory, ChainResolver, EarlyReferenceCache, Exposed, Interceptor, Invocation,
    InvocationResult, JoinPoint, MethodSignature, Pointcut, ProceedingJoinPoint, Proxy,
    ProxyConfig, ProxyFactory, Target, ThrowsMatcher, TypeInfo,
};
pub use trace::{init_tracing, TraceConfig};
