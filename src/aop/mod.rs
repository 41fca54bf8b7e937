//! AOP (Aspect-Oriented Programming) 模块
//!
//! 方法拦截运行时：用切点匹配连接点，把所有匹配的通知组合成一条有序的调用链，
//! 每次调用由 [`Invocation`] 递归执行这条链，最后调用目标方法。
//!
//! - [`Pointcut`]: 静态过滤 + 可选的动态（按参数）过滤
//! - [`Advice`]: Before / After / AfterReturning / AfterThrowing / Around
//! - [`AdviceAdapterRegistry`]: 把各种通知统一适配成 [`Interceptor`]
//! - [`AdvisorCatalog`]: 通知器目录，按顺序查找适用的通知器
//! - [`ChainResolver`]: 按（类型，方法）解析并缓存调用链
//! - [`ProxyFactory`] / [`Proxy`]: 把目标的调用路由到调用链
//! - [`EarlyReferenceCache`]: 循环依赖时提前暴露唯一的代理引用
//! - 内置通知: [`logging_advice`]、[`retry_advice`]
//!
//! # 使用示例
//!
//! ```ignore
//! use aopx::aop::{Advice, Advisor, AdvisorCatalog, Pointcut, ProxyConfig, ProxyFactory};
//!
//! let catalog = AdvisorCatalog::new(vec![
//!     Advisor::new(Pointcut::method("foo"), Advice::before(|jp| {
//!         tracing::info!("before {}", jp);
//!         Ok(())
//!     }).with_order(1)),
//! ]);
//! let factory = ProxyFactory::new(catalog, ProxyConfig::default())?;
//! let proxy = factory.wrap(Arc::new(MyTarget))?;
//! let value: i32 = proxy.call("foo", aopx::args![21])?;
//! ```

pub mod advice;
pub mod advisor;
pub mod chain;
pub mod config;
pub mod early_reference;
pub mod error;
pub mod interceptor;
pub mod invocation;
pub mod join_point;
pub mod logging;
pub mod pointcut;
pub mod proxy;
pub mod retry;
pub mod target;

pub use advice::{
    Advice, AdviceKind, AdviceType, AspectInstanceFactory, InstancePolicy, ThrowsMatcher,
    DEFAULT_ORDER,
};
pub use advisor::{Advisor, AdvisorCatalog};
pub use chain::{Chain, ChainResolver};
pub use config::{AopConfig, ProxyConfig};
pub use early_reference::EarlyReferenceCache;
pub use error::AopError;
pub use interceptor::{default_registry, from_fn, AdapterFn, AdviceAdapterRegistry, Interceptor};
pub use invocation::{current_join_point, invocation_depth, Invocation, ProceedingJoinPoint};
pub use join_point::{
    ArgBinding, Args, InvocationResult, JoinPoint, MethodSignature, TypeInfo, Value,
};
pub use logging::{logging_advice, LoggingAdviceConfig};
pub use pointcut::Pointcut;
pub use proxy::{Exposed, Proxy, ProxyFactory, ProxyId, ProxyStrategy};
pub use retry::{retry_advice, retry_advice_when, RetryAdviceConfig};
pub use target::Target;
