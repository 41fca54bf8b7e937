//! 拦截器与通知适配
//!
//! 所有通知在内部都统一成 [`Interceptor`]：它拿到当前的 [`Invocation`]，
//! 自己决定何时、调用几次 `proceed()`。各种通知形态到拦截器的转换由
//! [`AdviceAdapterRegistry`] 中的适配函数完成，注册表在启动时固定下来，之后只读。

use crate::aop::advice::{
    Advice, AdviceKind, AdviceType, AfterFn, AfterReturningFn, AfterThrowingFn, AroundFn,
    BeforeFn, ThrowsMatcher,
};
use crate::aop::error::AopError;
use crate::aop::invocation::{Invocation, ProceedingJoinPoint};
use crate::aop::join_point::{ArgBinding, InvocationResult};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

/// 拦截器
///
/// 创建后不可变，可以被多个并发调用共享；调用相关的状态都在 [`Invocation`] 上
pub trait Interceptor: Send + Sync {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> InvocationResult;

    /// 诊断用的名称
    fn name(&self) -> &str {
        "Interceptor"
    }
}

/// 用闭包实现的拦截器
pub struct FnInterceptor<F> {
    name: String,
    f: F,
}

/// 从闭包创建拦截器
pub fn from_fn<F>(name: impl Into<String>, f: F) -> FnInterceptor<F>
where
    F: Fn(&mut Invocation<'_>) -> InvocationResult + Send + Sync,
{
    FnInterceptor {
        name: name.into(),
        f,
    }
}

impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(&mut Invocation<'_>) -> InvocationResult + Send + Sync,
{
    fn invoke(&self, invocation: &mut Invocation<'_>) -> InvocationResult {
        (self.f)(invocation)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct BeforeAdviceInterceptor {
    name: String,
    run: BeforeFn,
    bindings: Arc<[ArgBinding]>,
}

impl Interceptor for BeforeAdviceInterceptor {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> InvocationResult {
        let jp = invocation.join_point().with_bindings(self.bindings.clone());
        (self.run)(&jp)?;
        invocation.proceed()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct AfterAdviceInterceptor {
    name: String,
    run: AfterFn,
    bindings: Arc<[ArgBinding]>,
}

impl Interceptor for AfterAdviceInterceptor {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> InvocationResult {
        let jp = invocation.join_point().with_bindings(self.bindings.clone());
        let result = invocation.proceed();
        (self.run)(&jp);
        result
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct AfterReturningAdviceInterceptor {
    name: String,
    run: AfterReturningFn,
    bindings: Arc<[ArgBinding]>,
}

impl Interceptor for AfterReturningAdviceInterceptor {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> InvocationResult {
        let value = invocation.proceed()?;
        let jp = invocation.join_point().with_bindings(self.bindings.clone());
        (self.run)(&jp, &*value)?;
        Ok(value)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct AfterThrowingAdviceInterceptor {
    name: String,
    throwing: ThrowsMatcher,
    run: AfterThrowingFn,
    bindings: Arc<[ArgBinding]>,
}

impl Interceptor for AfterThrowingAdviceInterceptor {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> InvocationResult {
        match invocation.proceed() {
            Ok(value) => Ok(value),
            Err(err) => {
                if self.throwing.matches(&err) {
                    let jp = invocation.join_point().with_bindings(self.bindings.clone());
                    (self.run)(&jp, &err);
                }
                Err(err)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct AroundAdviceInterceptor {
    name: String,
    run: AroundFn,
    bindings: Arc<[ArgBinding]>,
}

impl Interceptor for AroundAdviceInterceptor {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> InvocationResult {
        let mut pjp = ProceedingJoinPoint::new(invocation, self.bindings.clone());
        (self.run)(&mut pjp)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 适配函数：把某一种通知转换成拦截器
pub type AdapterFn = fn(&Advice) -> Result<Arc<dyn Interceptor>, AopError>;

fn interceptor_name(kind: &str, advice: &Advice) -> String {
    if advice.aspect_name().is_empty() {
        kind.to_string()
    } else {
        format!("{}[{}]", kind, advice.aspect_name())
    }
}

fn mismatch(expected: AdviceType, advice: &Advice) -> AopError {
    AopError::UnsupportedAdvice(format!(
        "adapter for {} cannot adapt {}",
        expected,
        advice.advice_type()
    ))
}

fn adapt_before(advice: &Advice) -> Result<Arc<dyn Interceptor>, AopError> {
    match advice.kind() {
        AdviceKind::Before(run) => Ok(Arc::new(BeforeAdviceInterceptor {
            name: interceptor_name("BeforeAdviceInterceptor", advice),
            run: run.clone(),
            bindings: advice.bindings().clone(),
        })),
        _ => Err(mismatch(AdviceType::Before, advice)),
    }
}

fn adapt_after(advice: &Advice) -> Result<Arc<dyn Interceptor>, AopError> {
    match advice.kind() {
        AdviceKind::After(run) => Ok(Arc::new(AfterAdviceInterceptor {
            name: interceptor_name("AfterAdviceInterceptor", advice),
            run: run.clone(),
            bindings: advice.bindings().clone(),
        })),
        _ => Err(mismatch(AdviceType::After, advice)),
    }
}

fn adapt_after_returning(advice: &Advice) -> Result<Arc<dyn Interceptor>, AopError> {
    match advice.kind() {
        AdviceKind::AfterReturning(run) => Ok(Arc::new(AfterReturningAdviceInterceptor {
            name: interceptor_name("AfterReturningAdviceInterceptor", advice),
            run: run.clone(),
            bindings: advice.bindings().clone(),
        })),
        _ => Err(mismatch(AdviceType::AfterReturning, advice)),
    }
}

fn adapt_after_throwing(advice: &Advice) -> Result<Arc<dyn Interceptor>, AopError> {
    match advice.kind() {
        AdviceKind::AfterThrowing { throwing, run } => {
            Ok(Arc::new(AfterThrowingAdviceInterceptor {
                name: interceptor_name("AfterThrowingAdviceInterceptor", advice),
                throwing: throwing.clone(),
                run: run.clone(),
                bindings: advice.bindings().clone(),
            }))
        }
        _ => Err(mismatch(AdviceType::AfterThrowing, advice)),
    }
}

fn adapt_around(advice: &Advice) -> Result<Arc<dyn Interceptor>, AopError> {
    match advice.kind() {
        AdviceKind::Around(run) => Ok(Arc::new(AroundAdviceInterceptor {
            name: interceptor_name("AroundAdviceInterceptor", advice),
            run: run.clone(),
            bindings: advice.bindings().clone(),
        })),
        _ => Err(mismatch(AdviceType::Around, advice)),
    }
}

fn adapt_interceptor(advice: &Advice) -> Result<Arc<dyn Interceptor>, AopError> {
    match advice.kind() {
        AdviceKind::Interceptor(interceptor) => Ok(Arc::clone(interceptor)),
        _ => Err(mismatch(AdviceType::Interceptor, advice)),
    }
}

/// 通知适配器注册表
///
/// 通知类型到适配函数的映射表，构建完成后只读
#[derive(Clone)]
pub struct AdviceAdapterRegistry {
    adapters: HashMap<AdviceType, AdapterFn>,
}

impl AdviceAdapterRegistry {
    /// 不包含任何适配器的注册表
    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// 注册（或替换）某种通知的适配函数
    pub fn register(&mut self, advice_type: AdviceType, adapter: AdapterFn) -> &mut Self {
        self.adapters.insert(advice_type, adapter);
        self
    }

    pub fn supports(&self, advice_type: AdviceType) -> bool {
        self.adapters.contains_key(&advice_type)
    }

    /// 把通知转换成拦截器
    pub fn adapt(&self, advice: &Advice) -> Result<Arc<dyn Interceptor>, AopError> {
        let adapter = self
            .adapters
            .get(&advice.advice_type())
            .ok_or_else(|| AopError::UnsupportedAdvice(advice.advice_type().to_string()))?;
        adapter(advice)
    }
}

impl Default for AdviceAdapterRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register(AdviceType::Before, adapt_before)
            .register(AdviceType::After, adapt_after)
            .register(AdviceType::AfterReturning, adapt_after_returning)
            .register(AdviceType::AfterThrowing, adapt_after_throwing)
            .register(AdviceType::Around, adapt_around)
            .register(AdviceType::Interceptor, adapt_interceptor);
        registry
    }
}

/// 全局默认适配器注册表
static DEFAULT_REGISTRY: Lazy<Arc<AdviceAdapterRegistry>> =
    Lazy::new(|| Arc::new(AdviceAdapterRegistry::default()));

/// 获取全局默认适配器注册表
pub fn default_registry() -> Arc<AdviceAdapterRegistry> {
    Arc::clone(&DEFAULT_REGISTRY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aop::join_point::{Args, MethodSignature, TypeInfo};
    use crate::aop::target::Target;
    use crate::args;
    use anyhow::anyhow;
    use std::sync::Mutex;

    static METHODS: [MethodSignature; 1] = [MethodSignature::new("foo", &["i32"])];
    static TYPE: TypeInfo = TypeInfo::new("Target", &METHODS);

    struct Echo {
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl Target for Echo {
        fn type_info(&self) -> &'static TypeInfo {
            &TYPE
        }

        fn invoke(&self, _: &MethodSignature, args: &Args) -> InvocationResult {
            self.log.lock().unwrap().push("target".to_string());
            if self.fail {
                return Err(anyhow!("target failed"));
            }
            Ok(Box::new(*args.get::<i32>(0).unwrap()))
        }
    }

    fn run(
        advice: Advice,
        fail: bool,
        log: &Arc<Mutex<Vec<String>>>,
    ) -> InvocationResult {
        let target = Echo {
            log: log.clone(),
            fail,
        };
        let chain = vec![default_registry().adapt(&advice).unwrap()];
        let mut invocation = Invocation::new(&target, METHODS[0], args![21], &chain);
        invocation.proceed()
    }

    #[test]
    fn test_before_adapter() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        let advice = Advice::before(move |jp| {
            l.lock().unwrap().push(format!("before {}", jp.signature()));
            Ok(())
        });
        let value = run(advice, false, &log).unwrap();
        assert_eq!(*value.downcast::<i32>().unwrap(), 21);
        assert_eq!(*log.lock().unwrap(), vec!["before Target.foo", "target"]);
    }

    #[test]
    fn test_before_error_aborts_call() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let advice = Advice::before(|_| Err(anyhow!("access denied")));
        let err = run(advice, false, &log).unwrap_err();
        assert_eq!(err.to_string(), "access denied");
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_after_returning_adapter_skipped_on_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        let advice = Advice::after_returning(move |_, value| {
            let v = value.downcast_ref::<i32>().copied().unwrap_or_default();
            l.lock().unwrap().push(format!("returned {}", v));
            Ok(())
        });
        run(advice.clone(), false, &log).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["target", "returned 21"]);

        log.lock().unwrap().clear();
        let err = run(advice, true, &log).unwrap_err();
        assert_eq!(err.to_string(), "target failed");
        assert_eq!(*log.lock().unwrap(), vec!["target"]);
    }

    #[test]
    fn test_after_adapter_runs_on_both_paths() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        let advice = Advice::after(move |_| l.lock().unwrap().push("after".to_string()));
        assert!(run(advice.clone(), false, &log).is_ok());
        assert!(run(advice, true, &log).is_err());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["target", "after", "target", "after"]
        );
    }

    #[test]
    fn test_registry_without_adapter() {
        let registry = AdviceAdapterRegistry::empty();
        assert!(!registry.supports(AdviceType::Before));
        let err = registry.adapt(&Advice::before(|_| Ok(()))).err().unwrap();
        assert!(matches!(err, AopError::UnsupportedAdvice(_)));
    }

    #[test]
    fn test_registry_wrong_adapter() {
        let mut registry = AdviceAdapterRegistry::empty();
        registry.register(AdviceType::Before, adapt_around);
        let err = registry.adapt(&Advice::before(|_| Ok(()))).err().unwrap();
        assert!(matches!(err, AopError::UnsupportedAdvice(_)));
    }

    #[test]
    fn test_interceptor_advice_is_passed_through() {
        let raw: Arc<dyn Interceptor> = Arc::new(from_fn("raw", |inv| inv.proceed()));
        let adapted = default_registry()
            .adapt(&Advice::interceptor(raw.clone()))
            .unwrap();
        assert!(Arc::ptr_eq(&raw, &adapted));
        assert_eq!(adapted.name(), "raw");
    }
}
