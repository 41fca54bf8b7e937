//! 调用链解析
//!
//! 按（目标类型，方法）计算适用的拦截器列表并缓存。带动态条件的通知器会被包装成
//! 运行时守卫：参数不满足时直接 `proceed()`，跳过被包装的通知，其它拦截器的位置不变。

use crate::aop::advisor::AdvisorCatalog;
use crate::aop::error::AopError;
use crate::aop::interceptor::{AdviceAdapterRegistry, Interceptor};
use crate::aop::invocation::Invocation;
use crate::aop::join_point::{InvocationResult, MethodSignature, TypeInfo};
use crate::aop::pointcut::Pointcut;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// 有序的拦截器列表
pub type Chain = Arc<[Arc<dyn Interceptor>]>;

/// 以 TypeInfo 的地址区分类型，同名的不同类型不会共用调用链
type ChainKey = (usize, MethodSignature);

fn chain_key(type_info: &'static TypeInfo, method: &MethodSignature) -> ChainKey {
    (type_info as *const TypeInfo as usize, *method)
}

/// 动态切点守卫
struct DynamicMatchInterceptor {
    pointcut: Pointcut,
    inner: Arc<dyn Interceptor>,
}

impl Interceptor for DynamicMatchInterceptor {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> InvocationResult {
        if self.pointcut.matches_dynamic(invocation.args()) {
            return self.inner.invoke(invocation);
        }

        tracing::trace!(
            pointcut = self.pointcut.expression(),
            method = invocation.method().name,
            "dynamic pointcut not matched, skip advice"
        );
        invocation.proceed()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// 调用链解析器
///
/// 目录中的每个通知在创建解析器时适配一次，之后所有调用链共享这些拦截器。
/// 同一个 key 即使并发首次访问也只计算一次；计算失败不缓存，下次重新计算。
pub struct ChainResolver {
    catalog: Arc<AdvisorCatalog>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    cache: DashMap<ChainKey, Arc<OnceCell<Chain>>>,
}

impl ChainResolver {
    /// 使用全局默认适配器注册表
    pub fn new(catalog: Arc<AdvisorCatalog>) -> Result<Self, AopError> {
        Self::with_registry(catalog, &crate::aop::interceptor::default_registry())
    }

    pub fn with_registry(
        catalog: Arc<AdvisorCatalog>,
        registry: &AdviceAdapterRegistry,
    ) -> Result<Self, AopError> {
        let mut interceptors = Vec::with_capacity(catalog.len());
        for advisor in catalog.advisors() {
            let adapted = registry.adapt(advisor.advice())?;
            let interceptor: Arc<dyn Interceptor> = if advisor.pointcut().is_runtime() {
                Arc::new(DynamicMatchInterceptor {
                    pointcut: advisor.pointcut().clone(),
                    inner: adapted,
                })
            } else {
                adapted
            };
            interceptors.push(interceptor);
        }

        Ok(Self {
            catalog,
            interceptors,
            cache: DashMap::new(),
        })
    }

    pub fn catalog(&self) -> &Arc<AdvisorCatalog> {
        &self.catalog
    }

    /// 解析调用链
    pub fn resolve(
        &self,
        type_info: &'static TypeInfo,
        method: &MethodSignature,
    ) -> Result<Chain, AopError> {
        // 先取出 cell 再初始化，避免持有 DashMap 的分片锁执行切点
        let cell = Arc::clone(&self.cache.entry(chain_key(type_info, method)).or_default());
        let chain = cell.get_or_try_init(|| self.build(type_info, method))?;
        Ok(Arc::clone(chain))
    }

    fn build(&self, type_info: &TypeInfo, method: &MethodSignature) -> Result<Chain, AopError> {
        let mut chain = Vec::new();
        for (advisor, interceptor) in self.catalog.advisors().iter().zip(&self.interceptors) {
            if advisor.matches(type_info, method)? {
                chain.push(Arc::clone(interceptor));
            }
        }

        tracing::debug!(
            type_name = type_info.name,
            method = %method,
            interceptors = chain.len(),
            "resolved interceptor chain"
        );
        Ok(Chain::from(chain))
    }

    /// 已缓存的调用链数量
    pub fn cached_len(&self) -> usize {
        self.cache
            .iter()
            .filter(|entry| entry.value().get().is_some())
            .count()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aop::advice::Advice;
    use crate::aop::advisor::Advisor;
    use crate::aop::join_point::Args;
    use crate::aop::target::Target;
    use crate::args;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    static METHODS: [MethodSignature; 2] = [
        MethodSignature::new("foo", &["i32"]),
        MethodSignature::new("bar", &[]),
    ];
    static TYPE: TypeInfo = TypeInfo::new("Target", &METHODS);

    struct Noop;

    impl Target for Noop {
        fn type_info(&self) -> &'static TypeInfo {
            &TYPE
        }

        fn invoke(&self, _: &MethodSignature, _: &Args) -> InvocationResult {
            Ok(Box::new(()))
        }
    }

    #[test]
    fn test_resolve_filters_by_method_and_caches() {
        let catalog = AdvisorCatalog::new(vec![
            Advisor::new(Pointcut::method("foo"), Advice::after(|_| {})),
            Advisor::new(Pointcut::all(), Advice::after(|_| {})),
        ]);
        let resolver = ChainResolver::new(Arc::new(catalog)).unwrap();

        let foo = resolver.resolve(&TYPE, &METHODS[0]).unwrap();
        let bar = resolver.resolve(&TYPE, &METHODS[1]).unwrap();
        assert_eq!(foo.len(), 2);
        assert_eq!(bar.len(), 1);
        assert_eq!(resolver.cached_len(), 2);

        let again = resolver.resolve(&TYPE, &METHODS[0]).unwrap();
        assert!(Arc::ptr_eq(&foo, &again));
    }

    #[test]
    fn test_same_name_types_resolve_separately() {
        static AUDITED: TypeInfo = TypeInfo::new("Target", &METHODS).with_interfaces(&["Audited"]);

        let catalog = AdvisorCatalog::new(vec![Advisor::new(
            Pointcut::matching("audited", |t, _| t.implements("Audited")),
            Advice::after(|_| {}),
        )]);
        let resolver = ChainResolver::new(Arc::new(catalog)).unwrap();

        assert_eq!(resolver.resolve(&AUDITED, &METHODS[0]).unwrap().len(), 1);
        assert!(resolver.resolve(&TYPE, &METHODS[0]).unwrap().is_empty());
        assert_eq!(resolver.cached_len(), 2);
    }

    #[test]
    fn test_static_filter_evaluated_once_per_key() {
        let evaluated = Arc::new(AtomicUsize::new(0));
        let counter = evaluated.clone();
        let pointcut = Pointcut::matching("counting", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        let catalog = AdvisorCatalog::new(vec![Advisor::new(pointcut, Advice::after(|_| {}))]);
        let resolver = ChainResolver::new(Arc::new(catalog)).unwrap();

        for _ in 0..5 {
            resolver.resolve(&TYPE, &METHODS[0]).unwrap();
        }
        assert_eq!(evaluated.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resolution_error_is_not_cached() {
        let fail = Arc::new(Mutex::new(true));
        let f = fail.clone();
        let pointcut = Pointcut::new("flaky", move |_, _| {
            if *f.lock().unwrap() {
                Err(anyhow!("not ready"))
            } else {
                Ok(true)
            }
        });
        let catalog = AdvisorCatalog::new(vec![Advisor::new(pointcut, Advice::after(|_| {}))]);
        let resolver = ChainResolver::new(Arc::new(catalog)).unwrap();

        assert!(matches!(
            resolver.resolve(&TYPE, &METHODS[0]),
            Err(AopError::PointcutMatch { .. })
        ));
        assert_eq!(resolver.cached_len(), 0);

        *fail.lock().unwrap() = false;
        assert_eq!(resolver.resolve(&TYPE, &METHODS[0]).unwrap().len(), 1);
    }

    #[test]
    fn test_dynamic_guard_skips_advice() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let catalog = AdvisorCatalog::new(vec![Advisor::new(
            Pointcut::method("foo").and_arg::<i32, _>(0, |x| *x > 0),
            Advice::before(move |_| {
                h.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )]);
        let resolver = ChainResolver::new(Arc::new(catalog)).unwrap();
        let chain = resolver.resolve(&TYPE, &METHODS[0]).unwrap();
        assert_eq!(chain.len(), 1);

        let target = Noop;
        Invocation::new(&target, METHODS[0], args![5], &chain)
            .proceed()
            .unwrap();
        Invocation::new(&target, METHODS[0], args![-1], &chain)
            .proceed()
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_first_resolve_yields_one_chain() {
        let evaluated = Arc::new(AtomicUsize::new(0));
        let counter = evaluated.clone();
        let pointcut = Pointcut::matching("slow", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            true
        });
        let catalog = AdvisorCatalog::new(vec![Advisor::new(pointcut, Advice::after(|_| {}))]);
        let resolver = Arc::new(ChainResolver::new(Arc::new(catalog)).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let resolver = resolver.clone();
                std::thread::spawn(move || resolver.resolve(&TYPE, &METHODS[0]).unwrap())
            })
            .collect();
        let chains: Vec<Chain> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(evaluated.load(Ordering::SeqCst), 1);
        for chain in &chains[1..] {
            assert!(Arc::ptr_eq(&chains[0], chain));
        }
    }
}
