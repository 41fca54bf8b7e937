//! 通知（Advice）定义
//!
//! 对外区分 Before / After / AfterReturning / AfterThrowing / Around 几种形态，
//! 对内统一由 [`AdviceAdapterRegistry`](crate::aop::AdviceAdapterRegistry) 适配成拦截器。

use crate::aop::interceptor::Interceptor;
use crate::aop::invocation::ProceedingJoinPoint;
use crate::aop::join_point::{ArgBinding, InvocationResult, JoinPoint};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 默认顺序，最后执行
pub const DEFAULT_ORDER: i32 = i32::MAX;

pub type BeforeFn = Arc<dyn Fn(&JoinPoint) -> anyhow::Result<()> + Send + Sync>;
pub type AfterFn = Arc<dyn Fn(&JoinPoint) + Send + Sync>;
pub type AfterReturningFn =
    Arc<dyn Fn(&JoinPoint, &(dyn Any + Send + Sync)) -> anyhow::Result<()> + Send + Sync>;
pub type AfterThrowingFn = Arc<dyn Fn(&JoinPoint, &anyhow::Error) + Send + Sync>;
pub type AroundFn =
    Arc<dyn Fn(&mut ProceedingJoinPoint<'_, '_>) -> InvocationResult + Send + Sync>;

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdviceType {
    /// 前置通知
    Before,
    /// 后置通知（无论成功还是失败都执行）
    After,
    /// 返回后通知（成功返回时执行）
    AfterReturning,
    /// 异常通知（抛出匹配的错误时执行）
    AfterThrowing,
    /// 环绕通知（可以控制目标方法是否执行、执行几次）
    Around,
    /// 已经是拦截器形态的通知
    Interceptor,
}

impl fmt::Display for AdviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 通知的具体行为
#[derive(Clone)]
pub enum AdviceKind {
    Before(BeforeFn),
    After(AfterFn),
    AfterReturning(AfterReturningFn),
    AfterThrowing {
        throwing: ThrowsMatcher,
        run: AfterThrowingFn,
    },
    Around(AroundFn),
    Interceptor(Arc<dyn Interceptor>),
}

impl AdviceKind {
    pub fn advice_type(&self) -> AdviceType {
        match self {
            AdviceKind::Before(_) => AdviceType::Before,
            AdviceKind::After(_) => AdviceType::After,
            AdviceKind::AfterReturning(_) => AdviceType::AfterReturning,
            AdviceKind::AfterThrowing { .. } => AdviceType::AfterThrowing,
            AdviceKind::Around(_) => AdviceType::Around,
            AdviceKind::Interceptor(_) => AdviceType::Interceptor,
        }
    }
}

/// 切面实例的创建策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstancePolicy {
    /// 不依赖切面实例（直接用闭包声明的通知）
    Stateless,
    /// 所有调用共享一个实例
    Singleton,
    /// 每次调用创建一个新实例
    Prototype,
}

/// 通知
#[derive(Clone)]
pub struct Advice {
    kind: AdviceKind,
    order: i32,
    aspect_name: String,
    policy: InstancePolicy,
    bindings: Arc<[ArgBinding]>,
}

impl Advice {
    fn from_kind(kind: AdviceKind) -> Self {
        Self {
            kind,
            order: DEFAULT_ORDER,
            aspect_name: String::new(),
            policy: InstancePolicy::Stateless,
            bindings: Arc::from(Vec::new()),
        }
    }

    /// 前置通知，返回错误会中断调用（目标方法不会执行）
    pub fn before<F>(f: F) -> Self
    where
        F: Fn(&JoinPoint) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::from_kind(AdviceKind::Before(Arc::new(f)))
    }

    /// 后置通知，成功和失败都会执行，不影响调用结果
    pub fn after<F>(f: F) -> Self
    where
        F: Fn(&JoinPoint) + Send + Sync + 'static,
    {
        Self::from_kind(AdviceKind::After(Arc::new(f)))
    }

    /// 返回后通知，只读地观察返回值
    pub fn after_returning<F>(f: F) -> Self
    where
        F: Fn(&JoinPoint, &(dyn Any + Send + Sync)) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::from_kind(AdviceKind::AfterReturning(Arc::new(f)))
    }

    /// 异常通知，只在错误匹配 throwing 时执行，执行后错误继续向外传播
    pub fn after_throwing<F>(throwing: ThrowsMatcher, f: F) -> Self
    where
        F: Fn(&JoinPoint, &anyhow::Error) + Send + Sync + 'static,
    {
        Self::from_kind(AdviceKind::AfterThrowing {
            throwing,
            run: Arc::new(f),
        })
    }

    /// 环绕通知
    pub fn around<F>(f: F) -> Self
    where
        F: Fn(&mut ProceedingJoinPoint<'_, '_>) -> InvocationResult + Send + Sync + 'static,
    {
        Self::from_kind(AdviceKind::Around(Arc::new(f)))
    }

    /// 直接使用拦截器作为通知
    pub fn interceptor(interceptor: Arc<dyn Interceptor>) -> Self {
        Self::from_kind(AdviceKind::Interceptor(interceptor))
    }

    /// 设置顺序，越小越先进入、越晚退出
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// 设置参数绑定
    pub fn with_bindings(mut self, bindings: impl IntoIterator<Item = ArgBinding>) -> Self {
        self.bindings = bindings.into_iter().collect();
        self
    }

    fn with_aspect(mut self, name: &str, policy: InstancePolicy) -> Self {
        self.aspect_name = name.to_string();
        self.policy = policy;
        self
    }

    pub fn kind(&self) -> &AdviceKind {
        &self.kind
    }

    pub fn advice_type(&self) -> AdviceType {
        self.kind.advice_type()
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn aspect_name(&self) -> &str {
        &self.aspect_name
    }

    pub fn policy(&self) -> InstancePolicy {
        self.policy
    }

    pub fn bindings(&self) -> &Arc<[ArgBinding]> {
        &self.bindings
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advice")
            .field("type", &self.advice_type())
            .field("order", &self.order)
            .field("aspect", &self.aspect_name)
            .field("policy", &self.policy)
            .finish()
    }
}

/// 异常通知的错误匹配条件
///
/// Rust 的错误类型没有继承关系，"子类型" 通过谓词表达，
/// 例如 `when::<io::Error>(|e| e.kind() == ErrorKind::NotFound)`
#[derive(Clone)]
pub struct ThrowsMatcher {
    name: String,
    predicate: Arc<dyn Fn(&anyhow::Error) -> bool + Send + Sync>,
}

impl ThrowsMatcher {
    /// 匹配任意错误
    pub fn any() -> Self {
        Self {
            name: "any".to_string(),
            predicate: Arc::new(|_: &anyhow::Error| true),
        }
    }

    /// 匹配类型为 E 的错误（包括被 anyhow context 包装过的 E）
    pub fn of<E>() -> Self
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self {
            name: std::any::type_name::<E>().to_string(),
            predicate: Arc::new(|e: &anyhow::Error| e.downcast_ref::<E>().is_some()),
        }
    }

    /// 匹配类型为 E 且满足 pred 的错误
    pub fn when<E, F>(pred: F) -> Self
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            name: format!("{}(when)", std::any::type_name::<E>()),
            predicate: Arc::new(move |e: &anyhow::Error| {
                e.downcast_ref::<E>().is_some_and(&pred)
            }),
        }
    }

    pub fn matches(&self, err: &anyhow::Error) -> bool {
        (self.predicate)(err)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ThrowsMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ThrowsMatcher").field(&self.name).finish()
    }
}

enum InstanceSource<A> {
    Singleton(Arc<A>),
    Prototype(Arc<dyn Fn() -> A + Send + Sync>),
}

impl<A> Clone for InstanceSource<A> {
    fn clone(&self) -> Self {
        match self {
            InstanceSource::Singleton(a) => InstanceSource::Singleton(Arc::clone(a)),
            InstanceSource::Prototype(f) => InstanceSource::Prototype(Arc::clone(f)),
        }
    }
}

/// 切面实例工厂
///
/// 由它创建的通知在执行时会拿到切面实例：singleton 模式共享一个实例，
/// prototype 模式每次调用新建一个实例
pub struct AspectInstanceFactory<A> {
    name: String,
    order: i32,
    source: InstanceSource<A>,
}

impl<A> Clone for AspectInstanceFactory<A> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            order: self.order,
            source: self.source.clone(),
        }
    }
}

impl<A: Send + Sync + 'static> AspectInstanceFactory<A> {
    pub fn singleton(name: impl Into<String>, aspect: A) -> Self {
        Self {
            name: name.into(),
            order: DEFAULT_ORDER,
            source: InstanceSource::Singleton(Arc::new(aspect)),
        }
    }

    pub fn prototype<F>(name: impl Into<String>, create: F) -> Self
    where
        F: Fn() -> A + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            order: DEFAULT_ORDER,
            source: InstanceSource::Prototype(Arc::new(create)),
        }
    }

    /// 切面级别的顺序，由该工厂创建的通知默认使用它
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// 获取切面实例
    pub fn aspect_instance(&self) -> Arc<A> {
        match &self.source {
            InstanceSource::Singleton(a) => Arc::clone(a),
            InstanceSource::Prototype(create) => Arc::new(create()),
        }
    }

    pub fn policy(&self) -> InstancePolicy {
        match self.source {
            InstanceSource::Singleton(_) => InstancePolicy::Singleton,
            InstanceSource::Prototype(_) => InstancePolicy::Prototype,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn decorate(&self, advice: Advice) -> Advice {
        advice
            .with_aspect(&self.name, self.policy())
            .with_order(self.order)
    }

    pub fn before<F>(&self, f: F) -> Advice
    where
        F: Fn(&A, &JoinPoint) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let factory = self.clone();
        self.decorate(Advice::before(move |jp| f(&factory.aspect_instance(), jp)))
    }

    pub fn after<F>(&self, f: F) -> Advice
    where
        F: Fn(&A, &JoinPoint) + Send + Sync + 'static,
    {
        let factory = self.clone();
        self.decorate(Advice::after(move |jp| f(&factory.aspect_instance(), jp)))
    }

    pub fn after_returning<F>(&self, f: F) -> Advice
    where
        F: Fn(&A, &JoinPoint, &(dyn Any + Send + Sync)) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        let factory = self.clone();
        self.decorate(Advice::after_returning(move |jp, value| {
            f(&factory.aspect_instance(), jp, value)
        }))
    }

    pub fn after_throwing<F>(&self, throwing: ThrowsMatcher, f: F) -> Advice
    where
        F: Fn(&A, &JoinPoint, &anyhow::Error) + Send + Sync + 'static,
    {
        let factory = self.clone();
        self.decorate(Advice::after_throwing(throwing, move |jp, err| {
            f(&factory.aspect_instance(), jp, err)
        }))
    }

    pub fn around<F>(&self, f: F) -> Advice
    where
        F: Fn(&A, &mut ProceedingJoinPoint<'_, '_>) -> InvocationResult + Send + Sync + 'static,
    {
        let factory = self.clone();
        self.decorate(Advice::around(move |pjp| f(&factory.aspect_instance(), pjp)))
    }
}
