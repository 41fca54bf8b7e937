//! 代理
//!
//! 代理把目标对象的每次调用路由到解析好的调用链上。有两种策略：
//! - Interface：只暴露目标类型声明的接口方法，代理和目标是同一组接口的两个独立实现
//! - Class：暴露目标的全部方法，行为是目标的超集
//!
//! 没有任何适用通知器的目标不需要代理，调用直接转发给目标。

use crate::aop::advisor::AdvisorCatalog;
use crate::aop::chain::ChainResolver;
use crate::aop::config::ProxyConfig;
use crate::aop::error::AopError;
use crate::aop::invocation::Invocation;
use crate::aop::join_point::{Args, InvocationResult, MethodSignature, TypeInfo, Value};
use crate::aop::target::{same_instance, Target};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_PROXY_ID: AtomicU64 = AtomicU64::new(1);

/// 代理标识，进程内唯一
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProxyId(u64);

impl ProxyId {
    fn next() -> Self {
        ProxyId(NEXT_PROXY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ProxyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proxy#{}", self.0)
    }
}

/// 代理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyStrategy {
    /// 接口代理
    Interface,
    /// 类代理
    Class,
}

/// 把返回值转换成具体类型
fn downcast_value<R: Any>(method: &str, value: Value) -> anyhow::Result<R> {
    match value.downcast::<R>() {
        Ok(v) => Ok(*v),
        Err(_) => Err(AopError::ReturnType {
            method: method.to_string(),
            expected: std::any::type_name::<R>(),
        }
        .into()),
    }
}

fn lookup(
    type_info: &'static TypeInfo,
    name: &str,
    arity: usize,
) -> Result<&'static MethodSignature, AopError> {
    type_info
        .find_method(name, arity)
        .ok_or_else(|| AopError::NoSuchMethod {
            type_name: type_info.name.to_string(),
            method: name.to_string(),
            arity,
        })
}

/// 代理对象
pub struct Proxy {
    id: ProxyId,
    target: Arc<dyn Target>,
    strategy: ProxyStrategy,
    resolver: Arc<ChainResolver>,
    advised: bool,
    expose_invocation: bool,
}

impl Proxy {
    pub fn id(&self) -> ProxyId {
        self.id
    }

    pub fn strategy(&self) -> ProxyStrategy {
        self.strategy
    }

    /// 是否有适用的通知器
    pub fn is_advised(&self) -> bool {
        self.advised
    }

    pub fn type_name(&self) -> &'static str {
        self.target.type_info().name
    }

    /// 按方法名调用，方法由名称和参数个数确定
    pub fn invoke(&self, name: &str, args: Args) -> InvocationResult {
        let method = lookup(self.target.type_info(), name, args.len())?;
        self.invoke_method(method, args)
    }

    /// 调用并把返回值转换成 R
    pub fn call<R: Any>(&self, name: &str, args: Args) -> anyhow::Result<R> {
        downcast_value(name, self.invoke(name, args)?)
    }

    /// 按方法签名调用
    pub fn invoke_method(&self, method: &MethodSignature, args: Args) -> InvocationResult {
        self.check_exposed(method)?;

        if !self.advised {
            return self.target.invoke(method, &args);
        }

        let chain = self.resolver.resolve(self.target.type_info(), method)?;
        if chain.is_empty() {
            return self.target.invoke(method, &args);
        }

        Invocation::new(&*self.target, *method, args, &chain).run(self.expose_invocation)
    }

    fn check_exposed(&self, method: &MethodSignature) -> Result<(), AopError> {
        if self.strategy == ProxyStrategy::Class {
            return Ok(());
        }

        let type_info = self.target.type_info();
        match method.declared_by {
            Some(interface) if type_info.implements(interface) => Ok(()),
            _ => Err(AopError::MethodNotExposed {
                type_name: type_info.name.to_string(),
                method: method.to_string(),
            }),
        }
    }
}

impl Target for Proxy {
    fn type_info(&self) -> &'static TypeInfo {
        self.target.type_info()
    }

    fn invoke(&self, method: &MethodSignature, args: &Args) -> InvocationResult {
        self.invoke_method(method, args.clone())
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("id", &self.id)
            .field("type_name", &self.type_name())
            .field("strategy", &self.strategy)
            .field("advised", &self.advised)
            .finish()
    }
}

/// 对外暴露的引用：原始目标或代理
#[derive(Clone)]
pub enum Exposed {
    Raw(Arc<dyn Target>),
    Proxied(Arc<Proxy>),
}

impl Exposed {
    pub fn invoke(&self, name: &str, args: Args) -> InvocationResult {
        match self {
            Exposed::Raw(target) => {
                let method = lookup(target.type_info(), name, args.len())?;
                target.invoke(method, &args)
            }
            Exposed::Proxied(proxy) => proxy.invoke(name, args),
        }
    }

    pub fn call<R: Any>(&self, name: &str, args: Args) -> anyhow::Result<R> {
        downcast_value(name, self.invoke(name, args)?)
    }

    pub fn type_info(&self) -> &'static TypeInfo {
        match self {
            Exposed::Raw(target) => target.type_info(),
            Exposed::Proxied(proxy) => proxy.type_info(),
        }
    }

    pub fn is_proxied(&self) -> bool {
        matches!(self, Exposed::Proxied(_))
    }

    pub fn proxy(&self) -> Option<&Arc<Proxy>> {
        match self {
            Exposed::Proxied(proxy) => Some(proxy),
            Exposed::Raw(_) => None,
        }
    }

    /// 作为 Target 使用
    pub fn as_target(&self) -> Arc<dyn Target> {
        match self {
            Exposed::Raw(target) => Arc::clone(target),
            Exposed::Proxied(proxy) => Arc::clone(proxy) as Arc<dyn Target>,
        }
    }

    /// 是否是同一个对外身份
    pub fn same_identity(&self, other: &Exposed) -> bool {
        match (self, other) {
            (Exposed::Proxied(a), Exposed::Proxied(b)) => Arc::ptr_eq(a, b),
            (Exposed::Raw(a), Exposed::Raw(b)) => same_instance(&**a, &**b),
            _ => false,
        }
    }
}

impl fmt::Debug for Exposed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exposed::Raw(target) => f.debug_tuple("Raw").field(&target.type_info().name).finish(),
            Exposed::Proxied(proxy) => f.debug_tuple("Proxied").field(proxy).finish(),
        }
    }
}

/// 代理工厂
pub struct ProxyFactory {
    resolver: Arc<ChainResolver>,
    config: ProxyConfig,
}

impl ProxyFactory {
    /// 从通知器目录创建，使用全局默认适配器注册表
    pub fn new(catalog: AdvisorCatalog, config: ProxyConfig) -> Result<Self, AopError> {
        let resolver = ChainResolver::new(Arc::new(catalog))?;
        Ok(Self::with_resolver(Arc::new(resolver), config))
    }

    /// 多个工厂可以共享同一个解析器（以及它的缓存）
    pub fn with_resolver(resolver: Arc<ChainResolver>, config: ProxyConfig) -> Self {
        Self { resolver, config }
    }

    pub fn resolver(&self) -> &Arc<ChainResolver> {
        &self.resolver
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// 根据目标类型和配置选择代理策略
    pub fn strategy_for(&self, type_info: &TypeInfo) -> ProxyStrategy {
        if !type_info.interfaces.is_empty() && !self.config.proxy_target_class {
            ProxyStrategy::Interface
        } else {
            ProxyStrategy::Class
        }
    }

    /// 创建代理
    ///
    /// 切点在这里对目标类型的所有方法求值一次，求值失败直接返回错误，不会推迟到调用时
    pub fn wrap(&self, target: Arc<dyn Target>) -> Result<Arc<Proxy>, AopError> {
        let type_info = target.type_info();
        let eligible = self.resolver.catalog().eligible_indices(type_info)?;
        let advised = !eligible.is_empty();

        if advised && self.config.eager_resolution {
            for method in type_info.methods {
                self.resolver.resolve(type_info, method)?;
            }
        }

        let proxy = Proxy {
            id: ProxyId::next(),
            target,
            strategy: self.strategy_for(type_info),
            resolver: Arc::clone(&self.resolver),
            advised,
            expose_invocation: self.config.expose_invocation,
        };
        tracing::debug!(
            id = %proxy.id,
            type_name = type_info.name,
            strategy = ?proxy.strategy,
            advisors = eligible.len(),
            "created proxy"
        );
        Ok(Arc::new(proxy))
    }

    /// 有适用的通知器时创建代理，否则原样返回目标
    pub fn wrap_if_necessary(&self, target: Arc<dyn Target>) -> Result<Exposed, AopError> {
        let type_info = target.type_info();
        if self.resolver.catalog().eligible_indices(type_info)?.is_empty() {
            tracing::trace!(type_name = type_info.name, "no eligible advisors, skip proxy");
            return Ok(Exposed::Raw(target));
        }
        Ok(Exposed::Proxied(self.wrap(target)?))
    }
}
