use anyhow::Result;
use aopx::aop::{
    Advice, Advisor, AdvisorCatalog, Args, EarlyReferenceCache, Exposed, InvocationResult,
    MethodSignature, Pointcut, ProxyConfig, ProxyFactory, Target, TypeInfo,
};
use aopx::args;
use std::sync::{Arc, OnceLock};

static A_METHODS: [MethodSignature; 2] = [
    MethodSignature::new("foo", &[]),
    MethodSignature::new("callB", &[]),
];
static A_TYPE: TypeInfo = TypeInfo::new("A", &A_METHODS);

static B_METHODS: [MethodSignature; 1] = [MethodSignature::new("callA", &[])];
static B_TYPE: TypeInfo = TypeInfo::new("B", &B_METHODS);

// A 依赖 B，构造完成后才注入
struct A {
    b: OnceLock<Exposed>,
}

impl Target for A {
    fn type_info(&self) -> &'static TypeInfo {
        &A_TYPE
    }

    fn invoke(&self, method: &MethodSignature, _: &Args) -> InvocationResult {
        match method.name {
            "foo" => {
                println!("  A.foo()");
                Ok(Box::new(()))
            }
            "callB" => match self.b.get() {
                Some(b) => b.invoke("callA", args![]),
                None => Err(anyhow::anyhow!("B not injected")),
            },
            _ => Err(anyhow::anyhow!("unknown method {}", method)),
        }
    }
}

// B 在构造时就需要 A
struct B {
    a: Exposed,
}

impl Target for B {
    fn type_info(&self) -> &'static TypeInfo {
        &B_TYPE
    }

    fn invoke(&self, method: &MethodSignature, _: &Args) -> InvocationResult {
        match method.name {
            "callA" => self.a.invoke("foo", args![]),
            _ => Err(anyhow::anyhow!("unknown method {}", method)),
        }
    }
}

fn main() -> Result<()> {
    let catalog = AdvisorCatalog::new(vec![Advisor::new(
        Pointcut::glob("A", "foo"),
        Advice::before(|jp| {
            println!("  [before] {}", jp);
            Ok(())
        }),
    )]);
    let factory = Arc::new(ProxyFactory::new(catalog, ProxyConfig::default())?);
    let cache = EarlyReferenceCache::new(factory);

    // 1. 创建 A 的原始实例，提前暴露
    let raw_a = Arc::new(A { b: OnceLock::new() });
    let early_a = cache.expose_early("a", raw_a.clone())?;

    // 2. 创建 B，注入 A 的提前引用
    let b = cache.finalize("b", Arc::new(B { a: early_a.clone() }))?;

    // 3. B 注入 A，A 构造完成
    let _ = raw_a.b.set(b.clone());
    let a = cache.finalize("a", raw_a)?;

    println!("B 持有的 A 与容器中的 A 是同一个代理: {}", early_a.same_identity(&a));
    if let Some(proxy) = a.proxy() {
        println!("A 的代理: {}", proxy.id());
    }

    println!("\n===== b.callA() =====");
    b.invoke("callA", args![])?;

    println!("\n===== a.foo() =====");
    a.invoke("foo", args![])?;

    Ok(())
}
