use anyhow::Result;
use aopx::aop::{
    current_join_point, Advice, Advisor, AdvisorCatalog, ArgBinding, Args, InvocationResult,
    MethodSignature, Pointcut, ProxyConfig, ProxyFactory, Target, TypeInfo,
};
use aopx::args;
use std::sync::Arc;

static METHODS: [MethodSignature; 2] = [
    MethodSignature::new("foo", &["i32"]),
    MethodSignature::new("bar", &[]),
];
static TARGET: TypeInfo = TypeInfo::new("Target", &METHODS);

struct Calculator;

impl Target for Calculator {
    fn type_info(&self) -> &'static TypeInfo {
        &TARGET
    }

    fn invoke(&self, method: &MethodSignature, args: &Args) -> InvocationResult {
        match method.name {
            "foo" => {
                let x = *args.get::<i32>(0).ok_or_else(|| anyhow::anyhow!("missing x"))?;
                println!("  target foo({})", x);
                Ok(Box::new(x * 2))
            }
            "bar" => {
                // 通知里和目标方法里都能拿到当前连接点
                let jp = current_join_point().map(|jp| jp.to_string());
                println!("  target bar, current join point: {:?}", jp);
                Ok(Box::new(()))
            }
            _ => Err(anyhow::anyhow!("unknown method {}", method)),
        }
    }
}

fn main() -> Result<()> {
    let advisors = vec![
        // 静态切点：构建调用链时就确定
        Advisor::new(
            Pointcut::method("foo"),
            Advice::before(|jp| {
                println!("  [static] before {}", jp);
                Ok(())
            })
            .with_order(1),
        ),
        // 动态切点：每次调用检查参数
        Advisor::new(
            Pointcut::method("foo").and_arg::<i32, _>(0, |x| *x > 0),
            Advice::around(|pjp| {
                let x = *pjp.join_point().bound::<i32>("x").unwrap_or(&0);
                println!("  [dynamic] around x={}", x);
                pjp.proceed()
            })
            .with_bindings([ArgBinding::new("x", 0)])
            .with_order(2),
        ),
    ];

    let factory = ProxyFactory::new(AdvisorCatalog::new(advisors), ProxyConfig::default())?;
    let proxy = factory.wrap(Arc::new(Calculator))?;

    println!("===== foo(5): 动态切点匹配 =====");
    println!("  结果: {}", proxy.call::<i32>("foo", args![5])?);

    println!("\n===== foo(-1): 动态切点不匹配，只执行静态通知 =====");
    println!("  结果: {}", proxy.call::<i32>("foo", args![-1])?);

    println!("\n===== bar(): 没有适用的通知 =====");
    proxy.call::<()>("bar", args![])?;

    Ok(())
}
