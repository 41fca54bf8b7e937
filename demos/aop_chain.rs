use anyhow::Result;
use aopx::aop::{
    Advice, Advisor, AdvisorCatalog, AopConfig, Args, InvocationResult, MethodSignature,
    Pointcut, ProxyFactory, Target, ThrowsMatcher, TypeInfo,
};
use aopx::{args, init_tracing, TraceConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static METHODS: [MethodSignature; 2] = [
    MethodSignature::new("getUser", &["u64"]).declared_by("UserRepository"),
    MethodSignature::new("saveUser", &["u64", "String"]).declared_by("UserRepository"),
];
static USER_SERVICE: TypeInfo =
    TypeInfo::new("UserService", &METHODS).with_interfaces(&["UserRepository"]);

// 模拟一个偶尔超时的用户服务
struct UserService {
    attempts: AtomicUsize,
}

impl Target for UserService {
    fn type_info(&self) -> &'static TypeInfo {
        &USER_SERVICE
    }

    fn invoke(&self, method: &MethodSignature, args: &Args) -> InvocationResult {
        match method.name {
            "getUser" => {
                let id = *args.get::<u64>(0).ok_or_else(|| anyhow::anyhow!("missing id"))?;
                let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
                println!("  目标方法 getUser({}) 第 {} 次执行", id, attempt + 1);
                if attempt < 2 {
                    return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout").into());
                }
                Ok(Box::new(format!("user-{}", id)))
            }
            "saveUser" => {
                let name = args.get::<String>(1).ok_or_else(|| anyhow::anyhow!("missing name"))?;
                if name.is_empty() {
                    return Err(anyhow::anyhow!("empty name"));
                }
                Ok(Box::new(()))
            }
            _ => Err(anyhow::anyhow!("unknown method {}", method)),
        }
    }
}

fn main() -> Result<()> {
    init_tracing(&TraceConfig {
        log_level: "info".to_string(),
        ..Default::default()
    })?;

    // 内置日志和重试通知
    let config = AopConfig::from_json5(
        r#"
        {
          logging: { level: "info", log_result: true },
          retry: { max_times: 3, strategy: "exponential", min_delay: "10ms", max_delay: "100ms" },
        }
    "#,
    )?;

    let mut advisors: Vec<Advisor> = config
        .builtin_advice()?
        .into_iter()
        .map(|advice| Advisor::new(Pointcut::all(), advice))
        .collect();

    advisors.push(Advisor::new(
        Pointcut::glob("*Service", "save*"),
        Advice::before(|jp| {
            println!("  [before] {} args={:?}", jp, jp.args());
            Ok(())
        })
        .with_order(10),
    ));
    advisors.push(Advisor::new(
        Pointcut::all(),
        Advice::after_throwing(ThrowsMatcher::any(), |jp, err| {
            println!("  [after-throwing] {} failed: {}", jp, err);
        })
        .with_order(20),
    ));

    let factory = ProxyFactory::new(AdvisorCatalog::new(advisors), config.proxy.clone())?;
    let proxy = factory.wrap(Arc::new(UserService {
        attempts: AtomicUsize::new(0),
    }))?;

    println!("===== 场景 1: 重试直到成功 =====");
    let user: String = proxy.call("getUser", args![42u64])?;
    println!("  结果: {}", user);

    println!("\n===== 场景 2: 前置通知和异常通知 =====");
    proxy.call::<()>("saveUser", args![42u64, "alice".to_string()])?;
    if let Err(e) = proxy.invoke("saveUser", args![42u64, String::new()]) {
        println!("  调用失败: {}", e);
    }

    Ok(())
}
