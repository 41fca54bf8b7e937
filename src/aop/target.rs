use crate::aop::join_point::{Args, InvocationResult, MethodSignature, TypeInfo};

/// 可被代理的目标对象
///
/// 没有运行时反射，目标类型自己声明方法表，并按签名分发调用。
///
/// # 示例
///
/// ```ignore
/// static METHODS: [MethodSignature; 1] = [MethodSignature::new("foo", &["i32"])];
/// static TYPE: TypeInfo = TypeInfo::new("Target", &METHODS);
///
/// struct Target;
///
/// impl aopx::aop::Target for Target {
///     fn type_info(&self) -> &'static TypeInfo {
///         &TYPE
///     }
///
///     fn invoke(&self, method: &MethodSignature, args: &Args) -> InvocationResult {
///         match method.name {
///             "foo" => {
///                 let x = *args.get::<i32>(0).unwrap_or(&0);
///                 Ok(Box::new(x * 2))
///             }
///             _ => Err(anyhow::anyhow!("unknown method {}", method)),
///         }
///     }
/// }
/// ```
pub trait Target: Send + Sync + 'static {
    /// 目标类型描述
    fn type_info(&self) -> &'static TypeInfo;

    /// 执行目标方法
    fn invoke(&self, method: &MethodSignature, args: &Args) -> InvocationResult;
}

/// 比较两个 trait object 是否指向同一个实例（只比较数据指针）
pub(crate) fn same_instance(a: &dyn Target, b: &dyn Target) -> bool {
    std::ptr::eq(
        a as *const dyn Target as *const (),
        b as *const dyn Target as *const (),
    )
}
