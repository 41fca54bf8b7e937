//! 连接点（JoinPoint）相关的数据定义
//!
//! 目标类型和方法签名都是 `'static` 的描述信息，由目标类型以静态表的形式声明；
//! 参数和返回值在运行期以 `Any` 擦除类型。

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 方法返回值
pub type Value = Box<dyn Any + Send + Sync>;

/// 一次方法调用的结果
pub type InvocationResult = anyhow::Result<Value>;

/// 方法签名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// 方法名
    pub name: &'static str,
    /// 参数类型名称
    pub params: &'static [&'static str],
    /// 声明该方法的接口（None 表示只属于实现类型本身）
    pub declared_by: Option<&'static str>,
}

impl MethodSignature {
    pub const fn new(name: &'static str, params: &'static [&'static str]) -> Self {
        Self {
            name,
            params,
            declared_by: None,
        }
    }

    /// 标记该方法由某个接口声明
    pub const fn declared_by(self, interface: &'static str) -> Self {
        Self {
            name: self.name,
            params: self.params,
            declared_by: Some(interface),
        }
    }

    /// 参数个数
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.params.join(", "))
    }
}

/// 目标类型描述
///
/// 通常以两个 static 声明：
///
/// ```ignore
/// static METHODS: [MethodSignature; 1] = [MethodSignature::new("foo", &["i32"]).declared_by("Foo")];
/// static TYPE: TypeInfo = TypeInfo::new("Target", &METHODS).with_interfaces(&["Foo"]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    pub name: &'static str,
    pub methods: &'static [MethodSignature],
    pub interfaces: &'static [&'static str],
}

impl TypeInfo {
    pub const fn new(name: &'static str, methods: &'static [MethodSignature]) -> Self {
        Self {
            name,
            methods,
            interfaces: &[],
        }
    }

    pub const fn with_interfaces(self, interfaces: &'static [&'static str]) -> Self {
        Self {
            name: self.name,
            methods: self.methods,
            interfaces,
        }
    }

    /// 按名称和参数个数查找方法
    pub fn find_method(&self, name: &str, arity: usize) -> Option<&'static MethodSignature> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.arity() == arity)
    }

    /// 是否实现了指定接口
    pub fn implements(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|i| *i == interface)
    }
}

/// 方法参数
///
/// 每个参数以 `Arc` 保存，克隆开销很小，重试时可以反复使用同一组参数
#[derive(Clone, Default)]
pub struct Args {
    values: Vec<Arc<dyn Any + Send + Sync>>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个参数
    pub fn push<T: Any + Send + Sync>(&mut self, value: T) {
        self.values.push(Arc::new(value));
    }

    /// 获取第 index 个参数，类型不匹配时返回 None
    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        self.values.get(index)?.downcast_ref::<T>()
    }

    /// 获取第 index 个参数的原始引用
    pub fn raw(&self, index: usize) -> Option<&(dyn Any + Send + Sync)> {
        self.values.get(index).map(|v| v.as_ref())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.values.iter().map(|v| DebugAny(v.as_ref())))
            .finish()
    }
}

/// 尽量以可读形式输出被擦除类型的值
pub(crate) struct DebugAny<'a>(pub &'a (dyn Any + Send + Sync));

impl fmt::Debug for DebugAny<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        if let Some(s) = v.downcast_ref::<String>() {
            write!(f, "{:?}", s)
        } else if let Some(s) = v.downcast_ref::<&'static str>() {
            write!(f, "{:?}", s)
        } else if let Some(n) = v.downcast_ref::<i32>() {
            write!(f, "{}", n)
        } else if let Some(n) = v.downcast_ref::<i64>() {
            write!(f, "{}", n)
        } else if let Some(n) = v.downcast_ref::<u32>() {
            write!(f, "{}", n)
        } else if let Some(n) = v.downcast_ref::<u64>() {
            write!(f, "{}", n)
        } else if let Some(n) = v.downcast_ref::<usize>() {
            write!(f, "{}", n)
        } else if let Some(n) = v.downcast_ref::<f64>() {
            write!(f, "{}", n)
        } else if let Some(b) = v.downcast_ref::<bool>() {
            write!(f, "{}", b)
        } else if v.downcast_ref::<()>().is_some() {
            write!(f, "()")
        } else {
            write!(f, "<opaque>")
        }
    }
}

/// 构造方法参数
///
/// ```ignore
/// let args = aopx::args![5, "alice".to_string()];
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::aop::Args::new()
    };
    ($($value:expr),+ $(,)?) => {{
        let mut args = $crate::aop::Args::new();
        $( args.push($value); )+
        args
    }};
}

/// 参数绑定：带参数的通知声明自己需要第几个参数，并给它起名
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgBinding {
    pub name: &'static str,
    pub index: usize,
}

impl ArgBinding {
    pub const fn new(name: &'static str, index: usize) -> Self {
        Self { name, index }
    }
}

/// 连接点信息
///
/// 一次具体方法调用的快照，传给 Before/After 类通知，也会压入当前线程的调用上下文栈
#[derive(Clone)]
pub struct JoinPoint {
    type_name: &'static str,
    method: MethodSignature,
    args: Args,
    invocation_id: u64,
    bindings: Arc<[ArgBinding]>,
}

impl JoinPoint {
    pub(crate) fn new(
        type_name: &'static str,
        method: MethodSignature,
        args: Args,
        invocation_id: u64,
    ) -> Self {
        Self {
            type_name,
            method,
            args,
            invocation_id,
            bindings: Arc::from(Vec::new()),
        }
    }

    pub(crate) fn with_bindings(mut self, bindings: Arc<[ArgBinding]>) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn method(&self) -> &MethodSignature {
        &self.method
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    /// 调用编号，同一次顶层调用内的所有通知看到的编号相同
    pub fn invocation_id(&self) -> u64 {
        self.invocation_id
    }

    /// 获取第 index 个参数
    pub fn arg<T: Any>(&self, index: usize) -> Option<&T> {
        self.args.get(index)
    }

    /// 按绑定名称获取参数
    pub fn bound<T: Any>(&self, name: &str) -> Option<&T> {
        let binding = self.bindings.iter().find(|b| b.name == name)?;
        self.args.get(binding.index)
    }

    /// 完整的方法签名，如 `Target.foo`
    pub fn signature(&self) -> String {
        format!("{}.{}", self.type_name, self.method.name)
    }
}

impl fmt::Debug for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinPoint")
            .field("type_name", &self.type_name)
            .field("method", &self.method.to_string())
            .field("args", &self.args)
            .field("invocation_id", &self.invocation_id)
            .finish()
    }
}

impl fmt::Display for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}
