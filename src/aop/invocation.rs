//! 方法调用的执行游标
//!
//! [`Invocation`] 只有两个状态：
//! - pending：`cursor < len`，`proceed()` 取出下一个拦截器执行
//! - exhausted：`cursor == len`，`proceed()` 直接调用目标方法
//!
//! 每个拦截器执行完后游标会回退到进入前的位置，所以拦截器可以多次调用
//! `proceed()`（重试），每次都会重新执行下游的全部拦截器和目标方法。

use crate::aop::interceptor::Interceptor;
use crate::aop::join_point::{ArgBinding, Args, InvocationResult, JoinPoint, MethodSignature, TypeInfo};
use crate::aop::target::Target;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_INVOCATION_ID: AtomicU64 = AtomicU64::new(1);

/// 一次方法调用
pub struct Invocation<'a> {
    target: &'a dyn Target,
    method: MethodSignature,
    args: Args,
    interceptors: &'a [Arc<dyn Interceptor>],
    cursor: usize,
    id: u64,
}

impl<'a> Invocation<'a> {
    pub fn new(
        target: &'a dyn Target,
        method: MethodSignature,
        args: Args,
        interceptors: &'a [Arc<dyn Interceptor>],
    ) -> Self {
        Self {
            target,
            method,
            args,
            interceptors,
            cursor: 0,
            id: NEXT_INVOCATION_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// 执行调用链的下一环
    pub fn proceed(&mut self) -> InvocationResult {
        let interceptors = self.interceptors;
        match interceptors.get(self.cursor) {
            None => self.target.invoke(&self.method, &self.args),
            Some(interceptor) => {
                let position = self.cursor;
                self.cursor += 1;
                let result = interceptor.invoke(self);
                self.cursor = position;
                result
            }
        }
    }

    /// 作为顶层调用执行
    ///
    /// expose 为 true 时，调用期间当前连接点可以通过 [`current_join_point`] 获取
    pub(crate) fn run(mut self, expose: bool) -> InvocationResult {
        let _exposed = expose.then(|| ExposedInvocation::enter(self.join_point()));
        self.proceed()
    }

    /// 当前调用的连接点快照
    pub fn join_point(&self) -> JoinPoint {
        JoinPoint::new(
            self.type_info().name,
            self.method,
            self.args.clone(),
            self.id,
        )
    }

    pub fn target(&self) -> &'a dyn Target {
        self.target
    }

    pub fn type_info(&self) -> &'static TypeInfo {
        self.target.type_info()
    }

    pub fn method(&self) -> &MethodSignature {
        &self.method
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    /// 替换参数，对之后的 `proceed()` 生效
    pub fn set_args(&mut self, args: Args) {
        self.args = args;
    }

    /// 调用编号
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 下一个要执行的拦截器位置
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn chain_len(&self) -> usize {
        self.interceptors.len()
    }

    /// 拦截器已经全部执行，下一次 `proceed()` 将调用目标方法
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.interceptors.len()
    }
}

/// 环绕通知拿到的调用句柄
pub struct ProceedingJoinPoint<'a, 'b> {
    invocation: &'a mut Invocation<'b>,
    bindings: Arc<[ArgBinding]>,
}

impl<'a, 'b> ProceedingJoinPoint<'a, 'b> {
    pub(crate) fn new(invocation: &'a mut Invocation<'b>, bindings: Arc<[ArgBinding]>) -> Self {
        Self {
            invocation,
            bindings,
        }
    }

    /// 继续执行调用链，可以不调用（短路），也可以多次调用（重试）
    pub fn proceed(&mut self) -> InvocationResult {
        self.invocation.proceed()
    }

    /// 用新的参数继续执行调用链，返回后恢复原来的参数
    pub fn proceed_with(&mut self, args: Args) -> InvocationResult {
        let saved = std::mem::replace(&mut self.invocation.args, args);
        let result = self.invocation.proceed();
        self.invocation.args = saved;
        result
    }

    pub fn join_point(&self) -> JoinPoint {
        self.invocation
            .join_point()
            .with_bindings(self.bindings.clone())
    }

    pub fn args(&self) -> &Args {
        self.invocation.args()
    }

    pub fn method(&self) -> &MethodSignature {
        self.invocation.method()
    }

    pub fn type_name(&self) -> &'static str {
        self.invocation.type_info().name
    }

    /// 完整的方法签名，如 `Target.foo`
    pub fn signature(&self) -> String {
        format!("{}.{}", self.type_name(), self.method().name)
    }

    pub fn invocation(&mut self) -> &mut Invocation<'b> {
        self.invocation
    }
}

thread_local! {
    static CURRENT: RefCell<Vec<JoinPoint>> = const { RefCell::new(Vec::new()) };
}

/// 当前线程上正在执行的最内层连接点
///
/// 只在代理开启 `expose_invocation` 时可见；调用结束（无论成功或失败）后即不可见
pub fn current_join_point() -> Option<JoinPoint> {
    CURRENT.with(|stack| stack.borrow().last().cloned())
}

/// 当前线程上嵌套的代理调用层数
pub fn invocation_depth() -> usize {
    CURRENT.with(|stack| stack.borrow().len())
}

/// 进入时压栈，drop 时出栈
struct ExposedInvocation;

impl ExposedInvocation {
    fn enter(join_point: JoinPoint) -> Self {
        CURRENT.with(|stack| stack.borrow_mut().push(join_point));
        ExposedInvocation
    }
}

impl Drop for ExposedInvocation {
    fn drop(&mut self) {
        CURRENT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
