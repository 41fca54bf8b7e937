//! 切点（Pointcut）
//!
//! 切点由两部分组成：
//! - 静态过滤：只看目标类型和方法签名，用于构建调用链时的预筛选
//! - 动态过滤（可选）：看实际参数，每次调用都会重新求值
//!
//! 切点表达式文本只用于展示和诊断，这里不解析表达式语法。

use crate::aop::error::AopError;
use crate::aop::join_point::{Args, MethodSignature, TypeInfo};
use anyhow::anyhow;
use glob::Pattern;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 静态过滤函数，无法求值时返回错误
pub type StaticFilter =
    Arc<dyn Fn(&TypeInfo, &MethodSignature) -> anyhow::Result<bool> + Send + Sync>;

/// 动态过滤函数
pub type DynamicFilter = Arc<dyn Fn(&Args) -> bool + Send + Sync>;

/// 切点
#[derive(Clone)]
pub struct Pointcut {
    expression: String,
    static_filter: StaticFilter,
    dynamic_filter: Option<DynamicFilter>,
}

impl Pointcut {
    /// 从可能失败的静态过滤函数创建切点
    pub fn new<F>(expression: impl Into<String>, filter: F) -> Self
    where
        F: Fn(&TypeInfo, &MethodSignature) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Self {
            expression: expression.into(),
            static_filter: Arc::new(filter),
            dynamic_filter: None,
        }
    }

    /// 从不会失败的静态过滤函数创建切点
    pub fn matching<F>(expression: impl Into<String>, filter: F) -> Self
    where
        F: Fn(&TypeInfo, &MethodSignature) -> bool + Send + Sync + 'static,
    {
        Self::new(expression, move |t, m| Ok(filter(t, m)))
    }

    /// 匹配所有方法
    pub fn all() -> Self {
        Self::matching("execution(* *(..))", |_, _| true)
    }

    /// 按方法名匹配
    pub fn method(name: impl Into<String>) -> Self {
        let name = name.into();
        let expression = format!("execution(* {}(..))", name);
        Self::matching(expression, move |_, m| m.name == name)
    }

    /// 按类型名和方法名的 glob 模式匹配，如 `glob("*Service", "create*")`
    ///
    /// 模式非法时不会立即报错，而是在构建调用链时以 [`AopError::PointcutMatch`] 暴露出来
    pub fn glob(type_pattern: &str, method_pattern: &str) -> Self {
        let expression = format!("execution(* {}.{}(..))", type_pattern, method_pattern);
        let compiled = Pattern::new(type_pattern)
            .and_then(|t| Pattern::new(method_pattern).map(|m| (t, m)))
            .map_err(|e| e.to_string());

        Self::new(expression, move |t, m| match &compiled {
            Ok((type_glob, method_glob)) => {
                Ok(type_glob.matches(t.name) && method_glob.matches(m.name))
            }
            Err(e) => Err(anyhow!("malformed pattern: {}", e)),
        })
    }

    /// 追加动态过滤条件（与已有条件取交集）
    pub fn with_dynamic<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Args) -> bool + Send + Sync + 'static,
    {
        let combined: DynamicFilter = match self.dynamic_filter.take() {
            Some(prev) => Arc::new(move |args: &Args| prev(args) && filter(args)),
            None => Arc::new(filter),
        };
        self.dynamic_filter = Some(combined);
        self
    }

    /// 按参数值匹配，相当于 `args(x) && pred(x)`
    ///
    /// 静态部分要求方法至少有 index + 1 个参数，动态部分要求参数类型为 T 且满足 pred
    pub fn and_arg<T, F>(self, index: usize, pred: F) -> Self
    where
        T: Any,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let mut pc = self.and_static(move |_, m| Ok(m.arity() > index));
        pc.expression = format!("{} && args[{}]", pc.expression, index);
        pc.with_dynamic(move |args| args.get::<T>(index).is_some_and(&pred))
    }

    /// 两个切点取交集
    pub fn and(self, other: Pointcut) -> Self {
        let other_static = other.static_filter.clone();
        let mut pc = self.and_static(move |t, m| other_static(t, m));
        pc.expression = format!("{} && {}", pc.expression, other.expression);
        match other.dynamic_filter {
            Some(dynamic) => pc.with_dynamic(move |args| dynamic(args)),
            None => pc,
        }
    }

    fn and_static<F>(mut self, filter: F) -> Self
    where
        F: Fn(&TypeInfo, &MethodSignature) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        let prev = self.static_filter;
        self.static_filter = Arc::new(
            move |t: &TypeInfo, m: &MethodSignature| -> anyhow::Result<bool> {
                Ok(prev(t, m)? && filter(t, m)?)
            },
        );
        self
    }

    /// 切点表达式文本
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// 是否包含动态过滤条件
    pub fn is_runtime(&self) -> bool {
        self.dynamic_filter.is_some()
    }

    /// 静态匹配
    pub fn matches_static(
        &self,
        type_info: &TypeInfo,
        method: &MethodSignature,
    ) -> Result<bool, AopError> {
        (self.static_filter)(type_info, method).map_err(|e| {
            AopError::pointcut_match(&self.expression, type_info.name, method.name, e)
        })
    }

    /// 动态匹配，没有动态条件时总是匹配
    pub fn matches_dynamic(&self, args: &Args) -> bool {
        self.dynamic_filter.as_ref().map_or(true, |f| f(args))
    }
}

impl fmt::Debug for Pointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pointcut")
            .field("expression", &self.expression)
            .field("runtime", &self.is_runtime())
            .finish()
    }
}
