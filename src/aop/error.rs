use thiserror::Error;

/// 织入过程中的错误类型
///
/// 只覆盖装配阶段（切点求值、通知适配、代理创建、循环引用）的错误。
/// 目标方法或通知抛出的业务错误以 `anyhow::Error` 原样穿过调用链，不会被包装。
#[derive(Error, Debug)]
pub enum AopError {
    #[error("切点求值失败 [{expression}] {type_name}.{method}: {reason}")]
    PointcutMatch {
        expression: String,
        type_name: String,
        method: String,
        reason: String,
    },

    #[error("不支持的通知类型: {0}")]
    UnsupportedAdvice(String),

    #[error("方法不存在: {type_name}.{method}/{arity}")]
    NoSuchMethod {
        type_name: String,
        method: String,
        arity: usize,
    },

    #[error("方法未通过接口暴露: {type_name}.{method}")]
    MethodNotExposed { type_name: String, method: String },

    #[error("提前暴露的引用与最终实例不一致: {id}")]
    EarlyReferenceMismatch { id: String },

    #[error("返回值类型不匹配: {method} 期望 {expected}")]
    ReturnType {
        method: String,
        expected: &'static str,
    },

    #[error("配置错误: {0}")]
    InvalidConfig(String),
}

impl AopError {
    /// 从切点求值错误构造
    pub fn pointcut_match(
        expression: &str,
        type_name: &str,
        method: &str,
        reason: impl std::fmt::Display,
    ) -> Self {
        AopError::PointcutMatch {
            expression: expression.to_string(),
            type_name: type_name.to_string(),
            method: method.to_string(),
            reason: reason.to_string(),
        }
    }
}
