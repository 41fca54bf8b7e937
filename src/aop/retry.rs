//! 内置重试通知
//!
//! 环绕通知：目标失败且错误匹配时，按退避策略等待后再次 `proceed()`，
//! 下游的拦截器和目标方法都会重新执行。

use crate::aop::advice::{Advice, ThrowsMatcher};
use crate::cfg::duration::{serde_as, HumanDur};
use anyhow::Result;
use backon::{BackoffBuilder, ConstantBuilder, ExponentialBuilder, FibonacciBuilder};
use garde::Validate;
use serde::Deserialize;
use smart_default::SmartDefault;
use std::time::Duration;

/// 重试通知配置
#[serde_as]
#[derive(Debug, Clone, Deserialize, SmartDefault, Validate)]
#[serde(default)]
pub struct RetryAdviceConfig {
    /// 最大重试次数（不含第一次调用）
    #[default = 3]
    #[garde(range(min = 1, max = 100))]
    pub max_times: usize,

    /// 退避策略: "constant" / "exponential" / "fibonacci"
    #[default = "constant"]
    #[garde(pattern("^(constant|exponential|fibonacci)$"))]
    pub strategy: String,

    /// 延迟（用于 constant 策略）
    #[serde_as(as = "HumanDur")]
    #[default(Duration::from_millis(100))]
    #[garde(skip)]
    pub delay: Duration,

    /// 最小延迟（用于 exponential/fibonacci 策略）
    #[serde_as(as = "HumanDur")]
    #[default(Duration::from_millis(100))]
    #[garde(skip)]
    pub min_delay: Duration,

    /// 最大延迟
    #[serde_as(as = "HumanDur")]
    #[default(Duration::from_secs(10))]
    #[garde(skip)]
    pub max_delay: Duration,

    /// 退避因子（用于 exponential 策略）
    #[default = 2.0]
    #[garde(range(min = 1.0))]
    pub factor: f32,

    /// 是否在延迟基础上添加随机抖动
    #[garde(skip)]
    pub jitter: bool,

    /// 通知顺序，默认在日志通知之内
    #[default = 1]
    #[garde(skip)]
    pub order: i32,
}

impl RetryAdviceConfig {
    /// 构建退避序列，序列耗尽即停止重试
    pub fn build_backoff(&self) -> Box<dyn Iterator<Item = Duration> + Send + Sync> {
        match self.strategy.as_str() {
            "exponential" => {
                let mut builder = ExponentialBuilder::default()
                    .with_min_delay(self.min_delay)
                    .with_max_delay(self.max_delay)
                    .with_factor(self.factor)
                    .with_max_times(self.max_times);
                if self.jitter {
                    builder = builder.with_jitter();
                }
                Box::new(builder.build())
            }
            "fibonacci" => {
                let mut builder = FibonacciBuilder::default()
                    .with_min_delay(self.min_delay)
                    .with_max_delay(self.max_delay)
                    .with_max_times(self.max_times);
                if self.jitter {
                    builder = builder.with_jitter();
                }
                Box::new(builder.build())
            }
            _ => {
                let mut builder = ConstantBuilder::default()
                    .with_delay(self.delay)
                    .with_max_times(self.max_times);
                if self.jitter {
                    builder = builder.with_jitter();
                }
                Box::new(builder.build())
            }
        }
    }
}

/// 任意错误都重试
pub fn retry_advice(config: RetryAdviceConfig) -> Result<Advice> {
    retry_advice_when(config, ThrowsMatcher::any())
}

/// 只有匹配 retry_on 的错误才重试，其它错误直接返回
pub fn retry_advice_when(config: RetryAdviceConfig, retry_on: ThrowsMatcher) -> Result<Advice> {
    config.validate()?;
    let order = config.order;

    let advice = Advice::around(move |pjp| {
        let operation = pjp.signature();
        let mut backoff = config.build_backoff();
        let mut retry_count = 0usize;
        loop {
            let err = match pjp.proceed() {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !retry_on.matches(&err) {
                return Err(err);
            }
            let Some(delay) = backoff.next() else {
                return Err(err);
            };

            retry_count += 1;
            tracing::warn!(
                operation = operation.as_str(),
                retry_count,
                retry_delay_ms = delay.as_millis() as u64,
                error = %err,
                "[AOP] {} retry {}",
                operation,
                retry_count
            );
            std::thread::sleep(delay);
        }
    });

    Ok(advice.with_order(order))
}
