//! 提前暴露的引用
//!
//! 对象 A 和 B 互相依赖时，容器在 A 还没有构造完成之前就要把 A 注入给 B。
//! 这里为 A 提前创建（或复用）对外引用并记录下来；A 构造完成后 `finalize`
//! 返回的必须是同一个引用，保证整个对象图里每个目标只有一个代理身份。

use crate::aop::error::AopError;
use crate::aop::proxy::{Exposed, ProxyFactory};
use crate::aop::target::{same_instance, Target};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

struct EarlyReference {
    raw: Arc<dyn Target>,
    exposed: Exposed,
}

/// 提前暴露引用的缓存，生命周期限于一次对象图构建
pub struct EarlyReferenceCache {
    factory: Arc<ProxyFactory>,
    references: DashMap<String, EarlyReference>,
}

impl EarlyReferenceCache {
    pub fn new(factory: Arc<ProxyFactory>) -> Self {
        Self {
            factory,
            references: DashMap::new(),
        }
    }

    /// 提前暴露 id 对应的对象
    ///
    /// 同一个 id 重复调用返回同一个引用；raw 必须是第一次暴露时的同一个实例
    pub fn expose_early(&self, id: &str, raw: Arc<dyn Target>) -> Result<Exposed, AopError> {
        match self.references.entry(id.to_string()) {
            Entry::Occupied(entry) => {
                if !same_instance(&*entry.get().raw, &*raw) {
                    return Err(AopError::EarlyReferenceMismatch { id: id.to_string() });
                }
                Ok(entry.get().exposed.clone())
            }
            Entry::Vacant(entry) => {
                let exposed = self.factory.wrap_if_necessary(Arc::clone(&raw))?;
                tracing::debug!(id, proxied = exposed.is_proxied(), "exposed early reference");
                entry.insert(EarlyReference {
                    raw,
                    exposed: exposed.clone(),
                });
                Ok(exposed)
            }
        }
    }

    /// 对象构造完成，返回它最终的对外引用
    ///
    /// 如果之前提前暴露过，返回那个引用并清除记录；否则正常创建
    ///
    /// 实例不一致时返回错误并保留记录，之后用正确的实例 finalize 仍然得到提前暴露的引用
    pub fn finalize(&self, id: &str, constructed: Arc<dyn Target>) -> Result<Exposed, AopError> {
        let removed = self
            .references
            .remove_if(id, |_, early| same_instance(&*early.raw, &*constructed));
        if let Some((_, early)) = removed {
            return Ok(early.exposed);
        }

        if self.references.contains_key(id) {
            tracing::warn!(id, "constructed instance differs from early exposed one");
            return Err(AopError::EarlyReferenceMismatch { id: id.to_string() });
        }
        self.factory.wrap_if_necessary(constructed)
    }

    /// id 是否已经提前暴露且尚未 finalize
    pub fn is_exposed(&self, id: &str) -> bool {
        self.references.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}
