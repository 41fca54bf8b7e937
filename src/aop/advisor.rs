//! 通知器（Advisor）与通知器目录

use crate::aop::advice::Advice;
use crate::aop::error::AopError;
use crate::aop::join_point::{MethodSignature, TypeInfo};
use crate::aop::pointcut::Pointcut;
use std::sync::Arc;

/// 通知器：切点 + 通知 + 顺序
#[derive(Clone, Debug)]
pub struct Advisor {
    pointcut: Pointcut,
    advice: Arc<Advice>,
    order: i32,
}

impl Advisor {
    /// 顺序默认取通知自身的顺序
    pub fn new(pointcut: Pointcut, advice: Advice) -> Self {
        let order = advice.order();
        Self {
            pointcut,
            advice: Arc::new(advice),
            order,
        }
    }

    /// 显式覆盖顺序
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn pointcut(&self) -> &Pointcut {
        &self.pointcut
    }

    pub fn advice(&self) -> &Arc<Advice> {
        &self.advice
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    /// 是否静态匹配指定方法
    pub fn matches(&self, type_info: &TypeInfo, method: &MethodSignature) -> Result<bool, AopError> {
        self.pointcut.matches_static(type_info, method)
    }
}

/// 通知器目录
///
/// 由外部一次性提供全部通知器，构建后只读。通知器按 order 升序排列，
/// order 相同时保持注册顺序。
#[derive(Clone, Debug, Default)]
pub struct AdvisorCatalog {
    advisors: Vec<Advisor>,
}

impl AdvisorCatalog {
    pub fn new(advisors: impl IntoIterator<Item = Advisor>) -> Self {
        let mut advisors: Vec<Advisor> = advisors.into_iter().collect();
        // sort_by_key 是稳定排序
        advisors.sort_by_key(|a| a.order);
        Self { advisors }
    }

    pub fn advisors(&self) -> &[Advisor] {
        &self.advisors
    }

    pub fn len(&self) -> usize {
        self.advisors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.advisors.is_empty()
    }

    /// 查找适用于目标类型的通知器
    ///
    /// 只要静态匹配目标类型的任意一个方法即视为适用，动态条件留到调用时再判断。
    /// 没有适用的通知器时返回空列表，切点无法求值时返回错误。
    pub fn find_eligible_advisors(&self, type_info: &TypeInfo) -> Result<Vec<Advisor>, AopError> {
        Ok(self
            .eligible_indices(type_info)?
            .into_iter()
            .map(|i| self.advisors[i].clone())
            .collect())
    }

    /// 适用于指定方法的通知器，保持目录顺序
    pub fn advisors_for_method(
        &self,
        type_info: &TypeInfo,
        method: &MethodSignature,
    ) -> Result<Vec<&Advisor>, AopError> {
        let mut matched = Vec::new();
        for advisor in &self.advisors {
            if advisor.matches(type_info, method)? {
                matched.push(advisor);
            }
        }
        Ok(matched)
    }

    /// 每个（通知器，方法）组合都会求值，任何一个切点无法求值都直接返回错误
    pub(crate) fn eligible_indices(&self, type_info: &TypeInfo) -> Result<Vec<usize>, AopError> {
        let mut indices = Vec::new();
        for (i, advisor) in self.advisors.iter().enumerate() {
            let mut eligible = false;
            for method in type_info.methods {
                eligible |= advisor.matches(type_info, method)?;
            }
            if eligible {
                indices.push(i);
            }
        }
        Ok(indices)
    }
}

impl FromIterator<Advisor> for AdvisorCatalog {
    fn from_iter<I: IntoIterator<Item = Advisor>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    static METHODS: [MethodSignature; 2] = [
        MethodSignature::new("foo", &[]),
        MethodSignature::new("bar", &["i32"]),
    ];
    static TYPE: TypeInfo = TypeInfo::new("Target", &METHODS);

    fn named(order: i32, name: &'static str) -> Advisor {
        Advisor::new(
            Pointcut::matching(name, |_, _| true),
            Advice::before(|_| Ok(())).with_order(order),
        )
    }

    fn tags(advisors: &[Advisor]) -> Vec<&str> {
        advisors.iter().map(|a| a.pointcut().expression()).collect()
    }

    #[test]
    fn test_order_defaults_from_advice() {
        let advisor = Advisor::new(Pointcut::all(), Advice::before(|_| Ok(())).with_order(5));
        assert_eq!(advisor.order(), 5);
        assert_eq!(advisor.with_order(1).order(), 1);
    }

    #[test]
    fn test_stable_ordering() {
        let catalog = AdvisorCatalog::new(vec![
            named(2, "a"),
            named(1, "b"),
            named(2, "c"),
            named(1, "d"),
            named(i32::MAX, "e"),
        ]);
        let eligible = catalog.find_eligible_advisors(&TYPE).unwrap();
        assert_eq!(tags(&eligible), vec!["b", "d", "a", "c", "e"]);
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let catalog: AdvisorCatalog =
            vec![Advisor::new(Pointcut::method("baz"), Advice::after(|_| {}))]
                .into_iter()
                .collect();
        assert!(catalog.find_eligible_advisors(&TYPE).unwrap().is_empty());
        assert!(AdvisorCatalog::default()
            .find_eligible_advisors(&TYPE)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_eligible_if_any_method_matches() {
        let catalog = AdvisorCatalog::new(vec![Advisor::new(
            Pointcut::method("bar"),
            Advice::after(|_| {}),
        )]);
        assert_eq!(catalog.find_eligible_advisors(&TYPE).unwrap().len(), 1);
        assert!(catalog
            .advisors_for_method(&TYPE, &METHODS[0])
            .unwrap()
            .is_empty());
        assert_eq!(
            catalog.advisors_for_method(&TYPE, &METHODS[1]).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_static_filter_error_fails_fast() {
        let catalog = AdvisorCatalog::new(vec![Advisor::new(
            Pointcut::new("broken", |_, _| Err(anyhow!("cannot evaluate"))),
            Advice::after(|_| {}),
        )]);
        let err = catalog.find_eligible_advisors(&TYPE).unwrap_err();
        assert!(matches!(err, AopError::PointcutMatch { .. }));
    }

    #[test]
    fn test_error_on_later_method_still_fails() {
        // foo 匹配成功，bar 无法求值
        let catalog = AdvisorCatalog::new(vec![Advisor::new(
            Pointcut::new("partial", |_, m| match m.name {
                "foo" => Ok(true),
                _ => Err(anyhow!("cannot evaluate {}", m.name)),
            }),
            Advice::after(|_| {}),
        )]);
        let err = catalog.find_eligible_advisors(&TYPE).unwrap_err();
        assert!(matches!(
            err,
            AopError::PointcutMatch { ref method, .. } if method == "bar"
        ));
    }
}
