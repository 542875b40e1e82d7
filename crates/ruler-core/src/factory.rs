use crate::error::{Result, RulerError};
use crate::model::RuleDefinition;
use crate::rule::{DeclarativeRule, Rule};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// 规则工厂
///
/// 规则引擎在重新加载时以工厂为准。
pub trait RuleFactory: Send + Sync {
    /// 按发现顺序返回业务类型下的所有规则，未知业务类型返回错误
    fn find_rules(&self, business_type: &str) -> Result<Vec<Arc<dyn Rule>>>;

    /// 按规则编号获取规则
    fn get_rule(&self, rule_code: &str) -> Option<Arc<dyn Rule>>;
}

/// 规则构造函数
pub type RuleConstructor = Arc<dyn Fn(RuleDefinition) -> Arc<dyn Rule> + Send + Sync>;

#[derive(Default)]
struct Registry {
    /// 规则编号 -> 构造函数
    constructors: HashMap<String, RuleConstructor>,
    /// 按注册顺序保存的规则实例
    rules: Vec<Arc<dyn Rule>>,
    /// 已知的业务类型
    business_types: HashSet<String>,
}

impl Registry {
    fn contains(&self, rule_code: &str) -> bool {
        self.rules.iter().any(|r| r.rule_code() == rule_code)
    }

    fn build(&self, definition: RuleDefinition) -> Arc<dyn Rule> {
        match self.constructors.get(&definition.rule_code) {
            Some(constructor) => constructor(definition),
            None => Arc::new(DeclarativeRule::new(definition)),
        }
    }
}

/// 基于显式注册表的规则工厂
///
/// 启动时登记 `规则编号 -> 构造函数`，再登记规则定义。
/// 没有构造函数的定义会构造成 [`DeclarativeRule`]。
/// 规则实例在登记时创建一次，之后共享。
#[derive(Default)]
pub struct RegistryRuleFactory {
    registry: RwLock<Registry>,
}

impl RegistryRuleFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记构造函数（需在登记对应的规则定义之前调用）
    pub fn register_constructor<F>(&self, rule_code: impl Into<String>, constructor: F)
    where
        F: Fn(RuleDefinition) -> Arc<dyn Rule> + Send + Sync + 'static,
    {
        let rule_code = rule_code.into();
        debug!(rule_code = %rule_code, "Rule constructor registered");
        self.registry
            .write()
            .constructors
            .insert(rule_code, Arc::new(constructor));
    }

    /// 声明业务类型（没有任何规则时也视为已知）
    pub fn declare_business_type(&self, business_type: impl Into<String>) {
        self.registry.write().business_types.insert(business_type.into());
    }

    /// 登记规则定义
    pub fn register(&self, definition: RuleDefinition) -> Result<()> {
        let mut registry = self.registry.write();
        if registry.contains(&definition.rule_code) {
            return Err(RulerError::DuplicateRule(definition.rule_code));
        }

        info!(
            rule_code = %definition.rule_code,
            business_type = %definition.business_type,
            "Rule registered"
        );
        registry.business_types.insert(definition.business_type.clone());
        let rule = registry.build(definition);
        registry.rules.push(rule);
        Ok(())
    }

    /// 批量登记规则定义，遇到第一个错误即停止
    pub fn register_all<I>(&self, definitions: I) -> Result<()>
    where
        I: IntoIterator<Item = RuleDefinition>,
    {
        for definition in definitions {
            self.register(definition)?;
        }
        Ok(())
    }

    /// 登记已经构造好的规则实例
    pub fn register_rule(&self, rule: Arc<dyn Rule>) -> Result<()> {
        let mut registry = self.registry.write();
        if registry.contains(rule.rule_code()) {
            return Err(RulerError::DuplicateRule(rule.rule_code().to_string()));
        }

        registry
            .business_types
            .insert(rule.definition().business_type.clone());
        registry.rules.push(rule);
        Ok(())
    }

    /// 整体替换某个业务类型的规则定义
    ///
    /// 已登记的该业务类型规则（包括通过 `register_rule` 登记的实例）全部被替换，
    /// 规则引擎在下一次 `reload_rules` 时生效。
    pub fn replace_definitions(
        &self,
        business_type: &str,
        definitions: Vec<RuleDefinition>,
    ) -> Result<()> {
        let mut registry = self.registry.write();

        let mut codes = HashSet::new();
        for definition in &definitions {
            if definition.business_type != business_type {
                return Err(RulerError::BusinessTypeMismatch {
                    rule_code: definition.rule_code.clone(),
                    expected: business_type.to_string(),
                    actual: definition.business_type.clone(),
                });
            }
            let taken_elsewhere = registry.rules.iter().any(|r| {
                r.rule_code() == definition.rule_code
                    && r.definition().business_type != business_type
            });
            if !codes.insert(definition.rule_code.as_str()) || taken_elsewhere {
                return Err(RulerError::DuplicateRule(definition.rule_code.clone()));
            }
        }

        let count = definitions.len();
        let rebuilt: Vec<_> = definitions.into_iter().map(|d| registry.build(d)).collect();
        registry
            .rules
            .retain(|r| r.definition().business_type != business_type);
        registry.rules.extend(rebuilt);
        registry.business_types.insert(business_type.to_string());

        info!(business_type = %business_type, count, "Rule definitions replaced");
        Ok(())
    }

    /// 某个业务类型的全部规则定义
    pub fn definitions(&self, business_type: &str) -> Vec<RuleDefinition> {
        self.registry
            .read()
            .rules
            .iter()
            .filter(|r| r.definition().business_type == business_type)
            .map(|r| r.definition().clone())
            .collect()
    }

    /// 已知的业务类型（排序后）
    pub fn business_types(&self) -> Vec<String> {
        let mut types: Vec<_> = self.registry.read().business_types.iter().cloned().collect();
        types.sort();
        types
    }
}

impl RuleFactory for RegistryRuleFactory {
    fn find_rules(&self, business_type: &str) -> Result<Vec<Arc<dyn Rule>>> {
        let registry = self.registry.read();
        if !registry.business_types.contains(business_type) {
            return Err(RulerError::UnknownBusinessType(business_type.to_string()));
        }

        Ok(registry
            .rules
            .iter()
            .filter(|r| r.definition().business_type == business_type)
            .cloned()
            .collect())
    }

    fn get_rule(&self, rule_code: &str) -> Option<Arc<dyn Rule>> {
        self.registry
            .read()
            .rules
            .iter()
            .find(|r| r.rule_code() == rule_code)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EvaluationContext;
    use crate::error::EvalError;
    use crate::evaluator::ConditionEvaluator;
    use crate::rule::Fields;
    use serde_json::Value;

    struct AlwaysViolated(RuleDefinition);

    impl Rule for AlwaysViolated {
        fn definition(&self) -> &RuleDefinition {
            &self.0
        }

        fn supports(
            &self,
            _: &EvaluationContext<'_>,
            _: &dyn ConditionEvaluator,
            _: &Value,
        ) -> std::result::Result<bool, EvalError> {
            Ok(true)
        }

        fn judge(
            &self,
            _: &EvaluationContext<'_>,
            _: &dyn ConditionEvaluator,
            _: &Value,
        ) -> std::result::Result<bool, EvalError> {
            Ok(true)
        }

        fn collect_violations(
            &self,
            _: &EvaluationContext<'_>,
            _: &dyn ConditionEvaluator,
            _: &Value,
        ) -> std::result::Result<Fields, EvalError> {
            Ok(Fields::new())
        }
    }

    struct Unused;

    impl ConditionEvaluator for Unused {
        fn judge(
            &self,
            _: &EvaluationContext<'_>,
            _: &str,
            _: &Value,
        ) -> std::result::Result<bool, EvalError> {
            Err(EvalError::runtime("unused"))
        }

        fn extract(
            &self,
            _: &EvaluationContext<'_>,
            _: &str,
            _: &Value,
        ) -> std::result::Result<Value, EvalError> {
            Err(EvalError::runtime("unused"))
        }
    }

    #[test]
    fn test_register_and_find() {
        let factory = RegistryRuleFactory::new();
        factory.register(RuleDefinition::new("a", "order")).unwrap();
        factory.register(RuleDefinition::new("b", "order")).unwrap();
        factory.register(RuleDefinition::new("c", "invoice")).unwrap();

        let rules = factory.find_rules("order").unwrap();
        let codes: Vec<_> = rules.iter().map(|r| r.rule_code().to_string()).collect();
        assert_eq!(codes, vec!["a", "b"]);
        assert_eq!(factory.business_types(), vec!["invoice", "order"]);
        assert!(factory.get_rule("c").is_some());
        assert!(factory.get_rule("z").is_none());
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let factory = RegistryRuleFactory::new();
        factory.register(RuleDefinition::new("a", "order")).unwrap();

        let err = factory.register(RuleDefinition::new("a", "invoice")).unwrap_err();
        assert!(matches!(err, RulerError::DuplicateRule(code) if code == "a"));
    }

    #[test]
    fn test_unknown_business_type() {
        let factory = RegistryRuleFactory::new();
        assert!(matches!(
            factory.find_rules("order"),
            Err(RulerError::UnknownBusinessType(_))
        ));

        factory.declare_business_type("order");
        assert!(factory.find_rules("order").unwrap().is_empty());
    }

    #[test]
    fn test_constructor_is_used() {
        let factory = RegistryRuleFactory::new();
        factory.register_constructor("always", |d| Arc::new(AlwaysViolated(d)) as Arc<dyn Rule>);
        factory.register(RuleDefinition::new("always", "order")).unwrap();

        let rule = factory.get_rule("always").unwrap();
        let root = Value::Null;
        let context = EvaluationContext::new(&root);
        assert!(rule.judge(&context, &Unused, &root).unwrap());
    }

    #[test]
    fn test_replace_definitions() {
        let factory = RegistryRuleFactory::new();
        factory.register(RuleDefinition::new("a", "order")).unwrap();
        factory.register(RuleDefinition::new("x", "invoice")).unwrap();

        factory
            .replace_definitions(
                "order",
                vec![
                    RuleDefinition::new("b", "order"),
                    RuleDefinition::new("c", "order"),
                ],
            )
            .unwrap();

        let codes: Vec<_> = factory
            .definitions("order")
            .into_iter()
            .map(|d| d.rule_code)
            .collect();
        assert_eq!(codes, vec!["b", "c"]);
        assert!(factory.get_rule("x").is_some());
    }

    #[test]
    fn test_replace_definitions_rejects_conflicts() {
        let factory = RegistryRuleFactory::new();
        factory.register(RuleDefinition::new("x", "invoice")).unwrap();

        let err = factory
            .replace_definitions("order", vec![RuleDefinition::new("x", "order")])
            .unwrap_err();
        assert!(matches!(err, RulerError::DuplicateRule(_)));

        let err = factory
            .replace_definitions("order", vec![RuleDefinition::new("y", "invoice")])
            .unwrap_err();
        assert!(matches!(err, RulerError::BusinessTypeMismatch { .. }));

        // 失败的替换不改变已有规则
        assert!(factory.get_rule("x").is_some());
        assert!(factory.get_rule("y").is_none());
    }
}
