#![allow(dead_code)]

use parking_lot::Mutex;
use ruler_core::{
    ConditionEvaluator, EvalError, EvaluationContext, ExecutionStrategy, Fields, Grade,
    RegistryRuleFactory, Rule, RuleDefinition, RuleFactory, RuleObserver, RulerError,
    RulesEngine,
};
use serde_json::Value;
use std::sync::Arc;

pub const BUSINESS_TYPE: &str = "order";

pub fn lookup<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(value, |v, key| v.get(key))
}

/// 按点分路径取值；判定表达式必须指向布尔字段
pub struct PathEvaluator;

impl ConditionEvaluator for PathEvaluator {
    fn judge(
        &self,
        _context: &EvaluationContext<'_>,
        expression: &str,
        target: &Value,
    ) -> Result<bool, EvalError> {
        match lookup(target, expression) {
            Some(Value::Bool(flag)) => Ok(*flag),
            _ => Err(EvalError::type_mismatch("bool", "other")),
        }
    }

    fn extract(
        &self,
        _context: &EvaluationContext<'_>,
        expression: &str,
        target: &Value,
    ) -> Result<Value, EvalError> {
        Ok(lookup(target, expression).cloned().unwrap_or(Value::Null))
    }
}

type Predicate = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// 作用于单个字段的测试规则
pub struct FieldRule {
    definition: RuleDefinition,
    field: String,
    supports: Predicate,
    judge: Predicate,
    value: Option<Value>,
}

impl FieldRule {
    pub fn new(definition: RuleDefinition, field: &str) -> Self {
        Self {
            definition,
            field: field.to_string(),
            supports: Box::new(|_| true),
            judge: Box::new(|_| false),
            value: None,
        }
    }

    pub fn supports_when(mut self, f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.supports = Box::new(f);
        self
    }

    pub fn violated_when(mut self, f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.judge = Box::new(f);
        self
    }

    /// 报告中使用固定值代替字段值
    pub fn report_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

impl Rule for FieldRule {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn supports(
        &self,
        _context: &EvaluationContext<'_>,
        _evaluator: &dyn ConditionEvaluator,
        target: &Value,
    ) -> Result<bool, EvalError> {
        Ok((self.supports)(target))
    }

    fn judge(
        &self,
        _context: &EvaluationContext<'_>,
        _evaluator: &dyn ConditionEvaluator,
        target: &Value,
    ) -> Result<bool, EvalError> {
        Ok((self.judge)(target))
    }

    fn collect_violations(
        &self,
        context: &EvaluationContext<'_>,
        _evaluator: &dyn ConditionEvaluator,
        target: &Value,
    ) -> Result<Fields, EvalError> {
        let leaf = self.field.rsplit('.').next().unwrap_or(&self.field);
        let value = match &self.value {
            Some(value) => value.clone(),
            None => target.get(leaf).cloned().unwrap_or(Value::Null),
        };
        let mut fields = Fields::new();
        fields.insert(context.field_key(&self.field), value);
        Ok(fields)
    }
}

/// 字段大于阈值即违规的规则
pub fn greater_than(code: &str, order: i32, limit: i64) -> FieldRule {
    let field = code.to_string();
    FieldRule::new(
        RuleDefinition::new(code, BUSINESS_TYPE).with_order(order),
        code,
    )
    .violated_when(move |v| v.get(&field).and_then(Value::as_i64).unwrap_or(0) > limit)
}

pub fn factory_with(rules: Vec<FieldRule>) -> Arc<RegistryRuleFactory> {
    let factory = Arc::new(RegistryRuleFactory::new());
    factory.declare_business_type(BUSINESS_TYPE);
    for rule in rules {
        factory.register_rule(Arc::new(rule)).unwrap();
    }
    factory
}

pub fn engine(factory: &Arc<RegistryRuleFactory>, strategy: ExecutionStrategy) -> RulesEngine {
    RulesEngine::builder(BUSINESS_TYPE, factory.clone(), Arc::new(PathEvaluator))
        .strategy(strategy)
        .build()
        .unwrap()
}

pub fn codes(engine: &RulesEngine) -> Vec<String> {
    engine
        .rule_definitions()
        .into_iter()
        .map(|d| d.rule_code)
        .collect()
}

/// 记录所有回调的观察者
#[derive(Default)]
pub struct RecordingObserver {
    pub outcomes: Mutex<Vec<(String, Grade, bool, Option<Fields>)>>,
    pub errors: Mutex<Vec<(String, EvalError)>>,
}

impl RuleObserver for RecordingObserver {
    fn on_rule_outcome(&self, rule_code: &str, grade: Grade, violated: bool, fields: Option<&Fields>) {
        self.outcomes
            .lock()
            .push((rule_code.to_string(), grade, violated, fields.cloned()));
    }

    fn on_rule_error(&self, rule_code: &str, error: &EvalError) {
        self.errors.lock().push((rule_code.to_string(), error.clone()));
    }
}

/// 可切换返回内容的工厂，用于重载场景
#[derive(Default)]
pub struct SwitchableFactory {
    rules: Mutex<Vec<Arc<dyn Rule>>>,
    unknown: Mutex<bool>,
}

impl SwitchableFactory {
    pub fn with_rules(rules: Vec<FieldRule>) -> Arc<Self> {
        let factory = Arc::new(Self::default());
        factory.set_rules(rules);
        factory
    }

    /// 之后的 `find_rules` 按发现顺序返回这些规则
    pub fn set_rules(&self, rules: Vec<FieldRule>) {
        *self.rules.lock() = rules
            .into_iter()
            .map(|r| Arc::new(r) as Arc<dyn Rule>)
            .collect();
        *self.unknown.lock() = false;
    }

    /// 之后的 `find_rules` 返回未知业务类型错误
    pub fn forget_business_type(&self) {
        *self.unknown.lock() = true;
    }
}

impl RuleFactory for SwitchableFactory {
    fn find_rules(&self, business_type: &str) -> ruler_core::Result<Vec<Arc<dyn Rule>>> {
        if *self.unknown.lock() {
            return Err(RulerError::UnknownBusinessType(business_type.to_string()));
        }
        Ok(self.rules.lock().clone())
    }

    fn get_rule(&self, rule_code: &str) -> Option<Arc<dyn Rule>> {
        self.rules
            .lock()
            .iter()
            .find(|r| r.definition().rule_code == rule_code)
            .cloned()
    }
}

pub fn switchable_engine(factory: &Arc<SwitchableFactory>) -> RulesEngine {
    RulesEngine::builder(BUSINESS_TYPE, factory.clone(), Arc::new(PathEvaluator))
        .strategy(ExecutionStrategy::Complete)
        .build()
        .unwrap()
}
