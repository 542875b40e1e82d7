use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::evaluator::ConditionEvaluator;
use crate::model::RuleDefinition;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// 违规字段名 -> 违规值
pub type Fields = BTreeMap<String, Value>;

/// 规则
///
/// 一条规则绑定一个 [`RuleDefinition`]，由引擎按以下顺序调用：
/// `supports` 为真才会调用 `judge`，`judge` 为真才会调用 `collect_violations`。
/// 无法求值的情况（例如字段缺失）应通过 `supports` 返回 false 表达。
pub trait Rule: Send + Sync {
    /// 规则定义
    fn definition(&self) -> &RuleDefinition;

    /// 规则是否适用于目标对象，不得有副作用
    fn supports(
        &self,
        context: &EvaluationContext<'_>,
        evaluator: &dyn ConditionEvaluator,
        target: &Value,
    ) -> Result<bool, EvalError>;

    /// 目标对象是否违反规则
    fn judge(
        &self,
        context: &EvaluationContext<'_>,
        evaluator: &dyn ConditionEvaluator,
        target: &Value,
    ) -> Result<bool, EvalError>;

    /// 收集违规字段与值
    fn collect_violations(
        &self,
        context: &EvaluationContext<'_>,
        evaluator: &dyn ConditionEvaluator,
        target: &Value,
    ) -> Result<Fields, EvalError>;

    fn rule_code(&self) -> &str {
        &self.definition().rule_code
    }
}

impl fmt::Debug for dyn Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("rule_code", &self.definition().rule_code)
            .field("order", &self.definition().order)
            .finish()
    }
}

/// 声明式规则
///
/// 行为完全由定义中的表达式决定：
/// - `condition_exp` 决定是否适用（缺省为适用）
/// - `predicate_exp` 决定是否违规（缺省为不违规）
/// - `parameter_exp` 决定报告中的字段与值
#[derive(Debug, Clone)]
pub struct DeclarativeRule {
    definition: RuleDefinition,
}

impl DeclarativeRule {
    pub fn new(definition: RuleDefinition) -> Self {
        Self { definition }
    }
}

fn non_empty(exp: Option<&str>) -> Option<&str> {
    exp.map(str::trim).filter(|exp| !exp.is_empty())
}

impl Rule for DeclarativeRule {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn supports(
        &self,
        context: &EvaluationContext<'_>,
        evaluator: &dyn ConditionEvaluator,
        target: &Value,
    ) -> Result<bool, EvalError> {
        match non_empty(self.definition.condition_exp.as_deref()) {
            Some(exp) => evaluator.supports(context, exp, target),
            None => Ok(true),
        }
    }

    fn judge(
        &self,
        context: &EvaluationContext<'_>,
        evaluator: &dyn ConditionEvaluator,
        target: &Value,
    ) -> Result<bool, EvalError> {
        match non_empty(self.definition.predicate_exp.as_deref()) {
            Some(exp) => evaluator.judge(context, exp, target),
            None => Ok(false),
        }
    }

    fn collect_violations(
        &self,
        context: &EvaluationContext<'_>,
        evaluator: &dyn ConditionEvaluator,
        target: &Value,
    ) -> Result<Fields, EvalError> {
        let mut fields = Fields::new();
        if let Some(exp) = non_empty(self.definition.parameter_exp.as_deref()) {
            let value = evaluator.extract(context, exp, target)?;
            fields.insert(context.field_key(exp), value);
        }
        Ok(fields)
    }
}
