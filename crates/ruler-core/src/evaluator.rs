use crate::context::EvaluationContext;
use crate::error::EvalError;
use serde_json::Value;

/// 条件求值器
///
/// 引擎把“规则是否适用”、“是否违规”和“取出字段值”交给外部表达式引擎处理，
/// 表达式对引擎来说只是不透明的字符串。
pub trait ConditionEvaluator: Send + Sync {
    /// 判断规则是否适用于目标对象
    fn supports(
        &self,
        context: &EvaluationContext<'_>,
        expression: &str,
        target: &Value,
    ) -> Result<bool, EvalError> {
        self.judge(context, expression, target)
    }

    /// 判断目标对象是否违规
    fn judge(
        &self,
        context: &EvaluationContext<'_>,
        expression: &str,
        target: &Value,
    ) -> Result<bool, EvalError>;

    /// 取出表达式指向的值
    fn extract(
        &self,
        context: &EvaluationContext<'_>,
        expression: &str,
        target: &Value,
    ) -> Result<Value, EvalError>;
}
