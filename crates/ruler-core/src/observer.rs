use crate::error::EvalError;
use crate::model::Grade;
use crate::rule::Fields;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// 规则执行观察者
///
/// 每条被执行的规则都会回调一次 `on_rule_outcome`。回调只用于观察，
/// 不会影响执行结果；回调中的 panic 会被捕获并记录。
pub trait RuleObserver: Send + Sync {
    /// 规则执行结果，`fields` 仅在生成报告时提供
    fn on_rule_outcome(&self, rule_code: &str, grade: Grade, violated: bool, fields: Option<&Fields>);

    /// 规则求值出错（该规则对当前对象视为不适用）
    fn on_rule_error(&self, rule_code: &str, error: &EvalError) {
        let _ = (rule_code, error);
    }
}

/// 以 tracing 日志记录每条规则的执行结果
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RuleObserver for TracingObserver {
    fn on_rule_outcome(&self, rule_code: &str, grade: Grade, violated: bool, fields: Option<&Fields>) {
        let grade = if violated { grade } else { Grade::Qualified };
        debug!(
            rule_code = %rule_code,
            grade = %grade,
            violated,
            fields = ?fields,
            "Rule evaluated"
        );
    }

    fn on_rule_error(&self, rule_code: &str, error: &EvalError) {
        debug!(rule_code = %rule_code, error = %error, "Rule evaluation error");
    }
}

/// 调用观察者，吞掉回调中的 panic
pub(crate) fn notify<F>(observer: Option<&dyn RuleObserver>, rule_code: &str, f: F)
where
    F: FnOnce(&dyn RuleObserver),
{
    if let Some(observer) = observer {
        if catch_unwind(AssertUnwindSafe(|| f(observer))).is_err() {
            warn!(rule_code = %rule_code, "Rule observer panicked, ignored");
        }
    }
}
