use crate::context::{EngineOptions, EvaluationContext};
use crate::error::{EvalError, Result, RulerError};
use crate::evaluator::ConditionEvaluator;
use crate::execution::{Report, ValidationResult};
use crate::factory::RuleFactory;
use crate::model::{Grade, RuleDefinition};
use crate::observer::{notify, RuleObserver};
use crate::rule::{Fields, Rule};
use crate::strategy::ExecutionStrategy;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

type RuleList = Vec<Arc<dyn Rule>>;

/// 单条规则对一个对象（或一个数组）的执行结果
enum Outcome {
    /// 规则不适用
    Skipped,
    /// 适用且未违规
    Passed,
    /// 违规，需要报告时附带违规字段
    Violated(Option<Fields>),
}

/// 规则引擎
///
/// 持有一个业务类型下按 `order` 升序排列的生效规则列表。
/// 列表采用写时复制：每次变更构造新列表并原子替换，
/// 执行时只在开始时取一次快照，因此执行中的调用要么看到完整的旧列表，要么看到完整的新列表。
pub struct RulesEngine {
    /// 业务类型
    business_type: String,

    /// 执行策略
    strategy: ExecutionStrategy,

    /// 引擎选项
    options: EngineOptions,

    /// 规则工厂
    factory: Arc<dyn RuleFactory>,

    /// 条件求值器
    evaluator: Arc<dyn ConditionEvaluator>,

    /// 执行观察者
    observer: Option<Arc<dyn RuleObserver>>,

    /// 生效的规则列表
    rules: ArcSwap<RuleList>,

    /// 串行化所有变更操作
    write_lock: Mutex<()>,
}

/// 规则引擎构造器
pub struct RulesEngineBuilder {
    business_type: String,
    factory: Arc<dyn RuleFactory>,
    evaluator: Arc<dyn ConditionEvaluator>,
    strategy: ExecutionStrategy,
    options: EngineOptions,
    observer: Option<Arc<dyn RuleObserver>>,
}

impl RulesEngineBuilder {
    pub fn strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn RuleObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// 构造引擎并从工厂加载规则
    pub fn build(self) -> Result<RulesEngine> {
        let engine = RulesEngine {
            business_type: self.business_type,
            strategy: self.strategy,
            options: self.options,
            factory: self.factory,
            evaluator: self.evaluator,
            observer: self.observer,
            rules: ArcSwap::from_pointee(Vec::new()),
            write_lock: Mutex::new(()),
        };
        engine.reload_rules()?;
        Ok(engine)
    }
}

impl RulesEngine {
    pub fn builder(
        business_type: impl Into<String>,
        factory: Arc<dyn RuleFactory>,
        evaluator: Arc<dyn ConditionEvaluator>,
    ) -> RulesEngineBuilder {
        RulesEngineBuilder {
            business_type: business_type.into(),
            factory,
            evaluator,
            strategy: ExecutionStrategy::default(),
            options: EngineOptions::default(),
            observer: None,
        }
    }

    pub fn business_type(&self) -> &str {
        &self.business_type
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// 生效规则数量
    pub fn len(&self) -> usize {
        self.rules.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.load().is_empty()
    }

    // ------------------------------------------------------------------
    // 查询
    // ------------------------------------------------------------------

    /// 按执行顺序返回生效规则的定义
    pub fn rule_definitions(&self) -> Vec<RuleDefinition> {
        self.rules
            .load()
            .iter()
            .map(|r| r.definition().clone())
            .collect()
    }

    /// 获取生效的规则
    pub fn get_rule(&self, rule_code: &str) -> Option<Arc<dyn Rule>> {
        self.rules
            .load()
            .iter()
            .find(|r| r.rule_code() == rule_code)
            .cloned()
    }

    // ------------------------------------------------------------------
    // 变更
    // ------------------------------------------------------------------

    /// 在持有写锁的情况下基于当前列表构造新列表，成功后原子替换
    fn mutate<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut RuleList) -> Result<R>,
    {
        let _guard = self.write_lock.lock();
        let mut next = RuleList::clone(&self.rules.load_full());
        let out = f(&mut next)?;
        self.rules.store(Arc::new(next));
        Ok(out)
    }

    /// 从工厂获取规则并检查业务类型
    fn fetch(&self, rule_code: &str) -> Result<Arc<dyn Rule>> {
        let rule = self
            .factory
            .get_rule(rule_code)
            .ok_or_else(|| RulerError::RuleNotFound(rule_code.to_string()))?;

        let definition = rule.definition();
        if definition.business_type != self.business_type {
            return Err(RulerError::BusinessTypeMismatch {
                rule_code: rule_code.to_string(),
                expected: self.business_type.clone(),
                actual: definition.business_type.clone(),
            });
        }
        Ok(rule)
    }

    /// 插入到第一个 `order` 更大的规则之前
    fn insert_ordered(rules: &mut RuleList, rule: Arc<dyn Rule>) -> Result<()> {
        if rules.iter().any(|r| r.rule_code() == rule.rule_code()) {
            return Err(RulerError::DuplicateRule(rule.rule_code().to_string()));
        }
        let order = rule.definition().order;
        let pos = rules.partition_point(|r| r.definition().order <= order);
        rules.insert(pos, rule);
        Ok(())
    }

    /// 添加规则
    pub fn add_rule(&self, rule_code: &str) -> Result<()> {
        let rule = self.fetch(rule_code)?;
        self.mutate(|rules| Self::insert_ordered(rules, rule))?;
        info!(business_type = %self.business_type, rule_code = %rule_code, "Rule added");
        Ok(())
    }

    /// 按顺序添加多条规则
    ///
    /// 全部成功后一次性发布；任意一条失败则不做任何改变。
    pub fn add_rules<I, S>(&self, rule_codes: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fetched = rule_codes
            .into_iter()
            .map(|code| self.fetch(code.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let count = fetched.len();

        self.mutate(|rules| {
            for rule in fetched {
                Self::insert_ordered(rules, rule)?;
            }
            Ok(())
        })?;
        info!(business_type = %self.business_type, count, "Rules added");
        Ok(())
    }

    /// 移除规则
    ///
    /// 规则不存在时返回 `Ok(None)`；必需规则返回 [`RulerError::RequiredRule`] 且不做改变。
    pub fn remove_rule(&self, rule_code: &str) -> Result<Option<Arc<dyn Rule>>> {
        let removed = self.mutate(|rules| {
            let Some(pos) = rules.iter().position(|r| r.rule_code() == rule_code) else {
                return Ok(None);
            };
            if rules[pos].definition().required {
                return Err(RulerError::RequiredRule(rule_code.to_string()));
            }
            Ok(Some(rules.remove(pos)))
        })?;

        if removed.is_some() {
            info!(business_type = %self.business_type, rule_code = %rule_code, "Rule removed");
        }
        Ok(removed)
    }

    /// 强制移除规则，忽略 `required`
    pub fn force_remove_rule(&self, rule_code: &str) -> Option<Arc<dyn Rule>> {
        let _guard = self.write_lock.lock();
        let current = self.rules.load_full();
        let pos = current.iter().position(|r| r.rule_code() == rule_code)?;

        let mut next = RuleList::clone(&current);
        let removed = next.remove(pos);
        self.rules.store(Arc::new(next));

        warn!(business_type = %self.business_type, rule_code = %rule_code, "Rule force removed");
        Some(removed)
    }

    /// 从工厂重新加载全部规则
    ///
    /// 过滤掉未启用的规则，按 `order` 稳定排序，按 `rule_code` 去重（保留先发现的），
    /// 然后整体替换生效列表。工厂出错时列表保持不变。返回生效规则数量。
    pub fn reload_rules(&self) -> Result<usize> {
        let _guard = self.write_lock.lock();
        let discovered = self.factory.find_rules(&self.business_type)?;

        let mut seen = HashSet::new();
        let mut next: RuleList = Vec::with_capacity(discovered.len());
        for rule in discovered {
            let definition = rule.definition();
            if !definition.enabled {
                continue;
            }
            if definition.business_type != self.business_type {
                warn!(
                    business_type = %self.business_type,
                    rule_code = %definition.rule_code,
                    actual = %definition.business_type,
                    "Rule from another business type ignored"
                );
                continue;
            }
            if !seen.insert(definition.rule_code.clone()) {
                warn!(
                    business_type = %self.business_type,
                    rule_code = %definition.rule_code,
                    "Duplicate rule code ignored"
                );
                continue;
            }
            next.push(rule);
        }
        next.sort_by_key(|r| r.definition().order);

        let count = next.len();
        self.rules.store(Arc::new(next));
        info!(business_type = %self.business_type, count, "Rules reloaded");
        Ok(count)
    }

    // ------------------------------------------------------------------
    // 执行
    // ------------------------------------------------------------------

    fn check_input(object: &Value) -> Result<()> {
        if object.is_null() {
            return Err(RulerError::invalid_input("the object to evaluate is null"));
        }
        Ok(())
    }

    /// 执行全部生效规则并生成报告
    ///
    /// `Complete` 策略收集所有违规报告，`Incomplete` 策略在第一个违规规则处停止。
    /// `Simple` 策略不生成报告，调用本方法返回 [`RulerError::UnsupportedOperation`]。
    pub fn execute(&self, object: &Value) -> Result<ValidationResult> {
        if !self.strategy.builds_reports() {
            return Err(RulerError::unsupported(
                "execute is not available with the simple strategy, use evaluate",
            ));
        }
        Self::check_input(object)?;

        let rules = self.rules.load_full();
        let mut context = EvaluationContext::with_index_label(object, &self.options.index_label);
        let mut result = ValidationResult::new();

        for rule in rules.iter() {
            match self.apply(&mut context, rule.as_ref(), true) {
                Outcome::Violated(fields) => {
                    let fields = fields.unwrap_or_default();
                    self.notify_outcome(rule.as_ref(), true, Some(&fields));
                    result.push(Report::new(rule.definition(), fields));
                    if !self.strategy.continue_after_violation() {
                        break;
                    }
                }
                Outcome::Passed => self.notify_outcome(rule.as_ref(), false, None),
                Outcome::Skipped => {}
            }
        }

        debug!(
            business_type = %self.business_type,
            strategy = %self.strategy,
            rules = rules.len(),
            reports = result.len(),
            "Rules executed"
        );
        Ok(result)
    }

    /// 只判断是否违规：任意一条生效规则违规即返回 true
    pub fn evaluate(&self, object: &Value) -> Result<bool> {
        self.first_violation(object, |_| true)
    }

    /// 只检查可疑等级的规则，遇到第一个违规即返回 true
    pub fn has_suspected(&self, object: &Value) -> Result<bool> {
        self.first_violation(object, |d| d.grade == Grade::Suspected)
    }

    /// 先序列化为 JSON 再执行
    pub fn execute_object<T: Serialize>(&self, object: &T) -> Result<ValidationResult> {
        let value = serde_json::to_value(object)?;
        self.execute(&value)
    }

    /// 先序列化为 JSON 再判断
    pub fn evaluate_object<T: Serialize>(&self, object: &T) -> Result<bool> {
        let value = serde_json::to_value(object)?;
        self.evaluate(&value)
    }

    fn first_violation<P>(&self, object: &Value, filter: P) -> Result<bool>
    where
        P: Fn(&RuleDefinition) -> bool,
    {
        Self::check_input(object)?;

        let rules = self.rules.load_full();
        let mut context = EvaluationContext::with_index_label(object, &self.options.index_label);

        for rule in rules.iter().filter(|r| filter(r.definition())) {
            match self.apply(&mut context, rule.as_ref(), false) {
                Outcome::Violated(_) => {
                    self.notify_outcome(rule.as_ref(), true, None);
                    return Ok(true);
                }
                Outcome::Passed => self.notify_outcome(rule.as_ref(), false, None),
                Outcome::Skipped => {}
            }
        }
        Ok(false)
    }

    /// 对一条规则执行：参数表达式含索引占位符时遍历数组，否则直接作用于根对象
    fn apply(&self, context: &mut EvaluationContext<'_>, rule: &dyn Rule, collect: bool) -> Outcome {
        let array_exp = rule
            .definition()
            .parameter_exp
            .as_deref()
            .and_then(|exp| self.options.array_expression(exp));

        match array_exp {
            Some(array_exp) => self.apply_to_array(context, rule, array_exp, collect),
            None => {
                let root = context.root();
                self.apply_to_target(context, rule, root, collect)
            }
        }
    }

    /// 对数组的每个元素执行规则，任一元素违规即视为违规
    ///
    /// 某个元素不适用时只跳过该元素。需要报告时合并所有违规元素的字段。
    fn apply_to_array(
        &self,
        context: &mut EvaluationContext<'_>,
        rule: &dyn Rule,
        array_exp: &str,
        collect: bool,
    ) -> Outcome {
        let root = context.root();
        let resolved = if array_exp.trim().is_empty() {
            Ok(root.clone())
        } else {
            self.evaluator.extract(context, array_exp, root)
        };

        let elements = match resolved {
            Ok(Value::Array(elements)) => elements,
            Ok(Value::Null) => return Outcome::Skipped,
            Ok(other) => {
                let err = EvalError::type_mismatch("array", json_type(&other));
                self.report_error(rule, &err);
                return Outcome::Skipped;
            }
            Err(err) => {
                self.report_error(rule, &err);
                return Outcome::Skipped;
            }
        };

        let variable = self.options.index_variable.as_str();
        let mut outcome = Outcome::Skipped;
        for (index, element) in elements.iter().enumerate() {
            context.bind_index(variable, index);
            match self.apply_to_target(context, rule, element, collect) {
                Outcome::Skipped => {}
                Outcome::Passed => {
                    if matches!(outcome, Outcome::Skipped) {
                        outcome = Outcome::Passed;
                    }
                }
                // 不需要报告时第一个违规元素即可确定结果
                Outcome::Violated(None) => {
                    context.clear_index(variable);
                    return Outcome::Violated(None);
                }
                Outcome::Violated(Some(fields)) => {
                    let merged = match std::mem::replace(&mut outcome, Outcome::Skipped) {
                        Outcome::Violated(Some(mut merged)) => {
                            merged.extend(fields);
                            merged
                        }
                        _ => fields,
                    };
                    outcome = Outcome::Violated(Some(merged));
                }
            }
        }
        context.clear_index(variable);
        outcome
    }

    /// 对单个对象执行 supports -> judge -> collect_violations
    ///
    /// 求值错误只影响当前对象：记录后视为不适用。
    fn apply_to_target(
        &self,
        context: &EvaluationContext<'_>,
        rule: &dyn Rule,
        target: &Value,
        collect: bool,
    ) -> Outcome {
        let evaluator = self.evaluator.as_ref();
        let outcome = (|| -> std::result::Result<Outcome, EvalError> {
            if !rule.supports(context, evaluator, target)? {
                return Ok(Outcome::Skipped);
            }
            if !rule.judge(context, evaluator, target)? {
                return Ok(Outcome::Passed);
            }
            let fields = if collect {
                Some(rule.collect_violations(context, evaluator, target)?)
            } else {
                None
            };
            Ok(Outcome::Violated(fields))
        })();

        outcome.unwrap_or_else(|err| {
            self.report_error(rule, &err);
            Outcome::Skipped
        })
    }

    fn report_error(&self, rule: &dyn Rule, error: &EvalError) {
        let rule_code = rule.rule_code();
        warn!(
            business_type = %self.business_type,
            rule_code = %rule_code,
            error = %error,
            "Rule evaluation failed, treated as not supported"
        );
        notify(self.observer.as_deref(), rule_code, |o| o.on_rule_error(rule_code, error));
    }

    fn notify_outcome(&self, rule: &dyn Rule, violated: bool, fields: Option<&Fields>) {
        let definition = rule.definition();
        notify(self.observer.as_deref(), &definition.rule_code, |o| {
            o.on_rule_outcome(&definition.rule_code, definition.grade, violated, fields)
        });
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
