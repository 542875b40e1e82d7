use rhai::{Dynamic, Engine, Scope, AST};
use ruler_core::{ConditionEvaluator, EvalError, EvaluationContext};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

mod functions;

pub use functions::register_builtin_functions;

/// 默认的脚本最大操作数
pub const DEFAULT_MAX_OPERATIONS: u64 = 100_000;

/// 基于 Rhai 的条件求值器
///
/// 每次求值时作用域中包含：
/// - `root`：被校验的整个对象
/// - 根对象的每个顶层字段，以字段名作为变量名
/// - `target`：当前对象（遍历数组时为当前元素）
/// - 上下文变量，例如数组索引 `i`
///
/// 表达式中的 `#name` 会被改写为 `name`，因此 `items[#i].quantity`
/// 与 `items[i].quantity` 等价。以 `[#` 开头的表达式作用于根数组。
///
/// 根对象中不存在的字段不会定义为变量，可能缺失的字段请写成 `root.field`。
pub struct RhaiEvaluator {
    engine: Engine,
    // expression text -> compiled AST
    cache: RwLock<HashMap<String, Arc<AST>>>,
}

impl Default for RhaiEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl RhaiEvaluator {
    pub fn new() -> Self {
        Self::with_max_operations(DEFAULT_MAX_OPERATIONS)
    }

    pub fn with_max_operations(max_operations: u64) -> Self {
        let mut engine = Engine::new();

        // Safety: Limit max operations
        engine.set_max_operations(max_operations);

        register_builtin_functions(&mut engine);

        // Redirect print() to tracing::info!
        engine.on_print(|x| {
            tracing::info!("SCRIPT: {}", x);
        });

        Self {
            engine,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// 用于注册自定义函数
    ///
    /// 只能在构造后、开始求值前调用，已缓存的表达式不受影响。
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// 编译表达式，命中缓存时直接返回
    pub fn compile(&self, expression: &str) -> Result<Arc<AST>, EvalError> {
        if let Some(ast) = self.cached(expression) {
            return Ok(ast);
        }

        let source = rewrite_variables(expression);
        let ast = self
            .engine
            .compile(&source)
            .map_err(|e| EvalError::Compile(format!("{}: {}", expression, e)))?;
        let ast = Arc::new(ast);

        match self.cache.write() {
            Ok(mut cache) => {
                cache.insert(expression.to_string(), ast.clone());
            }
            Err(e) => {
                tracing::error!("Failed to acquire write lock for expression cache: {}", e);
            }
        }
        Ok(ast)
    }

    fn cached(&self, expression: &str) -> Option<Arc<AST>> {
        // 如果锁被污染，按未命中处理
        match self.cache.read() {
            Ok(cache) => cache.get(expression).cloned(),
            Err(_) => {
                tracing::error!("Failed to acquire read lock for expression cache");
                None
            }
        }
    }

    /// 已缓存的表达式数量
    pub fn cached_expressions(&self) -> usize {
        self.cache.read().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn clear_cache(&self) {
        match self.cache.write() {
            Ok(mut cache) => cache.clear(),
            Err(e) => {
                tracing::error!("Failed to acquire write lock in clear_cache: {}", e);
            }
        }
    }

    fn scope(context: &EvaluationContext<'_>, target: &Value) -> Result<Scope<'static>, EvalError> {
        let root = context.cached_root(RootValues::new)?;
        let mut scope = Scope::new();

        // 根对象在多次求值间共享，以常量压入防止脚本修改
        for (name, value) in &root.fields {
            scope.push_constant_dynamic(name.as_str(), value.clone());
        }
        scope.push_constant_dynamic("root", root.root.clone());

        if std::ptr::eq(target, context.root()) {
            scope.push_constant_dynamic("target", root.root.clone());
        } else {
            scope.push_dynamic("target", to_dynamic(target)?);
        }

        for (name, value) in context.variables() {
            scope.push_dynamic(name.as_str(), to_dynamic(value)?);
        }
        Ok(scope)
    }

    /// 执行表达式并返回原始结果
    pub fn eval(
        &self,
        context: &EvaluationContext<'_>,
        expression: &str,
        target: &Value,
    ) -> Result<Dynamic, EvalError> {
        let ast = self.compile(expression)?;
        let mut scope = Self::scope(context, target)?;
        self.engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
            .map(Dynamic::flatten)
            .map_err(|e| EvalError::Runtime(format!("{}: {}", expression, e)))
    }

    fn eval_bool(
        &self,
        context: &EvaluationContext<'_>,
        expression: &str,
        target: &Value,
    ) -> Result<bool, EvalError> {
        let result = self.eval(context, expression, target)?;
        result
            .as_bool()
            .map_err(|actual| EvalError::type_mismatch("bool", actual))
    }
}

impl ConditionEvaluator for RhaiEvaluator {
    fn supports(
        &self,
        context: &EvaluationContext<'_>,
        expression: &str,
        target: &Value,
    ) -> Result<bool, EvalError> {
        self.eval_bool(context, expression, target)
    }

    fn judge(
        &self,
        context: &EvaluationContext<'_>,
        expression: &str,
        target: &Value,
    ) -> Result<bool, EvalError> {
        self.eval_bool(context, expression, target)
    }

    fn extract(
        &self,
        context: &EvaluationContext<'_>,
        expression: &str,
        target: &Value,
    ) -> Result<Value, EvalError> {
        let result = self.eval(context, expression, target)?;
        rhai::serde::from_dynamic::<Value>(&result)
            .map_err(|e| EvalError::Conversion(e.to_string()))
    }
}

/// 根对象转换后的值，一次执行内所有规则和数组元素共享
///
/// 值以共享方式保存，压入作用域时只复制引用。
struct RootValues {
    root: Dynamic,
    fields: Vec<(String, Dynamic)>,
}

impl RootValues {
    fn new(root: &Value) -> Result<Self, EvalError> {
        let fields = match root {
            Value::Object(fields) => fields
                .iter()
                .map(|(name, value)| Ok((name.clone(), to_dynamic(value)?.into_shared())))
                .collect::<Result<Vec<_>, EvalError>>()?,
            _ => Vec::new(),
        };
        Ok(Self {
            root: to_dynamic(root)?.into_shared(),
            fields,
        })
    }
}

fn to_dynamic(value: &Value) -> Result<Dynamic, EvalError> {
    rhai::serde::to_dynamic(value).map_err(|e| EvalError::Conversion(e.to_string()))
}

/// 把 `#name` 改写为 `name`，字符串字面量和 `#{` 对象字面量保持不变
///
/// 以 `[#` 开头的表达式指向根数组的元素，改写为 `root[...]`。
pub fn rewrite_variables(expression: &str) -> String {
    let trimmed = expression.trim_start();
    let mut out = String::with_capacity(expression.len() + 4);
    if trimmed.starts_with("[#") {
        out.push_str("root");
    }

    let mut chars = trimmed.chars().peekable();
    let mut quote: Option<char> = None;
    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '`' | '\'' => {
                    quote = Some(c);
                    out.push(c);
                }
                '#' if chars
                    .peek()
                    .map_or(false, |next| next.is_alphabetic() || *next == '_') => {}
                _ => out.push(c),
            },
        }
    }
    out
}
