use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// 默认的数组索引占位符
pub const DEFAULT_INDEX_LABEL: &str = "[#i]";

/// 默认的索引变量名
pub const DEFAULT_INDEX_VARIABLE: &str = "i";

/// 引擎选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// 参数表达式中标记数组元素的占位符
    pub index_label: String,

    /// 遍历数组时绑定当前索引的变量名
    pub index_variable: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            index_label: DEFAULT_INDEX_LABEL.to_string(),
            index_variable: DEFAULT_INDEX_VARIABLE.to_string(),
        }
    }
}

impl EngineOptions {
    /// 若参数表达式指向数组元素，返回数组本身的表达式
    ///
    /// `items[#i].quantity` -> `items`
    pub fn array_expression<'e>(&self, parameter_exp: &'e str) -> Option<&'e str> {
        if self.index_label.is_empty() {
            return None;
        }
        parameter_exp
            .find(self.index_label.as_str())
            .map(|pos| &parameter_exp[..pos])
    }
}

/// 求值上下文
///
/// 以被校验对象为根，并允许绑定变量（遍历数组时绑定元素索引）。
/// 一次执行只构造一个上下文，求值器可以在其中缓存根对象的转换结果。
#[derive(Debug, Clone)]
pub struct EvaluationContext<'a> {
    root: &'a Value,
    variables: HashMap<String, Value>,
    index_label: &'a str,
    index: Option<usize>,
    root_cache: OnceLock<Arc<dyn Any + Send + Sync>>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self::with_index_label(root, DEFAULT_INDEX_LABEL)
    }

    pub fn with_index_label(root: &'a Value, index_label: &'a str) -> Self {
        Self {
            root,
            variables: HashMap::new(),
            index_label,
            index: None,
            root_cache: OnceLock::new(),
        }
    }

    /// 根对象
    pub fn root(&self) -> &'a Value {
        self.root
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> &HashMap<String, Value> {
        &self.variables
    }

    /// 绑定当前数组元素的索引
    pub fn bind_index(&mut self, variable: &str, index: usize) {
        self.variables.insert(variable.to_string(), Value::from(index));
        self.index = Some(index);
    }

    /// 解除索引绑定
    pub fn clear_index(&mut self, variable: &str) {
        self.variables.remove(variable);
        self.index = None;
    }

    /// 当前绑定的索引
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// 取出根对象的缓存表示，首次调用时由 `init` 构造
    ///
    /// 同一个上下文只缓存一种类型，类型不同时每次都重新构造。
    pub fn cached_root<T, E, F>(&self, init: F) -> Result<Arc<T>, E>
    where
        T: Any + Send + Sync,
        F: FnOnce(&'a Value) -> Result<T, E>,
    {
        if let Some(cached) = self.root_cache.get() {
            if let Ok(cached) = Arc::clone(cached).downcast::<T>() {
                return Ok(cached);
            }
        }

        let value = Arc::new(init(self.root)?);
        let _ = self.root_cache.set(value.clone());
        Ok(value)
    }

    /// 报告中使用的字段名：将占位符替换为实际索引
    pub fn field_key(&self, expression: &str) -> String {
        match self.index {
            Some(index) if !self.index_label.is_empty() => {
                expression.replace(self.index_label, &format!("[{}]", index))
            }
            _ => expression.to_string(),
        }
    }
}
