use thiserror::Error;

/// 规则引擎统一错误类型
///
/// 只有注册表层面的配置错误会返回给调用者，
/// 单条规则的求值错误由引擎在规则边界内消化（见 [`EvalError`]）。
#[derive(Error, Debug)]
pub enum RulerError {
    /// 必需规则不能被普通移除
    #[error("The rule [{0}] is required")]
    RequiredRule(String),

    /// 规则编号重复
    #[error("Rule already exists: {0}")]
    DuplicateRule(String),

    /// 规则工厂中不存在该规则
    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    /// 未知的业务类型
    #[error("Unknown business type: {0}")]
    UnknownBusinessType(String),

    /// 规则所属业务类型与引擎不一致
    #[error("Rule [{rule_code}] belongs to business type [{actual}], expected [{expected}]")]
    BusinessTypeMismatch {
        rule_code: String,
        expected: String,
        actual: String,
    },

    /// 当前执行策略不支持该操作
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// 输入无效
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 规则引擎结果类型
pub type Result<T> = std::result::Result<T, RulerError>;

impl RulerError {
    /// 创建输入无效错误
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        RulerError::InvalidInput(msg.into())
    }

    /// 创建不支持的操作错误
    pub fn unsupported(msg: impl Into<String>) -> Self {
        RulerError::UnsupportedOperation(msg.into())
    }

    /// 是否为配置类错误
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RulerError::RequiredRule(_)
                | RulerError::DuplicateRule(_)
                | RulerError::UnknownBusinessType(_)
                | RulerError::BusinessTypeMismatch { .. }
        )
    }
}

/// 表达式求值错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// 表达式无法编译
    #[error("Expression compile error: {0}")]
    Compile(String),

    /// 表达式执行失败
    #[error("Expression runtime error: {0}")]
    Runtime(String),

    /// 结果类型与预期不符
    #[error("Type error: expected {expected}, got {actual}")]
    Type { expected: String, actual: String },

    /// 值转换失败
    #[error("Conversion error: {0}")]
    Conversion(String),
}

impl EvalError {
    pub fn runtime(msg: impl Into<String>) -> Self {
        EvalError::Runtime(msg.into())
    }

    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        EvalError::Type {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
