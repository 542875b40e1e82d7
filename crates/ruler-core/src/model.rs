use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 规则的严重等级（按严重程度递增排序）
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Grade {
    /// 合格
    Qualified,

    /// 可疑
    Suspected,

    /// 违规
    #[default]
    Illegal,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Qualified => "QUALIFIED",
            Grade::Suspected => "SUSPECTED",
            Grade::Illegal => "ILLEGAL",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "QUALIFIED" => Ok(Grade::Qualified),
            "SUSPECTED" => Ok(Grade::Suspected),
            "ILLEGAL" => Ok(Grade::Illegal),
            other => Err(format!("unknown grade: {}", other)),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// 规则定义
///
/// 规则的不可变描述信息，`rule_code` 是规则的唯一标识，
/// `business_type` 决定规则归属哪一个规则引擎。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// 规则编号
    pub rule_code: String,

    /// 业务类型
    pub business_type: String,

    /// 严重等级
    #[serde(default)]
    pub grade: Grade,

    /// 规则描述
    #[serde(default)]
    pub description: String,

    /// 执行顺序（越小越先执行）
    #[serde(default)]
    pub order: i32,

    /// 是否启用
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// 是否为必需规则（只能强制移除）
    #[serde(default)]
    pub required: bool,

    /// 参数表达式，包含索引占位符时表示作用于数组元素
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_exp: Option<String>,

    /// 适用条件表达式
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_exp: Option<String>,

    /// 违规判定表达式
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate_exp: Option<String>,
}

impl RuleDefinition {
    pub fn new(rule_code: impl Into<String>, business_type: impl Into<String>) -> Self {
        Self {
            rule_code: rule_code.into(),
            business_type: business_type.into(),
            grade: Grade::default(),
            description: String::new(),
            order: 0,
            enabled: true,
            required: false,
            parameter_exp: None,
            condition_exp: None,
            predicate_exp: None,
        }
    }

    pub fn with_grade(mut self, grade: Grade) -> Self {
        self.grade = grade;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_parameter_exp(mut self, exp: impl Into<String>) -> Self {
        self.parameter_exp = Some(exp.into());
        self
    }

    pub fn with_condition_exp(mut self, exp: impl Into<String>) -> Self {
        self.condition_exp = Some(exp.into());
        self
    }

    pub fn with_predicate_exp(mut self, exp: impl Into<String>) -> Self {
        self.predicate_exp = Some(exp.into());
        self
    }
}
