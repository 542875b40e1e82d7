use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 执行策略
///
/// 引擎构造时选定，之后不可更改。三种策略共用同一个执行循环，
/// 区别只在于发现违规之后是否继续，以及是否生成报告。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// 执行完所有规则，收集所有违规报告
    #[default]
    #[serde(alias = "COMPLETE")]
    Complete,

    /// 遇到第一个违规规则即停止
    #[serde(alias = "INCOMPLETE")]
    Incomplete,

    /// 不生成报告，只返回是否违规
    #[serde(alias = "SIMPLE")]
    Simple,
}

impl ExecutionStrategy {
    /// 发现违规后是否继续执行后续规则
    pub fn continue_after_violation(self) -> bool {
        matches!(self, ExecutionStrategy::Complete)
    }

    /// 是否生成违规报告
    pub fn builds_reports(self) -> bool {
        !matches!(self, ExecutionStrategy::Simple)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStrategy::Complete => "complete",
            ExecutionStrategy::Incomplete => "incomplete",
            ExecutionStrategy::Simple => "simple",
        }
    }
}

impl fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "complete" => Ok(ExecutionStrategy::Complete),
            "incomplete" => Ok(ExecutionStrategy::Incomplete),
            "simple" => Ok(ExecutionStrategy::Simple),
            other => Err(format!("unknown execution strategy: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_policy() {
        assert!(ExecutionStrategy::Complete.continue_after_violation());
        assert!(!ExecutionStrategy::Incomplete.continue_after_violation());
        assert!(!ExecutionStrategy::Simple.continue_after_violation());

        assert!(ExecutionStrategy::Incomplete.builds_reports());
        assert!(!ExecutionStrategy::Simple.builds_reports());
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "INCOMPLETE".parse::<ExecutionStrategy>().unwrap(),
            ExecutionStrategy::Incomplete
        );

        #[derive(serde::Deserialize)]
        struct Wrapper {
            strategy: ExecutionStrategy,
        }

        let wrapper: Wrapper = serde_json::from_str(r#"{"strategy":"SIMPLE"}"#).unwrap();
        assert_eq!(wrapper.strategy, ExecutionStrategy::Simple);
    }
}
