use crate::model::{Grade, RuleDefinition};
use crate::rule::Fields;
use serde::{Deserialize, Serialize};

/// 单条规则的违规报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub rule_code: String,
    pub grade: Grade,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// 违规字段名 -> 违规值
    pub fields: Fields,
}

impl Report {
    pub fn new(definition: &RuleDefinition, fields: Fields) -> Self {
        Self {
            rule_code: definition.rule_code.clone(),
            grade: definition.grade,
            description: definition.description.clone(),
            fields,
        }
    }
}

/// 一次执行的结果，按规则执行顺序排列的报告；为空表示完全合规
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    reports: Vec<Report>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, report: Report) {
        self.reports.push(report);
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn into_reports(self) -> Vec<Report> {
        self.reports
    }

    pub fn report(&self, rule_code: &str) -> Option<&Report> {
        self.reports.iter().find(|r| r.rule_code == rule_code)
    }

    pub fn is_compliant(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// 结果等级：所有报告中最严重的等级，没有报告时为合格
    pub fn grade(&self) -> Grade {
        self.reports
            .iter()
            .map(|r| r.grade)
            .max()
            .unwrap_or(Grade::Qualified)
    }
}
