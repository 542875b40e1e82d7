use anyhow::{anyhow, Result};
use ruler_core::RuleDefinition;
use serde::Deserialize;

/// 规则文件（`rules/<business_type>.toml`）
#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<toml::Table>,
}

/// 解析规则文件内容
///
/// 未写 `business_type` 的规则归属文件对应的业务类型；
/// 写了的保持原样，由校验阶段检查是否一致。
pub fn parse_rules(content: &str, business_type: &str) -> Result<Vec<RuleDefinition>> {
    let file: RuleFile = toml::from_str(content)?;

    file.rules
        .into_iter()
        .enumerate()
        .map(|(index, mut table)| {
            table
                .entry("business_type")
                .or_insert_with(|| toml::Value::String(business_type.to_string()));
            toml::Value::Table(table)
                .try_into::<RuleDefinition>()
                .map_err(|e| anyhow!("Invalid rule #{} for {}: {}", index, business_type, e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruler_core::Grade;

    #[test]
    fn test_parse_rules() {
        let content = r#"
[[rules]]
rule_code = "required"
grade = "ILLEGAL"
order = 0
required = true
parameter_exp = "quantity"
predicate_exp = "quantity == ()"

[[rules]]
rule_code = "scope"
grade = "SUSPECTED"
order = 1
enabled = false
"#;

        let rules = parse_rules(content, "order").unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].business_type, "order");
        assert!(rules[0].required);
        assert_eq!(rules[0].predicate_exp.as_deref(), Some("quantity == ()"));
        assert_eq!(rules[1].grade, Grade::Suspected);
        assert!(!rules[1].enabled);
    }

    #[test]
    fn test_explicit_business_type_is_kept() {
        let content = r#"
[[rules]]
rule_code = "foreign"
business_type = "invoice"
"#;
        let rules = parse_rules(content, "order").unwrap();
        assert_eq!(rules[0].business_type, "invoice");
    }

    #[test]
    fn test_invalid_rule() {
        let content = r#"
[[rules]]
order = 1
"#;
        let err = parse_rules(content, "order").unwrap_err();
        assert!(err.to_string().contains("Invalid rule #0"));
    }

    #[test]
    fn test_empty_file() {
        assert!(parse_rules("", "order").unwrap().is_empty());
    }
}
