use anyhow::{anyhow, Result};
use config::{Config, Environment, File, FileFormat};
use ruler_core::RuleDefinition;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::rules::parse_rules;
use crate::GlobalConfig;

/// 全局配置文件名
pub const GLOBAL_CONFIG_FILE: &str = "ruler.toml";

/// 规则文件目录
pub const RULES_DIR: &str = "rules";

/// 完整配置：全局配置与各业务类型的规则定义
#[derive(Debug, Clone, Default)]
pub struct RulerConfig {
    pub global: GlobalConfig,
    pub rules: BTreeMap<String, Vec<RuleDefinition>>,
}

impl RulerConfig {
    /// 业务类型（按名称排序）
    pub fn business_types(&self) -> Vec<&str> {
        self.rules.keys().map(String::as_str).collect()
    }
}

/// 配置加载器
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// 创建配置加载器
    pub fn new<P: AsRef<Path>>(config_dir: P) -> Self {
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// 加载全局配置
    ///
    /// 文件不存在时使用默认配置；`RULER__<SECTION>__<KEY>` 环境变量可覆盖文件中的值。
    pub fn load_global(&self) -> Result<GlobalConfig> {
        let config_path = self.config_dir.join(GLOBAL_CONFIG_FILE);

        let mut builder = Config::builder();
        if config_path.exists() {
            builder = builder.add_source(File::new(
                config_path.to_str().ok_or_else(|| anyhow!("Invalid config path"))?,
                FileFormat::Toml,
            ));
        }
        let config = builder
            .add_source(
                Environment::with_prefix("RULER")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    fn rules_path(&self, business_type: &str) -> PathBuf {
        self.config_dir
            .join(RULES_DIR)
            .join(format!("{}.toml", business_type))
    }

    /// 加载业务类型的规则定义
    pub fn load_rules(&self, business_type: &str) -> Result<Vec<RuleDefinition>> {
        let path = self.rules_path(business_type);
        if !path.exists() {
            return Err(anyhow!("Rules config not found: {}", business_type));
        }

        let content = fs::read_to_string(&path)?;
        parse_rules(&content, business_type)
    }

    /// `rules/` 目录下存在规则文件的业务类型
    fn discover_business_types(&self) -> Result<BTreeSet<String>> {
        let dir = self.config_dir.join(RULES_DIR);
        let mut types = BTreeSet::new();
        if !dir.is_dir() {
            return Ok(types);
        }

        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                types.insert(stem.to_string());
            }
        }
        Ok(types)
    }

    /// 加载全部配置
    ///
    /// 业务类型包括 `[[business_types]]` 中声明的和 `rules/` 目录下有规则文件的；
    /// 声明了但没有规则文件的业务类型规则为空。
    pub fn load_all(&self) -> Result<RulerConfig> {
        let global = self.load_global()?;

        let mut types = self.discover_business_types()?;
        types.extend(global.business_types.iter().map(|bt| bt.name.clone()));

        let mut rules = BTreeMap::new();
        for business_type in types {
            let definitions = if self.rules_path(&business_type).exists() {
                self.load_rules(&business_type)?
            } else {
                Vec::new()
            };
            rules.insert(business_type, definitions);
        }

        Ok(RulerConfig { global, rules })
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        let config = self.load_all()?;
        let global = &config.global;

        if global.engine.index_label.is_empty() {
            return Err(anyhow!("engine.index_label must not be empty"));
        }
        if global.engine.index_variable.is_empty() {
            return Err(anyhow!("engine.index_variable must not be empty"));
        }
        if global.script.max_operations == 0 {
            return Err(anyhow!("script.max_operations must be greater than 0"));
        }

        let mut declared = HashSet::new();
        for bt in &global.business_types {
            if !declared.insert(bt.name.as_str()) {
                return Err(anyhow!("Duplicate business type: {}", bt.name));
            }
        }

        // 规则编号在所有业务类型中唯一
        let mut codes = HashSet::new();
        for (business_type, definitions) in &config.rules {
            for definition in definitions {
                if &definition.business_type != business_type {
                    return Err(anyhow!(
                        "Rule [{}] in rules/{}.toml belongs to business type [{}]",
                        definition.rule_code,
                        business_type,
                        definition.business_type
                    ));
                }
                if !codes.insert(definition.rule_code.as_str()) {
                    return Err(anyhow!("Duplicate rule code: {}", definition.rule_code));
                }
            }
        }

        Ok(())
    }
}
