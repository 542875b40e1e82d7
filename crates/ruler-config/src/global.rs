use ruler_core::{EngineOptions, ExecutionStrategy};
use serde::{Deserialize, Serialize};

/// 全局配置（`ruler.toml`）
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub engine: EngineOptions,
    pub script: ScriptConfig,
    pub logging: LoggingConfig,
    pub business_types: Vec<BusinessTypeConfig>,
}

/// 脚本配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// 单次求值的最大操作数
    pub max_operations: u64,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            max_operations: 100_000,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// 业务类型配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BusinessTypeConfig {
    pub name: String,
    #[serde(default)]
    pub strategy: ExecutionStrategy,
}

impl GlobalConfig {
    /// 业务类型的执行策略，未配置时使用默认策略
    pub fn strategy_for(&self, business_type: &str) -> ExecutionStrategy {
        self.business_types
            .iter()
            .find(|bt| bt.name == business_type)
            .map(|bt| bt.strategy)
            .unwrap_or_default()
    }
}
