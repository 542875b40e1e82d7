pub mod global;
pub mod loader;
pub mod rules;

pub use global::{BusinessTypeConfig, GlobalConfig, LoggingConfig, ScriptConfig};
pub use loader::{ConfigLoader, RulerConfig, GLOBAL_CONFIG_FILE, RULES_DIR};
pub use rules::parse_rules;
