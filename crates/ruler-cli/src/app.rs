use anyhow::{Context, Result};
use ruler_config::RulerConfig;
use ruler_core::{RegistryRuleFactory, RulesEngine, RulesEngineManager, TracingObserver};
use ruler_script::RhaiEvaluator;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// 根据配置构造每个业务类型的规则引擎
pub fn build_manager(config: &RulerConfig) -> Result<RulesEngineManager> {
    let factory = Arc::new(RegistryRuleFactory::new());
    for (business_type, definitions) in &config.rules {
        factory.declare_business_type(business_type.as_str());
        factory
            .register_all(definitions.iter().cloned())
            .with_context(|| format!("Failed to register rules of {}", business_type))?;
    }

    let global = &config.global;
    let evaluator = Arc::new(RhaiEvaluator::with_max_operations(
        global.script.max_operations,
    ));
    let observer = Arc::new(TracingObserver);

    let manager = RulesEngineManager::new();
    for business_type in config.business_types() {
        let engine = RulesEngine::builder(business_type, factory.clone(), evaluator.clone())
            .strategy(global.strategy_for(business_type))
            .options(global.engine.clone())
            .observer(observer.clone())
            .build()?;
        manager.insert(engine);
    }

    info!(business_types = manager.len(), "Rules engines ready");
    Ok(manager)
}

/// 执行方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// 生成报告
    Execute,
    /// 只判断是否违规
    Evaluate,
    /// 只检查可疑等级的规则
    Suspected,
}

/// 对一个对象执行规则，返回可直接输出的 JSON
pub fn run(
    manager: &RulesEngineManager,
    business_type: &str,
    mode: Mode,
    object: &Value,
) -> Result<Value> {
    let engine = manager.engine(business_type)?;
    let output = match mode {
        Mode::Execute => {
            let result = engine.execute(object)?;
            json!({
                "business_type": business_type,
                "grade": result.grade(),
                "reports": result.reports(),
            })
        }
        Mode::Evaluate => json!({
            "business_type": business_type,
            "violated": engine.evaluate(object)?,
        }),
        Mode::Suspected => json!({
            "business_type": business_type,
            "suspected": engine.has_suspected(object)?,
        }),
    };
    Ok(output)
}

/// 列出每个业务类型的生效规则
pub fn describe(manager: &RulesEngineManager) -> Value {
    let engines: Vec<_> = manager
        .business_types()
        .into_iter()
        .filter_map(|business_type| manager.get(&business_type))
        .map(|engine| {
            json!({
                "business_type": engine.business_type(),
                "strategy": engine.strategy(),
                "rules": engine.rule_definitions(),
            })
        })
        .collect();
    Value::Array(engines)
}
