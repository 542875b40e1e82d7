use ruler_core::{
    ExecutionStrategy, Grade, RegistryRuleFactory, RuleDefinition, RulesEngine, TracingObserver,
};
use ruler_script::RhaiEvaluator;
use serde_json::json;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    let factory = Arc::new(RegistryRuleFactory::new());
    factory.register_all([
        RuleDefinition::new("quantity_required", "order")
            .with_order(0)
            .with_required(true)
            .with_description("quantity must be filled")
            .with_parameter_exp("root.quantity")
            .with_predicate_exp("root.quantity == ()"),
        RuleDefinition::new("quantity_scope", "order")
            .with_order(1)
            .with_grade(Grade::Suspected)
            .with_description("quantity must be between 1 and 100")
            .with_parameter_exp("root.quantity")
            .with_condition_exp("root.quantity != ()")
            .with_predicate_exp("root.quantity < 1 || root.quantity > 100"),
        RuleDefinition::new("item_price", "order")
            .with_order(2)
            .with_description("item price must be positive")
            .with_parameter_exp("items[#i].price")
            .with_predicate_exp("items[#i].price <= 0"),
    ])?;

    let evaluator = Arc::new(RhaiEvaluator::new());
    let objects = [
        json!({ "quantity": null, "items": [] }),
        json!({ "items": [{ "price": 1 }] }),
        json!({ "quantity": 500, "items": [{ "price": 10 }, { "price": 0 }] }),
        json!({ "quantity": 3, "items": [{ "price": 10 }] }),
    ];

    for strategy in [ExecutionStrategy::Complete, ExecutionStrategy::Incomplete] {
        let engine = RulesEngine::builder("order", factory.clone(), evaluator.clone())
            .strategy(strategy)
            .observer(Arc::new(TracingObserver))
            .build()?;

        println!("== {} ==", strategy);
        for object in &objects {
            let result = engine.execute(object)?;
            println!("{} -> {}", object, serde_json::to_string(&result)?);
        }
    }

    let simple = RulesEngine::builder("order", factory, evaluator)
        .strategy(ExecutionStrategy::Simple)
        .build()?;
    println!("== simple ==");
    for object in &objects {
        println!(
            "{} -> violated={} suspected={}",
            object,
            simple.evaluate(object)?,
            simple.has_suspected(object)?
        );
    }

    Ok(())
}
