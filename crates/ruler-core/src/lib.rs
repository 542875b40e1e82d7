pub mod context;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod execution;
pub mod factory;
pub mod manager;
pub mod model;
pub mod observer;
pub mod rule;
pub mod strategy;

pub use context::{EngineOptions, EvaluationContext, DEFAULT_INDEX_LABEL, DEFAULT_INDEX_VARIABLE};
pub use engine::{RulesEngine, RulesEngineBuilder};
pub use error::{EvalError, Result, RulerError};
pub use evaluator::ConditionEvaluator;
pub use execution::{Report, ValidationResult};
pub use factory::{RegistryRuleFactory, RuleConstructor, RuleFactory};
pub use manager::RulesEngineManager;
pub use model::{Grade, RuleDefinition};
pub use observer::{RuleObserver, TracingObserver};
pub use rule::{DeclarativeRule, Fields, Rule};
pub use strategy::ExecutionStrategy;
