mod common;

use common::*;
use ruler_core::{ExecutionStrategy, RuleDefinition};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn set(prefix: &str) -> Vec<RuleDefinition> {
    (0..8)
        .map(|i| RuleDefinition::new(format!("{}{}", prefix, i), BUSINESS_TYPE).with_order(i))
        .collect()
}

/// 在并发执行的同时反复切换两套规则，每次执行看到的都必须是其中完整的一套
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reload_during_execution_sees_whole_snapshot() {
    let factory = factory_with(vec![]);
    factory.replace_definitions(BUSINESS_TYPE, set("a")).unwrap();
    let engine = Arc::new(engine(&factory, ExecutionStrategy::Complete));

    let set_a: BTreeSet<String> = set("a").into_iter().map(|d| d.rule_code).collect();
    let set_b: BTreeSet<String> = set("b").into_iter().map(|d| d.rule_code).collect();

    let stop = Arc::new(AtomicBool::new(false));

    let writer = {
        let engine = engine.clone();
        let factory = factory.clone();
        let stop = stop.clone();
        tokio::task::spawn_blocking(move || {
            for round in 0..200 {
                let prefix = if round % 2 == 0 { "b" } else { "a" };
                factory.replace_definitions(BUSINESS_TYPE, set(prefix)).unwrap();
                engine.reload_rules().unwrap();
            }
            stop.store(true, Ordering::SeqCst);
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let engine = engine.clone();
        let stop = stop.clone();
        let set_a = set_a.clone();
        let set_b = set_b.clone();
        readers.push(tokio::task::spawn_blocking(move || {
            let mut checked = 0;
            while !stop.load(Ordering::SeqCst) || checked == 0 {
                let seen: BTreeSet<String> = engine
                    .rule_definitions()
                    .into_iter()
                    .map(|d| d.rule_code)
                    .collect();
                assert!(seen == set_a || seen == set_b, "mixed snapshot: {:?}", seen);

                // 没有判定表达式的规则不会违规
                let result = engine.execute(&json!({ "quantity": 1 })).unwrap();
                assert!(result.is_compliant());
                checked += 1;
            }
            checked
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        assert!(reader.await.unwrap() > 0);
    }
}

/// 并发添加不同规则，最终列表包含全部规则且保持有序
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_add_rules() {
    let rules = (0..32).map(|i| greater_than(&format!("r{:02}", i), i, 10)).collect();
    let factory = factory_with(rules);
    let engine = Arc::new(engine(&factory, ExecutionStrategy::Complete));
    for i in 0..32 {
        engine.force_remove_rule(&format!("r{:02}", i));
    }
    assert!(engine.is_empty());

    let mut handles = Vec::new();
    for i in 0..32 {
        let engine = engine.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            engine.add_rule(&format!("r{:02}", i)).unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let expected: Vec<String> = (0..32).map(|i| format!("r{:02}", i)).collect();
    assert_eq!(codes(&engine), expected);
}
