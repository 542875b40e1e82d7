use crate::engine::RulesEngine;
use crate::error::{Result, RulerError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// 规则引擎管理器，每个业务类型一个引擎
#[derive(Default)]
pub struct RulesEngineManager {
    engines: RwLock<HashMap<String, Arc<RulesEngine>>>,
}

impl RulesEngineManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记引擎，返回被替换的同业务类型引擎
    pub fn insert(&self, engine: RulesEngine) -> Option<Arc<RulesEngine>> {
        let business_type = engine.business_type().to_string();
        info!(
            business_type = %business_type,
            strategy = %engine.strategy(),
            rules = engine.len(),
            "Rules engine registered"
        );
        self.engines.write().insert(business_type, Arc::new(engine))
    }

    pub fn get(&self, business_type: &str) -> Option<Arc<RulesEngine>> {
        self.engines.read().get(business_type).cloned()
    }

    /// 获取引擎，不存在时返回未知业务类型错误
    pub fn engine(&self, business_type: &str) -> Result<Arc<RulesEngine>> {
        self.get(business_type)
            .ok_or_else(|| RulerError::UnknownBusinessType(business_type.to_string()))
    }

    pub fn remove(&self, business_type: &str) -> Option<Arc<RulesEngine>> {
        self.engines.write().remove(business_type)
    }

    /// 已登记的业务类型（排序后）
    pub fn business_types(&self) -> Vec<String> {
        let mut types: Vec<_> = self.engines.read().keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.engines.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.read().is_empty()
    }

    /// 重新加载所有引擎的规则，返回生效规则总数
    ///
    /// 每个引擎都会尝试重载。失败的引擎保留原有规则，全部尝试后返回第一个错误。
    pub fn reload_all(&self) -> Result<usize> {
        // 先取出引擎再逐个重载，避免长时间持有管理器的锁
        let engines: Vec<_> = self.engines.read().values().cloned().collect();
        let mut total = 0;
        let mut first_error = None;
        for engine in engines {
            match engine.reload_rules() {
                Ok(count) => total += count,
                Err(e) => {
                    warn!(
                        business_type = %engine.business_type(),
                        error = %e,
                        "Rules reload failed, keeping previous rules"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(total),
        }
    }
}
