use rhai::{Dynamic, Engine};

/// 注册内置函数
///
/// - `now_ms()`：当前 UTC 毫秒时间戳
/// - `is_blank(x)`：空值或空白字符串
/// - `log(level, msg)`：输出到 tracing
pub fn register_builtin_functions(engine: &mut Engine) {
    engine.register_fn("now_ms", || chrono::Utc::now().timestamp_millis());

    engine.register_fn("is_blank", |value: Dynamic| -> bool {
        let value = value.flatten();
        value.is_unit() || (value.is_string() && value.to_string().trim().is_empty())
    });

    engine.register_fn("log", |level: &str, message: &str| match level {
        "error" => tracing::error!("SCRIPT: {}", message),
        "warn" => tracing::warn!("SCRIPT: {}", message),
        "debug" => tracing::debug!("SCRIPT: {}", message),
        "trace" => tracing::trace!("SCRIPT: {}", message),
        _ => tracing::info!("SCRIPT: {}", message),
    });
}
