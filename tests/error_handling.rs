//! 错误处理集成测试
//!
//! 测试超时重试、存储故障降级、错误分类和配置错误

use std::sync::Arc;
use std::time::Duration;

use local_translator::translation::{
    CacheStore, ConfigManager, ErrorKind, ErrorSeverity, HealthLevel, TranslationConfig,
    TranslationError, TranslationOrchestrator,
};

mod common {
    include!("common/mod.rs");
}

use common::{BrokenStore, ScriptedBackend, Step, TestEnvironment};

fn short_timeout() -> TranslationConfig {
    TranslationConfig {
        inference_timeout_secs: 1,
        ..common::test_config()
    }
}

/// 超时只重试一次，两次都超时则报告 Timeout
#[tokio::test(start_paused = true)]
async fn test_timeout_retried_exactly_once() {
    let backend = ScriptedBackend::new().with_script(vec![Step::Hang, Step::Hang]);
    let env = TestEnvironment::with_config(backend, short_timeout());

    let outcome = env.orchestrator.translate_one("Slow", "vi", Some("en")).await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::Timeout));
    assert_eq!(env.backend.calls(), 2);
    assert!(env.cached("Slow", "en", "vi").is_none());

    println!("✅ Timeout retry test passed");
}

/// 第一次超时、重试成功
#[tokio::test(start_paused = true)]
async fn test_timeout_then_success() {
    let backend = ScriptedBackend::new()
        .with_script(vec![Step::Hang, Step::Reply("Translation: \"Chậm\"".to_string())]);
    let env = TestEnvironment::with_config(backend, short_timeout());

    let outcome = env.orchestrator.translate_one("Slow", "vi", Some("en")).await;
    assert!(outcome.is_success());
    assert_eq!(outcome.translated_text.as_deref(), Some("Chậm"));
    assert_eq!(env.backend.calls(), 2);
    assert!(env.cached("Slow", "en", "vi").is_some());

    println!("✅ Timeout then success test passed");
}

/// 其他推理错误不重试
#[tokio::test]
async fn test_non_timeout_errors_not_retried() {
    let backend = ScriptedBackend::new().with_script(vec![
        Step::Fail(TranslationError::BackendUnavailable("connection refused".to_string())),
        Step::Reply("   ".to_string()),
        Step::Reply("Translation: \"\"".to_string()),
    ]);
    let env = TestEnvironment::new(backend);

    let unavailable = env.orchestrator.translate_one("a", "vi", Some("en")).await;
    assert_eq!(unavailable.error_kind(), Some(ErrorKind::BackendUnavailable));
    assert_eq!(env.backend.calls(), 1);

    // 清理后为空的回复视为格式错误
    let blank = env.orchestrator.translate_one("b", "vi", Some("en")).await;
    assert_eq!(blank.error_kind(), Some(ErrorKind::MalformedResponse));
    let quoted = env.orchestrator.translate_one("c", "vi", Some("en")).await;
    assert_eq!(quoted.error_kind(), Some(ErrorKind::MalformedResponse));
    assert_eq!(env.backend.calls(), 3);

    assert!(env.store.is_empty(), "Failed translations must not be cached");
    assert_eq!(env.orchestrator.stats().errors_encountered, 3);

    println!("✅ Non-timeout errors test passed");
}

/// 推理错误带上语言对上下文
#[tokio::test]
async fn test_error_context_and_serialization() {
    let backend = ScriptedBackend::new().with_script(vec![Step::Fail(
        TranslationError::BackendUnavailable("connection refused".to_string()),
    )]);
    let env = TestEnvironment::new(backend);

    let outcome = env.orchestrator.translate_one("Hello", "de", Some("en")).await;
    let message = outcome.error.as_ref().expect("Should fail").to_string();
    assert!(message.contains("connection refused"));
    assert!(message.contains("en->de"));

    let json = serde_json::to_value(&outcome).unwrap();
    assert!(json["translated_text"].is_null());
    assert_eq!(json["error"].as_str(), Some(message.as_str()));
    assert_eq!(json["from_cache"], false);

    println!("✅ Error context test passed");
}

/// 存储不可用时降级为直接推理
#[tokio::test]
async fn test_store_outage_degrades_to_inference() {
    let backend = Arc::new(ScriptedBackend::new());
    let cache = CacheStore::new(Arc::new(BrokenStore), Duration::from_secs(300));
    let orchestrator =
        TranslationOrchestrator::new(common::test_config(), backend.clone(), Some(cache)).unwrap();

    let first = orchestrator.translate_one("Hello", "vi", Some("en")).await;
    let second = orchestrator.translate_one("Hello", "vi", Some("en")).await;

    assert!(first.is_success());
    assert!(second.is_success());
    assert!(!second.from_cache);
    assert_eq!(backend.calls(), 2);

    // 缓存管理操作把存储错误报告给调用方
    assert_eq!(
        orchestrator.get_cache_stats().unwrap_err().kind(),
        ErrorKind::StoreUnavailable
    );
    assert!(orchestrator.clear_cache(None, None).is_err());

    let health = orchestrator.health().await;
    assert_eq!(health.overall, HealthLevel::Degraded);
    assert_eq!(health.components.get("cache"), Some(&HealthLevel::Degraded));

    println!("✅ Store outage degradation test passed");
}

/// 缓存关闭时每次都推理，统计不可用，清理返回 0
#[tokio::test]
async fn test_cache_disabled() {
    let config = TranslationConfig {
        cache_enabled: false,
        ..common::test_config()
    };
    let env = TestEnvironment::with_config(ScriptedBackend::new(), config);

    env.orchestrator.translate_one("Hello", "ms", Some("en")).await;
    let again = env.orchestrator.translate_one("Hello", "ms", Some("en")).await;
    assert!(!again.from_cache);
    assert_eq!(env.backend.calls(), 2);
    assert!(env.store.is_empty());

    assert!(env.orchestrator.cache().is_none());
    assert!(env.orchestrator.get_cache_stats().is_err());
    assert_eq!(env.orchestrator.clear_cache(None, None).unwrap(), 0);
    assert_eq!(env.orchestrator.purge_expired_cache().unwrap(), 0);

    println!("✅ Cache disabled test passed");
}

/// 推理服务不可达时健康检查为不健康
#[tokio::test]
async fn test_health_reports_backend_down() {
    let healthy = TestEnvironment::new(ScriptedBackend::new());
    assert_eq!(healthy.orchestrator.health().await.overall, HealthLevel::Healthy);

    let down = TestEnvironment::new(ScriptedBackend::new().unavailable());
    let health = down.orchestrator.health().await;
    assert_eq!(health.overall, HealthLevel::Unhealthy);
    assert_eq!(health.components.get("inference"), Some(&HealthLevel::Unhealthy));

    println!("✅ Health check test passed");
}

/// 错误分类和严重程度
#[test]
fn test_error_classification() {
    let timeout = TranslationError::Timeout("30s".to_string());
    assert!(timeout.is_retryable());
    assert!(!timeout.is_validation());

    let too_long = TranslationError::TextTooLong { length: 6000, max: 5000 };
    assert!(too_long.is_validation());
    assert!(!too_long.is_retryable());
    assert!(too_long.to_string().contains("6000"));

    assert!(
        TranslationError::BackendUnavailable("down".into()).severity()
            > TranslationError::EmptyInput.severity()
    );
    assert_eq!(TranslationError::EmptyInput.severity(), ErrorSeverity::Info);

    println!("✅ Error classification test passed");
}

/// 无效配置被拒绝
#[test]
fn test_invalid_configuration() {
    let zero_concurrency = TranslationConfig {
        max_concurrent_translations: 0,
        ..TranslationConfig::default()
    };
    assert_eq!(
        zero_concurrency.validate().unwrap_err().kind(),
        ErrorKind::Config
    );

    let bad_url = TranslationConfig {
        ollama_base_url: "ftp://localhost:11434".to_string(),
        ..TranslationConfig::default()
    };
    assert!(bad_url.validate().is_err());

    let zero_ttl = TranslationConfig {
        cache_ttl_secs: 0,
        ..TranslationConfig::default()
    };
    assert!(TranslationOrchestrator::new(
        zero_ttl,
        Arc::new(ScriptedBackend::new()),
        None
    )
    .is_err());

    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken.toml");
    std::fs::write(&broken, "max_text_length = \"lots\"").unwrap();
    assert_eq!(
        ConfigManager::from_file(&broken).unwrap_err().kind(),
        ErrorKind::Config
    );

    println!("✅ Invalid configuration test passed");
}
