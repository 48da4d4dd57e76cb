//! 翻译模块
//!
//! 基于本地大模型的文本翻译，带持久化翻译缓存：
//! - **core**: 请求编排、并发闸门、推理调用
//! - **backend**: 推理服务接口与 Ollama 实现
//! - **storage**: 翻译缓存与存储后端
//! - **languages**: 语言与模型注册表
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use local_translator::translation::{ConfigManager, TranslationOrchestrator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigManager::new()?.into_config();
//! let orchestrator = TranslationOrchestrator::from_config(config)?;
//!
//! let outcome = orchestrator.translate_one("Good morning", "ja", Some("en")).await;
//! let all = orchestrator.translate_to_all_languages("Good morning", None).await;
//! # let _ = (outcome, all);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 推理后端 - 外部模型服务的调用接口
pub mod backend;

/// 配置管理模块 - 处理翻译相关的所有配置
pub mod config;

/// 核心模块 - 编排服务、并发闸门和推理调用
pub mod core;

/// 错误处理模块 - 统一的错误类型和处理机制
pub mod error;

/// 语言注册表
pub mod languages;

/// 存储管理模块 - 翻译缓存和持久化存储
pub mod storage;

// ============================================================================
// 核心API导出
// ============================================================================

pub use core::{
    ConcurrencyGate, HealthLevel, HealthStatus, InferenceInvoker, ModelInfo, ServiceStats,
    ServiceStatsSnapshot, TranslationOrchestrator, TranslationOutcome,
};

pub use backend::{InferenceBackend, InferenceReply, OllamaBackend};

pub use config::{constants, ConfigManager, TranslationConfig};

pub use error::{ErrorKind, ErrorSeverity, TranslationError, TranslationResult};

pub use languages::{LanguageRegistry, ModelDescriptor};

pub use storage::{
    CacheBackend, CacheEntry, CacheStats, CacheStore, MemoryBackend, RedbBackend, TranslationKey,
};

/// 检查翻译配置文件是否存在
pub fn config_file_exists() -> bool {
    config::config_file_exists()
}

/// 加载翻译配置，失败时回退到默认配置
pub fn load_translation_config() -> TranslationConfig {
    config::load_translation_config()
}
