//! # Local Translator Library
//!
//! 基于本地大模型（Ollama）的文本翻译库，带持久化翻译缓存。
//!
//! ## 模块组织
//!
//! - `translation` - 翻译缓存与请求编排
//! - `env` - 类型安全的环境变量访问

pub mod env;
pub mod translation;

// Re-export commonly used items for convenience
pub use translation::{
    TranslationConfig, TranslationError, TranslationOrchestrator, TranslationOutcome,
    TranslationResult,
};
