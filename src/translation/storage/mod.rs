//! 存储模块
//!
//! 提供翻译结果缓存和持久化存储功能。

pub mod backend;
pub mod cache;
pub mod key;

pub use backend::{CacheBackend, MemoryBackend, RedbBackend};
pub use cache::{CacheEntry, CacheStats, CacheStore, LanguagePairUsage};
pub use key::TranslationKey;
