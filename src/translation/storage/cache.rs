//! 翻译缓存适配器
//!
//! 在存储后端之上实现缓存语义：TTL 过期判定、命中计数和统计。

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::backend::{CacheBackend, MemoryBackend, RedbBackend};
use super::key::TranslationKey;
use crate::translation::config::constants;
use crate::translation::error::TranslationResult;
use crate::translation::languages::normalize_code;

// ============================================================================
// 核心类型
// ============================================================================

/// 缓存条目
///
/// 内容字段写入后不再修改；同键的新写入会整体替换旧条目。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: TranslationKey,
    pub translated_text: String,
    pub model_used: String,
    pub confidence_score: Option<f32>,
    pub hit_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

/// 语言对使用统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguagePairUsage {
    pub pair: String,
    pub hits: u64,
}

/// 缓存统计信息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub total_hits: u64,
    /// 重复命中占全部命中的比例（每个条目的首次写入不算命中）
    pub hit_rate: f64,
    pub most_common_language_pairs: Vec<LanguagePairUsage>,
    pub storage_estimate_bytes: u64,
    pub ttl_secs: u64,
    pub backend: String,
}

impl CacheEntry {
    /// 创建新的缓存条目
    pub fn new(
        key: TranslationKey,
        translated_text: String,
        model_used: String,
        confidence_score: Option<f32>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            translated_text,
            model_used,
            confidence_score: confidence_score
                .filter(|score| score.is_finite())
                .map(|score| score.clamp(0.0, 1.0)),
            hit_count: 1,
            created_at: now,
            last_accessed_at: now,
        }
    }

    /// 更新访问信息
    pub fn record_hit(&mut self, at: DateTime<Utc>) {
        self.hit_count += 1;
        self.last_accessed_at = at;
    }

    /// 检查条目是否过期（按创建时间计算，命中不会延长有效期）
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        (now - self.created_at)
            .to_std()
            .map(|age| age > ttl)
            .unwrap_or(false)
    }

    fn estimated_size(&self) -> u64 {
        (self.key.text().len()
            + self.key.source_lang().len()
            + self.key.target_lang().len()
            + self.translated_text.len()
            + self.model_used.len()
            + 64) as u64
    }
}

// ============================================================================
// 缓存适配器
// ============================================================================

/// 翻译缓存
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("backend", &self.backend.name())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    /// 内存缓存
    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryBackend::new()), ttl)
    }

    /// 磁盘缓存
    pub fn open<P: AsRef<Path>>(path: P, ttl: Duration) -> TranslationResult<Self> {
        Ok(Self::new(Arc::new(RedbBackend::open(path)?), ttl))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// 获取未过期的缓存条目
    ///
    /// 过期条目视为不存在，但不会在读取时删除。
    pub fn get(&self, key: &TranslationKey) -> TranslationResult<Option<CacheEntry>> {
        let now = Utc::now();
        Ok(self.backend.fetch(key)?.filter(|entry| {
            let expired = entry.is_expired(self.ttl, now);
            if expired {
                tracing::debug!("缓存条目已过期: {}", key);
            }
            !expired
        }))
    }

    /// 写入翻译结果，替换同键的旧条目
    pub fn put(
        &self,
        key: &TranslationKey,
        translated_text: &str,
        model_used: &str,
        confidence_score: Option<f32>,
    ) -> TranslationResult<CacheEntry> {
        let entry = CacheEntry::new(
            key.clone(),
            translated_text.to_string(),
            model_used.to_string(),
            confidence_score,
            Utc::now(),
        );
        self.backend.upsert(entry.clone())?;
        tracing::debug!("写入缓存: {}", key);
        Ok(entry)
    }

    /// 记录一次命中
    pub fn touch(&self, key: &TranslationKey) -> TranslationResult<Option<CacheEntry>> {
        self.backend.touch(key, Utc::now())
    }

    pub fn delete(&self, key: &TranslationKey) -> TranslationResult<bool> {
        self.backend.remove(key)
    }

    /// 清除缓存；可按源语言和/或目标语言过滤，未指定则全部清除
    pub fn clear(
        &self,
        source_lang: Option<&str>,
        target_lang: Option<&str>,
    ) -> TranslationResult<usize> {
        let source = source_lang.map(normalize_code);
        let target = target_lang.map(normalize_code);

        let removed = self.backend.remove_where(&|entry: &CacheEntry| {
            source
                .as_deref()
                .map_or(true, |lang| entry.key.source_lang() == lang)
                && target
                    .as_deref()
                    .map_or(true, |lang| entry.key.target_lang() == lang)
        })?;

        tracing::info!(
            "清除缓存 {} 条 (源语言: {}, 目标语言: {})",
            removed,
            source.as_deref().unwrap_or("*"),
            target.as_deref().unwrap_or("*")
        );
        Ok(removed)
    }

    /// 物理删除过期条目
    pub fn purge_expired(&self) -> TranslationResult<usize> {
        let now = Utc::now();
        let ttl = self.ttl;
        let removed = self
            .backend
            .remove_where(&|entry: &CacheEntry| entry.is_expired(ttl, now))?;

        if removed > 0 {
            tracing::info!("清理了 {} 个过期缓存条目", removed);
        }
        Ok(removed)
    }

    /// 获取缓存统计
    pub fn stats(&self) -> TranslationResult<CacheStats> {
        let now = Utc::now();
        let entries = self.backend.scan()?;

        let total_entries = entries.len();
        let expired_entries = entries
            .iter()
            .filter(|entry| entry.is_expired(self.ttl, now))
            .count();
        let total_hits: u64 = entries.iter().map(|entry| entry.hit_count).sum();
        let repeat_hits: u64 = entries
            .iter()
            .map(|entry| entry.hit_count.saturating_sub(1))
            .sum();
        let hit_rate = if total_hits == 0 {
            0.0
        } else {
            repeat_hits as f64 / total_hits as f64
        };

        let mut pairs: HashMap<String, u64> = HashMap::new();
        for entry in &entries {
            *pairs.entry(entry.key.language_pair()).or_default() += entry.hit_count;
        }
        let mut most_common_language_pairs: Vec<LanguagePairUsage> = pairs
            .into_iter()
            .map(|(pair, hits)| LanguagePairUsage { pair, hits })
            .collect();
        most_common_language_pairs.sort_by(|a, b| b.hits.cmp(&a.hits).then(a.pair.cmp(&b.pair)));
        most_common_language_pairs.truncate(constants::TOP_LANGUAGE_PAIRS);

        let storage_estimate_bytes = match self.backend.storage_bytes()? {
            Some(bytes) => bytes,
            None => entries.iter().map(CacheEntry::estimated_size).sum(),
        };

        Ok(CacheStats {
            total_entries,
            expired_entries,
            total_hits,
            hit_rate,
            most_common_language_pairs,
            storage_estimate_bytes,
            ttl_secs: self.ttl.as_secs(),
            backend: self.backend.name().to_string(),
        })
    }
}
