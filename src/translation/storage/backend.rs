//! 缓存存储后端
//!
//! `CacheBackend` 是缓存适配器与具体存储之间的接口。提供两种实现：
//! 基于 `DashMap` 的内存存储，以及基于 `redb` 的磁盘存储。

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use redb::{Database, ReadableTable, TableDefinition};

use super::cache::CacheEntry;
use super::key::TranslationKey;
use crate::translation::error::{TranslationError, TranslationResult};

/// 存储后端接口
///
/// 每个操作都是原子的；所有失败以 `StoreUnavailable` 报告。
pub trait CacheBackend: Send + Sync {
    /// 后端名称（用于日志和健康检查）
    fn name(&self) -> &'static str;

    fn fetch(&self, key: &TranslationKey) -> TranslationResult<Option<CacheEntry>>;

    /// 写入条目，替换同键的旧条目
    fn upsert(&self, entry: CacheEntry) -> TranslationResult<()>;

    /// 命中计数加一并刷新访问时间，返回更新后的条目
    fn touch(
        &self,
        key: &TranslationKey,
        at: DateTime<Utc>,
    ) -> TranslationResult<Option<CacheEntry>>;

    fn remove(&self, key: &TranslationKey) -> TranslationResult<bool>;

    /// 删除所有满足条件的条目，返回删除数量
    fn remove_where(&self, filter: &dyn Fn(&CacheEntry) -> bool) -> TranslationResult<usize>;

    fn scan(&self) -> TranslationResult<Vec<CacheEntry>>;

    /// 占用的存储字节数；无法得知时返回 `None`
    fn storage_bytes(&self) -> TranslationResult<Option<u64>> {
        Ok(None)
    }
}

// ============================================================================
// 内存后端
// ============================================================================

/// 内存缓存后端
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: DashMap<TranslationKey, CacheEntry>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn fetch(&self, key: &TranslationKey) -> TranslationResult<Option<CacheEntry>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn upsert(&self, entry: CacheEntry) -> TranslationResult<()> {
        self.entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    fn touch(
        &self,
        key: &TranslationKey,
        at: DateTime<Utc>,
    ) -> TranslationResult<Option<CacheEntry>> {
        Ok(self.entries.get_mut(key).map(|mut entry| {
            entry.record_hit(at);
            entry.value().clone()
        }))
    }

    fn remove(&self, key: &TranslationKey) -> TranslationResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn remove_where(&self, filter: &dyn Fn(&CacheEntry) -> bool) -> TranslationResult<usize> {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            if filter(entry) {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    fn scan(&self) -> TranslationResult<Vec<CacheEntry>> {
        Ok(self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }
}

// ============================================================================
// redb 磁盘后端
// ============================================================================

const TRANSLATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("translations");

/// 磁盘缓存后端
///
/// 单表存储，键为 `TranslationKey::fingerprint()`，值为 JSON 编码的条目。
/// 每次修改都在一个写事务内完成。
pub struct RedbBackend {
    db: Database,
    path: PathBuf,
}

impl RedbBackend {
    /// 打开（或创建）缓存文件
    pub fn open<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let db = Database::create(&path)?;

        // 预先创建表，之后的读事务不会遇到表不存在
        let txn = db.begin_write()?;
        txn.open_table(TRANSLATIONS)?;
        txn.commit()?;

        tracing::info!("打开磁盘翻译缓存: {}", path.display());
        Ok(Self { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(entry: &CacheEntry) -> TranslationResult<Vec<u8>> {
        serde_json::to_vec(entry)
            .map_err(|e| TranslationError::StoreUnavailable(format!("缓存条目编码失败: {}", e)))
    }

    fn decode(bytes: &[u8]) -> TranslationResult<CacheEntry> {
        serde_json::from_slice(bytes)
            .map_err(|e| TranslationError::StoreUnavailable(format!("缓存条目解码失败: {}", e)))
    }
}

impl CacheBackend for RedbBackend {
    fn name(&self) -> &'static str {
        "redb"
    }

    fn fetch(&self, key: &TranslationKey) -> TranslationResult<Option<CacheEntry>> {
        let fingerprint = key.fingerprint();
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TRANSLATIONS)?;

        let entry = match table.get(fingerprint.as_str())? {
            Some(value) => Some(Self::decode(value.value())?),
            None => None,
        };
        Ok(entry)
    }

    fn upsert(&self, entry: CacheEntry) -> TranslationResult<()> {
        let fingerprint = entry.key.fingerprint();
        let bytes = Self::encode(&entry)?;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(TRANSLATIONS)?;
            table.insert(fingerprint.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn touch(
        &self,
        key: &TranslationKey,
        at: DateTime<Utc>,
    ) -> TranslationResult<Option<CacheEntry>> {
        let fingerprint = key.fingerprint();

        let txn = self.db.begin_write()?;
        let updated = {
            let mut table = txn.open_table(TRANSLATIONS)?;
            let current = match table.get(fingerprint.as_str())? {
                Some(value) => Some(Self::decode(value.value())?),
                None => None,
            };

            match current {
                Some(mut entry) => {
                    entry.record_hit(at);
                    let bytes = Self::encode(&entry)?;
                    table.insert(fingerprint.as_str(), bytes.as_slice())?;
                    Some(entry)
                }
                None => None,
            }
        };
        txn.commit()?;
        Ok(updated)
    }

    fn remove(&self, key: &TranslationKey) -> TranslationResult<bool> {
        let fingerprint = key.fingerprint();

        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(TRANSLATIONS)?;
            let removed = table.remove(fingerprint.as_str())?.is_some();
            removed
        };
        txn.commit()?;
        Ok(removed)
    }

    fn remove_where(&self, filter: &dyn Fn(&CacheEntry) -> bool) -> TranslationResult<usize> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(TRANSLATIONS)?;

            let mut doomed = Vec::new();
            for item in table.iter()? {
                let (fingerprint, value) = item?;
                if filter(&Self::decode(value.value())?) {
                    doomed.push(fingerprint.value().to_string());
                }
            }

            for fingerprint in &doomed {
                table.remove(fingerprint.as_str())?;
            }
            doomed.len()
        };
        txn.commit()?;
        Ok(removed)
    }

    fn scan(&self) -> TranslationResult<Vec<CacheEntry>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TRANSLATIONS)?;

        let mut entries = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            entries.push(Self::decode(value.value())?);
        }
        Ok(entries)
    }

    fn storage_bytes(&self) -> TranslationResult<Option<u64>> {
        Ok(Some(fs::metadata(&self.path)?.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str, target: &str) -> CacheEntry {
        CacheEntry::new(
            TranslationKey::new(text, "en", target),
            format!("{}-{}", text, target),
            "llama2:latest".to_string(),
            Some(0.9),
            Utc::now(),
        )
    }

    fn exercise(backend: &dyn CacheBackend) {
        let hello = entry("hello", "vi");
        backend.upsert(hello.clone()).unwrap();
        backend.upsert(entry("world", "ja")).unwrap();

        let fetched = backend.fetch(&hello.key).unwrap().unwrap();
        assert_eq!(fetched.translated_text, "hello-vi");
        assert_eq!(fetched.hit_count, 1);

        let touched = backend.touch(&hello.key, Utc::now()).unwrap().unwrap();
        assert_eq!(touched.hit_count, 2);
        assert_eq!(backend.fetch(&hello.key).unwrap().unwrap().hit_count, 2);

        let missing = TranslationKey::new("missing", "en", "vi");
        assert!(backend.touch(&missing, Utc::now()).unwrap().is_none());

        assert_eq!(backend.scan().unwrap().len(), 2);
        assert_eq!(
            backend
                .remove_where(&|e: &CacheEntry| e.key.target_lang() == "ja")
                .unwrap(),
            1
        );
        assert!(backend.remove(&hello.key).unwrap());
        assert!(!backend.remove(&hello.key).unwrap());
        assert!(backend.scan().unwrap().is_empty());
    }

    #[test]
    fn test_memory_backend() {
        exercise(&MemoryBackend::new());
    }

    #[test]
    fn test_redb_backend() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RedbBackend::open(dir.path().join("nested").join("cache.redb")).unwrap();
        exercise(&backend);
        assert!(backend.storage_bytes().unwrap().unwrap() > 0);
    }

    #[test]
    fn test_redb_backend_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.redb");
        let hello = entry("hello", "vi");

        {
            let backend = RedbBackend::open(&path).unwrap();
            backend.upsert(hello.clone()).unwrap();
        }

        let backend = RedbBackend::open(&path).unwrap();
        let fetched = backend.fetch(&hello.key).unwrap().unwrap();
        assert_eq!(fetched.translated_text, "hello-vi");
    }
}
