//! 翻译编排服务
//!
//! 本模块是翻译系统的主要入口点，负责决定一个翻译请求是从缓存返回
//! 还是交给模型计算，并把单条、批量和多语言请求整理成统一的结果。
//!
//! ## 请求流程
//!
//! ```text
//! translate_one
//!     ├── 校验（语言、模型支持、空文本、长度）
//!     ├── CacheStore::get  ── 命中 → touch → 返回
//!     └── 未命中 → 同键合并 → 再次查询缓存 → ConcurrencyGate → InferenceInvoker → CacheStore::put
//! ```
//!
//! ## 同键合并
//!
//! 同一个 `TranslationKey` 同时只会有一次模型计算。计算在独立的任务中运行，
//! 持有并发许可、写入缓存并在结束时移除自己的登记项；所有等待者共享同一个
//! 结果。某个等待者被取消只会丢弃它自己的句柄，计算会继续为其余等待者完成。
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use local_translator::translation::{TranslationConfig, TranslationOrchestrator};
//!
//! # async fn run() -> local_translator::translation::TranslationResult<()> {
//! let orchestrator = TranslationOrchestrator::from_config(TranslationConfig::default())?;
//! let outcome = orchestrator.translate_one("Hello world", "vi", None).await;
//! println!("{:?}", outcome.translated_text);
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{join_all, BoxFuture, Shared};
use futures::FutureExt;
use serde::Serialize;

use super::gate::ConcurrencyGate;
use super::invoker::InferenceInvoker;
use super::outcome::TranslationOutcome;
use crate::translation::backend::{InferenceBackend, OllamaBackend};
use crate::translation::config::constants::AUTO_LANGUAGE;
use crate::translation::config::TranslationConfig;
use crate::translation::error::{helpers, TranslationError, TranslationResult};
use crate::translation::languages::{normalize_code, LanguageRegistry, ModelDescriptor};
use crate::translation::storage::{CacheEntry, CacheStats, CacheStore, TranslationKey};

// ============================================================================
// 同键合并
// ============================================================================

/// 一次模型计算的结果，分发给所有等待者
#[derive(Debug, Clone)]
struct Computed {
    text: String,
    model: String,
    confidence: Option<f32>,
    from_cache: bool,
}

type SharedComputation = Shared<BoxFuture<'static, TranslationResult<Computed>>>;

/// 正在进行的计算
struct Flight {
    id: u64,
    result: SharedComputation,
}

/// 计算任务结束（包括 panic）时移除自己的登记项
struct FlightGuard {
    inner: Arc<Inner>,
    key: TranslationKey,
    id: u64,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .remove_if(&self.key, |_, flight| flight.id == self.id);
    }
}

// ============================================================================
// 编排服务
// ============================================================================

struct Inner {
    config: TranslationConfig,
    registry: Arc<LanguageRegistry>,
    cache: Option<CacheStore>,
    gate: ConcurrencyGate,
    invoker: InferenceInvoker,
    in_flight: DashMap<TranslationKey, Flight>,
    next_flight_id: AtomicU64,
    stats: ServiceStats,
}

/// 翻译编排服务
///
/// 内部状态位于 `Arc` 之后，克隆代价很低；克隆出的实例共享缓存、
/// 并发闸门、合并表和统计信息。
///
/// 服务不持有任何持久状态：持久化由 `CacheStore` 负责，
/// 服务本身只有合并表、闸门和运行时计数器。
#[derive(Clone)]
pub struct TranslationOrchestrator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TranslationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationOrchestrator")
            .field("model", &self.inner.config.default_model_id)
            .field("cache", &self.inner.cache)
            .field("gate", &self.inner.gate)
            .field("in_flight", &self.inner.in_flight.len())
            .finish()
    }
}

impl TranslationOrchestrator {
    /// 使用默认语言注册表创建服务
    ///
    /// `cache` 为 `None` 时完全跳过缓存读写（仍然合并同键请求并受闸门限制）。
    ///
    /// # 错误
    ///
    /// 配置校验失败时返回 `ConfigError`。
    pub fn new(
        config: TranslationConfig,
        backend: Arc<dyn InferenceBackend>,
        cache: Option<CacheStore>,
    ) -> TranslationResult<Self> {
        Self::with_registry(config, Arc::new(LanguageRegistry::default()), backend, cache)
    }

    /// 使用自定义语言注册表创建服务
    pub fn with_registry(
        config: TranslationConfig,
        registry: Arc<LanguageRegistry>,
        backend: Arc<dyn InferenceBackend>,
        cache: Option<CacheStore>,
    ) -> TranslationResult<Self> {
        config.validate()?;

        let cache = if config.cache_enabled { cache } else { None };
        let gate = ConcurrencyGate::new(config.max_concurrent_translations);
        let invoker = InferenceInvoker::new(backend, Arc::clone(&registry), config.inference_timeout());

        tracing::info!(
            "翻译服务已创建: 模型={}, 并发上限={}, 缓存={}",
            config.default_model_id,
            gate.capacity(),
            cache.as_ref().map_or("disabled", |c| c.backend_name())
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                registry,
                cache,
                gate,
                invoker,
                in_flight: DashMap::new(),
                next_flight_id: AtomicU64::new(0),
                stats: ServiceStats::default(),
            }),
        })
    }

    /// 根据配置创建服务：Ollama 后端加磁盘缓存
    ///
    /// 没有可用的缓存目录时使用内存缓存。
    pub fn from_config(config: TranslationConfig) -> TranslationResult<Self> {
        config.validate()?;
        let backend: Arc<dyn InferenceBackend> = Arc::new(OllamaBackend::new(&config.ollama_base_url)?);

        let cache = if config.cache_enabled {
            Some(match config.resolved_cache_path() {
                Some(path) => CacheStore::open(path, config.cache_ttl())?,
                None => {
                    tracing::warn!("无法确定缓存目录，使用内存缓存");
                    CacheStore::in_memory(config.cache_ttl())
                }
            })
        } else {
            None
        };

        Self::new(config, backend, cache)
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.inner.registry
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.inner.gate
    }

    pub fn cache(&self) -> Option<&CacheStore> {
        self.inner.cache.as_ref()
    }

    /// 当前正在进行的模型计算数量
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    fn model_id(&self) -> &str {
        &self.inner.config.default_model_id
    }

    // ------------------------------------------------------------------------
    // 翻译操作
    // ------------------------------------------------------------------------

    /// 翻译单条文本
    ///
    /// `source_lang` 为 `None`（或空白、`"auto"`）时由模型自行判断源语言，
    /// 结果中的 `source_language_used` 为 `"auto"`。
    ///
    /// 校验顺序：目标语言已注册 → 源语言已注册 → 模型支持目标语言 →
    /// 文本非空 → 字符数不超过上限。校验失败、推理失败都体现在结果的
    /// `error` 字段中，失败结果不会写入缓存。
    pub async fn translate_one(
        &self,
        text: &str,
        target_lang: &str,
        source_lang: Option<&str>,
    ) -> TranslationOutcome {
        let started = Instant::now();
        let stats = &self.inner.stats;
        stats.inc_requests();

        let target = normalize_code(target_lang);
        let source = resolve_source(source_lang);

        let outcome = match self.validate(text, &source, &target) {
            Ok(()) => self.resolve(TranslationKey::new(text, &source, &target)).await,
            Err(error) => TranslationOutcome::failure(error, &source, &target, self.model_id()),
        };

        match &outcome.error {
            Some(error) => {
                stats.inc_errors();
                metrics::counter!("translation_errors_total").increment(1);
                helpers::log_error(error);
            }
            None => stats.inc_translations_completed(),
        }

        let elapsed = started.elapsed();
        stats.add_processing_time(elapsed);
        outcome.with_processing_time(elapsed)
    }

    /// 批量翻译
    ///
    /// 结果与输入一一对应、顺序一致；单条失败不影响其他条目。
    /// 实际并发度由并发闸门限制。
    pub async fn translate_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
        target_lang: &str,
        source_lang: Option<&str>,
    ) -> Vec<TranslationOutcome> {
        tracing::info!("批量翻译 {} 条文本 → {}", texts.len(), target_lang);

        join_all(
            texts
                .iter()
                .map(|text| self.translate_one(text.as_ref(), target_lang, source_lang)),
        )
        .await
    }

    /// 翻译到所有已注册语言
    ///
    /// 源语言为 `auto` 时先调用 `detect_language`；结果中不包含
    /// 解析出的源语言本身。每种语言的失败单独保留在对应结果中。
    pub async fn translate_to_all_languages(
        &self,
        text: &str,
        source_lang: Option<&str>,
    ) -> BTreeMap<String, TranslationOutcome> {
        let mut source = resolve_source(source_lang);
        if source == AUTO_LANGUAGE {
            source = self.detect_language(text).await;
        }

        let targets: Vec<String> = self
            .inner
            .registry
            .all_codes()
            .into_iter()
            .filter(|code| *code != source)
            .collect();

        tracing::info!("多语言翻译: 源语言={}, 目标语言 {} 种", source, targets.len());

        let outcomes = join_all(
            targets
                .iter()
                .map(|target| self.translate_one(text, target, Some(source.as_str()))),
        )
        .await;

        targets.into_iter().zip(outcomes).collect()
    }

    /// 识别文本语言
    ///
    /// 检测调用同样受并发闸门限制。空文本、推理失败或无法识别的回答
    /// 一律返回 `"auto"`。
    pub async fn detect_language(&self, text: &str) -> String {
        let text = text.trim();
        if text.is_empty() {
            return AUTO_LANGUAGE.to_string();
        }

        let detected = async {
            let _permit = self.inner.gate.acquire().await?;
            self.inner.invoker.detect(text, self.model_id()).await
        }
        .await;

        match detected {
            Ok(code) => {
                tracing::debug!("检测到语言: {}", code);
                code
            }
            Err(error) => {
                tracing::warn!("语言检测失败，使用 auto: {}", error);
                AUTO_LANGUAGE.to_string()
            }
        }
    }

    fn validate(&self, text: &str, source: &str, target: &str) -> TranslationResult<()> {
        let registry = &self.inner.registry;

        if !registry.is_supported(target) {
            return Err(TranslationError::UnsupportedLanguage(format!(
                "目标语言 '{}'",
                target
            )));
        }

        if source != AUTO_LANGUAGE && !registry.is_supported(source) {
            return Err(TranslationError::UnsupportedLanguage(format!(
                "源语言 '{}'",
                source
            )));
        }

        if !registry.model_supports(self.model_id(), target) {
            return Err(TranslationError::UnsupportedLanguage(format!(
                "模型 {} 不支持目标语言 '{}'",
                self.model_id(),
                target
            )));
        }

        if text.trim().is_empty() {
            return Err(TranslationError::EmptyInput);
        }

        let length = text.chars().count();
        let max = self.inner.config.max_text_length;
        if length > max {
            return Err(TranslationError::TextTooLong { length, max });
        }

        Ok(())
    }

    async fn resolve(&self, key: TranslationKey) -> TranslationOutcome {
        if let Some(entry) = self.lookup(&key) {
            return TranslationOutcome::success(
                entry.translated_text,
                key.source_lang(),
                key.target_lang(),
                &entry.model_used,
                entry.confidence_score,
                true,
            );
        }

        self.inner.stats.inc_cache_misses();
        metrics::counter!("translation_cache_misses_total").increment(1);

        match self.join_flight(&key).await {
            Ok(computed) => TranslationOutcome::success(
                computed.text,
                key.source_lang(),
                key.target_lang(),
                &computed.model,
                computed.confidence,
                computed.from_cache,
            ),
            Err(error) => TranslationOutcome::failure(
                error.with_context(key.language_pair()),
                key.source_lang(),
                key.target_lang(),
                self.model_id(),
            ),
        }
    }

    /// 查询缓存，命中时记录一次访问；存储不可用时视为未命中
    fn lookup(&self, key: &TranslationKey) -> Option<CacheEntry> {
        let cache = self.inner.cache.as_ref()?;

        let entry = match cache.get(key) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(error) => {
                tracing::warn!("缓存读取失败，直接推理: {}", error);
                return None;
            }
        };

        let entry = match cache.touch(key) {
            Ok(Some(updated)) => updated,
            Ok(None) => entry,
            Err(error) => {
                tracing::warn!("更新缓存命中计数失败: {}", error);
                entry
            }
        };

        self.inner.stats.inc_cache_hits();
        metrics::counter!("translation_cache_hits_total").increment(1);
        tracing::debug!("缓存命中: {} (命中 {} 次)", key, entry.hit_count);
        Some(entry)
    }

    /// 加入同键计算；没有进行中的计算时启动一个
    async fn join_flight(&self, key: &TranslationKey) -> TranslationResult<Computed> {
        let result = match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(flight) => {
                self.inner.stats.inc_deduplicated();
                tracing::debug!("合并到进行中的计算: {}", key);
                flight.get().result.clone()
            }
            Entry::Vacant(slot) => {
                let id = self.inner.next_flight_id.fetch_add(1, Ordering::Relaxed);
                let result = self.spawn_flight(key.clone(), id);
                slot.insert(Flight {
                    id,
                    result: result.clone(),
                });
                result
            }
        };

        result.await
    }

    fn spawn_flight(&self, key: TranslationKey, id: u64) -> SharedComputation {
        let this = self.clone();
        let handle = tokio::spawn(async move {
            let _guard = FlightGuard {
                inner: Arc::clone(&this.inner),
                key: key.clone(),
                id,
            };
            this.compute(&key).await
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(error) => Err(TranslationError::InternalError(format!(
                    "翻译任务异常终止: {}",
                    error
                ))),
            }
        }
        .boxed()
        .shared()
    }

    async fn compute(&self, key: &TranslationKey) -> TranslationResult<Computed> {
        // 上一次计算可能在本次未命中之后、登记之前刚写入缓存
        if let Some(entry) = self.lookup(key) {
            return Ok(Computed {
                text: entry.translated_text,
                model: entry.model_used,
                confidence: entry.confidence_score,
                from_cache: true,
            });
        }

        let model = self.model_id().to_string();

        let reply = {
            let _permit = self.inner.gate.acquire().await?;
            self.inner.stats.inc_inference_calls();
            self.inner
                .invoker
                .translate(key.text(), key.source_lang(), key.target_lang(), &model)
                .await?
        };

        if let Some(cache) = &self.inner.cache {
            if let Err(error) = cache.put(key, &reply.text, &model, reply.confidence) {
                tracing::warn!("缓存写入失败，结果未缓存: {}", error);
            }
        }

        Ok(Computed {
            text: reply.text,
            model,
            confidence: reply.confidence,
            from_cache: false,
        })
    }

    // ------------------------------------------------------------------------
    // 缓存管理
    // ------------------------------------------------------------------------

    /// 获取缓存统计
    ///
    /// 缓存未启用时返回 `StoreUnavailable`。
    pub fn get_cache_stats(&self) -> TranslationResult<CacheStats> {
        self.require_cache()?.stats()
    }

    /// 清除缓存，可按源语言和/或目标语言过滤；缓存未启用时返回 0
    pub fn clear_cache(
        &self,
        source_lang: Option<&str>,
        target_lang: Option<&str>,
    ) -> TranslationResult<usize> {
        match &self.inner.cache {
            Some(cache) => cache.clear(source_lang, target_lang),
            None => Ok(0),
        }
    }

    /// 物理删除过期的缓存条目；缓存未启用时返回 0
    pub fn purge_expired_cache(&self) -> TranslationResult<usize> {
        match &self.inner.cache {
            Some(cache) => cache.purge_expired(),
            None => Ok(0),
        }
    }

    fn require_cache(&self) -> TranslationResult<&CacheStore> {
        self.inner
            .cache
            .as_ref()
            .ok_or_else(|| TranslationError::StoreUnavailable("缓存未启用".to_string()))
    }

    // ------------------------------------------------------------------------
    // 信息与监控
    // ------------------------------------------------------------------------

    /// 支持的语言：代码 → 显示名称
    pub fn supported_languages(&self) -> BTreeMap<String, String> {
        self.inner.registry.languages().clone()
    }

    /// 模型信息
    ///
    /// 查询推理服务的已安装模型列表；服务不可达时 `backend_available` 为 false。
    pub async fn model_info(&self, model_id: Option<&str>) -> ModelInfo {
        let model_id = model_id.unwrap_or(self.model_id()).to_string();
        let descriptor = self.inner.registry.model(&model_id).cloned();

        let (backend_available, installed) = match self.inner.invoker.backend().list_models().await {
            Ok(models) => {
                let installed = models.iter().any(|name| {
                    name.eq_ignore_ascii_case(&model_id)
                        || descriptor.as_ref().is_some_and(|d| d.matches(name))
                });
                (true, installed)
            }
            Err(error) => {
                tracing::warn!("获取模型列表失败: {}", error);
                (false, false)
            }
        };

        ModelInfo {
            supported_languages: self
                .inner
                .registry
                .supported_by_model(&model_id)
                .into_iter()
                .collect(),
            model_id,
            descriptor,
            installed,
            backend_available,
        }
    }

    /// 获取服务健康状态
    ///
    /// 检查推理服务是否可达以及缓存存储是否可读。
    ///
    /// - `Healthy`: 所有组件正常工作
    /// - `Degraded`: 缓存不可用，翻译仍可直接走推理
    /// - `Unhealthy`: 推理服务不可达
    pub async fn health(&self) -> HealthStatus {
        let mut components = HashMap::new();

        let backend_level = if self.inner.invoker.backend().is_available().await {
            HealthLevel::Healthy
        } else {
            HealthLevel::Unhealthy
        };
        components.insert("inference".to_string(), backend_level);

        if let Some(cache) = &self.inner.cache {
            let cache_level = match cache.stats() {
                Ok(_) => HealthLevel::Healthy,
                Err(error) => {
                    tracing::warn!("缓存健康检查失败: {}", error);
                    HealthLevel::Degraded
                }
            };
            components.insert("cache".to_string(), cache_level);
        }

        components.insert("gate".to_string(), HealthLevel::Healthy);

        HealthStatus::from_components(components)
    }

    /// 运行时统计快照
    pub fn stats(&self) -> ServiceStatsSnapshot {
        let mut snapshot = self.inner.stats.snapshot();
        snapshot.in_flight = self.inner.in_flight.len();
        snapshot
    }
}

fn resolve_source(source_lang: Option<&str>) -> String {
    match source_lang.map(normalize_code) {
        Some(code) if !code.is_empty() => code,
        _ => AUTO_LANGUAGE.to_string(),
    }
}

/// 模型信息
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_id: String,
    pub descriptor: Option<ModelDescriptor>,
    pub installed: bool,
    pub backend_available: bool,
    pub supported_languages: Vec<String>,
}

// ============================================================================
// 统计
// ============================================================================

/// 翻译服务统计信息（线程安全版本）
///
/// 所有字段都是原子类型，任意数量的并发请求可以无锁更新。
///
/// - `requests`: `translate_one` 调用次数（批量和多语言请求按条计数）
/// - `cache_hits` / `cache_misses`: 缓存命中与未命中
/// - `inference_calls`: 实际启动的模型计算次数
/// - `deduplicated`: 合并到进行中计算的请求数
/// - `translations_completed` / `errors_encountered`: 成功与失败的请求数
/// - `processing_time`: 累计处理时间（微秒）
#[derive(Debug, Default)]
pub struct ServiceStats {
    pub requests: AtomicUsize,
    pub cache_hits: AtomicUsize,
    pub cache_misses: AtomicUsize,
    pub inference_calls: AtomicUsize,
    pub deduplicated: AtomicUsize,
    pub translations_completed: AtomicUsize,
    pub errors_encountered: AtomicUsize,
    pub processing_time: AtomicU64,
}

impl ServiceStats {
    pub fn inc_requests(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_inference_calls(&self) {
        self.inference_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_deduplicated(&self) {
        self.deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_translations_completed(&self) {
        self.translations_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_errors(&self) {
        self.errors_encountered.fetch_add(1, Ordering::Relaxed);
    }

    /// 累加处理时间（微秒精度）
    pub fn add_processing_time(&self, duration: Duration) {
        self.processing_time
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// 获取统计数据快照
    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            inference_calls: self.inference_calls.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            translations_completed: self.translations_completed.load(Ordering::Relaxed),
            errors_encountered: self.errors_encountered.load(Ordering::Relaxed),
            processing_time_ms: self.processing_time.load(Ordering::Relaxed) / 1000,
            in_flight: 0,
        }
    }
}

/// 翻译服务统计数据的不可变快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceStatsSnapshot {
    pub requests: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub inference_calls: usize,
    pub deduplicated: usize,
    pub translations_completed: usize,
    pub errors_encountered: usize,
    pub processing_time_ms: u64,
    pub in_flight: usize,
}

impl ServiceStatsSnapshot {
    /// 本进程内的缓存命中率
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

// ============================================================================
// 健康状态
// ============================================================================

/// 翻译服务的健康状态报告
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// 整体健康级别
    pub overall: HealthLevel,
    /// 各组件的健康级别
    pub components: HashMap<String, HealthLevel>,
}

impl HealthStatus {
    /// 根据组件状态汇总整体状态
    pub fn from_components(components: HashMap<String, HealthLevel>) -> Self {
        let overall = if components.values().all(|&level| level == HealthLevel::Healthy) {
            HealthLevel::Healthy
        } else if components
            .values()
            .any(|&level| level == HealthLevel::Unhealthy)
        {
            // 任何组件不健康都会导致整体不健康
            HealthLevel::Unhealthy
        } else {
            HealthLevel::Degraded
        };

        Self {
            overall,
            components,
        }
    }
}

/// 健康状态级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Unhealthy,
}
