// 集成测试公共模块
//
// 提供脚本化的假推理后端、故障存储后端和编排服务构建工具

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use local_translator::translation::{
    CacheBackend, CacheEntry, CacheStore, InferenceBackend, InferenceReply, MemoryBackend,
    TranslationConfig, TranslationError, TranslationKey, TranslationOrchestrator,
    TranslationResult,
};

/// 假后端的一步响应
#[derive(Debug, Clone)]
pub enum Step {
    /// 返回给定文本
    Reply(String),
    /// 返回错误
    Fail(TranslationError),
    /// 永不返回（由调用器超时）
    Hang,
}

/// 脚本化推理后端
///
/// 按顺序消费脚本中的响应；脚本用尽后，翻译提示词回显为
/// `Translation: "<原文> (translated)"`，检测提示词回答 `en`。
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Step>>,
    prompts: Mutex<Vec<String>>,
    delay: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    available: bool,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            available: true,
        }
    }

    pub fn with_script(self, steps: Vec<Step>) -> Self {
        *self.script.lock().unwrap() = steps.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 同时进行的调用数峰值
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn echo(prompt: &str) -> String {
        if prompt.contains("Language code:") {
            return "en".to_string();
        }

        let marker = "Text to translate: \"";
        let start = prompt.find(marker).map(|i| i + marker.len()).unwrap_or(0);
        let end = prompt.rfind("\"\n\nTranslation:").unwrap_or(prompt.len());
        format!("Translation: \"{} (translated)\"", &prompt[start..end])
    }
}

/// 调用结束（包括被取消）时减少活跃计数
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, _model_id: &str) -> TranslationResult<InferenceReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        let step = self.script.lock().unwrap().pop_front();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match step {
            Some(Step::Reply(text)) => Ok(InferenceReply::new(text)),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            None => Ok(InferenceReply::new(Self::echo(prompt))),
        }
    }

    async fn list_models(&self) -> TranslationResult<Vec<String>> {
        if self.available {
            Ok(vec!["llama2:latest".to_string()])
        } else {
            Err(TranslationError::BackendUnavailable("connection refused".to_string()))
        }
    }

    async fn is_available(&self) -> bool {
        self.available
    }
}

/// 所有操作都失败的存储后端
pub struct BrokenStore;

impl BrokenStore {
    fn down<T>() -> TranslationResult<T> {
        Err(TranslationError::StoreUnavailable("disk offline".to_string()))
    }
}

impl CacheBackend for BrokenStore {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn fetch(&self, _key: &TranslationKey) -> TranslationResult<Option<CacheEntry>> {
        Self::down()
    }

    fn upsert(&self, _entry: CacheEntry) -> TranslationResult<()> {
        Self::down()
    }

    fn touch(&self, _key: &TranslationKey, _at: DateTime<Utc>) -> TranslationResult<Option<CacheEntry>> {
        Self::down()
    }

    fn remove(&self, _key: &TranslationKey) -> TranslationResult<bool> {
        Self::down()
    }

    fn remove_where(&self, _filter: &dyn Fn(&CacheEntry) -> bool) -> TranslationResult<usize> {
        Self::down()
    }

    fn scan(&self) -> TranslationResult<Vec<CacheEntry>> {
        Self::down()
    }
}

/// 测试用配置：较短的推理超时
pub fn test_config() -> TranslationConfig {
    TranslationConfig {
        inference_timeout_secs: 5,
        ..TranslationConfig::default()
    }
}

/// 测试环境：编排服务、假后端和共享的内存存储
pub struct TestEnvironment {
    pub orchestrator: TranslationOrchestrator,
    pub backend: Arc<ScriptedBackend>,
    pub store: Arc<MemoryBackend>,
}

impl TestEnvironment {
    pub fn new(backend: ScriptedBackend) -> Self {
        Self::with_config(backend, test_config())
    }

    pub fn with_config(backend: ScriptedBackend, config: TranslationConfig) -> Self {
        let backend = Arc::new(backend);
        let store = Arc::new(MemoryBackend::new());
        let cache = CacheStore::new(store.clone(), config.cache_ttl());
        let orchestrator =
            TranslationOrchestrator::new(config, backend.clone(), Some(cache)).unwrap();

        Self {
            orchestrator,
            backend,
            store,
        }
    }

    pub fn cached(&self, text: &str, source: &str, target: &str) -> Option<CacheEntry> {
        self.store
            .fetch(&TranslationKey::new(text, source, target))
            .unwrap()
    }
}
