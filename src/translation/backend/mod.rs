//! 推理后端
//!
//! 翻译模型的外部调用接口。`OllamaBackend` 是默认实现，
//! 测试中可替换为脚本化的假后端。

pub mod ollama;

use async_trait::async_trait;

use crate::translation::error::TranslationResult;

pub use ollama::OllamaBackend;

/// 一次推理调用的原始结果
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceReply {
    pub text: String,
    /// 模型给出的置信度（0.0–1.0），后端不提供时为 `None`
    pub confidence: Option<f32>,
}

impl InferenceReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// 推理服务接口
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// 后端名称
    fn name(&self) -> &str;

    /// 以给定模型执行一次生成
    async fn generate(&self, prompt: &str, model_id: &str) -> TranslationResult<InferenceReply>;

    /// 列出服务端已安装的模型标签
    async fn list_models(&self) -> TranslationResult<Vec<String>>;

    /// 服务是否可达
    async fn is_available(&self) -> bool;
}
