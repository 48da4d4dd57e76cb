//! 推理调用器
//!
//! 包装推理后端：超时控制、重试策略、提示词构造和响应清理。
//! 调用器本身无状态，可在多个任务间共享。

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;

use crate::translation::backend::{InferenceBackend, InferenceReply};
use crate::translation::config::constants::AUTO_LANGUAGE;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::languages::LanguageRegistry;

/// 语言检测时发送给模型的最大字符数
const DETECTION_SAMPLE_CHARS: usize = 500;

/// 推理调用器
#[derive(Clone)]
pub struct InferenceInvoker {
    backend: Arc<dyn InferenceBackend>,
    registry: Arc<LanguageRegistry>,
    timeout: Duration,
}

impl InferenceInvoker {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        registry: Arc<LanguageRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            registry,
            timeout,
        }
    }

    pub fn backend(&self) -> &Arc<dyn InferenceBackend> {
        &self.backend
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 执行一次推理，超时时重试一次
    pub async fn invoke(&self, prompt: &str, model_id: &str) -> TranslationResult<InferenceReply> {
        match self.invoke_once(prompt, model_id).await {
            Err(error) if error.is_retryable() => {
                tracing::warn!("推理调用失败，重试一次: {}", error);
                self.invoke_once(prompt, model_id).await
            }
            result => result,
        }
    }

    async fn invoke_once(&self, prompt: &str, model_id: &str) -> TranslationResult<InferenceReply> {
        metrics::counter!("translation_inference_calls_total").increment(1);

        match tokio::time::timeout(self.timeout, self.backend.generate(prompt, model_id)).await {
            Ok(result) => result,
            Err(_) => Err(TranslationError::Timeout(format!(
                "模型 {} 在 {:?} 内没有响应",
                model_id, self.timeout
            ))),
        }
    }

    /// 翻译文本并清理模型回复
    pub async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        model_id: &str,
    ) -> TranslationResult<InferenceReply> {
        let prompt = self.translation_prompt(text, source_lang, target_lang);
        let reply = self.invoke(&prompt, model_id).await?;

        let cleaned = clean_translation(&reply.text);
        if cleaned.is_empty() {
            return Err(TranslationError::MalformedResponse(
                "清理后的译文为空".to_string(),
            ));
        }

        Ok(InferenceReply {
            text: cleaned,
            confidence: reply
                .confidence
                .filter(|score| score.is_finite())
                .map(|score| score.clamp(0.0, 1.0)),
        })
    }

    /// 识别文本语言，返回已注册的语言代码
    pub async fn detect(&self, text: &str, model_id: &str) -> TranslationResult<String> {
        let prompt = self.detection_prompt(text);
        let reply = self.invoke(&prompt, model_id).await?;

        self.registry.resolve_code(&reply.text).ok_or_else(|| {
            TranslationError::MalformedResponse(format!("无法识别的语言回答: {}", reply.text.trim()))
        })
    }

    /// 构造翻译提示词；相同输入总是得到相同的提示词
    pub fn translation_prompt(&self, text: &str, source_lang: &str, target_lang: &str) -> String {
        let target_name = self.registry.prompt_name(target_lang);
        let direction = if source_lang == AUTO_LANGUAGE {
            format!("to {}", target_name)
        } else {
            format!("from {} to {}", self.registry.prompt_name(source_lang), target_name)
        };

        format!(
            "You are a professional translator. Translate the following text {}. \
             Return only the translation.\n\nText to translate: \"{}\"\n\nTranslation:",
            direction, text
        )
    }

    /// 构造语言检测提示词
    pub fn detection_prompt(&self, text: &str) -> String {
        let sample: String = text.chars().take(DETECTION_SAMPLE_CHARS).collect();
        let codes: Vec<String> = self.registry.all_codes().into_iter().collect();

        format!(
            "Identify the language of the following text. Answer with only the ISO 639-1 \
             language code, one of: {}.\n\nText: \"{}\"\n\nLanguage code:",
            codes.join(", "),
            sample
        )
    }
}

fn prefix_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?i-u)^\s*(?:translation|translated text|here is the translation|the translation is)\s*:\s*",
            )
            .ok()
        })
        .as_ref()
}

/// 清理模型回复：去掉常见的前缀和包裹整段的双引号
pub fn clean_translation(reply: &str) -> String {
    let mut text = reply.trim();

    if let Some(pattern) = prefix_pattern() {
        while let Some(found) = pattern.find(text) {
            text = text[found.end()..].trim_start();
        }
    }

    let text = text.trim();
    let text = if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        &text[1..text.len() - 1]
    } else {
        text
    };

    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_translation_prefixes() {
        assert_eq!(clean_translation("Translation: Xin chào"), "Xin chào");
        assert_eq!(clean_translation("  translated TEXT:  Hallo "), "Hallo");
        assert_eq!(
            clean_translation("Here is the translation: \"Bonjour\""),
            "Bonjour"
        );
        assert_eq!(clean_translation("The translation is: Hola"), "Hola");
        assert_eq!(clean_translation("Translation: Translated text: Ciao"), "Ciao");
    }

    #[test]
    fn test_clean_translation_keeps_inner_text() {
        assert_eq!(clean_translation("\"こんにちは\""), "こんにちは");
        assert_eq!(
            clean_translation("He said \"hi\" to me"),
            "He said \"hi\" to me"
        );
        assert_eq!(clean_translation("Translations are hard"), "Translations are hard");
        assert_eq!(clean_translation("\""), "\"");
    }

    #[test]
    fn test_clean_translation_empty() {
        assert_eq!(clean_translation("   "), "");
        assert_eq!(clean_translation("Translation:"), "");
        assert_eq!(clean_translation("\"\""), "");
    }
}
