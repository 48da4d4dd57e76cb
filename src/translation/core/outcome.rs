//! 翻译结果

use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::translation::error::{ErrorKind, TranslationError};

/// 单个翻译请求的结果
///
/// 成功时 `translated_text` 为 `Some`，失败时 `error` 为 `Some`；
/// 批量和多语言请求中失败只影响对应的那一项。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationOutcome {
    pub translated_text: Option<String>,
    pub source_language_used: String,
    pub target_language: String,
    pub model_used: String,
    pub confidence_score: Option<f32>,
    pub from_cache: bool,
    #[serde(serialize_with = "serialize_millis", rename = "processing_time_ms")]
    pub processing_time: Duration,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<TranslationError>,
}

impl TranslationOutcome {
    pub fn success(
        translated_text: String,
        source_language_used: &str,
        target_language: &str,
        model_used: &str,
        confidence_score: Option<f32>,
        from_cache: bool,
    ) -> Self {
        Self {
            translated_text: Some(translated_text),
            source_language_used: source_language_used.to_string(),
            target_language: target_language.to_string(),
            model_used: model_used.to_string(),
            confidence_score,
            from_cache,
            processing_time: Duration::ZERO,
            error: None,
        }
    }

    pub fn failure(
        error: TranslationError,
        source_language_used: &str,
        target_language: &str,
        model_used: &str,
    ) -> Self {
        Self {
            translated_text: None,
            source_language_used: source_language_used.to_string(),
            target_language: target_language.to_string(),
            model_used: model_used.to_string(),
            confidence_score: None,
            from_cache: false,
            processing_time: Duration::ZERO,
            error: Some(error),
        }
    }

    pub fn with_processing_time(mut self, elapsed: Duration) -> Self {
        self.processing_time = elapsed;
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.translated_text.is_some()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(TranslationError::kind)
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

fn serialize_error<S: Serializer>(
    error: &Option<TranslationError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(error) => serializer.serialize_some(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_and_failure() {
        let ok = TranslationOutcome::success("Xin chào".into(), "en", "vi", "llama2", None, true);
        assert!(ok.is_success());
        assert_eq!(ok.error_kind(), None);

        let failed =
            TranslationOutcome::failure(TranslationError::EmptyInput, "auto", "vi", "llama2");
        assert!(!failed.is_success());
        assert_eq!(failed.error_kind(), Some(ErrorKind::EmptyInput));
    }

    #[test]
    fn test_json_shape() {
        let outcome = TranslationOutcome::success("Hallo".into(), "en", "de", "llama2", Some(0.5), false)
            .with_processing_time(Duration::from_millis(42));
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["translated_text"], "Hallo");
        assert_eq!(value["processing_time_ms"], 42);
        assert!(value["error"].is_null());
    }
}
