//! 缓存键
//!
//! 翻译请求的规范化标识：源文本去除首尾空白（不改变大小写），
//! 语言代码去除空白并转为小写。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::translation::languages::normalize_code;

/// 规范化的翻译请求标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TranslationKey {
    text: String,
    source_lang: String,
    target_lang: String,
}

impl TranslationKey {
    pub fn new(text: &str, source_lang: &str, target_lang: &str) -> Self {
        Self {
            text: text.trim().to_string(),
            source_lang: normalize_code(source_lang),
            target_lang: normalize_code(target_lang),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source_lang(&self) -> &str {
        &self.source_lang
    }

    pub fn target_lang(&self) -> &str {
        &self.target_lang
    }

    /// 语言对标签，如 `en->vi`
    pub fn language_pair(&self) -> String {
        format!("{}->{}", self.source_lang, self.target_lang)
    }

    /// 稳定的存储键（blake3 十六进制摘要）
    ///
    /// 各字段以长度前缀写入哈希器，不同的字段切分不会产生相同的摘要。
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for part in [&self.source_lang, &self.target_lang, &self.text] {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

impl fmt::Display for TranslationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview: String = self.text.chars().take(32).collect();
        write!(f, "[{}] {}", self.language_pair(), preview)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        let a = TranslationKey::new("  Hello world \n", "EN", " vi ");
        let b = TranslationKey::new("Hello world", "en", "vi");
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_text_case_is_preserved() {
        let a = TranslationKey::new("Hello", "en", "vi");
        let b = TranslationKey::new("hello", "en", "vi");
        assert_ne!(a, b);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_separates_fields() {
        let a = TranslationKey::new("x", "en", "vi");
        let b = TranslationKey::new("x", "env", "i");
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_language_pair() {
        let key = TranslationKey::new("Hi", "auto", "JA");
        assert_eq!(key.language_pair(), "auto->ja");
    }
}
