//! 语言与模型注册表
//!
//! 静态的语言代码 → 显示名称映射，以及每个模型支持的语言集合。

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::config::constants::AUTO_LANGUAGE;

/// 默认支持的语言（代码, 显示名称）
const DEFAULT_LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("vi", "Vietnamese"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("ru", "Russian"),
    ("fa", "Persian"),
    ("zh", "Chinese"),
    ("th", "Thai"),
    ("id", "Indonesian"),
    ("ms", "Malay"),
    ("de", "German"),
    ("fr", "French"),
    ("es", "Spanish"),
    ("it", "Italian"),
];

/// 模型描述
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDescriptor {
    /// 注册表中的键
    pub key: String,
    /// 推理服务中的模型标签
    pub name: String,
    pub provider: String,
    pub size: String,
    pub languages: Vec<String>,
    pub description: String,
}

impl ModelDescriptor {
    fn new(
        key: &str,
        name: &str,
        provider: &str,
        size: &str,
        languages: &[&str],
        description: &str,
    ) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            provider: provider.to_string(),
            size: size.to_string(),
            languages: languages.iter().map(|code| code.to_string()).collect(),
            description: description.to_string(),
        }
    }

    /// 模型标识是否指向该描述（按键或标签匹配，忽略大小写）
    pub fn matches(&self, model_id: &str) -> bool {
        let id = model_id.trim();
        self.key.eq_ignore_ascii_case(id) || self.name.eq_ignore_ascii_case(id)
    }

    pub fn supports(&self, code: &str) -> bool {
        self.languages.iter().any(|lang| lang == code)
    }
}

/// 语言注册表
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: BTreeMap<String, String>,
    models: Vec<ModelDescriptor>,
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        let all: Vec<&str> = DEFAULT_LANGUAGES.iter().map(|(code, _)| *code).collect();

        let models = vec![
            ModelDescriptor::new(
                "llama2",
                "llama2:latest",
                "ollama",
                "3.8GB",
                &all,
                "Meta Llama2 model - High quality general purpose model for translation",
            ),
            ModelDescriptor::new(
                "nllb-200",
                "nllb-200-distilled-600M",
                "ollama",
                "600M",
                &all,
                "Meta NLLB-200 distilled model - Best for multilingual translation",
            ),
            ModelDescriptor::new(
                "nllb-200-large",
                "nllb-200-1.3B",
                "ollama",
                "1.3B",
                &all,
                "Meta NLLB-200 large model - Higher quality, more resource intensive",
            ),
            ModelDescriptor::new(
                "mt5-base",
                "mt5-base",
                "huggingface",
                "580M",
                &all[..10],
                "Google mT5 base model - Good balance of quality and speed",
            ),
        ];

        Self::new(
            DEFAULT_LANGUAGES
                .iter()
                .map(|(code, name)| (code.to_string(), name.to_string())),
            models,
        )
    }
}

impl LanguageRegistry {
    /// 创建自定义注册表；语言代码统一转为小写
    pub fn new<I>(languages: I, models: Vec<ModelDescriptor>) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            languages: languages
                .into_iter()
                .map(|(code, name)| (normalize_code(&code), name))
                .collect(),
            models,
        }
    }

    pub fn is_supported(&self, code: &str) -> bool {
        self.languages.contains_key(&normalize_code(code))
    }

    pub fn display_name(&self, code: &str) -> Option<&str> {
        self.languages.get(&normalize_code(code)).map(String::as_str)
    }

    /// 提示词中使用的语言名称，未注册时原样返回代码
    pub fn prompt_name<'a>(&'a self, code: &'a str) -> &'a str {
        self.display_name(code).unwrap_or(code)
    }

    pub fn all_codes(&self) -> BTreeSet<String> {
        self.languages.keys().cloned().collect()
    }

    pub fn languages(&self) -> &BTreeMap<String, String> {
        &self.languages
    }

    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    pub fn model(&self, model_id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|model| model.matches(model_id))
    }

    /// 模型支持的语言集合；未知模型回退到全部已注册语言
    pub fn supported_by_model(&self, model_id: &str) -> BTreeSet<String> {
        match self.model(model_id) {
            Some(model) => model
                .languages
                .iter()
                .filter(|code| self.languages.contains_key(*code))
                .cloned()
                .collect(),
            None => self.all_codes(),
        }
    }

    pub fn model_supports(&self, model_id: &str, code: &str) -> bool {
        let code = normalize_code(code);
        match self.model(model_id) {
            Some(model) => model.supports(&code),
            None => self.languages.contains_key(&code),
        }
    }

    /// 将模型回答解析为已注册的语言代码
    ///
    /// 接受代码（`"ja"`）或显示名称（`"Japanese"`），也会在较长的回答中
    /// 查找第一个可识别的词。无法识别时返回 `None`。
    pub fn resolve_code(&self, answer: &str) -> Option<String> {
        let cleaned = answer
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if cleaned.is_empty() || cleaned == AUTO_LANGUAGE {
            return None;
        }

        if let Some(code) = self.by_code(&cleaned).or_else(|| self.by_name(&cleaned)) {
            return Some(code);
        }

        // 名称优先于代码，避免 "It is Japanese" 被识别为 it
        let words: Vec<&str> = cleaned
            .split(|c: char| !c.is_alphabetic())
            .filter(|word| !word.is_empty())
            .collect();
        words
            .iter()
            .find_map(|word| self.by_name(word))
            .or_else(|| words.iter().find_map(|word| self.by_code(word)))
    }

    fn by_code(&self, word: &str) -> Option<String> {
        self.languages
            .contains_key(word)
            .then(|| word.to_string())
    }

    fn by_name(&self, word: &str) -> Option<String> {
        self.languages
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(word))
            .map(|(code, _)| code.clone())
    }
}

/// 规范化语言代码：去除空白并转为小写
pub fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}
