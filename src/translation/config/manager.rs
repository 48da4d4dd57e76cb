//! 简化的配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值。
//! 优先级：默认值 < 配置文件 < `.env` / 环境变量。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::error::{TranslationError, TranslationResult};

/// 翻译配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    // 并发与输入
    pub max_concurrent_translations: usize,
    pub max_text_length: usize,

    // 推理服务
    pub ollama_base_url: String,
    pub default_model_id: String,
    pub inference_timeout_secs: u64,

    // 缓存配置
    pub cache_enabled: bool,
    pub cache_ttl_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<String>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            max_concurrent_translations: constants::DEFAULT_MAX_CONCURRENT_TRANSLATIONS,
            max_text_length: constants::DEFAULT_MAX_TEXT_LENGTH,

            ollama_base_url: constants::DEFAULT_OLLAMA_BASE_URL.to_string(),
            default_model_id: constants::DEFAULT_MODEL_ID.to_string(),
            inference_timeout_secs: constants::DEFAULT_INFERENCE_TIMEOUT.as_secs(),

            cache_enabled: true,
            cache_ttl_secs: constants::DEFAULT_CACHE_TTL.as_secs(),
            cache_path: None,
        }
    }
}

impl TranslationConfig {
    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.max_concurrent_translations == 0 {
            return Err(TranslationError::ConfigError("最大并发数不能为0".to_string()));
        }

        if self.max_concurrent_translations > constants::MAX_CONCURRENT_TRANSLATIONS_LIMIT {
            return Err(TranslationError::ConfigError(format!(
                "最大并发数不能超过 {}",
                constants::MAX_CONCURRENT_TRANSLATIONS_LIMIT
            )));
        }

        if self.max_text_length == 0 {
            return Err(TranslationError::ConfigError("最大文本长度不能为0".to_string()));
        }

        if self.cache_ttl_secs == 0 || self.cache_ttl_secs > constants::MAX_CACHE_TTL.as_secs() {
            return Err(TranslationError::ConfigError(format!(
                "缓存TTL必须在 1 秒到 {} 秒之间",
                constants::MAX_CACHE_TTL.as_secs()
            )));
        }

        if self.inference_timeout_secs == 0 {
            return Err(TranslationError::ConfigError("推理超时必须大于0".to_string()));
        }

        if self.default_model_id.trim().is_empty() {
            return Err(TranslationError::ConfigError("模型标识不能为空".to_string()));
        }

        let parsed = url::Url::parse(&self.ollama_base_url).map_err(|e| {
            TranslationError::ConfigError(format!(
                "推理服务地址无效 '{}': {}",
                self.ollama_base_url, e
            ))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TranslationError::ConfigError(format!(
                "推理服务地址必须使用 http 或 https: {}",
                self.ollama_base_url
            )));
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    ///
    /// 只有显式设置的变量会覆盖当前值；取值非法时返回配置错误。
    pub fn apply_env_overrides(&mut self) -> TranslationResult<()> {
        use crate::env::{cache, ollama, translation, EnvVar};

        let env_err = |e: crate::env::EnvError| TranslationError::ConfigError(e.to_string());

        if let Some(url) = ollama::BaseUrl::get_if_set().map_err(env_err)? {
            tracing::info!("环境变量覆盖推理服务地址: {}", url);
            self.ollama_base_url = url;
        }

        if let Some(timeout) = ollama::Timeout::get_if_set().map_err(env_err)? {
            self.inference_timeout_secs = timeout.as_secs();
        }

        if let Some(model) = ollama::DefaultModel::get_if_set().map_err(env_err)? {
            self.default_model_id = model;
        }

        if let Some(max_concurrent) = translation::MaxConcurrent::get_if_set().map_err(env_err)? {
            self.max_concurrent_translations = max_concurrent;
        }

        if let Some(max_len) = translation::MaxTextLength::get_if_set().map_err(env_err)? {
            self.max_text_length = max_len;
        }

        // 缓存相关环境变量
        if let Some(enabled) = cache::Enabled::get_if_set().map_err(env_err)? {
            self.cache_enabled = enabled;
        }

        if let Some(ttl) = cache::Ttl::get_if_set().map_err(env_err)? {
            self.cache_ttl_secs = ttl.as_secs();
        }

        if let Some(path) = cache::Path::get_if_set().map_err(env_err)? {
            self.cache_path = Some(path);
        }

        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }

    /// 磁盘缓存文件路径：显式配置优先，否则使用平台缓存目录
    pub fn resolved_cache_path(&self) -> Option<PathBuf> {
        match &self.cache_path {
            Some(path) => Some(PathBuf::from(shellexpand::tilde(path).as_ref())),
            None => default_cache_path(),
        }
    }
}

/// 平台缓存目录下的默认缓存文件
pub fn default_cache_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "local-translator")
        .map(|dirs| dirs.cache_dir().join(constants::CACHE_FILE_NAME))
}

/// 简化的配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: TranslationConfig,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// 创建新的配置管理器（搜索默认路径）
    pub fn new() -> TranslationResult<Self> {
        Self::load_dotenv();

        let (config, source) = match Self::find_config_file() {
            Some(path) => {
                tracing::info!("加载配置文件: {}", path.display());
                (Self::load_from_file(&path)?, Some(path))
            }
            None => {
                tracing::info!("未找到配置文件，使用默认配置");
                (TranslationConfig::default(), None)
            }
        };

        Self::finish(config, source)
    }

    /// 使用指定的配置文件创建配置管理器
    pub fn from_file<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        Self::load_dotenv();

        let path = PathBuf::from(shellexpand::tilde(&path.as_ref().to_string_lossy()).as_ref());
        let config = Self::load_from_file(&path)?;
        Self::finish(config, Some(path))
    }

    fn finish(mut config: TranslationConfig, source: Option<PathBuf>) -> TranslationResult<Self> {
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(Self { config, source })
    }

    /// 获取配置
    pub fn get_config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn into_config(self) -> TranslationConfig {
        self.config
    }

    /// 配置的来源文件（未找到时为 `None`）
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    fn find_config_file() -> Option<PathBuf> {
        constants::CONFIG_PATHS
            .iter()
            .map(|path| PathBuf::from(shellexpand::tilde(path).as_ref()))
            .find(|path| path.exists())
    }

    /// 从指定文件加载配置
    fn load_from_file(path: &Path) -> TranslationResult<TranslationConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslationError::ConfigError(format!("读取配置文件失败: {}", e)))?;

        // 尝试TOML格式
        if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            serde_json::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析JSON配置失败: {}", e)))
        } else {
            toml::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析TOML配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        for env_file in constants::ENV_FILES {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config<P: AsRef<Path>>(path: P) -> TranslationResult<()> {
        let config = TranslationConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| TranslationError::ConfigError(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| TranslationError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}
