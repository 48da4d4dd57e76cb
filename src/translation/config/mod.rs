//! 翻译配置管理模块
//!
//! 提供简化的配置管理，支持环境变量、配置文件和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{ConfigManager, TranslationConfig};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 并发与输入限制
    pub const DEFAULT_MAX_CONCURRENT_TRANSLATIONS: usize = 3;
    pub const MAX_CONCURRENT_TRANSLATIONS_LIMIT: usize = 64;
    pub const DEFAULT_MAX_TEXT_LENGTH: usize = 4000;

    // 推理服务
    pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
    pub const DEFAULT_MODEL_ID: &str = "llama2:latest";
    pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_secs(300);

    // 生成参数
    pub const GENERATION_TEMPERATURE: f32 = 0.3;
    pub const GENERATION_TOP_P: f32 = 0.9;
    pub const GENERATION_MAX_TOKENS: u32 = 1000;

    // 缓存设置
    pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(86400); // 24小时
    pub const MAX_CACHE_TTL: Duration = Duration::from_secs(86400 * 365);
    pub const CACHE_FILE_NAME: &str = "translations.redb";
    pub const TOP_LANGUAGE_PAIRS: usize = 5;

    /// 自动检测源语言的占位代码
    pub const AUTO_LANGUAGE: &str = "auto";

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "translator.toml",
        ".translator.toml",
        "~/.config/local-translator/config.toml",
    ];

    // .env 文件搜索顺序
    pub const ENV_FILES: &[&str] = &[".env.local", ".env"];
}

/// 便利函数
pub fn config_file_exists() -> bool {
    constants::CONFIG_PATHS
        .iter()
        .any(|path| std::path::Path::new(shellexpand::tilde(path).as_ref()).exists())
}

/// 加载配置，失败时回退到默认配置
pub fn load_translation_config() -> TranslationConfig {
    match ConfigManager::new() {
        Ok(manager) => manager.into_config(),
        Err(e) => {
            tracing::warn!("配置加载失败，使用默认配置: {}", e);
            TranslationConfig::default()
        }
    }
}
