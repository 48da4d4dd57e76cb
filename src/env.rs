//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问。变量名沿用本地推理部署的惯例
//! （`OLLAMA_BASE_URL`、`TRANSLATION_CACHE_TTL` 等），便于与现有 `.env` 文件共用。

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    /// 仅在变量被显式设置时返回值，未设置时返回 `None`
    ///
    /// 配置覆盖使用此方法，避免默认值覆盖配置文件中的取值。
    fn get_if_set() -> EnvResult<Option<T>> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value).map(Some),
            Err(_) => Ok(None),
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "LOG_LEVEL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.trim().to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }
}

/// 推理后端（Ollama）相关环境变量
pub mod ollama {
    use super::*;

    /// 推理服务地址
    pub struct BaseUrl;
    impl EnvVar<String> for BaseUrl {
        const NAME: &'static str = "OLLAMA_BASE_URL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("http://localhost:11434".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Base URL of the local Ollama server";

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim().trim_end_matches('/');
            if url.starts_with("http://") || url.starts_with("https://") {
                Ok(url.to_string())
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Base URL must start with http:// or https://".to_string(),
                })
            }
        }
    }

    /// 推理超时
    pub struct Timeout;
    impl EnvVar<Duration> for Timeout {
        const NAME: &'static str = "OLLAMA_TIMEOUT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(300));
        const DESCRIPTION: &'static str = "Inference timeout in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds = parse_positive_usize(value.trim(), Self::NAME, 1, 3600)?;
            Ok(Duration::from_secs(seconds as u64))
        }
    }

    /// 默认翻译模型
    pub struct DefaultModel;
    impl EnvVar<String> for DefaultModel {
        const NAME: &'static str = "DEFAULT_TRANSLATION_MODEL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("llama2:latest".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Model identifier used for translation";

        fn parse(value: &str) -> EnvResult<String> {
            let model = value.trim();
            if model.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Model identifier cannot be empty".to_string(),
                });
            }
            Ok(model.to_string())
        }
    }
}

/// 翻译相关环境变量
pub mod translation {
    use super::*;

    /// 最大并发翻译数
    pub struct MaxConcurrent;
    impl EnvVar<usize> for MaxConcurrent {
        const NAME: &'static str = "MAX_CONCURRENT_TRANSLATIONS";
        const DEFAULT: Option<usize> = Some(3);
        const DESCRIPTION: &'static str = "Maximum in-flight inference calls";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value.trim(), Self::NAME, 1, 64)
        }
    }

    /// 单次翻译的最大字符数
    pub struct MaxTextLength;
    impl EnvVar<usize> for MaxTextLength {
        const NAME: &'static str = "MAX_TEXT_LENGTH";
        const DEFAULT: Option<usize> = Some(4000);
        const DESCRIPTION: &'static str = "Maximum characters per translation request";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value.trim(), Self::NAME, 1, 1_000_000)
        }
    }
}

/// 缓存相关环境变量
pub mod cache {
    use super::*;

    /// 缓存启用状态
    pub struct Enabled;
    impl EnvVar<bool> for Enabled {
        const NAME: &'static str = "TRANSLATION_CACHE";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Enable the translation cache";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value.trim(), Self::NAME)
        }
    }

    /// 缓存TTL
    pub struct Ttl;
    impl EnvVar<Duration> for Ttl {
        const NAME: &'static str = "TRANSLATION_CACHE_TTL";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(86400));
        const DESCRIPTION: &'static str = "Cache TTL in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds: u64 = value.trim().parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a valid number of seconds".to_string(),
            })?;

            if seconds == 0 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "TTL must be greater than 0".to_string(),
                });
            }

            if seconds > 86400 * 365 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "TTL too long (maximum 365 days)".to_string(),
                });
            }

            Ok(Duration::from_secs(seconds))
        }
    }

    /// 磁盘缓存文件路径
    pub struct Path;
    impl EnvVar<String> for Path {
        const NAME: &'static str = "TRANSLATION_CACHE_PATH";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Path of the on-disk translation cache (redb file)";

        fn parse(value: &str) -> EnvResult<String> {
            let path = value.trim();
            if path.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Path cannot be empty".to_string(),
                });
            }
            Ok(shellexpand::tilde(path).into_owned())
        }
    }
}

/// 辅助函数
fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");

    docs.push_str("## Core\n\n");
    docs.push_str(&format!(
        "- `{}`: {}\n",
        core::LogLevel::NAME,
        core::LogLevel::DESCRIPTION
    ));

    docs.push_str("\n## Inference backend\n\n");
    docs.push_str(&format!(
        "- `{}`: {}\n",
        ollama::BaseUrl::NAME,
        ollama::BaseUrl::DESCRIPTION
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        ollama::Timeout::NAME,
        ollama::Timeout::DESCRIPTION,
        ollama::Timeout::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {}\n",
        ollama::DefaultModel::NAME,
        ollama::DefaultModel::DESCRIPTION
    ));

    docs.push_str("\n## Translation\n\n");
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        translation::MaxConcurrent::NAME,
        translation::MaxConcurrent::DESCRIPTION,
        translation::MaxConcurrent::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        translation::MaxTextLength::NAME,
        translation::MaxTextLength::DESCRIPTION,
        translation::MaxTextLength::DEFAULT
    ));

    docs.push_str("\n## Cache\n\n");
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        cache::Enabled::NAME,
        cache::Enabled::DESCRIPTION,
        cache::Enabled::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        cache::Ttl::NAME,
        cache::Ttl::DESCRIPTION,
        cache::Ttl::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {}\n",
        cache::Path::NAME,
        cache::Path::DESCRIPTION
    ));

    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(core::LogLevel::parse("DEBUG").unwrap(), "debug");
        assert_eq!(core::LogLevel::parse(" warn ").unwrap(), "warn");
        assert!(core::LogLevel::parse("verbose").is_err());
    }

    #[test]
    fn test_boolean_parsing() {
        assert!(cache::Enabled::parse("true").unwrap());
        assert!(cache::Enabled::parse("1").unwrap());
        assert!(cache::Enabled::parse("YES").unwrap());
        assert!(!cache::Enabled::parse("off").unwrap());
        assert!(!cache::Enabled::parse("False").unwrap());

        assert!(cache::Enabled::parse("maybe").is_err());
    }

    #[test]
    fn test_url_validation() {
        assert_eq!(
            ollama::BaseUrl::parse("http://localhost:11434/").unwrap(),
            "http://localhost:11434"
        );
        assert!(ollama::BaseUrl::parse("https://gpu-box.lan").is_ok());

        assert!(ollama::BaseUrl::parse("localhost:11434").is_err());
        assert!(ollama::BaseUrl::parse("ftp://example.com").is_err());
    }

    #[test]
    fn test_numeric_validation() {
        assert_eq!(translation::MaxConcurrent::parse("3").unwrap(), 3);
        assert!(translation::MaxConcurrent::parse("0").is_err());
        assert!(translation::MaxConcurrent::parse("65").is_err());
        assert!(translation::MaxTextLength::parse("abc").is_err());

        assert_eq!(
            ollama::Timeout::parse("120").unwrap(),
            Duration::from_secs(120)
        );
        assert!(ollama::Timeout::parse("0").is_err());
    }

    #[test]
    fn test_ttl_bounds() {
        assert_eq!(cache::Ttl::parse("86400").unwrap(), Duration::from_secs(86400));
        assert!(cache::Ttl::parse("0").is_err());
        assert!(cache::Ttl::parse(&(86400u64 * 366).to_string()).is_err());
    }

    #[test]
    fn test_model_must_not_be_blank() {
        assert_eq!(
            ollama::DefaultModel::parse(" nllb-200 ").unwrap(),
            "nllb-200"
        );
        assert!(ollama::DefaultModel::parse("   ").is_err());
    }

    #[test]
    fn test_env_docs_mention_every_variable() {
        let docs = generate_env_docs();
        for name in [
            core::LogLevel::NAME,
            ollama::BaseUrl::NAME,
            ollama::Timeout::NAME,
            ollama::DefaultModel::NAME,
            translation::MaxConcurrent::NAME,
            translation::MaxTextLength::NAME,
            cache::Enabled::NAME,
            cache::Ttl::NAME,
            cache::Path::NAME,
        ] {
            assert!(docs.contains(name), "missing {}", name);
        }
    }
}
