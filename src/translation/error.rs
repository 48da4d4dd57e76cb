//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制。错误类型需要 `Clone`，
//! 因为同一个推理结果（包括失败）会分发给所有等待同一缓存键的调用方。

use std::fmt;

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// 语言代码未注册或模型不支持
    #[error("不支持的语言: {0}")]
    UnsupportedLanguage(String),

    /// 文本超过长度上限
    #[error("文本过长: {length} 字符 (上限 {max})")]
    TextTooLong { length: usize, max: usize },

    /// 空文本或仅包含空白字符
    #[error("输入文本为空")]
    EmptyInput,

    /// 推理服务无法访问
    #[error("推理服务不可用: {0}")]
    BackendUnavailable(String),

    /// 推理超时
    #[error("推理超时: {0}")]
    Timeout(String),

    /// 推理响应无法解析为可用文本
    #[error("推理响应无效: {0}")]
    MalformedResponse(String),

    /// 缓存存储不可用
    #[error("缓存存储不可用: {0}")]
    StoreUnavailable(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

/// 错误种类（不带消息的判别值，便于断言和统计）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedLanguage,
    TextTooLong,
    EmptyInput,
    BackendUnavailable,
    Timeout,
    MalformedResponse,
    StoreUnavailable,
    Config,
    Internal,
}

impl TranslationError {
    /// 获取错误种类
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranslationError::UnsupportedLanguage(_) => ErrorKind::UnsupportedLanguage,
            TranslationError::TextTooLong { .. } => ErrorKind::TextTooLong,
            TranslationError::EmptyInput => ErrorKind::EmptyInput,
            TranslationError::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            TranslationError::Timeout(_) => ErrorKind::Timeout,
            TranslationError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            TranslationError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            TranslationError::ConfigError(_) => ErrorKind::Config,
            TranslationError::InternalError(_) => ErrorKind::Internal,
        }
    }

    /// 检查错误是否可重试
    ///
    /// 只有超时会被推理调用器重试一次。
    pub fn is_retryable(&self) -> bool {
        matches!(self, TranslationError::Timeout(_))
    }

    /// 是否为请求校验错误
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TranslationError::UnsupportedLanguage(_)
                | TranslationError::TextTooLong { .. }
                | TranslationError::EmptyInput
        )
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::UnsupportedLanguage(_) => ErrorSeverity::Info,
            TranslationError::TextTooLong { .. } => ErrorSeverity::Info,
            TranslationError::EmptyInput => ErrorSeverity::Info,
            TranslationError::BackendUnavailable(_) => ErrorSeverity::Error,
            TranslationError::Timeout(_) => ErrorSeverity::Warning,
            TranslationError::MalformedResponse(_) => ErrorSeverity::Warning,
            TranslationError::StoreUnavailable(_) => ErrorSeverity::Warning,
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(self, context: T) -> Self {
        let wrap = |msg: String| format!("{} (上下文: {})", msg, context);

        match self {
            TranslationError::UnsupportedLanguage(msg) => {
                TranslationError::UnsupportedLanguage(wrap(msg))
            }
            TranslationError::BackendUnavailable(msg) => {
                TranslationError::BackendUnavailable(wrap(msg))
            }
            TranslationError::Timeout(msg) => TranslationError::Timeout(wrap(msg)),
            TranslationError::MalformedResponse(msg) => {
                TranslationError::MalformedResponse(wrap(msg))
            }
            TranslationError::StoreUnavailable(msg) => {
                TranslationError::StoreUnavailable(wrap(msg))
            }
            TranslationError::ConfigError(msg) => TranslationError::ConfigError(wrap(msg)),
            TranslationError::InternalError(msg) => TranslationError::InternalError(wrap(msg)),
            other @ (TranslationError::TextTooLong { .. } | TranslationError::EmptyInput) => other,
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 标准错误转换
impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::StoreUnavailable(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::MalformedResponse(format!("JSON解析错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ConfigError(format!("TOML解析错误: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::Timeout(format!("异步操作超时: {}", error))
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::Timeout(error.to_string())
        } else if error.is_decode() {
            TranslationError::MalformedResponse(error.to_string())
        } else {
            // 连接失败、DNS失败以及非成功状态码
            TranslationError::BackendUnavailable(error.to_string())
        }
    }
}

macro_rules! store_error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for TranslationError {
                fn from(error: $ty) -> Self {
                    TranslationError::StoreUnavailable(error.to_string())
                }
            }
        )*
    };
}

store_error_from!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度选择日志级别记录错误
    pub fn log_error(error: &TranslationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("翻译请求被拒绝: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
        }
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::ConfigError(msg.to_string())
    }

    /// 创建存储错误
    pub fn store_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::StoreUnavailable(msg.to_string())
    }

    /// 创建内部错误
    pub fn internal_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::InternalError(msg.to_string())
    }
}
