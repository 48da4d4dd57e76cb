//! 翻译系统核心模块
//!
//! 请求编排、并发控制和推理调用。
//!
//! ```text
//! TranslationOrchestrator (service.rs)
//!     ├── CacheStore (storage/cache.rs)
//!     ├── ConcurrencyGate (gate.rs)
//!     └── InferenceInvoker (invoker.rs)
//!             └── InferenceBackend (backend/)
//! ```

pub mod gate;
pub mod invoker;
pub mod outcome;
pub mod service;

/// 推理并发闸门
pub use gate::{ConcurrencyGate, GatePermit};

/// 推理调用器
pub use invoker::{clean_translation, InferenceInvoker};

pub use outcome::TranslationOutcome;

/// 翻译编排服务 - 主要的对外接口
pub use service::TranslationOrchestrator;

/// 运行统计、模型信息与健康状态
pub use service::{HealthLevel, HealthStatus, ModelInfo, ServiceStats, ServiceStatsSnapshot};
