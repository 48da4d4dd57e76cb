//! local-translator 命令行入口
//!
//! 结果以 JSON 输出到标准输出，日志输出到标准错误。

use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use local_translator::env::{self, EnvVar};
use local_translator::translation::{
    ConfigManager, HealthLevel, LanguageRegistry, TranslationConfig, TranslationError,
    TranslationOrchestrator, TranslationResult,
};

/// Local LLM backed text translation with a persistent translation cache
#[derive(Parser)]
#[command(name = "local-translator")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (TOML or JSON); default search paths are used otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Model identifier, overrides the configured default
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Skip the translation cache entirely
    #[arg(long, global = true)]
    no_cache: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a single text
    Translate {
        text: String,
        /// Target language code
        #[arg(short, long)]
        to: String,
        /// Source language code (auto-detected by the model when omitted)
        #[arg(short, long)]
        from: Option<String>,
    },
    /// Translate every line of a file (or stdin when no file is given)
    Batch {
        file: Option<PathBuf>,
        #[arg(short, long)]
        to: String,
        #[arg(short, long)]
        from: Option<String>,
    },
    /// Translate a text into every supported language
    All {
        text: String,
        #[arg(short, long)]
        from: Option<String>,
    },
    /// Detect the language of a text
    Detect { text: String },
    /// List supported languages
    Languages,
    /// Show model descriptors and installation status
    Models,
    /// Show translation cache statistics
    CacheStats,
    /// Delete cached translations, optionally filtered by language
    CacheClear {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// Physically remove expired cache entries
    CachePurge,
    /// Check inference backend and cache health
    Health,
    /// Write an example configuration file
    InitConfig {
        #[arg(default_value = "translator.toml")]
        path: PathBuf,
    },
    /// Print documentation for supported environment variables
    EnvDocs,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(error) => {
            tracing::error!("{}", error);
            eprintln!("error: {}", error);
            process::exit(1);
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(env::core::LogLevel::get().unwrap_or_else(|_| "info".to_string()))
        }),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> TranslationResult<TranslationConfig> {
    let manager = match &cli.config {
        Some(path) => ConfigManager::from_file(path)?,
        None => ConfigManager::new()?,
    };

    let mut config = manager.into_config();
    if let Some(model) = &cli.model {
        config.default_model_id = model.clone();
    }
    if cli.no_cache {
        config.cache_enabled = false;
    }
    config.validate()?;
    Ok(config)
}

fn orchestrator(cli: &Cli) -> TranslationResult<TranslationOrchestrator> {
    TranslationOrchestrator::from_config(load_config(cli)?)
}

fn print_json<T: Serialize>(value: &T) -> TranslationResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| TranslationError::InternalError(format!("序列化输出失败: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}

fn read_lines(file: Option<&PathBuf>) -> TranslationResult<Vec<String>> {
    let content = match file {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            TranslationError::ConfigError(format!("读取输入文件失败 {}: {}", path.display(), e))
        })?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .lock()
                .read_to_string(&mut buffer)
                .map_err(|e| TranslationError::InternalError(format!("读取标准输入失败: {}", e)))?;
            buffer
        }
    };

    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}

async fn run(cli: Cli) -> TranslationResult<i32> {
    match &cli.command {
        Commands::Translate { text, to, from } => {
            let outcome = orchestrator(&cli)?
                .translate_one(text, to, from.as_deref())
                .await;
            print_json(&outcome)?;
            Ok(if outcome.is_success() { 0 } else { 1 })
        }
        Commands::Batch { file, to, from } => {
            let lines = read_lines(file.as_ref())?;
            let outcomes = orchestrator(&cli)?
                .translate_batch(&lines, to, from.as_deref())
                .await;
            print_json(&outcomes)?;
            Ok(if outcomes.iter().all(|o| o.is_success()) { 0 } else { 1 })
        }
        Commands::All { text, from } => {
            let outcomes = orchestrator(&cli)?
                .translate_to_all_languages(text, from.as_deref())
                .await;
            print_json(&outcomes)?;
            Ok(0)
        }
        Commands::Detect { text } => {
            let code = orchestrator(&cli)?.detect_language(text).await;
            print_json(&serde_json::json!({ "language": code }))?;
            Ok(0)
        }
        Commands::Languages => {
            print_json(LanguageRegistry::default().languages())?;
            Ok(0)
        }
        Commands::Models => {
            let service = orchestrator(&cli)?;
            let mut infos = Vec::new();
            for model in service.registry().models() {
                infos.push(service.model_info(Some(model.name.as_str())).await);
            }
            print_json(&infos)?;
            Ok(0)
        }
        Commands::CacheStats => {
            print_json(&orchestrator(&cli)?.get_cache_stats()?)?;
            Ok(0)
        }
        Commands::CacheClear { from, to } => {
            let removed = orchestrator(&cli)?.clear_cache(from.as_deref(), to.as_deref())?;
            print_json(&serde_json::json!({ "removed": removed }))?;
            Ok(0)
        }
        Commands::CachePurge => {
            let removed = orchestrator(&cli)?.purge_expired_cache()?;
            print_json(&serde_json::json!({ "removed": removed }))?;
            Ok(0)
        }
        Commands::Health => {
            let health = orchestrator(&cli)?.health().await;
            print_json(&health)?;
            Ok(if health.overall == HealthLevel::Unhealthy { 1 } else { 0 })
        }
        Commands::InitConfig { path } => {
            ConfigManager::generate_example_config(path)?;
            tracing::info!("已生成示例配置文件: {}", path.display());
            Ok(0)
        }
        Commands::EnvDocs => {
            print!("{}", env::generate_env_docs());
            Ok(0)
        }
    }
}
