//! Ollama 推理后端

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{InferenceBackend, InferenceReply};
use crate::translation::config::constants;
use crate::translation::error::{TranslationError, TranslationResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Ollama HTTP 客户端
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaBackend {
    pub fn new(base_url: &str) -> TranslationResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("创建HTTP客户端失败: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, prompt: &str, model_id: &str) -> TranslationResult<InferenceReply> {
        let request = GenerateRequest {
            model: model_id,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: constants::GENERATION_TEMPERATURE,
                top_p: constants::GENERATION_TOP_P,
                num_predict: constants::GENERATION_MAX_TOKENS,
            },
        };

        let response = self
            .client
            .post(self.endpoint("/api/generate"))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, model_id, &body));
        }

        let bytes = response.bytes().await?;
        let parsed: GenerateResponse = serde_json::from_slice(&bytes)?;
        match parsed.response {
            Some(text) => Ok(InferenceReply::new(text)),
            None => Err(TranslationError::MalformedResponse(
                "响应缺少 response 字段".to_string(),
            )),
        }
    }

    async fn list_models(&self) -> TranslationResult<Vec<String>> {
        let response = self.client.get(self.endpoint("/api/tags")).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslationError::MalformedResponse(format!(
                "获取模型列表失败: HTTP {}",
                status
            )));
        }

        let bytes = response.bytes().await?;
        let tags: TagsResponse = serde_json::from_slice(&bytes)?;
        Ok(tags.models.into_iter().map(|model| model.name).collect())
    }

    async fn is_available(&self) -> bool {
        match self
            .client
            .get(self.endpoint("/api/tags"))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!("推理服务不可达: {}", e);
                false
            }
        }
    }
}

/// 服务可达但返回非成功状态：归为响应无效，而不是服务不可用
fn status_error(status: reqwest::StatusCode, model_id: &str, body: &str) -> TranslationError {
    let snippet: String = body.trim().chars().take(200).collect();

    if status == reqwest::StatusCode::NOT_FOUND {
        TranslationError::MalformedResponse(format!(
            "模型 {} 未安装 (HTTP {}): {}",
            model_id, status, snippet
        ))
    } else {
        TranslationError::MalformedResponse(format!("HTTP {}: {}", status, snippet))
    }
}
