use std::env;
use std::time::Duration;

use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};
use swarnam_contracts::{ImageRef, JewelryAnalysis, DEFAULT_IMAGE_MIME};
use tracing::debug;

use crate::client::{AnalysisClient, VisualizationClient, VisualizationRequest};
use crate::error::{AnalysisFailure, GenerationFailure, InferenceError};
use crate::prompts::{visualization_prompt, ANALYSIS_INSTRUCTION};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_ASPECT_RATIO: &str = "3:4";

const SERVICE: &str = "Gemini";
const API_KEY_HEADER: &str = "x-goog-api-key";
const DEFAULT_REQUEST_TIMEOUT_S: f64 = 90.0;
const ERROR_BODY_MAX_CHARS: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub struct GeminiConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub analysis_model: String,
    pub image_model: String,
    pub aspect_ratio: String,
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            request_timeout: Duration::from_secs_f64(DEFAULT_REQUEST_TIMEOUT_S),
        }
    }
}

impl GeminiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base: non_empty_env("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            api_key: first_non_empty_env(&["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"]),
            analysis_model: non_empty_env("SWARNAM_ANALYSIS_MODEL")
                .unwrap_or(defaults.analysis_model),
            image_model: non_empty_env("SWARNAM_IMAGE_MODEL").unwrap_or(defaults.image_model),
            aspect_ratio: defaults.aspect_ratio,
            request_timeout: request_timeout_from(
                non_empty_env("SWARNAM_REQUEST_TIMEOUT").as_deref(),
            ),
        }
    }
}

/// Seconds, clamped to 15..=300; unparseable values use the default.
pub fn request_timeout_from(raw: Option<&str>) -> Duration {
    let seconds = raw
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_S)
        .clamp(15.0, 300.0);
    Duration::from_secs_f64(seconds)
}

/// Both capabilities over the Gemini `generateContent` endpoint.
pub struct GeminiService {
    config: GeminiConfig,
    api_key: String,
    http: HttpClient,
}

impl GeminiService {
    pub fn new(config: GeminiConfig) -> Result<Self, InferenceError> {
        let http = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(InferenceError::Client)?;
        Self::with_http_client(config, http)
    }

    pub fn with_http_client(config: GeminiConfig, http: HttpClient) -> Result<Self, InferenceError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(InferenceError::MissingApiKey)?;
        Ok(Self {
            config,
            api_key,
            http,
        })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!(
            "{}/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            model_path
        )
    }

    fn post(&self, endpoint: &str, payload: &Value) -> Result<Value, InferenceError> {
        debug!(endpoint, "dispatching {SERVICE} request");
        let response = self
            .http
            .post(endpoint)
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(payload)
            .send()
            .map_err(|source| InferenceError::Transport {
                service: SERVICE,
                endpoint: endpoint.to_string(),
                source: source.without_url(),
            })?;
        response_json_or_error(endpoint, response)
    }
}

impl AnalysisClient for GeminiService {
    fn analyze(&self, image: &ImageRef) -> Result<JewelryAnalysis, AnalysisFailure> {
        let endpoint = self.endpoint_for_model(&self.config.analysis_model);
        let response = self.post(&endpoint, &analysis_payload(image))?;
        parse_analysis(&response)
    }
}

impl VisualizationClient for GeminiService {
    fn generate(&self, request: &VisualizationRequest<'_>) -> Result<ImageRef, GenerationFailure> {
        let endpoint = self.endpoint_for_model(&self.config.image_model);
        let payload = visualization_payload(request, &self.config.aspect_ratio);
        let response = self.post(&endpoint, &payload)?;
        extract_inline_image(&response).ok_or(GenerationFailure::NoImage)
    }
}

fn inline_image_part(image: &ImageRef) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type(),
            "data": image.base64_payload(),
        }
    })
}

fn analysis_payload(image: &ImageRef) -> Value {
    let text_field = json!({ "type": "STRING" });
    json!({
        "contents": [{
            "role": "user",
            "parts": [inline_image_part(image), { "text": ANALYSIS_INSTRUCTION }],
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "type": text_field,
                    "material": text_field,
                    "style": text_field,
                    "description": text_field,
                },
                "required": ["type", "material", "style", "description"],
            },
        },
    })
}

fn visualization_payload(request: &VisualizationRequest<'_>, aspect_ratio: &str) -> Value {
    let prompt = visualization_prompt(request.analysis, request.scenario, request.shot);
    json!({
        "contents": [{
            "role": "user",
            "parts": [inline_image_part(request.image), { "text": prompt }],
        }],
        "generationConfig": {
            "imageConfig": { "aspectRatio": aspect_ratio },
        },
    })
}

fn candidate_parts<'a>(response: &'a Value) -> impl Iterator<Item = &'a Value> + 'a {
    response
        .get("candidates")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|candidate| candidate.get("content"))
        .filter_map(|content| content.get("parts"))
        .filter_map(Value::as_array)
        .flatten()
}

fn first_candidate_text(response: &Value) -> String {
    response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn parse_analysis(response: &Value) -> Result<JewelryAnalysis, AnalysisFailure> {
    let text = first_candidate_text(response);
    let body = strip_code_fence(text.trim());
    if body.is_empty() {
        return Err(AnalysisFailure::EmptyResponse);
    }
    serde_json::from_str(body).map_err(AnalysisFailure::Malformed)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn extract_inline_image(response: &Value) -> Option<ImageRef> {
    candidate_parts(response).find_map(|part| {
        let inline = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))?;
        let data = inline.get("data").and_then(Value::as_str)?.trim();
        if data.is_empty() {
            return None;
        }
        let mime = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(DEFAULT_IMAGE_MIME);
        Some(ImageRef::parse(&format!("data:{mime};base64,{data}")))
    })
}

fn response_json_or_error(endpoint: &str, response: HttpResponse) -> Result<Value, InferenceError> {
    let status = response.status();
    let body = response.text().map_err(|source| InferenceError::Transport {
        service: SERVICE,
        endpoint: endpoint.to_string(),
        source: source.without_url(),
    })?;
    if !status.is_success() {
        return Err(InferenceError::Status {
            service: SERVICE,
            code: status.as_u16(),
            body: truncate_text(&body, ERROR_BODY_MAX_CHARS),
        });
    }
    serde_json::from_str(&body).map_err(|source| InferenceError::InvalidJson {
        service: SERVICE,
        source,
    })
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn first_non_empty_env(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| non_empty_env(key))
}
