pub mod prompt;
pub mod response;
pub mod template;

use log::{debug, info};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::Settings;
use crate::error::{Result, SabimError};

pub use prompt::Prompt;
pub use response::parse_response;
pub use template::{analysis_field, Shape, StructuredResult, Template};

/// Text-generation backend family, resolved once from the model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Local Ollama server; no credential.
    Ollama,
    /// Google Generative Language API; needs an API key.
    Gemini,
}

impl Backend {
    /// Pick the backend from the model-name prefix (`llama*` or `gemini*`).
    pub fn from_model(model: &str) -> Result<Self> {
        let name = model.trim().to_ascii_lowercase();
        if name.starts_with("llama") {
            Ok(Backend::Ollama)
        } else if name.starts_with("gemini") {
            Ok(Backend::Gemini)
        } else {
            Err(SabimError::UnsupportedModel(model.to_string()))
        }
    }

    pub fn requires_credential(&self) -> bool {
        matches!(self, Backend::Gemini)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Ollama => write!(f, "ollama"),
            Backend::Gemini => write!(f, "gemini"),
        }
    }
}

/// Everything needed to ask the model about one article.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub prompt: &'a Prompt,
    pub title: &'a str,
    pub abstract_text: &'a str,
    pub template: &'a Template,
}

impl ChatRequest<'_> {
    pub fn compose(&self) -> String {
        self.prompt.compose(self.title, self.abstract_text, self.template)
    }
}

/// A text-generation service answering one article at a time.
pub trait ModelClient {
    /// Send the composed prompt as a single user turn and return the reply verbatim.
    fn chat(&self, request: &ChatRequest<'_>) -> Result<String>;
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

/// Blocking HTTP client for the supported backends.
///
/// One request per call: no retry, no timeout, no streaming.
pub struct LlmClient {
    backend: Backend,
    model: String,
    api_key: Option<String>,
    base_url: String,
    http: Client,
}

impl LlmClient {
    /// Build a client for `model`; `api_key` falls back to `GEMINI_API_KEY` from `settings`.
    pub fn new(model: &str, api_key: Option<String>, settings: &Settings) -> Result<Self> {
        let backend = Backend::from_model(model)?;
        let base_url = match backend {
            Backend::Ollama => settings.ollama_base_url.clone(),
            Backend::Gemini => settings.gemini_base_url.clone(),
        };
        let api_key = api_key.or_else(|| settings.gemini_api_key.clone());
        if backend.requires_credential() && api_key.is_none() {
            log::warn!("No API key configured for {} model {}", backend, model);
        }

        let http = Client::builder().timeout(None::<Duration>).build()?;
        info!("Using {} backend with model {}", backend, model);

        Ok(Self {
            backend,
            model: model.to_string(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn chat_ollama(&self, content: String) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let body = OllamaChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content,
            }],
            stream: false,
        };

        debug!("POST {}", url);
        let response = self.http.post(&url).json(&body).send()?;
        let reply: OllamaChatResponse = check_status(response)?.json()?;
        Ok(reply.message.content)
    }

    fn chat_gemini(&self, content: String) -> Result<String> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart { text: content }],
            }],
        };

        debug!("POST {}", url);
        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }
        let reply: GeminiResponse = check_status(request.send()?)?.json()?;

        match reply.candidates.into_iter().next() {
            Some(candidate) => Ok(candidate
                .content
                .parts
                .into_iter()
                .map(|part| part.text)
                .collect::<Vec<String>>()
                .join("")),
            None => {
                log::warn!("Gemini returned no candidates for model {}", self.model);
                Ok(String::new())
            }
        }
    }
}

impl ModelClient for LlmClient {
    fn chat(&self, request: &ChatRequest<'_>) -> Result<String> {
        let content = request.compose();
        match self.backend {
            Backend::Ollama => self.chat_ollama(content),
            Backend::Gemini => self.chat_gemini(content),
        }
    }
}

/// Turn a non-success reply into [`SabimError::Backend`] with the body untouched.
fn check_status(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    log::warn!("Model backend returned status {}", status);
    Err(SabimError::Backend {
        status: status.as_u16(),
        body,
    })
}
