use std::env;
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "llama3.2:1b";
pub const DEFAULT_STORE_FILE: &str = "Articles_llm.json";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Runtime settings taken from the environment.
///
/// Base URLs are overridable so tests can point the client at a local mock server.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub ollama_base_url: String,
    pub gemini_base_url: String,
    pub gemini_api_key: Option<String>,
    pub store_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            gemini_api_key: None,
            store_path: PathBuf::from(".").join(DEFAULT_STORE_FILE),
        }
    }
}

impl Settings {
    /// Read `OLLAMA_BASE_URL`, `GEMINI_BASE_URL`, `GEMINI_API_KEY` and `SABIM_STORE`,
    /// falling back to the defaults for anything unset or blank.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ollama_base_url: non_blank_var("OLLAMA_BASE_URL").unwrap_or(defaults.ollama_base_url),
            gemini_base_url: non_blank_var("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            gemini_api_key: non_blank_var("GEMINI_API_KEY"),
            store_path: non_blank_var("SABIM_STORE")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
        }
    }
}

fn non_blank_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
