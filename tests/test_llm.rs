use mockito::{Matcher, Server};
use sabim_ai_tools::config::Settings;
use sabim_ai_tools::llm::{Backend, ChatRequest, LlmClient, ModelClient, Prompt, Template};
use sabim_ai_tools::SabimError;
use serde_json::json;

fn request<'a>(prompt: &'a Prompt, template: &'a Template) -> ChatRequest<'a> {
    ChatRequest {
        prompt,
        title: "Electric Field Effect in Atomically Thin Carbon Films",
        abstract_text: "We describe monocrystalline graphitic films.",
        template,
    }
}

#[test]
fn test_ollama_chat_round_trip() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({"model": "llama3.2:1b", "stream": false})),
            Matcher::Regex(r#""role":"user""#.to_string()),
            Matcher::Regex("Title: Electric Field Effect".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"model": "llama3.2:1b", "message": {"role": "assistant", "content": "{\"Type\": \"experimental\"}"}, "done": true}"#)
        .create();

    let settings = Settings {
        ollama_base_url: server.url(),
        ..Settings::default()
    };
    let client = LlmClient::new("llama3.2:1b", None, &settings).unwrap();
    assert_eq!(client.backend(), Backend::Ollama);

    let prompt = Prompt::default();
    let template = Template::default();
    let reply = client.chat(&request(&prompt, &template)).unwrap();

    assert_eq!(reply, r#"{"Type": "experimental"}"#);
    mock.assert();
}

#[test]
fn test_gemini_sends_key_and_joins_parts() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1beta/models/gemini-pro:generateContent")
        .match_query(Matcher::UrlEncoded("key".to_string(), "secret".to_string()))
        .match_body(Matcher::Regex(r#""contents":\[\{"role":"user""#.to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"candidates": [{"content": {"role": "model", "parts": [{"text": "{\"Systems\": "}, {"text": "[\"2D\"]}"}]}}]}"#)
        .create();

    let settings = Settings {
        gemini_base_url: server.url(),
        ..Settings::default()
    };
    let client = LlmClient::new("gemini-pro", Some("secret".to_string()), &settings).unwrap();

    let prompt = Prompt::default();
    let template = Template::default();
    let reply = client.chat(&request(&prompt, &template)).unwrap();

    assert_eq!(reply, r#"{"Systems": ["2D"]}"#);
    mock.assert();
}

#[test]
fn test_gemini_without_candidates_replies_empty() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1beta/models/gemini-pro:generateContent")
        .match_query(Matcher::UrlEncoded("key".to_string(), "secret".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#)
        .create();

    let settings = Settings {
        gemini_base_url: server.url(),
        ..Settings::default()
    };
    let client = LlmClient::new("gemini-pro", Some("secret".to_string()), &settings).unwrap();

    let prompt = Prompt::default();
    let template = Template::default();
    let reply = client.chat(&request(&prompt, &template)).unwrap();

    assert_eq!(reply, "");
    mock.assert();
}

#[test]
fn test_backend_auth_error_is_surfaced_unchanged() {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", "/v1beta/models/gemini-pro:generateContent")
        .with_status(403)
        .with_body("API key not valid")
        .create();

    let settings = Settings {
        gemini_base_url: server.url(),
        ..Settings::default()
    };
    let client = LlmClient::new("gemini-pro", None, &settings).unwrap();

    let prompt = Prompt::default();
    let template = Template::default();
    let result = client.chat(&request(&prompt, &template));

    match result {
        Err(SabimError::Backend { status, body }) => {
            assert_eq!(status, 403);
            assert_eq!(body, "API key not valid");
        }
        other => panic!("expected a backend error, got {:?}", other),
    }
}

#[test]
fn test_unknown_model_prefix_is_rejected() {
    let result = LlmClient::new("mistral-7b", None, &Settings::default());
    assert!(matches!(result, Err(SabimError::UnsupportedModel(_))));
}
