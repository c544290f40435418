//! A [CategoryPredictor] backed by an OpenAI-compatible chat completions API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    prediction::{CategoryPredictor, ChatPrompt},
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Where and how to reach the chat completions API.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionConfig {
    /// Sent as a bearer token.
    pub api_key: String,
    /// The server root, without the `/v1/...` path.
    pub base_url: String,
    /// The chat model to ask, e.g. "gpt-3.5-turbo".
    pub model: String,
}

impl PredictionConfig {
    /// A config for the public OpenAI API with the default model.
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_owned(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
        }
    }

    /// Read `OPENAI_API_KEY`, `OPENAI_BASE_URL` and `OPENAI_MODEL`.
    ///
    /// Returns `None` if no API key is set, which disables predictions.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())?;
        let mut config = Self::new(&api_key);

        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            config.model = model;
        }

        Some(config)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Sends prompts to `{base_url}/v1/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiPredictor {
    http_client: Client,
    config: PredictionConfig,
}

impl OpenAiPredictor {
    /// Create a predictor with its own HTTP client.
    pub fn new(mut config: PredictionConfig) -> Self {
        config.base_url = config.base_url.trim_end_matches('/').to_owned();

        Self {
            http_client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl CategoryPredictor for OpenAiPredictor {
    async fn complete(&self, prompt: &ChatPrompt) -> Result<String, Error> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: 0.3,
            max_tokens: 150,
        };

        let response = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| Error::PredictionRequest(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::PredictionRequest(format!(
                "chat completion failed with {status}: {body}"
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|error| Error::PredictionRequest(error.to_string()))?;

        let reply = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::PredictionRequest("no prediction in reply".to_owned()))?;
        tracing::debug!("Chat completion reply: {reply}");

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Json, Router,
        http::{HeaderMap, StatusCode},
        routing::post,
    };
    use serde_json::{Value, json};
    use tokio::{net::TcpListener, sync::oneshot};

    use crate::{
        Error,
        prediction::{CategoryPredictor, ChatPrompt},
    };

    use super::{OpenAiPredictor, PredictionConfig};

    /// Serve `router` on a random local port until the returned sender is dropped or fired.
    async fn spawn_mock(router: Router) -> (String, oneshot::Sender<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .unwrap();
        });

        (format!("http://{address}"), shutdown_tx)
    }

    fn predictor(base_url: &str) -> OpenAiPredictor {
        OpenAiPredictor::new(PredictionConfig {
            api_key: "sk-test".to_owned(),
            base_url: format!("{base_url}/"),
            model: "test-model".to_owned(),
        })
    }

    fn prompt() -> ChatPrompt {
        ChatPrompt {
            system: "classify".to_owned(),
            user: "Transaction description: \"Amazon Prime\"".to_owned(),
        }
    }

    #[tokio::test]
    async fn sends_chat_request_and_returns_reply() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer sk-test");
                assert_eq!(body["model"], "test-model");
                assert_eq!(body["temperature"], 0.3);
                assert_eq!(body["max_tokens"], 150);
                assert_eq!(body["messages"][0]["role"], "system");
                assert_eq!(body["messages"][1]["content"], "Transaction description: \"Amazon Prime\"");

                Json(json!({
                    "choices": [{ "message": { "role": "assistant", "content": "{\"categoryId\": 3, \"subcategoryId\": null}" } }]
                }))
            }),
        );
        let (base_url, _shutdown) = spawn_mock(router).await;

        let reply = predictor(&base_url).complete(&prompt()).await;

        assert_eq!(
            reply,
            Ok("{\"categoryId\": 3, \"subcategoryId\": null}".to_owned())
        );
    }

    #[tokio::test]
    async fn upstream_failure_is_a_request_error() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let (base_url, shutdown) = spawn_mock(router).await;

        let reply = predictor(&base_url).complete(&prompt()).await;

        assert!(
            matches!(&reply, Err(Error::PredictionRequest(message)) if message.contains("429")),
            "got {reply:?}"
        );
        let _ = shutdown.send(());
    }

    #[tokio::test]
    async fn empty_choices_is_a_request_error() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({ "choices": [] })) }),
        );
        let (base_url, _shutdown) = spawn_mock(router).await;

        let reply = predictor(&base_url).complete(&prompt()).await;

        assert!(matches!(reply, Err(Error::PredictionRequest(_))));
    }
}
