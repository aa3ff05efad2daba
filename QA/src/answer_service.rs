use crate::config::AnswerServiceConfig;
use crate::error::AnswerServiceError;
use crate::models::*;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio::sync::watch;

/// Something that turns a prompt into an answer.
#[async_trait]
pub trait AnswerService: Send + Sync {
    async fn ask(&self, prompt: &str) -> Result<String, AnswerServiceError>;
}

/// Client for Groq's OpenAI-compatible chat-completion endpoint.
pub struct GroqService {
    client: Client,
    config: AnswerServiceConfig,
}

impl GroqService {
    pub fn new(config: AnswerServiceConfig) -> Result<Self, AnswerServiceError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AnswerServiceError::Transport(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &AnswerServiceConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn map_send_error(&self, e: reqwest::Error) -> AnswerServiceError {
        if e.is_timeout() {
            AnswerServiceError::Timeout {
                secs: self.config.timeout.as_secs(),
            }
        } else {
            AnswerServiceError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl AnswerService for GroqService {
    async fn ask(&self, prompt: &str) -> Result<String, AnswerServiceError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(AnswerServiceError::MissingCredential)?;

        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        log::info!(
            "Requesting answer from {} ({} prompt chars)",
            self.config.model,
            prompt.chars().count()
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&error_text)
                .map(|body| body.error.message)
                .unwrap_or(error_text);
            log::error!("Answer service returned {}: {}", status, message);

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    AnswerServiceError::Authentication {
                        status: status.as_u16(),
                        message,
                    }
                }
                _ => AnswerServiceError::Api {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let body = response.text().await.map_err(|e| self.map_send_error(e))?;
        let completion: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| AnswerServiceError::MalformedResponse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                AnswerServiceError::MalformedResponse("response contained no answer".to_string())
            })
    }
}

/// Receiving side of a cancellation flag.
#[derive(Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self(rx)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the flag is raised. Pends forever if the sender is gone.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Sending side, held by whoever can abort an in-flight question.
pub struct Canceller(watch::Sender<bool>);

impl Canceller {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self(tx)
    }

    /// Fresh signal for the next request; clears any earlier cancellation.
    pub fn signal(&self) -> CancelSignal {
        self.0.send_replace(false);
        CancelSignal(self.0.subscribe())
    }

    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

impl Default for Canceller {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `service.ask` until it finishes or `cancel` fires.
pub async fn ask_cancellable(
    service: &dyn AnswerService,
    prompt: &str,
    mut cancel: CancelSignal,
) -> Result<String, AnswerServiceError> {
    tokio::select! {
        result = service.ask(prompt) => result,
        _ = cancel.cancelled() => {
            log::warn!("Answer request cancelled");
            Err(AnswerServiceError::Cancelled)
        }
    }
}
