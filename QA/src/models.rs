use serde::{Deserialize, Serialize};

/// A file as it arrives from the user.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedDocument {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// Text extracted from the most recently accepted upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    pub filename: String,
    pub text: String,
    pub pages: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    DocumentLoaded,
    QueryPending,
    AnswerDisplayed,
    ErrorDisplayed,
}

/// What the user currently sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub state: SessionState,
    pub filename: Option<String>,
    pub pages: Option<usize>,
    pub preview: Option<String>,
    pub question: Option<String>,
    pub answer: Option<String>,
    pub error: Option<String>,
    pub warning: Option<String>,
}

impl SessionView {
    pub fn idle() -> Self {
        Self {
            state: SessionState::Idle,
            filename: None,
            pages: None,
            preview: None,
            question: None,
            answer: None,
            error: None,
            warning: None,
        }
    }
}

impl Default for SessionView {
    fn default() -> Self {
        Self::idle()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatChoiceMessage {
    pub content: Option<String>,
}

/// Error body returned by OpenAI-compatible endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub error: String,
}
