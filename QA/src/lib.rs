pub mod models;
pub mod config;
pub mod error;
pub mod document_processor;
pub mod prompt;
pub mod answer_service;
pub mod upload_store;
pub mod session;

pub use models::*;
pub use config::{AnswerServiceConfig, AppConfig, SessionConfig};
pub use error::{AnswerServiceError, ConfigError, DocumentParseError, UploadError, ValidationWarning};
pub use document_processor::{DocumentProcessor, TextExtractor};
pub use prompt::build_prompt;
pub use answer_service::{ask_cancellable, AnswerService, CancelSignal, Canceller, GroqService};
pub use upload_store::UploadStore;
pub use session::{Session, SessionEvent};
