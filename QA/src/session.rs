use crate::answer_service::{ask_cancellable, AnswerService, CancelSignal};
use crate::config::SessionConfig;
use crate::document_processor::{preview, TextExtractor};
use crate::error::{DocumentParseError, UploadError, ValidationWarning};
use crate::models::*;
use crate::prompt::{build_prompt, fit_context};
use crate::upload_store::UploadStore;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// A user action.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Upload(UploadedDocument),
    Submit(String),
    Clear,
}

/// One user's upload / ask / clear cycle.
///
/// Every event runs to completion and leaves a fresh [`SessionView`].
/// Failures never escape: they are rendered into the view.
pub struct Session {
    id: Uuid,
    config: SessionConfig,
    extractor: Arc<dyn TextExtractor>,
    answers: Arc<dyn AnswerService>,
    store: UploadStore,
    state: SessionState,
    document: Option<LoadedDocument>,
    view: SessionView,
}

impl Session {
    /// Create a session, first removing upload files an earlier process
    /// may have left in the temp directory.
    pub fn start(
        config: SessionConfig,
        extractor: Arc<dyn TextExtractor>,
        answers: Arc<dyn AnswerService>,
    ) -> Self {
        if let Err(e) = UploadStore::sweep_stale(&config.temp_dir) {
            log::warn!(
                "Could not sweep stale uploads in {}: {}",
                config.temp_dir.display(),
                e
            );
        }

        let id = Uuid::new_v4();
        let store = UploadStore::new(&config.temp_dir, id);
        log::info!("Session {} started", id);

        Self {
            id,
            config,
            extractor,
            answers,
            store,
            state: SessionState::Idle,
            document: None,
            view: SessionView::idle(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn view(&self) -> &SessionView {
        &self.view
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    pub fn upload_path(&self) -> &Path {
        self.store.path()
    }

    pub async fn handle(&mut self, event: SessionEvent, cancel: CancelSignal) -> &SessionView {
        self.view.warning = None;
        match event {
            SessionEvent::Upload(document) => self.upload(document).await,
            SessionEvent::Submit(query) => self.submit(query, cancel).await,
            SessionEvent::Clear => self.clear(),
        }
        &self.view
    }

    async fn upload(&mut self, upload: UploadedDocument) {
        log::info!(
            "Session {}: received '{}' ({} bytes)",
            self.id,
            upload.filename,
            upload.bytes.len()
        );

        // The previous document is gone whether or not this one loads.
        self.document = None;

        match self.load(upload).await {
            Ok(document) => {
                log::info!(
                    "Session {}: loaded '{}' ({} pages)",
                    self.id,
                    document.filename,
                    document.pages
                );
                self.state = SessionState::DocumentLoaded;
                self.view = SessionView {
                    state: self.state,
                    filename: Some(document.filename.clone()),
                    pages: Some(document.pages),
                    preview: Some(preview(&document.text, self.config.preview_chars)),
                    ..SessionView::idle()
                };
                self.document = Some(document);
            }
            Err(e) => {
                log::error!("Session {}: upload rejected: {}", self.id, e);
                if let Err(rm) = self.store.remove() {
                    log::warn!("Session {}: could not remove upload: {}", self.id, rm);
                }
                self.state = SessionState::ErrorDisplayed;
                self.view = SessionView {
                    state: self.state,
                    error: Some(e.to_string()),
                    ..SessionView::idle()
                };
            }
        }
    }

    async fn load(&self, upload: UploadedDocument) -> Result<LoadedDocument, UploadError> {
        self.store.persist(&upload.bytes)?;
        let bytes = self.store.read()?;

        let extractor = Arc::clone(&self.extractor);
        let pages = tokio::task::spawn_blocking(move || extractor.extract_pages(&bytes))
            .await
            .map_err(|e| DocumentParseError::new(format!("extraction task failed: {e}")))??;

        Ok(LoadedDocument {
            filename: upload.filename,
            text: pages.concat(),
            pages: pages.len(),
        })
    }

    async fn submit(&mut self, query: String, cancel: CancelSignal) {
        let Some(document) = self.document.as_ref() else {
            self.warn(ValidationWarning::NoDocument);
            return;
        };
        if query.trim().is_empty() {
            self.warn(ValidationWarning::EmptyQuery);
            return;
        }

        let context = match self.config.context_token_budget {
            Some(budget) => fit_context(&document.text, budget),
            None => document.text.as_str(),
        };
        let prompt = build_prompt(context, &query);

        self.state = SessionState::QueryPending;
        self.view.state = self.state;
        self.view.question = Some(query);
        self.view.answer = None;
        self.view.error = None;
        log::info!("Session {}: question submitted", self.id);

        match ask_cancellable(self.answers.as_ref(), &prompt, cancel).await {
            Ok(answer) => {
                self.state = SessionState::AnswerDisplayed;
                self.view.answer = Some(answer);
            }
            Err(e) => {
                log::error!("Session {}: answer failed: {}", self.id, e);
                self.state = SessionState::ErrorDisplayed;
                self.view.error = Some(e.to_string());
            }
        }
        self.view.state = self.state;
    }

    fn warn(&mut self, warning: ValidationWarning) {
        log::debug!("Session {}: {}", self.id, warning);
        self.view.warning = Some(warning.to_string());
    }

    fn clear(&mut self) {
        self.state = SessionState::Idle;
        self.document = None;
        self.view = SessionView::idle();

        if let Err(e) = self.store.remove() {
            log::error!("Session {}: could not remove upload: {}", self.id, e);
            self.view.error = Some(format!("Could not remove the uploaded file: {e}"));
        }
        log::info!("Session {}: cleared", self.id);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.store.remove();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnswerServiceError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Treats the upload bytes as UTF-8 page text separated by form feeds.
    struct FormFeedPages;

    impl TextExtractor for FormFeedPages {
        fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, DocumentParseError> {
            let text = std::str::from_utf8(bytes).map_err(|e| DocumentParseError::new(e.to_string()))?;
            if !text.starts_with("PAGES:") {
                return Err(DocumentParseError::new("not a document"));
            }
            Ok(text["PAGES:".len()..].split('\x0c').map(str::to_string).collect())
        }
    }

    #[derive(Default)]
    struct ScriptedAnswers {
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
        fail_next: Mutex<bool>,
    }

    #[async_trait]
    impl AnswerService for ScriptedAnswers {
        async fn ask(&self, prompt: &str) -> Result<String, AnswerServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut fail = self.fail_next.lock().unwrap();
            if *fail {
                *fail = false;
                return Err(AnswerServiceError::Api {
                    status: 503,
                    message: "service unavailable".into(),
                });
            }
            Ok("It says Hello World.".to_string())
        }
    }

    fn session(dir: &TempDir, answers: Arc<ScriptedAnswers>) -> Session {
        let config = SessionConfig {
            temp_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        Session::start(config, Arc::new(FormFeedPages), answers)
    }

    fn upload(text: &str) -> SessionEvent {
        SessionEvent::Upload(UploadedDocument::new("doc.pdf", format!("PAGES:{text}").into_bytes()))
    }

    fn bad_upload() -> SessionEvent {
        SessionEvent::Upload(UploadedDocument::new("broken.pdf", b"garbage".to_vec()))
    }

    async fn send(session: &mut Session, event: SessionEvent) -> SessionView {
        session.handle(event, CancelSignal::never()).await.clone()
    }

    #[tokio::test]
    async fn upload_loads_document_and_previews() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir, Arc::default());

        let view = send(&mut session, upload("Hello \x0cWorld")).await;

        assert_eq!(view.state, SessionState::DocumentLoaded);
        assert_eq!(view.preview.as_deref(), Some("Hello World"));
        assert_eq!(view.pages, Some(2));
        assert_eq!(session.document().unwrap().text, "Hello World");
        assert!(session.upload_path().exists());
    }

    #[tokio::test]
    async fn long_documents_get_truncated_preview() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir, Arc::default());

        let view = send(&mut session, upload(&"x".repeat(2500))).await;

        let shown = view.preview.unwrap();
        assert_eq!(shown.chars().count(), 1003);
        assert!(shown.ends_with("..."));
        assert_eq!(session.document().unwrap().text.len(), 2500);
    }

    #[tokio::test]
    async fn empty_query_never_calls_service() {
        let dir = tempfile::tempdir().unwrap();
        let answers = Arc::new(ScriptedAnswers::default());
        let mut session = session(&dir, answers.clone());
        send(&mut session, upload("Hello")).await;

        let view = send(&mut session, SessionEvent::Submit(String::new())).await;
        assert_eq!(view.state, SessionState::DocumentLoaded);
        assert_eq!(view.warning.as_deref(), Some("Please enter a question."));

        let view = send(&mut session, SessionEvent::Submit("   ".into())).await;
        assert_eq!(view.warning.as_deref(), Some("Please enter a question."));

        assert_eq!(answers.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn query_without_document_warns() {
        let dir = tempfile::tempdir().unwrap();
        let answers = Arc::new(ScriptedAnswers::default());
        let mut session = session(&dir, answers.clone());

        let view = send(&mut session, SessionEvent::Submit("What?".into())).await;

        assert_eq!(view.state, SessionState::Idle);
        assert_eq!(view.warning.as_deref(), Some("Please upload a PDF document first."));
        assert_eq!(answers.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn service_failure_keeps_document_for_retry() {
        let dir = tempfile::tempdir().unwrap();
        let answers = Arc::new(ScriptedAnswers::default());
        *answers.fail_next.lock().unwrap() = true;
        let mut session = session(&dir, answers.clone());
        send(&mut session, upload("Hello \x0cWorld")).await;

        let view = send(&mut session, SessionEvent::Submit("What does it say?".into())).await;
        assert_eq!(view.state, SessionState::ErrorDisplayed);
        assert!(view.error.unwrap().contains("service unavailable"));
        assert_eq!(view.preview.as_deref(), Some("Hello World"));
        assert!(session.document().is_some());

        let view = send(&mut session, SessionEvent::Submit("What does it say?".into())).await;
        assert_eq!(view.state, SessionState::AnswerDisplayed);
        assert_eq!(view.answer.as_deref(), Some("It says Hello World."));
        assert!(view.error.is_none());
        assert_eq!(answers.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn repeated_question_asks_again() {
        let dir = tempfile::tempdir().unwrap();
        let answers = Arc::new(ScriptedAnswers::default());
        let mut session = session(&dir, answers.clone());
        send(&mut session, upload("Hello")).await;

        send(&mut session, SessionEvent::Submit("Same?".into())).await;
        send(&mut session, SessionEvent::Submit("Same?".into())).await;

        assert_eq!(answers.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rejected_upload_discards_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir, Arc::default());
        send(&mut session, upload("first")).await;

        let view = send(&mut session, bad_upload()).await;

        assert_eq!(view.state, SessionState::ErrorDisplayed);
        assert!(view.error.unwrap().contains("not a document"));
        assert!(view.preview.is_none());
        assert!(session.document().is_none());
        assert!(!session.upload_path().exists());
    }

    #[tokio::test]
    async fn new_upload_replaces_text() {
        let dir = tempfile::tempdir().unwrap();
        let answers = Arc::new(ScriptedAnswers::default());
        let mut session = session(&dir, answers.clone());
        send(&mut session, upload("old contents")).await;
        send(&mut session, upload("new contents")).await;

        send(&mut session, SessionEvent::Submit("Which?".into())).await;

        let prompts = answers.prompts.lock().unwrap();
        assert!(prompts[0].contains("new contents"));
        assert!(!prompts[0].contains("old contents"));
    }

    #[tokio::test]
    async fn clear_removes_temp_file_from_every_state() {
        let dir = tempfile::tempdir().unwrap();
        let answers = Arc::new(ScriptedAnswers::default());
        let mut session = session(&dir, answers.clone());

        let view = send(&mut session, SessionEvent::Clear).await;
        assert_eq!(view, SessionView::idle());

        send(&mut session, upload("Hello")).await;
        send(&mut session, SessionEvent::Clear).await;
        assert!(!session.upload_path().exists());

        send(&mut session, upload("Hello")).await;
        send(&mut session, SessionEvent::Submit("Q?".into())).await;
        send(&mut session, SessionEvent::Clear).await;
        assert!(!session.upload_path().exists());

        *answers.fail_next.lock().unwrap() = true;
        send(&mut session, upload("Hello")).await;
        send(&mut session, SessionEvent::Submit("Q?".into())).await;
        let view = send(&mut session, SessionEvent::Clear).await;
        assert!(!session.upload_path().exists());
        assert_eq!(view.state, SessionState::Idle);
        assert!(session.document().is_none());
    }

    #[tokio::test]
    async fn start_sweeps_stale_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let stale = UploadStore::new(dir.path(), Uuid::new_v4());
        stale.persist(b"left over").unwrap();

        let _session = session(&dir, Arc::default());

        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn context_budget_limits_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let answers = Arc::new(ScriptedAnswers::default());
        let config = SessionConfig {
            temp_dir: dir.path().to_path_buf(),
            context_token_budget: Some(8),
            ..Default::default()
        };
        let mut session = Session::start(config, Arc::new(FormFeedPages), answers.clone());
        let text = "Short opening line. ".to_string() + &"Filler sentence follows here. ".repeat(50);
        send(&mut session, upload(&text)).await;

        send(&mut session, SessionEvent::Submit("Q?".into())).await;

        let prompts = answers.prompts.lock().unwrap();
        assert!(prompts[0].contains("Short opening line."));
        assert!(prompts[0].len() < text.len());
    }

    #[tokio::test]
    async fn cancelled_question_shows_error() {
        struct Slow;

        #[async_trait]
        impl AnswerService for Slow {
            async fn ask(&self, _prompt: &str) -> Result<String, AnswerServiceError> {
                std::future::pending().await
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig {
            temp_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let mut session = Session::start(config, Arc::new(FormFeedPages), Arc::new(Slow));
        send(&mut session, upload("Hello")).await;

        let canceller = crate::answer_service::Canceller::new();
        let signal = canceller.signal();
        canceller.cancel();
        let view = session
            .handle(SessionEvent::Submit("Q?".into()), signal)
            .await
            .clone();

        assert_eq!(view.state, SessionState::ErrorDisplayed);
        assert_eq!(view.error.as_deref(), Some("The request was cancelled"));
        assert!(session.document().is_some());
    }
}
