// Terminal front end for the PDF question answering session.
// The HTTP server lives in ../api.

use anyhow::{Context, Result};
use pdf_qa::{
    AppConfig, Canceller, DocumentProcessor, GroqService, Session, SessionEvent, SessionView,
    UploadedDocument,
};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "Commands:\n  :open <file.pdf>   upload a PDF\n  :clear             discard the document\n  :quit              exit\nAnything else is asked as a question. Ctrl-C cancels a pending answer.";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env()?;
    log::info!("Starting with {:?}", config.answer_service);

    let answers = Arc::new(GroqService::new(config.answer_service)?);
    let mut session = Session::start(config.session, Arc::new(DocumentProcessor::new()), answers);

    let canceller = Arc::new(Canceller::new());
    {
        let canceller = Arc::clone(&canceller);
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                canceller.cancel();
            }
        });
    }

    println!("PDF Question Answering System");
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end();
        let event = if line == ":quit" {
            break;
        } else if line == ":clear" {
            SessionEvent::Clear
        } else if line == ":help" {
            println!("{HELP}");
            continue;
        } else if let Some(path) = line.strip_prefix(":open ") {
            match read_upload(Path::new(path.trim())).await {
                Ok(upload) => SessionEvent::Upload(upload),
                Err(e) => {
                    eprintln!("{e:#}");
                    continue;
                }
            }
        } else {
            SessionEvent::Submit(line.to_string())
        };

        if matches!(event, SessionEvent::Submit(_)) && session.document().is_some() {
            println!("Generating response...");
        }
        let view = session.handle(event, canceller.signal()).await;
        render(view);
    }

    Ok(())
}

async fn read_upload(path: &Path) -> Result<UploadedDocument> {
    let is_pdf = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if !is_pdf {
        anyhow::bail!("Only .pdf files can be uploaded: {}", path.display());
    }

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    Ok(UploadedDocument::new(filename, bytes))
}

fn render(view: &SessionView) {
    if let Some(warning) = &view.warning {
        println!("Warning: {warning}");
    }
    if let Some(error) = &view.error {
        println!("An error occurred: {error}");
    }
    if let Some(answer) = &view.answer {
        println!("Response: {answer}");
        return;
    }
    if let (Some(filename), Some(preview)) = (&view.filename, &view.preview) {
        if view.warning.is_none() && view.error.is_none() {
            println!("--- {filename} ({} pages) ---", view.pages.unwrap_or(0));
            println!("{preview}");
            println!("---");
        }
    }
}
