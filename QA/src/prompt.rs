//! Prompt construction and the optional context budget.

use std::sync::OnceLock;
use tiktoken_rs::CoreBPE;
use unicode_segmentation::UnicodeSegmentation;

/// Render the instruction sent to the model. Both inputs are embedded
/// verbatim.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        r#"Based on the following text from a PDF document, please answer the question.

Text: {context}

Question: {question}

Please provide a clear and concise answer based only on the information provided in the text."#
    )
}

static BPE: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn bpe() -> Option<&'static CoreBPE> {
    BPE.get_or_init(|| match tiktoken_rs::cl100k_base() {
        Ok(bpe) => Some(bpe),
        Err(e) => {
            log::warn!("Tokenizer unavailable, estimating token counts: {}", e);
            None
        }
    })
    .as_ref()
}

/// Token count under cl100k_base, or a chars/4 estimate if the tokenizer
/// cannot be loaded.
pub fn count_tokens(text: &str) -> usize {
    match bpe() {
        Some(bpe) => bpe.encode_with_special_tokens(text).len(),
        None => text.chars().count().div_ceil(4),
    }
}

/// Longest prefix of `text` that fits in `max_tokens`, cut on a sentence
/// boundary (or a word boundary when not even the first sentence fits).
///
/// Per-piece counts are summed, so the result is approximate at the margins
/// but never cuts inside a word.
pub fn fit_context(text: &str, max_tokens: usize) -> &str {
    if count_tokens(text) <= max_tokens {
        return text;
    }

    let mut end = fitting_prefix_len(text.split_sentence_bounds(), max_tokens);
    if end == 0 {
        end = fitting_prefix_len(text.split_word_bounds(), max_tokens);
    }

    log::warn!(
        "Context trimmed to {} of {} bytes to stay within {} tokens",
        end,
        text.len(),
        max_tokens
    );
    &text[..end]
}

fn fitting_prefix_len<'a>(pieces: impl Iterator<Item = &'a str>, max_tokens: usize) -> usize {
    let mut used = 0;
    let mut end = 0;
    for piece in pieces {
        let tokens = count_tokens(piece);
        if used + tokens > max_tokens {
            break;
        }
        used += tokens;
        end += piece.len();
    }
    end
}
