//! Grounding material for support answers.
//!
//! Collects the visitor's live page, tenant documents and scraped knowledge
//! URLs, scores them against the visitor's message and packs the best of them
//! into a token-bounded block for the system prompt.

use thiserror::Error;

mod assembler;
pub mod assembly;
pub mod fetch;
pub mod prompt;
pub mod scoring;
mod source;

pub use assembler::{AssembledContext, ContextAssembler, ContextRequest, Summarizer};
pub use assembly::{estimate_tokens, truncate_on_word_boundary};
pub use fetch::{extract_readable_text, HttpPageFetcher, PageFetcher};
pub use prompt::{system_prompt, DEFAULT_PERSONA};
pub use source::{ContextSource, KnowledgeBase, KnowledgeDocumentInput, PageMetadata, SourceKind};

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("page request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("unsupported content type '{0}'")]
    UnsupportedContent(String),
    #[error("invalid url '{0}'")]
    InvalidUrl(String),
    #[error("summarisation failed: {0}")]
    Summary(String),
}
