use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use helpmate_config::KnowledgeConfig;
use helpmate_orchestrator::Orchestrator;
use tracing::{debug, warn};

use crate::assembly::{
    self, fit_block, remaining_chars, ContextBlock, CHARS_PER_TOKEN, MIN_PARTIAL_TOKENS,
};
use crate::fetch::PageFetcher;
use crate::scoring::{query_terms, rank_urls, score_source};
use crate::source::{ContextSource, KnowledgeBase, PageMetadata, SourceKind};
use crate::KnowledgeError;

const SUMMARY_LABEL: &str = "Summary of additional reference material";
/// Upper bound on the material handed to the summariser.
const MAX_SUMMARY_INPUT_CHARS: usize = 12_000;

/// Second-pass condensation of material that did not fit.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        material: &str,
        question: &str,
        max_tokens: u32,
    ) -> Result<String, KnowledgeError>;
}

#[async_trait]
impl Summarizer for Orchestrator {
    async fn summarize(
        &self,
        material: &str,
        question: &str,
        max_tokens: u32,
    ) -> Result<String, KnowledgeError> {
        Orchestrator::summarize(self, material, question, max_tokens)
            .await
            .map_err(|error| KnowledgeError::Summary(error.to_string()))
    }
}

pub struct ContextRequest<'a> {
    pub knowledge: &'a KnowledgeBase,
    pub page: Option<&'a PageMetadata>,
    pub query: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledContext {
    /// Knowledge block for the system prompt; empty when nothing relevant was found.
    pub text: String,
    pub estimated_tokens: usize,
    pub sources_used: usize,
    pub overflowed: bool,
    pub summarized: bool,
}

#[derive(Clone)]
pub struct ContextAssembler {
    config: KnowledgeConfig,
    fetcher: Arc<dyn PageFetcher>,
    summarizer: Option<Arc<dyn Summarizer>>,
}

impl ContextAssembler {
    pub fn new(config: KnowledgeConfig, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            config,
            fetcher,
            summarizer: None,
        }
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    /// Gather, score and pack the grounding material for one message.
    /// Page fetch and summariser failures degrade the context; they never fail it.
    pub async fn build(&self, request: ContextRequest<'_>) -> AssembledContext {
        let terms = query_terms(request.query);
        let mut sources = Vec::new();

        if let Some(page) = request.page.and_then(PageMetadata::to_source) {
            sources.push(page);
        }

        if request.knowledge.enabled {
            for document in &request.knowledge.documents {
                sources.push(ContextSource::new(
                    SourceKind::Document,
                    format!("Document {}", document.name.trim()),
                    document.content.trim(),
                ));
            }

            let current_page = request.page.and_then(|page| page.url.as_deref());
            let urls =
                rank_urls(&request.knowledge.urls, current_page, &terms, self.config.max_urls);
            sources.extend(self.fetch_pages(&urls).await);
        }

        let mut scored: Vec<(f64, ContextSource)> = sources
            .into_iter()
            .filter(|source| !source.is_empty())
            .map(|source| (score_source(&source, &terms), source))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let ordered = scored.into_iter().map(|(_, source)| source).collect();
        let packed = assembly::assemble(
            ordered,
            self.config.max_context_tokens,
            self.config.max_source_chars,
        );
        let overflowed = packed.overflowed();

        let mut blocks = packed.blocks;
        let mut summarized = false;
        if overflowed && self.config.summarize_overflow {
            if let Some(summarizer) = &self.summarizer {
                let replacement = self
                    .summarize_overflow(
                        summarizer.as_ref(),
                        &blocks,
                        &packed.overflow,
                        request.query,
                    )
                    .await;
                if let Some(replacement) = replacement {
                    blocks = replacement;
                    summarized = true;
                }
            }
        }

        let text = assembly::render_blocks(&blocks);
        let context = AssembledContext {
            estimated_tokens: assembly::estimate_tokens(&text),
            sources_used: blocks.len(),
            text,
            overflowed,
            summarized,
        };

        debug!(
            sources = context.sources_used,
            tokens = context.estimated_tokens,
            overflowed,
            summarized,
            "assembled knowledge context"
        );
        context
    }

    async fn fetch_pages(&self, urls: &[String]) -> Vec<ContextSource> {
        let fetches = urls.iter().map(|url| async move {
            match self.fetcher.fetch_text(url).await {
                Ok(text) => Some(ContextSource::new(
                    SourceKind::WebPage,
                    format!("Content from {url}"),
                    text,
                )),
                Err(error) => {
                    warn!(%url, %error, "skipping knowledge url");
                    None
                }
            }
        });

        join_all(fetches).await.into_iter().flatten().collect()
    }

    /// Keep the intact blocks and replace the cut or dropped material with an
    /// LLM summary that fits the space left. `None` keeps the truncated packing.
    async fn summarize_overflow(
        &self,
        summarizer: &dyn Summarizer,
        blocks: &[ContextBlock],
        overflow: &[ContextSource],
        question: &str,
    ) -> Option<Vec<ContextBlock>> {
        let intact: Vec<ContextBlock> =
            blocks.iter().filter(|block| block.complete).cloned().collect();
        let room = remaining_chars(&intact, self.config.max_context_tokens);
        if room < MIN_PARTIAL_TOKENS * CHARS_PER_TOKEN {
            return None;
        }

        let material = overflow
            .iter()
            .map(|source| format!("{}: {}", source.label, source.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        let (material, _) = assembly::truncate_on_word_boundary(&material, MAX_SUMMARY_INPUT_CHARS);

        let summary = match summarizer
            .summarize(&material, question, self.config.summary_max_tokens)
            .await
        {
            Ok(summary) if !summary.trim().is_empty() => summary,
            Ok(_) => return None,
            Err(error) => {
                warn!(%error, "overflow summarisation failed; keeping truncated context");
                return None;
            }
        };

        let block = fit_block(SUMMARY_LABEL, summary.trim(), room, !intact.is_empty())?;
        let mut replacement = intact;
        replacement.push(block);
        Some(replacement)
    }
}
