//! Retrieval of knowledge URLs as readable text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::source::collapse_whitespace;
use crate::KnowledgeError;

const CONTENT_SELECTORS: &[&str] = &["article", "main", "[role=main]"];
const BLOCK_SELECTORS: &str = "p, h1, h2, h3, h4, h5, h6, li, blockquote, td";
const MIN_FRAGMENT_CHARS: usize = 20;

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Readable text of the page at `url`.
    async fn fetch_text(&self, url: &str) -> Result<String, KnowledgeError>;
}

pub struct HttpPageFetcher {
    client: Client,
    max_bytes: usize,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, KnowledgeError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("HelpMate-KnowledgeBot/0.1")
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client, max_bytes })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, KnowledgeError> {
        let parsed =
            reqwest::Url::parse(url).map_err(|_| KnowledgeError::InvalidUrl(url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(KnowledgeError::InvalidUrl(url.to_string()));
        }

        let mut response = self.client.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(KnowledgeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("text/html")
            .to_ascii_lowercase();

        let is_html = content_type.contains("html");
        if !is_html && !content_type.starts_with("text/") {
            return Err(KnowledgeError::UnsupportedContent(content_type));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let room = self.max_bytes.saturating_sub(body.len());
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if body.len() >= self.max_bytes {
                debug!(url, max_bytes = self.max_bytes, "page body capped");
                break;
            }
        }

        let body = String::from_utf8_lossy(&body);
        let text = if is_html {
            extract_readable_text(&body)
        } else {
            collapse_whitespace(&body)
        };

        debug!(url, chars = text.len(), "fetched knowledge page");
        Ok(text)
    }
}

/// Readable text of an HTML document: `article`/`main` content when present,
/// otherwise the body's paragraphs, headings and list items.
pub fn extract_readable_text(html: &str) -> String {
    let document = Html::parse_document(html);

    for selector in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        let parts: Vec<String> = document
            .select(&selector)
            .map(|element| element_text(&element))
            .filter(|text| !text.is_empty())
            .collect();
        if !parts.is_empty() {
            return parts.join(" ");
        }
    }

    let (Ok(body_selector), Ok(block_selector)) =
        (Selector::parse("body"), Selector::parse(BLOCK_SELECTORS))
    else {
        return String::new();
    };

    let Some(body) = document.select(&body_selector).next() else {
        return String::new();
    };

    let mut fragments: Vec<String> = body
        .select(&block_selector)
        .map(|element| element_text(&element))
        .filter(|text| text.chars().count() > MIN_FRAGMENT_CHARS)
        .collect();
    fragments.dedup();

    if fragments.is_empty() {
        element_text(&body)
    } else {
        fragments.join(" ")
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    let mut text = String::new();
    for node in element.descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let skipped = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|el| matches!(el.name(), "script" | "style" | "noscript" | "nav" | "footer"))
                .unwrap_or(false)
        });
        if skipped {
            continue;
        }
        for word in fragment.split_whitespace() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(word);
        }
    }
    text
}
