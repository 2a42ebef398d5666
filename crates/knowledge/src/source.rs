use serde::{Deserialize, Serialize};

/// Where a piece of grounding text came from. Ordering of the weights favours
/// what the visitor is looking at over tenant documents over scraped pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    PageMetadata,
    Document,
    WebPage,
}

impl SourceKind {
    pub fn weight(self) -> f64 {
        match self {
            SourceKind::PageMetadata => 0.3,
            SourceKind::Document => 0.2,
            SourceKind::WebPage => 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextSource {
    pub kind: SourceKind,
    pub label: String,
    pub text: String,
}

impl ContextSource {
    pub fn new(kind: SourceKind, label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            text: text.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Live details the widget reports about the page the visitor is on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageMetadata {
    pub url: Option<String>,
    pub title: Option<String>,
    pub referrer: Option<String>,
    pub page_content: Option<String>,
}

impl PageMetadata {
    pub(crate) fn to_source(&self) -> Option<ContextSource> {
        let title = self.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let url = self.url.as_deref().map(str::trim).filter(|u| !u.is_empty());

        let mut text = String::new();
        if let Some(title) = title {
            text.push_str("Page title: ");
            text.push_str(title);
            text.push_str(". ");
        }
        if let Some(referrer) = self.referrer.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            text.push_str("Visitor arrived from ");
            text.push_str(referrer);
            text.push_str(". ");
        }
        if let Some(content) = self.page_content.as_deref() {
            text.push_str(&collapse_whitespace(content));
        }

        let text = text.trim().to_string();
        if text.is_empty() {
            return None;
        }

        let label = match url {
            Some(url) => format!("Page the visitor is viewing ({url})"),
            None => "Page the visitor is viewing".to_string(),
        };
        Some(ContextSource::new(SourceKind::PageMetadata, label, text))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeDocumentInput {
    pub name: String,
    pub content: String,
}

/// A tenant's knowledge base as stored on the integration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnowledgeBase {
    pub enabled: bool,
    pub urls: Vec<String>,
    pub documents: Vec<KnowledgeDocumentInput>,
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_metadata_source_combines_fields() {
        let page = PageMetadata {
            url: Some("https://shop.example.com/returns".into()),
            title: Some("Returns".into()),
            referrer: None,
            page_content: Some("  Items may be\n returned   within 30 days. ".into()),
        };

        let source = page.to_source().unwrap();
        assert_eq!(source.kind, SourceKind::PageMetadata);
        assert!(source.label.contains("https://shop.example.com/returns"));
        assert_eq!(source.text, "Page title: Returns. Items may be returned within 30 days.");
    }

    #[test]
    fn empty_page_metadata_yields_nothing() {
        let page = PageMetadata {
            url: Some("https://shop.example.com/".into()),
            ..PageMetadata::default()
        };
        assert!(page.to_source().is_none());
    }
}
