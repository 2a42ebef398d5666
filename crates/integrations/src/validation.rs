//! Input checks for integration settings.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{IntegrationError, IntegrationResult};

static DOMAIN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?:https?)://)?(?:www\.)?([a-zA-Z0-9-]+(?:\.[a-zA-Z0-9-]+)+)(?:/.*)?$")
        .expect("valid domain pattern")
});

static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| {
        Regex::new(r"(?i)^https?://[^\s/?#]+\.[^\s/?#]+(?:[/?#]\S*)?$").expect("valid url pattern")
    });

static COLOR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid color pattern"));

const MAX_NAME_CHARS: usize = 100;
const MAX_DOCUMENT_CHARS: usize = 200_000;

/// Validate a website domain and reduce it to its host, e.g.
/// `https://www.Shop.example.com/faq` becomes `shop.example.com`.
pub fn normalize_domain(input: &str) -> IntegrationResult<String> {
    let captures = DOMAIN_PATTERN
        .captures(input.trim())
        .ok_or_else(|| IntegrationError::validation("Please enter a valid domain"))?;
    Ok(captures[1].to_ascii_lowercase())
}

pub fn validate_name(name: &str) -> IntegrationResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(IntegrationError::validation("Integration name is required"));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(IntegrationError::validation(format!(
            "Integration name must be at most {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

/// Knowledge URLs must be absolute http(s) URLs.
pub fn validate_knowledge_url(url: &str) -> IntegrationResult<String> {
    let url = url.trim();
    if url.is_empty() {
        return Err(IntegrationError::validation("URL is required"));
    }
    if !URL_PATTERN.is_match(url) {
        return Err(IntegrationError::validation("URL must start with http:// or https://"));
    }
    Ok(url.to_string())
}

pub fn validate_color(color: &str) -> IntegrationResult<String> {
    let color = color.trim();
    if !COLOR_PATTERN.is_match(color) {
        return Err(IntegrationError::validation(
            "Primary color must be a hex color such as #4F46E5",
        ));
    }
    Ok(color.to_string())
}

pub fn validate_document(name: &str, content: &str) -> IntegrationResult<()> {
    if name.trim().is_empty() {
        return Err(IntegrationError::validation("Document name is required"));
    }
    if content.trim().is_empty() {
        return Err(IntegrationError::validation("Document content is required"));
    }
    if content.chars().count() > MAX_DOCUMENT_CHARS {
        return Err(IntegrationError::validation(format!(
            "Document content must be at most {MAX_DOCUMENT_CHARS} characters"
        )));
    }
    Ok(())
}
