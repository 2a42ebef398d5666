//! Lexical relevance between the visitor's message and candidate sources.

use std::collections::HashSet;

use crate::source::ContextSource;

const MIN_TERM_CHARS: usize = 3;
const FREQUENCY_BONUS_PER_HIT: f64 = 0.05;
const MAX_FREQUENCY_BONUS: f64 = 0.5;

const STOPWORDS: &[&str] = &[
    "about", "after", "all", "also", "and", "any", "are", "but", "can", "could", "did", "does",
    "for", "from", "get", "had", "has", "have", "hello", "her", "here", "him", "his", "how",
    "into", "its", "just", "like", "more", "much", "not", "now", "our", "out", "please", "she",
    "should", "some", "than", "thanks", "that", "the", "their", "them", "then", "there", "these",
    "they", "this", "those", "was", "were", "what", "when", "where", "which", "who", "why",
    "will", "with", "would", "you", "your",
];

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
}

/// Distinct lowercase terms of at least three characters, stopwords removed,
/// in order of first appearance.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    words(query)
        .filter(|word| word.chars().count() >= MIN_TERM_CHARS)
        .filter(|word| !STOPWORDS.contains(&word.as_str()))
        .filter(|word| seen.insert(word.clone()))
        .collect()
}

/// Term coverage plus a capped frequency bonus plus the source kind weight.
pub fn score_source(source: &ContextSource, terms: &[String]) -> f64 {
    let weight = source.kind.weight();
    if terms.is_empty() {
        return weight;
    }

    let wanted: HashSet<&str> = terms.iter().map(String::as_str).collect();
    let mut matched = HashSet::new();
    let mut hits = 0usize;

    for word in words(&source.label).chain(words(&source.text)) {
        if let Some(term) = wanted.get(word.as_str()) {
            matched.insert(*term);
            hits += 1;
        }
    }

    let coverage = matched.len() as f64 / terms.len() as f64;
    let bonus = (hits as f64 * FREQUENCY_BONUS_PER_HIT).min(MAX_FREQUENCY_BONUS);
    coverage + bonus + weight
}

/// Pick at most `limit` URLs: the visitor's current page first, then by how many
/// query terms appear in the URL path. Ties keep the configured order.
pub fn rank_urls(
    urls: &[String],
    current_page: Option<&str>,
    terms: &[String],
    limit: usize,
) -> Vec<String> {
    let current = current_page.map(normalize_url);

    let mut ranked: Vec<(bool, usize, &String)> = urls
        .iter()
        .map(|url| {
            let is_current = current.as_deref() == Some(normalize_url(url).as_str());
            let path_words: HashSet<String> = url_path(url)
                .map(|path| words(&path).collect())
                .unwrap_or_default();
            let overlap = terms.iter().filter(|term| path_words.contains(*term)).count();
            (is_current, overlap, url)
        })
        .collect();

    ranked.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
    ranked.into_iter().take(limit).map(|(_, _, url)| url.clone()).collect()
}

fn url_path(url: &str) -> Option<String> {
    reqwest::Url::parse(url).ok().map(|parsed| parsed.path().to_string())
}

fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    match reqwest::Url::parse(trimmed) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string().trim_end_matches('/').to_string()
        }
        Err(_) => trimmed.trim_end_matches('/').to_string(),
    }
}
