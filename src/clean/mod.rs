//! HTML → Markdown content cleaning.
//!
//! Deterministic: the same input and options always produce the same
//! output, and cleaning already-clean Markdown is a no-op (inputs with no
//! HTML elements pass through whitespace-normalized). Callers treat a
//! `CleanError` as non-fatal and keep the raw content.

use regex::Regex;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Default)]
pub struct CleanOptions {
    /// Whitelist: when non-empty, only matching subtrees contribute and
    /// main-content mode is bypassed.
    pub include_selectors: Vec<String>,
    /// Matching nodes are removed before anything else runs.
    pub exclude_selectors: Vec<String>,
    /// Restrict output to the main-content region (largest semantic
    /// article block), stripping navigation, footers, and ad-like chrome.
    pub only_main_content: bool,
}

#[derive(Debug, Error)]
pub enum CleanError {
    #[error("invalid selector `{0}`")]
    Selector(String),
    #[error("cleaning produced no content")]
    Empty,
}

/// Convert raw HTML to Markdown under the given options.
pub fn clean(raw: &str, base_url: &Url, options: &CleanOptions) -> Result<String, CleanError> {
    if !is_html_like(raw) {
        // Already text or Markdown; keep idempotence.
        return Ok(normalize_markdown(raw));
    }

    let mut document = Html::parse_document(raw);

    for raw_selector in &options.exclude_selectors {
        let selector = Selector::parse(raw_selector)
            .map_err(|_| CleanError::Selector(raw_selector.clone()))?;
        let ids: Vec<_> = document.select(&selector).map(|el| el.id()).collect();
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }

    if !options.include_selectors.is_empty() {
        let mut fragments = Vec::new();
        for raw_selector in &options.include_selectors {
            let selector = Selector::parse(raw_selector)
                .map_err(|_| CleanError::Selector(raw_selector.clone()))?;
            for element in document.select(&selector) {
                fragments.push(element.html());
            }
        }
        let markdown = html2md::parse_html(&fragments.join("\n"));
        return finalize(markdown);
    }

    let current = document.root_element().html();
    if options.only_main_content {
        let stripped = strip_noise_blocks(&current);

        let readability_md = match readability::extractor::extract(&mut stripped.as_bytes(), base_url) {
            Ok(product) => normalize_markdown(&html2md::parse_html(&product.content)),
            Err(e) => {
                debug!("readability pass failed: {} — relying on heuristics", e);
                String::new()
            }
        };
        let heuristic_md = heuristic_main_block(&stripped);

        let readability_words = word_count(&readability_md);
        let heuristic_words = word_count(&heuristic_md);
        debug!(
            "main-content passes: readability {} words, heuristic {} words",
            readability_words, heuristic_words
        );

        let mut chosen = if readability_words == 0 && heuristic_words == 0 {
            html2md::parse_html(&stripped)
        } else if heuristic_words > readability_words.saturating_add(20) {
            heuristic_md
        } else if readability_words > 0 {
            readability_md
        } else {
            heuristic_md
        };

        // Readability treats the lead heading as the document title and
        // drops it from the content; put it back so the page keeps its
        // name.
        if let Some(title) = page_title(&document) {
            if !chosen.contains(&title) {
                chosen = format!("{}\n==========\n\n{}", title, chosen);
            }
        }
        return finalize(chosen);
    }

    finalize(html2md::parse_html(&current))
}

fn finalize(markdown: String) -> Result<String, CleanError> {
    let normalized = normalize_markdown(&markdown);
    if normalized.is_empty() {
        return Err(CleanError::Empty);
    }
    Ok(normalized)
}

/// True when the input contains real HTML elements (not just angle
/// brackets in prose or code).
pub fn is_html_like(input: &str) -> bool {
    let probe = Regex::new(
        r"(?i)<(?:html|head|body|div|p|a|span|article|main|section|nav|header|footer|aside|h[1-6]|ul|ol|li|table|tr|td|th|img|br|hr|pre|code|blockquote|form|button|script|style|meta|title|strong|em|b|i)\b",
    )
    .unwrap();
    probe.is_match(input)
}

/// Regex-level removal of structural noise before readability: scripts,
/// styles, chrome elements, and blocks whose id/class smells like ads,
/// cookie banners, or subscription prompts.
fn strip_noise_blocks(html: &str) -> String {
    let mut s = html.to_string();

    let blocks = Regex::new(
        r"(?is)<(?:script|style|noscript|svg|canvas|iframe)[^>]*?>.*?</(?:script|style|noscript|svg|canvas|iframe)>",
    )
    .unwrap();
    s = blocks.replace_all(&s, " ").to_string();

    let structural =
        Regex::new(r"(?is)<(?:nav|header|footer|aside)[^>]*?>.*?</(?:nav|header|footer|aside)>").unwrap();
    s = structural.replace_all(&s, " ").to_string();

    let interactive = Regex::new(r"(?is)<(?:form|button)[^>]*?>.*?</(?:form|button)>").unwrap();
    s = interactive.replace_all(&s, " ").to_string();

    let ad_like = Regex::new(
        r#"(?is)<(?:div|section|article)[^>]*?(?:id|class)=(?:'|")[^'">]*(?:ads|advert|sponsor|promo|cookie|consent|banner|modal|subscribe|newsletter|share|social|sidebar|comments|breadcrumb|pagination)[^'">]*(?:'|")[^>]*?>.*?</(?:div|section|article)>"#,
    )
    .unwrap();
    s = ad_like.replace_all(&s, " ").to_string();

    s
}

/// First h1 text, falling back to `<title>`.
fn page_title(document: &Html) -> Option<String> {
    for raw_selector in ["h1", "title"] {
        let Ok(selector) = Selector::parse(raw_selector) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = element.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Largest semantic content block, converted to Markdown.
fn heuristic_main_block(html: &str) -> String {
    let document = Html::parse_document(html);
    let candidates = [
        "article",
        "main",
        "[role=main]",
        "[itemprop=articleBody]",
        ".entry-content",
        ".post-content",
        ".article-content",
        "#content",
        "#main",
        ".content",
    ];

    let mut best = String::new();
    let mut best_words = 0usize;
    for raw_selector in candidates {
        let Ok(selector) = Selector::parse(raw_selector) else {
            continue;
        };
        for element in document.select(&selector) {
            let markdown = normalize_markdown(&html2md::parse_html(&element.inner_html()));
            let words = word_count(&markdown);
            if words > best_words {
                best_words = words;
                best = markdown;
            }
        }
    }
    best
}

/// Idempotent whitespace normalization: trailing spaces stripped, blank
/// runs collapsed to one blank line, outer whitespace trimmed.
fn normalize_markdown(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut blank_pending = false;
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_pending = !lines.is_empty();
            continue;
        }
        if blank_pending {
            lines.push("");
            blank_pending = false;
        }
        lines.push(line);
    }
    lines.join("\n").trim().to_string()
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
