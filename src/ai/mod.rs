//! Image analysis and listing copy via a local Ollama server.
//!
//! The LLM is asked for strict JSON, but its output is never trusted: every
//! field falls back to a deterministic value, so analysis and listing
//! generation always succeed even with Ollama offline.

mod ollama;

pub use ollama::OllamaClient;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

const STOCK_BULLET: &str = "High-quality print-ready design with strong visual appeal.";
const DEFAULT_DESCRIPTION: &str = "A unique print-on-demand design for everyday wear.";
const BULLET_COUNT: usize = 5;
const MAX_TAGS: usize = 10;
const MAX_TAG_CHARS: usize = 20;
const CAPTION_WORDS: usize = 6;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Ollama request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Ollama returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),
}

/// Design intent extracted from an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub theme: String,
    pub objects: Vec<String>,
    pub style: String,
    pub mood: String,
    pub target_audience: String,
    pub caption: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captioner_warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_warning: Option<String>,
}

/// Marketplace copy for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub title: String,
    pub bullets: Vec<String>,
    pub description: String,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_warning: Option<String>,
}

/// Parse the JSON object in an LLM response.
///
/// Tries the whole text first, then the span between the first `{` and the
/// last `}`. Anything else yields an empty map.
pub fn extract_json(text: &str) -> Map<String, Value> {
    let text = text.trim();
    if let Ok(Value::Object(map)) = serde_json::from_str(text) {
        return map;
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            if let Ok(Value::Object(map)) = serde_json::from_str(&text[start..=end]) {
                return map;
            }
        }
    }

    Map::new()
}

/// Derive a caption from the file name: `cute_cat-logo.png` → "cute cat logo".
pub fn caption_from_path(path: &std::path::Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().replace(['_', '-'], " "))
        .unwrap_or_default();
    let stem = stem.trim();
    if stem.is_empty() {
        "design".to_string()
    } else {
        stem.to_string()
    }
}

/// First words of a caption with surrounding punctuation removed.
pub fn caption_words(caption: &str) -> Vec<String> {
    const PUNCT: &[char] = &[
        '.', ',', '!', '?', ':', ';', '"', '\'', '(', ')', '[', ']', '{', '}',
    ];
    let words: Vec<String> = caption
        .split_whitespace()
        .map(|w| w.trim_matches(PUNCT))
        .filter(|w| !w.is_empty())
        .take(CAPTION_WORDS)
        .map(str::to_string)
        .collect();

    if words.is_empty() {
        vec!["design".to_string()]
    } else {
        words
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn string_list(map: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    match map.get(key)? {
        Value::Array(items) => Some(
            items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
        ),
        _ => None,
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Build an analysis from parsed LLM output, filling gaps from the caption.
pub fn build_analysis(
    parsed: &Map<String, Value>,
    caption: String,
    captioner_warning: Option<String>,
) -> Analysis {
    Analysis {
        theme: string_field(parsed, "theme").unwrap_or_else(|| "general".into()),
        objects: string_list(parsed, "objects").unwrap_or_else(|| caption_words(&caption)),
        style: string_field(parsed, "style").unwrap_or_else(|| "graphic design".into()),
        mood: string_field(parsed, "mood").unwrap_or_else(|| "neutral".into()),
        target_audience: string_field(parsed, "target_audience")
            .unwrap_or_else(|| "general".into()),
        caption,
        captioner_warning,
        llm_warning: parsed
            .is_empty()
            .then(|| "Ollama unavailable; using deterministic fallback analysis".into()),
    }
}

/// Build a listing from parsed LLM output, filling gaps from the analysis.
pub fn build_listing(parsed: &Map<String, Value>, analysis: &Analysis) -> Listing {
    let mut bullets = string_list(parsed, "bullets").unwrap_or_default();
    bullets.truncate(BULLET_COUNT);
    while bullets.len() < BULLET_COUNT {
        bullets.push(STOCK_BULLET.to_string());
    }

    let mut tags: Vec<String> = string_list(parsed, "tags")
        .unwrap_or_default()
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| truncate_chars(t, MAX_TAG_CHARS))
        .collect();
    if tags.is_empty() {
        tags = analysis
            .objects
            .iter()
            .map(|o| truncate_chars(o, MAX_TAG_CHARS))
            .collect();
    }
    tags.truncate(MAX_TAGS);

    Listing {
        title: string_field(parsed, "title")
            .unwrap_or_else(|| format!("{} Graphic Shirt", analysis.theme)),
        bullets,
        description: string_field(parsed, "description")
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
        tags,
        llm_warning: parsed
            .is_empty()
            .then(|| "Ollama unavailable; using deterministic fallback listing".into()),
    }
}
