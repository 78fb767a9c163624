//! Course data model: graded practice levels and per-attempt evaluations
//!
//! Levels are created in bulk by the content generator at session start and
//! never mutated afterwards.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Maximum number of seed words accepted for course generation
pub const MAX_SEED_WORDS: usize = 50;

/// Maximum article length in characters accepted for course generation
pub const MAX_ARTICLE_CHARS: usize = 3000;

/// Difficulty grading for a level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyTier {
    Basic,
    Intermediate,
    Advanced,
}

/// One vocabulary entry within a level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyItem {
    /// Word form, matched by lowercased comparison
    pub word: String,
    pub part_of_speech: String,
    pub meaning: String,
    pub usage_note: String,
    /// Whether the word came from the user's seed list
    #[serde(default)]
    pub is_user_word: bool,
    /// Phonetic transcription, when the generator provides one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipa: Option<String>,
}

/// One surface token of the level sentence, for word-level interaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordToken {
    pub text: String,
    pub ipa: String,
    /// Meaning of the token in this sentence's context
    pub gloss: String,
}

/// One unit of practice content with its full analysis bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level {
    /// Ordinal within the course; assigned by the engine, not the generator
    #[serde(default)]
    pub id: u32,
    pub source_text: String,
    pub translation: String,
    pub tier: DifficultyTier,
    #[serde(default)]
    pub grammar_notes: Vec<String>,
    #[serde(default)]
    pub vocabulary: Vec<VocabularyItem>,
    #[serde(default)]
    pub word_tokens: Vec<WordToken>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tip: Option<String>,
}

impl Level {
    /// Look up a vocabulary item by cleaned lowercase word form
    #[must_use]
    pub fn vocabulary_for(&self, word: &str) -> Option<&VocabularyItem> {
        let cleaned = clean_word(word);
        self.vocabulary
            .iter()
            .find(|v| clean_word(&v.word) == cleaned)
    }

    /// Look up a surface token by cleaned lowercase word form
    #[must_use]
    pub fn token_for(&self, word: &str) -> Option<&WordToken> {
        let cleaned = clean_word(word);
        self.word_tokens
            .iter()
            .find(|t| clean_word(&t.text) == cleaned)
    }
}

/// One per-word pronunciation error annotation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhonemeError {
    /// Word the error occurred in, matched by lowercased comparison
    pub word: String,
    /// Phoneme the speaker should have produced
    pub expected: String,
    /// Approximation of what the speaker actually produced
    pub produced: String,
    /// Correction tip
    pub tip: String,
    /// Contrasting example word or pair
    pub contrast: String,
}

/// Result of one recorded practice attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    /// The captured utterance
    pub transcript: String,
    /// Encouragement and critique text
    pub feedback: String,
    /// Per-word phonetic error annotations
    pub errors: Vec<PhonemeError>,
    pub created_at: DateTime<Utc>,
}

impl Evaluation {
    /// Find the error annotation for a word, by cleaned lowercase form
    #[must_use]
    pub fn error_for(&self, word: &str) -> Option<&PhonemeError> {
        let cleaned = clean_word(word);
        self.errors.iter().find(|e| clean_word(&e.word) == cleaned)
    }
}

/// User-supplied seed material for course generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CourseInput {
    /// A vocabulary list
    Words { words: Vec<String> },
    /// An article or passage
    Article { text: String },
}

impl CourseInput {
    /// Validate the input before any external call is made
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for empty input or input exceeding the
    /// length limits.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Words { words } => {
                let non_empty = words.iter().filter(|w| !w.trim().is_empty()).count();
                if non_empty == 0 {
                    return Err(Error::Validation(
                        "enter at least one word to practice".to_string(),
                    ));
                }
                if non_empty > MAX_SEED_WORDS {
                    return Err(Error::Validation(format!(
                        "too many words: {non_empty} (limit {MAX_SEED_WORDS})"
                    )));
                }
            }
            Self::Article { text } => {
                if text.trim().is_empty() {
                    return Err(Error::Validation(
                        "enter an article to practice".to_string(),
                    ));
                }
                if text.chars().count() > MAX_ARTICLE_CHARS {
                    return Err(Error::Validation(format!(
                        "article too long (limit {MAX_ARTICLE_CHARS} characters)"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Normalize a surface word for lookups: lowercase, punctuation trimmed
/// from both edges (interior apostrophes and hyphens are kept)
#[must_use]
pub fn clean_word(raw: &str) -> String {
    static EDGES: OnceLock<Regex> = OnceLock::new();
    let edges = EDGES.get_or_init(|| {
        Regex::new(r"^[^\p{L}\p{N}]+|[^\p{L}\p{N}]+$").expect("valid word-edge pattern")
    });
    edges.replace_all(raw.trim(), "").to_lowercase()
}
