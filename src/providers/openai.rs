//! OpenAI-backed provider for generation, synthesis, illustration, critique
//!
//! One provider struct implements all four collaborator contracts against an
//! OpenAI-compatible API: chat completions (JSON mode) for course generation
//! and pronunciation critique, the speech endpoint for synthesis, and the
//! images endpoint for level illustration.

use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ContentGenerator, ImageGenerator, LevelImage, PronunciationCritic, SpeechSynthesizer};
use crate::course::{CourseInput, Evaluation, Level, PhonemeError};
use crate::{Error, Result};

/// Settings for the OpenAI-compatible provider
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    /// API base URL without trailing slash (e.g. `https://api.openai.com`)
    pub base_url: String,
    pub api_key: String,
    /// Chat model used for generation and critique
    pub chat_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub image_model: String,
    /// Language being learned (level sentences)
    pub target_language: String,
    /// Language translations and feedback are written in
    pub native_language: String,
}

/// OpenAI-compatible implementation of all four collaborator contracts
pub struct OpenAiProvider {
    client: Client,
    settings: OpenAiSettings,
}

impl OpenAiProvider {
    /// Create a new provider
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(settings: OpenAiSettings) -> Result<Self> {
        if settings.api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for course providers".to_string(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            settings,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.settings.base_url.trim_end_matches('/'))
    }

    /// Run a chat completion in JSON mode and return the raw content string
    async fn chat_json(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.settings.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user.to_string(),
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
        };

        let response = self
            .client
            .post(self.endpoint("/v1/chat/completions"))
            .header("Authorization", format!("Bearer {}", self.settings.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "chat completion error {status}: {body}"
            )));
        }

        let result: ChatResponse = response.json().await?;
        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Generation("chat completion returned no content".to_string()))
    }
}

#[async_trait]
impl ContentGenerator for OpenAiProvider {
    async fn generate(&self, input: &CourseInput) -> Result<Vec<Level>> {
        input.validate()?;

        let seed = match input {
            CourseInput::Words { words } => {
                format!("Vocabulary list: {}", words.join(", "))
            }
            CourseInput::Article { text } => format!("Article:\n{text}"),
        };

        let system = format!(
            "You are a {target} teacher building a graded pronunciation course for a \
             {native} speaker. Produce a JSON object {{\"levels\": [...]}} where each \
             level has: source_text ({target} sentence), translation ({native}), tier \
             (\"basic\"|\"intermediate\"|\"advanced\"), grammar_notes (array of strings), \
             vocabulary (array of {{word, part_of_speech, meaning, usage_note, \
             is_user_word, ipa}}), word_tokens (one {{text, ipa, gloss}} per word of \
             source_text), and an optional tip. Order levels from easiest to hardest.",
            target = self.settings.target_language,
            native = self.settings.native_language,
        );

        tracing::debug!(model = %self.settings.chat_model, "requesting course generation");
        let content = self.chat_json(&system, &seed).await?;

        let course: GeneratedCourse = serde_json::from_str(&content)
            .map_err(|e| Error::Generation(format!("malformed course payload: {e}")))?;

        if course.levels.is_empty() {
            return Err(Error::Generation("generator returned no levels".to_string()));
        }

        // Ordinals are assigned here; the model's own ids are ignored
        let levels: Vec<Level> = course
            .levels
            .into_iter()
            .enumerate()
            .map(|(i, mut level)| {
                level.id = u32::try_from(i).unwrap_or(u32::MAX);
                level
            })
            .collect();

        tracing::info!(levels = levels.len(), "course generated");
        Ok(levels)
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiProvider {
    async fn synthesize(&self, text: &str) -> Result<Option<Vec<u8>>> {
        let request = SpeechRequest {
            model: &self.settings.tts_model,
            input: text,
            voice: &self.settings.tts_voice,
            response_format: "mp3",
        };

        let response = self
            .client
            .post(self.endpoint("/v1/audio/speech"))
            .header("Authorization", format!("Bearer {}", self.settings.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!("speech error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            tracing::debug!("synthesizer returned empty payload, caller falls back");
            return Ok(None);
        }

        Ok(Some(audio.to_vec()))
    }
}

#[async_trait]
impl ImageGenerator for OpenAiProvider {
    async fn illustrate(&self, text: &str) -> Result<Option<LevelImage>> {
        let request = ImageRequest {
            model: &self.settings.image_model,
            prompt: format!(
                "A simple, friendly illustration for a language-learning flashcard \
                 depicting: {text}. No text in the image."
            ),
            n: 1,
            size: "512x512",
            response_format: "b64_json",
        };

        let response = self
            .client
            .post(self.endpoint("/v1/images/generations"))
            .header("Authorization", format!("Bearer {}", self.settings.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Illustration(format!("image error {status}: {body}")));
        }

        let result: ImageResponse = response.json().await?;
        let Some(datum) = result.data.into_iter().next() else {
            return Ok(None);
        };

        let url = match (datum.b64_json, datum.url) {
            (Some(b64), _) => {
                // Validate the payload decodes before handing it to the UI
                base64::engine::general_purpose::STANDARD
                    .decode(&b64)
                    .map_err(|e| Error::Illustration(format!("invalid image payload: {e}")))?;
                format!("data:image/png;base64,{b64}")
            }
            (None, Some(url)) => url,
            (None, None) => return Ok(None),
        };

        Ok(Some(LevelImage { url }))
    }
}

#[async_trait]
impl PronunciationCritic for OpenAiProvider {
    async fn critique(&self, target: &str, transcript: &str) -> Result<Evaluation> {
        let system = format!(
            "You are a {target_lang} pronunciation coach. The learner tried to read a \
             sentence aloud; a speech recognizer transcribed the attempt. Compare the \
             transcript against the target sentence and respond with a JSON object \
             {{\"feedback\": string ({native} encouragement and critique), \"errors\": \
             [{{word, expected, produced, tip, contrast}}]}} listing likely phoneme-level \
             mistakes. An empty transcript or an unrelated transcript still gets gentle \
             feedback and an empty error list.",
            target_lang = self.settings.target_language,
            native = self.settings.native_language,
        );
        let user = format!("Target sentence: {target}\nRecognized transcript: {transcript}");

        let content = self
            .chat_json(&system, &user)
            .await
            .map_err(|e| Error::Critique(e.to_string()))?;

        let critique: CritiquePayload = serde_json::from_str(&content)
            .map_err(|e| Error::Critique(format!("malformed critique payload: {e}")))?;

        Ok(Evaluation {
            transcript: transcript.to_string(),
            feedback: critique.feedback,
            errors: critique.errors,
            created_at: Utc::now(),
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct GeneratedCourse {
    levels: Vec<Level>,
}

#[derive(Deserialize)]
struct CritiquePayload {
    feedback: String,
    #[serde(default)]
    errors: Vec<PhonemeError>,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'static str,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: String,
    n: u8,
    size: &'static str,
    response_format: &'static str,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
    url: Option<String>,
}
