use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[strum(serialize = "gemini")]
    Gemini,
    #[strum(serialize = "openai")]
    OpenAI,
    #[strum(serialize = "assemblyai")]
    AssemblyAI,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TranscriptionMode {
    /// Keep fillers, false starts and repetitions.
    Verbatim,
    /// Light cleanup for readability without changing meaning.
    #[default]
    Clean,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionSettings {
    pub provider: Provider,
    #[serde(default)]
    pub vocabulary: Vec<String>,
    #[serde(default)]
    pub mode: TranscriptionMode,
    #[serde(default)]
    pub language: Option<String>,
}

impl TranscriptionSettings {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            vocabulary: Vec::new(),
            mode: TranscriptionMode::default(),
            language: None,
        }
    }

    pub fn vocabulary(mut self, vocabulary: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.vocabulary = vocabulary
            .into_iter()
            .map(Into::into)
            .filter(|term: &String| !term.trim().is_empty())
            .collect();
        self
    }

    pub fn mode(mut self, mode: TranscriptionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct AudioFile {
    pub bytes: Bytes,
    pub mime_type: String,
    pub display_name: String,
}

impl AudioFile {
    pub fn new(
        bytes: impl Into<Bytes>,
        mime_type: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
            display_name: display_name.into(),
        }
    }

    /// Reads the file and guesses its content type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        Ok(Self::new(
            bytes,
            hypr_audio_mime::path_to_content_type(path),
            display_name,
        ))
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Seconds from the start of the recording.
    pub start: f64,
    pub end: f64,
    pub speaker: String,
    pub text: String,
    /// 0 to 100 when the provider reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl TranscriptSegment {
    /// Clamps `start` to zero and `end` to at least `start`.
    pub fn new(start: f64, end: f64, speaker: impl Into<String>, text: impl Into<String>) -> Self {
        let start = if start.is_finite() { start.max(0.0) } else { 0.0 };
        let end = if end.is_finite() { end.max(start) } else { start };

        Self {
            start,
            end,
            speaker: speaker.into(),
            text: text.into(),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 100.0));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionResult {
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
    pub provider_used: Provider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
}
