mod error;
mod parsing;
mod progress;
mod prompt;
mod providers;
mod types;

pub use error::*;
pub use parsing::{format_timestamp, interpret_transcript, parse_segments, render_transcript};
pub use progress::{Progress, ProgressReporter};
pub use prompt::{transcription_prompt, vocabulary_hint};
pub use providers::*;
pub use types::*;

/// Routes a transcription to the driver selected in the settings.
///
/// Retries and rate coordination live inside the drivers; this layer only
/// dispatches.
#[derive(Default)]
pub struct Transcriber {
    gemini: Option<GeminiDriver>,
    openai: Option<OpenAIDriver>,
    assemblyai: Option<AssemblyAIDriver>,
}

impl Transcriber {
    pub fn builder() -> TranscriberBuilder {
        TranscriberBuilder::default()
    }

    pub fn is_configured(&self, provider: Provider) -> bool {
        match provider {
            Provider::Gemini => self.gemini.is_some(),
            Provider::OpenAI => self.openai.is_some(),
            Provider::AssemblyAI => self.assemblyai.is_some(),
        }
    }

    pub async fn transcribe(
        &self,
        file: &AudioFile,
        settings: &TranscriptionSettings,
        progress: &ProgressReporter,
    ) -> Result<TranscriptionResult> {
        tracing::info!(
            provider = %settings.provider,
            mode = %settings.mode,
            bytes = file.len(),
            mime_type = %file.mime_type,
            "transcription_request_received"
        );

        let result = match settings.provider {
            Provider::Gemini => {
                run(self.gemini.as_ref(), Provider::Gemini, file, settings, progress).await
            }
            Provider::OpenAI => {
                run(self.openai.as_ref(), Provider::OpenAI, file, settings, progress).await
            }
            Provider::AssemblyAI => {
                run(self.assemblyai.as_ref(), Provider::AssemblyAI, file, settings, progress).await
            }
        };

        if let Err(error) = &result {
            tracing::error!(provider = %settings.provider, error = %error, "transcription_failed");
        }
        result
    }
}

async fn run<D: TranscriptionDriver>(
    driver: Option<&D>,
    provider: Provider,
    file: &AudioFile,
    settings: &TranscriptionSettings,
    progress: &ProgressReporter,
) -> Result<TranscriptionResult> {
    let driver = driver.ok_or(Error::ProviderNotConfigured(provider))?;
    driver.transcribe(file, settings, progress).await
}

#[derive(Default)]
pub struct TranscriberBuilder {
    gemini: Option<GeminiDriver>,
    openai: Option<OpenAIDriver>,
    assemblyai: Option<AssemblyAIDriver>,
}

impl TranscriberBuilder {
    pub fn gemini(mut self, driver: GeminiDriver) -> Self {
        self.gemini = Some(driver);
        self
    }

    pub fn openai(mut self, driver: OpenAIDriver) -> Self {
        self.openai = Some(driver);
        self
    }

    pub fn assemblyai(mut self, driver: AssemblyAIDriver) -> Self {
        self.assemblyai = Some(driver);
        self
    }

    pub fn build(self) -> Transcriber {
        Transcriber {
            gemini: self.gemini,
            openai: self.openai,
            assemblyai: self.assemblyai,
        }
    }
}
