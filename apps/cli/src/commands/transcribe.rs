use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use hypr_transcribe_cloud::{
    AssemblyAIDriver, AudioFile, GeminiDriver, OpenAIDriver, Provider, Transcriber,
    TranscriptionMode, TranscriptionSettings,
};

use super::Credentials;
use crate::runtime::{CliRuntime, progress_reporter};

#[derive(clap::Args)]
pub struct Args {
    /// Audio or video file to transcribe.
    pub path: PathBuf,

    #[arg(long, short, default_value = "gemini")]
    pub provider: Provider,

    #[arg(long, short, default_value = "clean")]
    pub mode: TranscriptionMode,

    /// Term to spell exactly as given; repeat for more.
    #[arg(long = "vocab", value_name = "TERM")]
    pub vocabulary: Vec<String>,

    #[arg(long, short)]
    pub language: Option<String>,

    /// Print the full result as JSON instead of the transcript text.
    #[arg(long)]
    pub json: bool,
}

fn transcriber(credentials: &Credentials, quiet: bool) -> Transcriber {
    let mut builder = Transcriber::builder();

    if let Ok(client) = credentials.gemini() {
        let driver = GeminiDriver::new(client).runtime(Arc::new(CliRuntime::new(quiet)));
        builder = builder.gemini(driver);
    }
    if let Some(api_key) = &credentials.openai_api_key {
        builder = builder.openai(OpenAIDriver::new(api_key));
    }
    if let Some(api_key) = &credentials.assemblyai_api_key {
        builder = builder.assemblyai(AssemblyAIDriver::new(api_key));
    }

    builder.build()
}

pub async fn run(credentials: &Credentials, args: Args, quiet: bool) -> anyhow::Result<()> {
    let transcriber = transcriber(credentials, quiet);
    if !transcriber.is_configured(args.provider) {
        anyhow::bail!("no API key configured for {}", args.provider);
    }

    let file = AudioFile::from_path(&args.path)
        .await
        .with_context(|| format!("failed to read {}", args.path.display()))?;

    let mut settings = TranscriptionSettings::new(args.provider)
        .mode(args.mode)
        .vocabulary(args.vocabulary);
    if let Some(language) = args.language {
        settings = settings.language(language);
    }

    let result = transcriber
        .transcribe(&file, &settings, &progress_reporter(quiet))
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.text);
    }

    Ok(())
}
