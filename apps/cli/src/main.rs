mod commands;
mod runtime;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "counsel", about = "Queued generation and cloud transcription")]
struct Cli {
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    #[arg(long, env = "GEMINI_MODEL", default_value = hypr_gemini::DEFAULT_MODEL)]
    gemini_model: String,

    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    openrouter_api_key: Option<String>,

    #[arg(long, env = "OPENROUTER_MODEL", default_value = hypr_ai_queue::DEFAULT_FALLBACK_MODEL)]
    openrouter_model: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, env = "ASSEMBLYAI_API_KEY", hide_env_values = true)]
    assemblyai_api_key: Option<String>,

    /// Suppress progress and rate-limit notices.
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe an audio or video file.
    Transcribe(commands::transcribe::Args),
    /// Send one or more prompts through the request queue.
    Generate(commands::generate::Args),
    /// Interactive conversation with a persistent session.
    Chat(commands::chat::Args),
}

impl Cli {
    fn credentials(&self) -> commands::Credentials {
        commands::Credentials {
            gemini_api_key: non_empty(&self.gemini_api_key),
            gemini_model: self.gemini_model.clone(),
            openrouter_api_key: non_empty(&self.openrouter_api_key),
            openrouter_model: self.openrouter_model.clone(),
            openai_api_key: non_empty(&self.openai_api_key),
            assemblyai_api_key: non_empty(&self.assemblyai_api_key),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let credentials = cli.credentials();

    match cli.command {
        Commands::Transcribe(args) => {
            commands::transcribe::run(&credentials, args, cli.quiet).await
        }
        Commands::Generate(args) => commands::generate::run(&credentials, args, cli.quiet).await,
        Commands::Chat(args) => commands::chat::run(&credentials, args, cli.quiet).await,
    }
}
