use hypr_ai_queue::SessionRegistry;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::Credentials;

#[derive(clap::Args)]
pub struct Args {
    /// Session key, e.g. `witness-3-case-12`.
    #[arg(long, default_value = "default")]
    pub key: String,

    #[arg(long, default_value = "assistant")]
    pub role: String,

    #[arg(long, short)]
    pub system: Option<String>,
}

pub async fn run(credentials: &Credentials, args: Args, quiet: bool) -> anyhow::Result<()> {
    let assistant = credentials.assistant(quiet)?;
    let registry = SessionRegistry::new();
    let session = registry.get_or_create(&args.key, &args.role, args.system.as_deref(), Vec::new());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }

        match session.send_message(&assistant, line).await {
            Ok(reply) => println!("{reply}\n"),
            Err(error) => eprintln!("error: {error}"),
        }
    }

    registry.remove_all();
    Ok(())
}
