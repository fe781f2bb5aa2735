use super::Credentials;

#[derive(clap::Args)]
pub struct Args {
    /// Prompts are queued together and answered in order.
    #[arg(required = true)]
    pub prompts: Vec<String>,

    #[arg(long, short)]
    pub system: Option<String>,
}

pub async fn run(credentials: &Credentials, args: Args, quiet: bool) -> anyhow::Result<()> {
    let assistant = credentials.assistant(quiet)?;

    let handles: Vec<_> = args
        .prompts
        .into_iter()
        .map(|prompt| {
            let assistant = assistant.clone();
            let system = args.system.clone();
            tokio::spawn(async move { assistant.generate_text(system.as_deref(), &prompt).await })
        })
        .collect();

    for (index, handle) in handles.into_iter().enumerate() {
        let answer = handle.await??;
        if index > 0 {
            println!();
        }
        println!("{answer}");
    }

    Ok(())
}
