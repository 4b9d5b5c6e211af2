use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use tally_cli::{
    app::{self, RunOptions, DEFAULT_PROMPT},
    config::{Settings, DEFAULT_SETTINGS_PATH},
    logging::init_logging,
};
use tally_persist::{ResponseMapper, UsageStore};

/// Send a prompt to a chat-completions API and record its token usage
#[derive(Debug, Parser)]
#[command(name = "tally", version, about)]
struct Cli {
    /// Prompt sent to the model
    prompt: Option<String>,

    /// Settings file (YAML)
    #[arg(short, long, env = "TALLY_CONFIG", default_value = DEFAULT_SETTINGS_PATH)]
    config: PathBuf,

    /// Provider profile to use instead of `default_provider`
    #[arg(short, long)]
    provider: Option<String>,

    /// Also print the full JSON response
    #[arg(long)]
    raw: bool,

    /// Do not record usage for this call
    #[arg(long)]
    no_store: bool,

    /// Print aggregate usage stats and exit
    #[arg(long, conflicts_with_all = ["dump", "prompt"])]
    stats: bool,

    /// Print stored usage rows and exit
    #[arg(long, conflicts_with = "prompt")]
    dump: bool,

    /// Maximum number of rows printed by --dump
    #[arg(long, requires = "dump")]
    limit: Option<usize>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let settings = Settings::load(&cli.config)
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&settings.logging);

    let root = tracing::info_span!("tally");

    if cli.stats || cli.dump {
        let store = UsageStore::open_at(&settings.storage.path)?
            .with_span(tracing::info_span!(parent: &root, "usage_store"));
        println!("{}", app::render_store(&store, cli.stats, cli.limit)?);
        return Ok(ExitCode::SUCCESS);
    }

    let profile = settings.profile(cli.provider.as_deref())?;
    tracing::info!(provider = %profile.provider, model = %profile.model, "Provider profile loaded");

    let client = app::build_client(&profile, settings.http.timeout())?
        .with_span(tracing::info_span!(parent: &root, "chat_client", provider = %profile.provider));

    // A store that cannot be opened only disables recording
    let mut store = if cli.no_store {
        None
    } else {
        match UsageStore::open_at(&settings.storage.path) {
            Ok(store) => Some(store.with_span(tracing::info_span!(parent: &root, "usage_store"))),
            Err(e) => {
                tracing::warn!(error = %e, "Usage store unavailable; usage will not be recorded");
                None
            }
        }
    };
    let mapper = ResponseMapper::with_span(tracing::info_span!(parent: &root, "response_mapper"));

    let prompt = cli.prompt.as_deref().unwrap_or(DEFAULT_PROMPT);
    let options = RunOptions {
        show_raw: cli.raw,
        width: 0,
    };

    match app::run(&client, &profile, &mapper, store.as_mut(), prompt, options).await {
        Ok(outcome) => {
            println!("{}", outcome.display);
            if let Some(err) = outcome.persist_error {
                eprintln!("Usage not recorded: {}", err);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            tracing::error!(error = %err, "Chat completion failed");
            println!(
                "{}",
                serde_json::to_string_pretty(&err.to_payload()).unwrap_or_else(|_| err.to_string())
            );
            Ok(ExitCode::FAILURE)
        }
    }
}
