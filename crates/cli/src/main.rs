mod http;

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::{Context, bail},
    clap::{Parser, Subcommand},
    cortex_actuator::SerialActuator,
    cortex_bridge::{Dispatcher, Pipeline},
    cortex_config::{CortexConfig, FlowdockConfig},
    cortex_flowdock::{ChannelDirectory, FlowdockApi},
    cortex_intent::{IntentClassifier, WitClassifier},
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "cortex", about = "Cortex, a Flowdock bot that acts on what you ask it")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: cortex.toml/.yaml/.json in ./ or ~/.config/cortex/).
    #[arg(long, global = true, env = "CORTEX_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen to the configured flows and serve the HTTP endpoints (default).
    Run,
    /// Print the intent Wit finds in a message or a WAV recording.
    Classify {
        /// Message text.
        #[arg(required_unless_present = "wav", conflicts_with = "wav")]
        text: Option<String>,
        /// WAV recording to transcribe and classify.
        #[arg(long)]
        wav: Option<PathBuf>,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "cortex starting");

    let config = cortex_config::discover_and_load(cli.config.as_deref())?;

    match cli.command {
        None | Some(Commands::Run) => run(config).await,
        Some(Commands::Classify { text, wav }) => classify(&config, text, wav).await,
    }
}

async fn run(config: CortexConfig) -> anyhow::Result<()> {
    cortex_config::validate(&config)?;

    let api = FlowdockApi::new(&config.flowdock);
    let directory = Arc::new(ChannelDirectory::new(api.clone()));
    let classifier = Arc::new(WitClassifier::new(&config.wit));
    let actuator = Arc::new(SerialActuator::from_config(
        config.actuator.device.as_deref(),
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        classifier,
        actuator,
        directory.clone(),
        config.flowdock.issue_trackers.clone(),
    ));

    if !config.stream_enabled() {
        return match config.http.bind_addr() {
            Some(addr) => http::serve(addr, dispatcher).await,
            None => Ok(()),
        };
    }

    let server = config
        .http
        .bind_addr()
        .map(|addr| http::spawn(addr, Arc::clone(&dispatcher)));

    let bot_user_id = bot_identity(&api, &config.flowdock).await?;
    let pipeline = Pipeline::new(api, &config.flowdock, bot_user_id, dispatcher, directory)?;
    let result = pipeline.run().await;
    if let Some(handle) = server {
        handle.abort();
    }
    result.context("flow stream stopped")
}

/// The bot's own Flowdock user id, so it never answers itself.
async fn bot_identity(api: &FlowdockApi, config: &FlowdockConfig) -> anyhow::Result<Option<String>> {
    if let Some(id) = &config.bot_user_id {
        return Ok(Some(id.clone()));
    }
    let Some(email) = config.bot_email.as_deref() else {
        warn!("neither bot_user_id nor bot_email is set, own replies will not be filtered");
        return Ok(None);
    };
    let id = cortex_flowdock::users::resolve_bot_user_id(api, email)
        .await
        .context("failed to look up the bot user")?;
    match &id {
        Some(id) => info!(bot_user_id = %id, "bot user resolved"),
        None => warn!(email, "no Flowdock user has the configured bot_email"),
    }
    Ok(id)
}

async fn classify(
    config: &CortexConfig,
    text: Option<String>,
    wav: Option<PathBuf>,
) -> anyhow::Result<()> {
    let classifier = WitClassifier::new(&config.wit);
    let intent = match (text, wav) {
        (_, Some(path)) => {
            let audio = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            classifier.classify_speech(audio).await?
        },
        (Some(text), None) => classifier.classify(&text).await?,
        (None, None) => bail!("give a message to classify or --wav <file>"),
    };
    println!("{}", serde_json::to_string_pretty(&intent)?);
    Ok(())
}
