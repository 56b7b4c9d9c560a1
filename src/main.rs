mod api;
mod commands;
mod gateway;

use anyhow::Context as _;
use checkdoc_channels::telegram::TelegramChannel;
use checkdoc_core::{
    assistant::ContextId,
    config::{self, CheckdocConfig, Config},
    traits::{Channel, Provider},
};
use checkdoc_memory::{EvictionPolicy, SessionStore};
use checkdoc_providers::OpenAiAssistantProvider;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "checkdoc",
    version,
    about = "CheckDoc: relay Telegram and web chat to a hosted assistant"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay.
    Start,
    /// Check configuration and assistant availability.
    Status,
    /// Send a one-shot message to the assistant in a fresh context.
    Ask {
        /// The message to send.
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = config::load(&cli.config)?;
    cfg.apply_env();

    // Keeps the file writer flushing until exit.
    let _log_guard = init_tracing(&cfg.checkdoc)?;

    match cli.command {
        Commands::Start => {
            cfg.validate()?;

            let provider = build_provider(&cfg)?;
            if !provider.is_available().await {
                anyhow::bail!(
                    "provider '{}' is not available. Check the API key and assistant id.",
                    provider.name()
                );
            }

            let mut channels: HashMap<String, Arc<dyn Channel>> = HashMap::new();
            if let Some(tg) = cfg.channel.telegram.as_ref().filter(|tg| tg.enabled) {
                channels.insert(
                    "telegram".to_string(),
                    Arc::new(TelegramChannel::new(tg.clone())),
                );
            }

            let sessions = SessionStore::new(EvictionPolicy::from_config(&cfg.sessions));
            let conversation = gateway::Conversation::new(
                provider.clone(),
                cfg.provider.poll_interval(),
                cfg.provider.turn_timeout(),
            );

            println!("{}: starting relay...", cfg.checkdoc.name);
            let gw = Arc::new(gateway::Gateway::new(
                provider,
                channels,
                sessions,
                conversation,
                cfg.replies.clone(),
                cfg.channel.clone(),
                cfg.api.clone(),
            ));
            gw.run().await?;
        }
        Commands::Status => {
            println!("{}: status check\n", cfg.checkdoc.name);
            println!("Config: {}", cli.config);
            match cfg.validate() {
                Ok(()) => println!("Config valid: yes"),
                Err(e) => println!("Config valid: no ({e})"),
            }
            println!();

            match build_provider(&cfg) {
                Ok(provider) => {
                    let available = provider.is_available().await;
                    println!(
                        "  {}: {}",
                        provider.name(),
                        if available { "available" } else { "unreachable" }
                    );
                }
                Err(e) => println!("  provider: {e}"),
            }

            if let Some(ref tg) = cfg.channel.telegram {
                println!(
                    "  telegram: {}",
                    if tg.enabled && !tg.bot_token.is_empty() {
                        match tg.mode {
                            config::TelegramMode::Polling => "configured (polling)",
                            config::TelegramMode::Webhook => "configured (webhook)",
                        }
                    } else if tg.enabled {
                        "enabled but missing bot_token"
                    } else {
                        "disabled"
                    }
                );
            } else {
                println!("  telegram: not configured");
            }

            if cfg.api.enabled {
                println!("  api: {}:{}", cfg.api.host, cfg.api.port);
            } else {
                println!("  api: disabled");
            }
        }
        Commands::Ask { message } => {
            let prompt = message.join(" ");
            let prompt = prompt.trim();
            if prompt.is_empty() {
                anyhow::bail!("no message provided. Usage: checkdoc ask <message>");
            }

            let provider = build_provider(&cfg)?;
            let conversation = gateway::Conversation::new(
                provider.clone(),
                cfg.provider.poll_interval(),
                cfg.provider.turn_timeout(),
            );

            let context: ContextId = provider.create_context().await?;
            let reply = conversation
                .converse(&context, prompt)
                .await
                .with_context(|| format!("assistant turn failed in context {context}"))?;
            println!("{reply}");
        }
    }

    Ok(())
}

/// Console logging, plus a non-blocking file writer when `log_file` is set.
fn init_tracing(cfg: &CheckdocConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer());

    let Some(log_file) = cfg.log_file.as_deref() else {
        registry.init();
        return Ok(None);
    };

    let path = Path::new(log_file);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("log_file '{log_file}' has no file name"))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    registry
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();
    Ok(Some(guard))
}

/// Build the assistant provider from config.
fn build_provider(cfg: &Config) -> anyhow::Result<Arc<dyn Provider>> {
    let p = &cfg.provider;
    if p.api_key.trim().is_empty() || p.assistant_id.trim().is_empty() {
        anyhow::bail!(
            "assistant credentials missing. Set OPENAI_API_KEY and GPT_ID \
             (or provider.api_key / provider.assistant_id in config.toml)."
        );
    }
    Ok(Arc::new(OpenAiAssistantProvider::from_config(
        p.base_url.clone(),
        p.api_key.clone(),
        p.assistant_id.clone(),
        p.request_timeout(),
    )?))
}
