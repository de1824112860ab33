use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;

use registration_bot::application::conversation::Conversation;
use registration_bot::application::errors::BotError;
use registration_bot::application::messaging::{Inbound, MessageDispatcher};
use registration_bot::application::services::{BotDataLoader, MessageForwarder, Notifier};
use registration_bot::domain::entities::{Locale, Phrases};
use registration_bot::domain::traits::{Bot, BotCommand, Helpdesk, SessionStore};
use registration_bot::infrastructure::adapters::telegram::TelegramAdapter;
use registration_bot::infrastructure::clients::{BackendClient, ChatwootClient, RetryPolicy, SmallTalkClient};
use registration_bot::infrastructure::config::Config;
use registration_bot::infrastructure::database::SqliteStore;
use registration_bot::infrastructure::server::{self, AppState};

/// Bound of the queue between the webhook server and the dispatcher
const QUEUE_CAPACITY: usize = 256;

#[derive(Parser)]
#[command(name = "registration-bot")]
#[command(about = "Telegram bot registering students and volunteer teachers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Bot token (overrides config)
    #[arg(short, long)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run {
        #[arg(long, value_enum, default_value_t = RunMode::Webhook)]
        mode: RunMode,
    },
    /// Register the webhook URL with Telegram
    SetWebhook,
    /// Remove the webhook so long polling works
    DeleteWebhook,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RunMode {
    Webhook,
    Polling,
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("registration-bot v{}", env!("CARGO_PKG_VERSION"));
            return;
        }
        Commands::InitConfig => {
            init_config();
            return;
        }
        _ => {}
    }

    let config = match load_config(&cli.config, cli.token) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    init_logging(&config.logging.level);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let result = rt.block_on(async {
        match cli.command {
            Commands::Run { mode } => run_bot(config, mode).await,
            Commands::SetWebhook => set_webhook(&config).await,
            Commands::DeleteWebhook => delete_webhook(&config).await,
            Commands::Version | Commands::InitConfig => Ok(()),
        }
    });

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

/// Config file if present, then `.env` and process environment on top
fn load_config(path: &str, token_override: Option<String>) -> Result<Config, BotError> {
    let mut config = if std::path::Path::new(path).exists() {
        Config::load(path).map_err(|e| BotError::Config(e.to_string()))?
    } else {
        Config::default()
    };
    config
        .apply_env(|name| std::env::var(name).ok())
        .map_err(|e| BotError::Config(e.to_string()))?;
    if let Some(token) = token_override {
        config.bot.token = Some(token);
    }
    Ok(config)
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .init();
}

fn init_config() {
    match serde_yaml::to_string(&Config::default()) {
        Ok(yaml) => {
            println!("{}", yaml);
            println!("\nSave this to config.yaml and adjust as needed.");
        }
        Err(e) => eprintln!("Failed to render config: {}", e),
    }
}

fn telegram(config: &Config) -> Result<TelegramAdapter, BotError> {
    config
        .bot
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(TelegramAdapter::new)
        .ok_or_else(|| BotError::Config("BOT_TOKEN is not set".to_string()))
}

async fn set_webhook(config: &Config) -> Result<(), BotError> {
    let url = config
        .telegram_webhook_url()
        .ok_or_else(|| BotError::Config("WEBHOOK_URL_PREFIX is not set".to_string()))?;
    telegram(config)?
        .set_webhook(&url, config.webhook.secret_token.as_deref())
        .await
}

async fn delete_webhook(config: &Config) -> Result<(), BotError> {
    telegram(config)?.delete_webhook().await
}

fn retry_policy(config: &Config) -> RetryPolicy {
    RetryPolicy {
        max_attempts: config.backend.max_attempts,
        base_delay: Duration::from_secs(config.backend.retry_base_delay_secs),
    }
}

/// Commands shown in the Telegram menu, one set per interface language
async fn register_commands(bot: &dyn Bot, phrases: &Phrases) -> Result<(), BotError> {
    for locale in Locale::ALL {
        let commands: Vec<BotCommand> = ["start", "cancel"]
            .iter()
            .map(|name| BotCommand {
                command: name.to_string(),
                description: phrases.get(&format!("command_{}", name), locale).to_string(),
            })
            .collect();
        bot.set_commands(&commands, locale.telegram_code()).await?;
    }
    Ok(())
}

async fn run_bot(config: Config, mode: RunMode) -> Result<(), BotError> {
    config
        .validate(mode == RunMode::Webhook)
        .map_err(|e| BotError::Config(e.to_string()))?;

    let mut adapter = telegram(&config)?;
    adapter.fetch_bot_info().await?;
    tracing::info!("Bot started: @{}", adapter.bot_info().username);
    let telegram_adapter = Arc::new(adapter);
    let bot: Arc<dyn Bot> = telegram_adapter.clone();

    let phrases = match &config.bot.phrases_path {
        Some(path) => Phrases::load(path),
        None => Phrases::bundled(),
    }
    .map_err(|e| BotError::Config(e.to_string()))?;
    tracing::info!("Loaded {} phrases", phrases.len());

    let retry = retry_policy(&config);
    let backend = Arc::new(BackendClient::new(config.backend.url_prefix.clone(), retry));
    let data = Arc::new(BotDataLoader::load(backend.as_ref(), phrases).await?);

    let smalltalk = Arc::new(
        SmallTalkClient::new(
            config.smalltalk.url_prefix.clone(),
            config.smalltalk.token.as_deref().unwrap_or_default(),
            config.smalltalk.test_id.clone().unwrap_or_default(),
            retry,
        )
        .with_polling(
            Duration::from_secs(config.smalltalk.poll_interval_secs),
            config.smalltalk.max_poll_attempts,
        ),
    );

    let helpdesk: Arc<dyn Helpdesk> = if config.chatwoot.enabled {
        Arc::new(ChatwootClient::new(
            config.chatwoot.url_prefix.clone(),
            config.chatwoot.api_token.as_deref().unwrap_or_default(),
            config.chatwoot.inbox_id.unwrap_or_default(),
            config.chatwoot.chat_id_attribute.clone(),
            retry,
        ))
    } else {
        Arc::new(ChatwootClient::disabled())
    };

    let store: Arc<dyn SessionStore> = Arc::new(SqliteStore::new(&config.persistence.database_path)?);
    tracing::info!("Sessions stored in {}", config.persistence.database_path.display());

    let notifier = Notifier::new(bot.clone(), config.bot.admin_chat_id);
    let forwarder = Arc::new(MessageForwarder::new(bot.clone(), helpdesk, backend.clone(), store.clone()));
    let conversation = Arc::new(
        Conversation::new(bot.clone(), backend, smalltalk, forwarder.clone(), data.clone(), notifier.clone())
            .with_speaking_club_coordinator(config.bot.speaking_club_coordinator_username.clone()),
    );
    let dispatcher = Arc::new(
        MessageDispatcher::new(conversation, forwarder, store, notifier.clone())
            .with_owner(config.bot.owner_username.clone()),
    );

    if let Err(e) = register_commands(bot.as_ref(), &data.phrases).await {
        tracing::warn!("Failed to register commands: {}", e);
    }
    notifier.info("Registration bot started", None, true).await;

    let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
    tokio::spawn(dispatcher.run(receiver));

    match mode {
        RunMode::Webhook => {
            let state = AppState {
                sender,
                secret_token: config.webhook.secret_token.clone(),
                chat_id_attribute: config.chatwoot.chat_id_attribute.clone(),
            };
            let app = server::router(state, &config.webhook.telegram_path, &config.webhook.chatwoot_path);
            server::serve(app, &config.webhook.listen_addr).await
        }
        RunMode::Polling => {
            run_polling(&telegram_adapter, sender).await;
            Ok(())
        }
    }
}

async fn run_polling(bot: &TelegramAdapter, sender: mpsc::Sender<Inbound>) {
    let mut offset: i64 = 0;
    let timeout_seconds = 30;

    tracing::info!("Starting polling loop...");

    loop {
        match bot.get_updates(offset, timeout_seconds).await {
            Ok(updates) => {
                if !updates.is_empty() {
                    tracing::debug!("Received {} updates", updates.len());
                    offset = TelegramAdapter::get_next_offset(&updates);
                }
                for update in updates {
                    let Some(incoming) = update.into_incoming() else {
                        continue;
                    };
                    if sender.send(Inbound::Telegram(incoming)).await.is_err() {
                        tracing::error!("Update queue is closed, stopping polling");
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::error!("Failed to get updates: {}", e);
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}
