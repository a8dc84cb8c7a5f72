use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use simplechat_core::{ApiClient, Config};
use tracing::{error, info};

mod app;
mod commands;
mod handler;
mod logging;
mod markdown;
mod tui;
mod ui;

use app::{App, Screen};
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "simplechat")]
#[command(version, about = "Terminal client for the Simple Chat AI backend")]
struct Cli {
    /// Backend base URL
    #[arg(long, global = true, env = "SIMPLE_CHAT_API_BASE")]
    api_base: Option<String>,

    /// Vector store used for knowledge-base uploads
    #[arg(long, global = true, env = "SIMPLE_CHAT_VECTOR_STORE_ID")]
    vector_store: Option<String>,

    /// Bearer token from a previous login
    #[arg(long, global = true, env = "SIMPLE_CHAT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Go straight to the chat screen
    #[arg(long)]
    skip_login: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the backend is up
    Health,
    /// Send a single prompt and print the reply
    Ask {
        /// Your message
        prompt: String,
    },
    /// Log in and print the session token
    Login {
        username: String,
    },
    /// Knowledge-base management
    Kb {
        #[command(subcommand)]
        command: KbCommand,
    },
}

#[derive(Subcommand)]
enum KbCommand {
    /// Create a vector store
    CreateStore {
        name: String,
    },
    /// Upload a document into a vector store
    Upload {
        /// Vector store id (defaults to the configured one)
        #[arg(short, long)]
        store: Option<String>,
        /// File to upload
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().context("failed to load config")?;
    if let Some(api_base) = cli.api_base {
        config.api_base = api_base;
    }
    if let Some(store) = cli.vector_store {
        config.vector_store_id = Some(store);
    }
    if cli.skip_login {
        config.skip_login = true;
    }

    match cli.command {
        Some(command) => {
            logging::init_stderr()?;
            let mut api = ApiClient::new(&config.api_base);
            api.set_token(cli.token);
            run_command(command, &mut api, &config).await
        }
        None => run_tui(config, cli.token).await,
    }
}

async fn run_command(command: Commands, api: &mut ApiClient, config: &Config) -> Result<()> {
    match command {
        Commands::Health => commands::health(api).await,
        Commands::Ask { prompt } => commands::ask(api, &prompt).await,
        Commands::Login { username } => commands::login(api, &username).await,
        Commands::Kb { command } => match command {
            KbCommand::CreateStore { name } => commands::create_store(api, &name).await,
            KbCommand::Upload { store, path } => {
                let store = store.or_else(|| config.vector_store_id.clone());
                commands::upload(api, store.as_deref(), &path).await
            }
        },
    }
}

async fn run_tui(config: Config, token: Option<String>) -> Result<()> {
    let log_path = logging::init_file()?;
    info!("starting simplechat against {} (log: {})", config.api_base, log_path.display());

    let mut app = App::new(config);
    if let Some(token) = token {
        app.api.set_token(Some(token));
        app.screen = Screen::Chat;
    }

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let tx = events.sender();

    handler::spawn_health_check(app.api.clone(), tx.clone());

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            let Some(event) = events.next().await else {
                break;
            };
            handler::handle_event(&mut app, event, &tx)?;
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;

    if let Err(err) = &result {
        error!("terminal session ended with error: {:#}", err);
    }
    result
}
