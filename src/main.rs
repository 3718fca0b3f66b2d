use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bota_cli::config::Config;
use bota_cli::render::ThemeKind;
use bota_cli::transport;

#[derive(Parser)]
#[command(name = "bota")]
#[command(author, version, about = "BOTA - chat assistant that writes and runs Python for you", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat with the assistant
    Chat {
        /// Chat completion endpoint
        #[arg(long)]
        chat_url: Option<String>,

        /// Code execution endpoint
        #[arg(long)]
        execute_url: Option<String>,

        /// Model instance to request from the chat service
        #[arg(short, long)]
        instance: Option<String>,

        /// Highlighting theme (dark, light)
        #[arg(long)]
        theme: Option<ThemeKind>,
    },

    /// Show the effective configuration
    Config {
        /// Also write it to the config file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "bota_cli=debug,bota=debug"
    } else {
        "bota_cli=info,bota=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load()?;

    match cli.command {
        Commands::Chat {
            chat_url,
            execute_url,
            instance,
            theme,
        } => {
            if let Some(url) = chat_url {
                config.chat.endpoint = url;
            }
            if let Some(url) = execute_url {
                config.sandbox.endpoint = url;
            }
            if instance.is_some() {
                config.chat.instance = instance;
            }
            if let Some(theme) = theme {
                config.render.theme = theme;
            }

            tracing::info!(
                "Starting chat against {} (sandbox {})",
                config.chat.endpoint,
                config.sandbox.endpoint
            );
            transport::cli::run_chat(config).await?;
        }
        Commands::Config { save } => {
            transport::cli::run_show_config(&config)?;
            if save {
                config.save()?;
                println!("Saved to {}", Config::config_path()?.display());
            }
        }
    }

    Ok(())
}
