use anyhow::Result;
use clap::{Parser, Subcommand};
use openchat::cli;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "openchat")]
#[command(about = "Multi-provider LLM chat client and relay server", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Working directory
    #[arg(short = 'C', long, global = true)]
    directory: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single prompt
    #[command(alias = "ask")]
    Prompt {
        /// The prompt to send
        prompt: String,

        /// Model to use (provider/model format)
        #[arg(short, long)]
        model: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Start the HTTP relay server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "19876")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Manage conversations
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum SessionCommands {
    /// List all conversations
    List,
    /// Show conversation details
    Show {
        /// Conversation ID
        id: String,
    },
    /// Delete a conversation
    Delete {
        /// Conversation ID
        id: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Show configuration file path
    Path,
    /// Initialize configuration file with defaults
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Change directory if specified
    if let Some(dir) = &cli.directory {
        std::env::set_current_dir(dir)?;
    }

    match cli.command {
        Commands::Prompt {
            prompt,
            model,
            format,
        } => {
            cli::prompt::execute(&prompt, model.as_deref(), &format).await?;
        }
        Commands::Serve { port, host } => {
            cli::serve::execute(&host, port).await?;
        }
        Commands::Session { command } => match command {
            SessionCommands::List => {
                cli::session::list().await?;
            }
            SessionCommands::Show { id } => {
                cli::session::show(&id).await?;
            }
            SessionCommands::Delete { id } => {
                cli::session::delete(&id).await?;
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                cli::config::show().await?;
            }
            ConfigCommands::Path => {
                cli::config::path().await?;
            }
            ConfigCommands::Init => {
                cli::config::init().await?;
            }
        },
        Commands::Version => {
            println!("openchat {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
