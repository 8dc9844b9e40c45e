#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::assigning_clones,
    clippy::bool_to_int_with_if,
    clippy::case_sensitive_file_extension_comparisons,
    clippy::cast_possible_wrap,
    clippy::doc_markdown,
    clippy::field_reassign_with_default,
    clippy::float_cmp,
    clippy::implicit_clone,
    clippy::items_after_statements,
    clippy::map_unwrap_or,
    clippy::manual_let_else,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::needless_raw_string_hashes,
    clippy::redundant_closure_for_method_calls,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unused_self,
    clippy::cast_precision_loss,
    clippy::unnecessary_cast,
    clippy::unnecessary_lazy_evaluations,
    clippy::unnecessary_literal_bound,
    clippy::unnecessary_map_or,
    clippy::unnecessary_wraps,
    dead_code
)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use stockchat::config::Config;
use stockchat::erp::{fixture_source, ErpTables};
use stockchat::gateway::{self, AppState};
use stockchat::providers;
use stockchat::relay::{ChatInput, StdoutSink};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// `stockchat` - inventory chat assistant gateway.
#[derive(Parser, Debug)]
#[command(name = "stockchat")]
#[command(version)]
#[command(about = "Mock inventory API with a streaming LLM chat relay.", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway server (REST API and chat WebSocket)
    #[command(long_about = "\
Start the gateway server.

Serves the inventory/order REST API under /api and the streaming chat \
protocol on /ws. Bind address defaults to the values in your config \
file (gateway.host / gateway.port).

Examples:
  stockchat gateway                  # use config defaults
  stockchat gateway -p 8080          # listen on port 8080
  stockchat gateway --host 0.0.0.0   # bind to all interfaces
  stockchat gateway -p 0             # random available port")]
    Gateway {
        /// Port to listen on (use 0 for random available port); defaults to config gateway.port
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to; defaults to config gateway.host
        #[arg(long)]
        host: Option<String>,
    },

    /// Run chat turns from the terminal
    #[command(long_about = "\
Run chat turns from the terminal.

Each turn goes through the same relay as the WebSocket endpoint and \
prints the protocol frames to stdout as JSON lines. Without --message, \
every line read from stdin is one turn.

Examples:
  stockchat agent -m \"Which SKUs are low on stock?\"
  stockchat agent --user alice")]
    Agent {
        /// Single message mode (don't read stdin)
        #[arg(short, long)]
        message: Option<String>,

        /// Conversation owner
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Show configuration, provider and fixture status
    Status,

    /// Manage configuration
    #[command(long_about = "\
Manage stockchat configuration.

Use 'schema' to dump the full JSON Schema for the config file, which \
documents every available key, type, and default value.

Examples:
  stockchat config schema              # print JSON Schema to stdout
  stockchat config schema > schema.json")]
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Dump the full configuration JSON Schema to stdout
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.trim().is_empty() {
            bail!("--config-dir cannot be empty");
        }
        std::env::set_var("STOCKCHAT_CONFIG_DIR", config_dir);
    }

    // Schema output stays stdout-only.
    if let Commands::Config {
        config_command: ConfigCommands::Schema,
    } = &cli.command
    {
        let schema = schemars::schema_for!(Config);
        println!(
            "{}",
            serde_json::to_string_pretty(&schema).context("Failed to serialize JSON Schema")?
        );
        return Ok(());
    }

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    let config = Config::load_or_init().await?;

    match cli.command {
        Commands::Config { .. } => Ok(()),

        Commands::Gateway { port, host } => {
            let port = port.unwrap_or(config.gateway.port);
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            if port == 0 {
                info!("Starting stockchat gateway on {host} (random port)");
            } else {
                info!("Starting stockchat gateway on {host}:{port}");
            }
            gateway::run_gateway(&host, port, config).await
        }

        Commands::Agent { message, user } => run_agent(config, message, &user).await,

        Commands::Status => print_status(&config),
    }
}

async fn run_agent(config: Config, message: Option<String>, user: &str) -> Result<()> {
    let state = AppState::from_config(config)?;
    let mut sink = StdoutSink::new();

    if let Some(message) = message {
        let outcome = state
            .relay
            .handle_turn(&mut sink, &ChatInput::Text(message), user)
            .await?;
        info!(?outcome, frames = sink.frames_written(), "Turn finished");
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line == "/quit" || line == "/exit" {
            break;
        }
        let outcome = state
            .relay
            .handle_turn(&mut sink, &ChatInput::Text(line.to_string()), user)
            .await?;
        info!(?outcome, "Turn finished");
    }
    info!(frames = sink.frames_written(), "Agent session ended");
    Ok(())
}

fn print_status(config: &Config) -> Result<()> {
    println!("stockchat status");
    println!();
    println!("Version:     {}", env!("CARGO_PKG_VERSION"));
    println!("Config:      {}", config.config_path.display());
    println!();
    println!("Provider:    {}", config.default_provider);
    println!("  Model:       {}", config.default_model);
    println!("  Temperature: {}", config.default_temperature);
    println!(
        "  API URL:     {}",
        config.api_url.as_deref().unwrap_or("(provider default)")
    );
    println!(
        "  Credential:  {}",
        if config.credential().is_some() {
            "configured"
        } else {
            "missing (chat turns will report a configuration error)"
        }
    );
    println!();
    println!(
        "Gateway:     {}:{} (timeout {}s, body limit {} bytes)",
        config.gateway.host,
        config.gateway.port,
        config.gateway.request_timeout_secs,
        config.gateway.max_body_bytes
    );

    let data_dir = config.fixtures.resolved_data_dir();
    let source = fixture_source(data_dir.as_deref());
    println!();
    println!("Fixtures:    {}", source.describe());
    match ErpTables::load(source.as_ref()) {
        Ok(tables) => {
            let counts = tables.counts();
            println!("  Stock rows:    {}", counts.stock);
            println!("  Locations:     {}", counts.locations);
            println!("  Orders:        {}", counts.orders);
            println!("  Products:      {}", counts.products);
            println!("  Customers:     {}", counts.customers);
            println!("  Sales records: {}", counts.sales_history);
        }
        Err(e) => println!("  Failed to load: {e:#}"),
    }

    println!();
    println!("Supported providers:");
    let current = config.default_provider.trim().to_ascii_lowercase();
    for p in providers::list_providers() {
        let marker = if p.name == current { " (active)" } else { "" };
        println!("  {:<8} {}{}", p.name, p.display_name, marker);
    }
    Ok(())
}
