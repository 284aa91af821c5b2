mod config;
mod ecoscore;
mod instrumentation;
mod llm;
mod pipeline;
mod search;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};

use config::Config;
use pipeline::{Mode, ModeProfile, Pipeline, PipelineError};
use search::QueryRule;

#[derive(Parser)]
#[command(
    name = "eco-assistant",
    about = "Eco-shopping and recycling suggestions from web search and a local model"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Address to listen on (overrides BIND_ADDR)
        #[arg(long)]
        addr: Option<String>,
    },
    /// Ask about a single item read from stdin
    Ask {
        #[arg(long, value_enum, default_value_t = Mode::Shopping)]
        mode: Mode,
        /// Override the mode's query rule
        #[arg(long, value_enum)]
        rule: Option<QueryRule>,
    },
}

fn json_logs(log_format: Option<&str>) -> bool {
    log_format.is_some_and(|f| f.trim().eq_ignore_ascii_case("json"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG and LOG_FORMAT may come from .env.
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    if json_logs(std::env::var("LOG_FORMAT").ok().as_deref()) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    match cli.command {
        Commands::Serve { addr } => {
            if let Some(addr) = addr {
                config.bind_addr = addr;
            }
            server::serve(&config).await?;
        }
        Commands::Ask { mode, rule } => {
            let mut profile = ModeProfile::for_mode(mode);
            if let Some(rule) = rule {
                profile = profile.with_rule(rule);
            }
            let pipeline = Pipeline::new(&config)?;

            print!("Enter the item: ");
            std::io::stdout().flush().context("Failed to flush stdout")?;
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("Failed to read item from stdin")?;

            match pipeline.run(profile, &line).await {
                Ok(answer) => {
                    println!("{}", answer.context);
                    println!("\nLlama Response:\n");
                    println!("{}", answer.response);
                }
                Err(PipelineError::EmptyQuery) => println!("Empty question. Exiting."),
                Err(PipelineError::NoResults) => println!("No results found."),
            }
        }
    }

    Ok(())
}
