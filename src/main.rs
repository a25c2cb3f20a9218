use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

use wealthplan::api::{self, ApiError};

#[derive(Parser, Debug)]
#[command(
    name = "wealthplan",
    about = "Household wealth projector (marriage, mortgage, retirement, Monte Carlo)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON API.
    Serve {
        #[arg(long, env = "WEALTHPLAN_PORT", default_value_t = 8080)]
        port: u16,
    },
    /// Evaluate a plan document and print the result as JSON.
    Run {
        #[arg(long, help = "Path to a plan JSON document")]
        input: PathBuf,
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
}

fn run_plan_file(input: &Path, pretty: bool) -> Result<String, ApiError> {
    let json = std::fs::read_to_string(input)
        .map_err(|e| ApiError::Payload(format!("cannot read {}: {e}", input.display())))?;
    let request = api::plan_request_from_json(&json)?;
    let response = api::evaluate_plan(&request)?;
    let rendered = if pretty {
        serde_json::to_string_pretty(&response)
    } else {
        serde_json::to_string(&response)
    };
    rendered.map_err(|e| ApiError::Payload(e.to_string()))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Serve { port } => {
            if let Err(e) = api::run_http_server(port).await {
                error!(error = %e, "server error");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Command::Run { input, pretty } => match run_plan_file(&input, pretty) {
            Ok(output) => {
                println!("{output}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "plan evaluation failed");
                ExitCode::FAILURE
            }
        },
    }
}
