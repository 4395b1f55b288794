// src/main.rs
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use pallet_builder::api::{self, ErrorResponse};
use pallet_builder::config::{AppConfig, OutputConfig};
use pallet_builder::error::EngineError;

/// Builds store pallets from order lines and applies optimization actions.
#[derive(Parser, Debug)]
#[command(name = "pallet-builder", version, about)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Allocate order lines to pallets and print insights
    Build {
        /// Request file with `orderLines` (stdin when omitted or `-`)
        input: Option<PathBuf>,
    },
    /// Apply implementable actions to pallets
    Implement {
        /// Request file with `pallets`, `orderLines` and `implementableActions`
        input: Option<PathBuf>,
    },
    /// Print the OpenAPI document of the request and response records
    Schema,
}

fn init_logger(verbose: bool) {
    let default_filter = if verbose {
        "pallet_builder=debug,info"
    } else {
        "pallet_builder=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let dotenv_result = dotenvy::dotenv();
    init_logger(cli.verbose);

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            tracing::warn!("⚠️ Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();
    info!("🚀 Pallet builder starting...");

    let result = match &cli.command {
        Command::Build { input } => api::read_request_source(input.as_deref())
            .and_then(|body| api::handle_build(&body, &app_config.optimizer))
            .and_then(|response| render(&response, &app_config.output)),
        Command::Implement { input } => api::read_request_source(input.as_deref())
            .and_then(|body| api::handle_implement(&body, &app_config.optimizer))
            .and_then(|response| render(&response, &app_config.output)),
        Command::Schema => render(api::openapi_doc(), &app_config.output),
    };

    match result {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("❌ {}", err);
            let body = ErrorResponse::from(&err);
            match render(&body, &app_config.output) {
                Ok(output) => println!("{output}"),
                Err(render_err) => error!("❌ Could not render error response: {}", render_err),
            }
            ExitCode::FAILURE
        }
    }
}

fn render<T: Serialize>(value: &T, output: &OutputConfig) -> Result<String, EngineError> {
    let rendered = if output.pretty_json() {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(rendered)
}
