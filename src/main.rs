use clap::Parser;
use oas_explorer::config::{CliArgs, Command};
use oas_explorer::tools::{self, TOOLS, ToolResponse};
use oas_explorer::{ExplorerConfig, SpecService};
use serde_json::Value;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_json(value: &impl serde::Serialize) -> bool {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            true
        }
        Err(e) => {
            tracing::error!("Failed to encode output: {}", e);
            false
        }
    }
}

fn main() -> ExitCode {
    let cli = CliArgs::parse();
    init_logging(&cli.log_level);

    let config = ExplorerConfig::from_args(&cli);
    tracing::debug!(?config, "starting oas-explorer");

    match &cli.command {
        Command::Tools => {
            if print_json(&TOOLS) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Command::Call { tool, args } => {
            let service = SpecService::new(config);
            let response = run_call(&service, &cli, tool, args);
            if print_json(&response) && response.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run_call(service: &SpecService, cli: &CliArgs, tool: &str, args: &str) -> ToolResponse {
    let arguments: Value = match serde_json::from_str(args) {
        Ok(arguments) => arguments,
        Err(e) => {
            let error = oas_explorer::SpecError::InvalidInput {
                message: format!("--args is not valid JSON: {}", e),
            };
            return ToolResponse::failure(&error);
        }
    };

    if let Some(options) = cli.load_options() {
        if tool != "load_spec" {
            if let Err(e) = service.load(&options) {
                tracing::error!("Could not load specification: {}", e);
                return ToolResponse::failure(&e);
            }
        }
    }

    tracing::info!(tool, "calling tool");
    tools::call_tool(service, tool, arguments)
}
