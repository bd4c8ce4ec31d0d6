//! gcalbridge CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use gcalbridge_cli::cli::{AuthAction, Cli, Command, ConfigAction, EventAction};
use gcalbridge_cli::commands::{auth, calendar as calendar_cmd, config as config_cmd};
use gcalbridge_cli::config::ClientConfig;
use gcalbridge_cli::error::{ClientError, ClientResult};
use gcalbridge_cli::output::OutputFormat;
use gcalbridge_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::cli()
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config = match cli.config {
        Some(ref path) => ClientConfig::load_from(path),
        None => ClientConfig::load(),
    }
    .map_err(ClientError::Config)?;

    let format = OutputFormat::from_json_flag(cli.json);

    match cli.command {
        Command::Auth { action } => match action {
            AuthAction::Link { html, open } => auth::link(&config, html, open),
            AuthAction::Configure { code } => auth::configure(&config, code.as_deref()).await,
            AuthAction::Status => auth::status(&config, format),
            AuthAction::Reset => auth::reset(&config),
        },
        Command::Calendars => calendar_cmd::calendars(&config, format).await,
        Command::Events { calendar } => {
            calendar_cmd::events(&config, calendar.as_deref(), format).await
        }
        Command::Event { action } => match action {
            EventAction::Get { id, calendar } => {
                calendar_cmd::get(&config, &id, calendar.as_deref(), format).await
            }
            EventAction::Add { fields, calendar } => {
                calendar_cmd::add(&config, &fields, calendar.as_deref(), format).await
            }
            EventAction::Update {
                id,
                fields,
                calendar,
            } => calendar_cmd::update(&config, &id, &fields, calendar.as_deref(), format).await,
            EventAction::Delete { id, calendar } => {
                calendar_cmd::delete(&config, &id, calendar.as_deref()).await
            }
        },
        Command::Config { action } => match action {
            ConfigAction::Dump => config_cmd::dump(&config),
            ConfigAction::Validate => config_cmd::validate(&config),
            ConfigAction::Path => config_cmd::path(&config),
            ConfigAction::Init { force } => config_cmd::init(&config, force),
        },
    }
}
