use clap::Parser;
use owo_colors::{OwoColorize, Style};
use cadence_core::db;
use cadence_core::error::CoreError;
use cadence_core::projection::OccurrenceProjector;
use cadence_core::repository::SqliteRepository;
use tracing::Level;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod parser;
mod views;

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CADENCE_LOG").unwrap_or_else(|_| EnvFilter::new(Level::WARN.to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = cli::Cli::parse();

    let mut config = match config::Config::new() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} Failed to load configuration: {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };
    if let Some(path) = &cli.database {
        config.engine.database_path = path.to_string_lossy().into_owned();
    }

    let db_pool = match db::establish_connection_with(&config.engine).await {
        Ok(pool) => pool,
        Err(e) => {
            handle_error(e.into());
            std::process::exit(1);
        }
    };
    let repository = SqliteRepository::new(db_pool, OccurrenceProjector::from_config(&config.engine));

    let result = match cli.command {
        cli::Commands::Create(command) => commands::series::create_series(&repository, command, &config).await,
        cli::Commands::Show(command) => commands::series::show_series(&repository, command).await,
        cli::Commands::Exceptions(command) => commands::series::list_exceptions(&repository, command).await,
        cli::Commands::Expand(command) => {
            commands::occurrences::expand_series(&repository, command, &config).await
        }
        cli::Commands::Calendar(command) => {
            commands::occurrences::show_calendar(&repository, command, &config).await
        }
        cli::Commands::Edit(command) => commands::edit::edit_series(&repository, command).await,
        cli::Commands::Delete(command) => commands::delete::delete_series(&repository, command).await,
        cli::Commands::Restore(command) => commands::delete::restore_occurrence(&repository, command).await,
    };

    if let Err(e) = result {
        handle_error(e);
        std::process::exit(1);
    }
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    match err.chain().find_map(|e| e.downcast_ref::<CoreError>()) {
        Some(CoreError::SeriesNotFound(id)) => {
            eprintln!("{} Series '{}' not found.", "Error:".style(error_style), id);
        }
        Some(CoreError::AnchorRequired(scope)) => {
            eprintln!(
                "{} Scope '{}' needs the occurrence it applies to; pass {}",
                "Error:".style(error_style),
                scope,
                "--at <time>".yellow()
            );
        }
        Some(CoreError::NotAnOccurrence { series_id, at }) => {
            eprintln!(
                "{} {} is not an occurrence of series {}",
                "Error:".style(error_style),
                views::format_time(*at).yellow(),
                series_id
            );
        }
        Some(CoreError::RuleParse(e)) => {
            eprintln!("{} Invalid recurrence rule: {}", "Error:".style(error_style), e);
        }
        Some(CoreError::InvalidInput(s)) => {
            eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
        }
        _ => eprintln!("{} {:#}", "Error:".style(error_style), err),
    }
}
