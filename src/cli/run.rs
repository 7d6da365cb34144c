//! CLI entry point and dispatch logic
//!
//! `run()` parses arguments, resolves configuration, sets up tracing and a
//! current-thread tokio runtime, dispatches the command, and prints every
//! error itself.

use anyhow::Result;
use clap::Parser;

use enerdesk_config::{CliArgs, Config};
use enerdesk_utils::error::{ConfigError, EnerdeskError};
use enerdesk_utils::exit_codes::ExitCode;
use enerdesk_utils::logging::init_tracing;
use enerdesk_utils::redaction::redact_error_message;

use super::args::{Cli, Commands};
use super::commands;

/// Main CLI execution function.
///
/// Returns `Err(ExitCode)` after printing the error; main.rs only exits.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();
    let operation = cli.command.name();

    let cli_args = CliArgs {
        config_path: cli.config.clone(),
        base_url: cli.base_url.clone(),
        request_timeout_secs: cli.timeout,
        token: cli.token.clone(),
        role: cli.role.clone(),
        cups_min_length: cli.cups_min_length,
        verbose: cli.verbose.then_some(true),
        json_logs: cli.json_logs.then_some(true),
    };

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => {
            let err = config_error(err);
            eprintln!("{}", contextual_report(&err, operation));
            return Err(err.to_exit_code());
        }
    };

    // A subscriber may already be installed when embedded; keep going without one.
    let _ = init_tracing(config.defaults.verbose, config.defaults.json_logs);

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let result = rt.block_on(async move {
        match cli.command {
            Commands::Login {
                email,
                password,
                json,
            } => commands::execute_login_command(&email, &password, json, &config).await,
            Commands::Validate { draft, json } => {
                commands::execute_validate_command(&draft, json, &config)
            }
            Commands::Onboard {
                draft,
                dry_run,
                json,
            } => commands::execute_onboard_command(&draft, dry_run, json, &config).await,
            Commands::Clients { json } => commands::execute_clients_command(json, &config).await,
            Commands::Switching { json } => {
                commands::execute_switching_command(json, &config).await
            }
            Commands::Renewals { window_days, json } => {
                commands::execute_renewals_command(window_days, json, &config).await
            }
            Commands::Invoices {
                remit,
                remit_pending,
                output,
                json,
            } => {
                commands::execute_invoices_command(&remit, remit_pending, output.as_deref(), json, &config)
                    .await
            }
            Commands::Stats { json } => commands::execute_stats_command(json, &config).await,
            Commands::Ask { prompt, json } => {
                commands::execute_ask_command(&prompt.join(" "), json, &config).await
            }
            Commands::Config { json } => commands::execute_config_command(json, &config),
        }
    });

    if let Err(error) = result {
        if let Some(enerdesk_error) = error.downcast_ref::<EnerdeskError>() {
            eprintln!("{}", contextual_report(enerdesk_error, operation));
            return Err(enerdesk_error.to_exit_code());
        }

        eprintln!(
            "✗ Unexpected error: {}",
            redact_error_message(&format!("{error:#}"))
        );
        eprintln!("\n  Run with --verbose for more detailed output");
        return Err(ExitCode::INTERNAL);
    }

    Ok(())
}

/// Discovery reports through `anyhow`; recover the typed error when there is one.
fn config_error(err: anyhow::Error) -> EnerdeskError {
    match err.downcast::<ConfigError>() {
        Ok(config_error) => EnerdeskError::Config(config_error),
        Err(other) => EnerdeskError::Config(ConfigError::InvalidFile(format!("{other:#}"))),
    }
}

/// `display_for_user()` plus the command that failed.
fn contextual_report(error: &EnerdeskError, operation: &str) -> String {
    format!(
        "{}\nWhile running: enerdesk {operation}",
        error.display_for_user().trim_end()
    )
}
