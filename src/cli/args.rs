//! CLI argument definitions and parsing structures

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// enerdesk - client onboarding and operations for energy-retail back offices
#[derive(Parser, Debug)]
#[command(name = "enerdesk")]
#[command(about = "Onboard clients and inspect CRM state against an enerdesk backend")]
#[command(long_about = r#"
enerdesk drives the client onboarding chain of an energy-retail CRM backend:
client, documents, supply point, contract and switching request, in that order.

EXAMPLES:
  # Log in and keep the token for later commands
  enerdesk login --email ana@example.com
  export ENERDESK_TOKEN=...

  # Check a draft against the wizard's validation gate
  enerdesk validate draft.toml

  # Show the calls a submission would make, then submit it
  enerdesk onboard draft.toml --dry-run
  enerdesk onboard draft.toml

  # Listings
  enerdesk clients --json
  enerdesk switching
  enerdesk renewals --window-days 30
  enerdesk stats

  # Billing: list invoices, then build the SEPA remittance for the pending ones
  enerdesk invoices --role contabilidad
  enerdesk invoices --remit-pending --output remesas/marzo.xml

CONFIGURATION:
  Precedence: CLI flags > environment > config file > defaults
  The config file is found by searching upward from CWD for .enerdesk/config.toml,
  or at $ENERDESK_HOME/config.toml. Use --config to point at a file explicitly.
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL, e.g. http://127.0.0.1:8000
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Bearer token (prefer the ENERDESK_TOKEN environment variable)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Role to act under: admin, comercial, contabilidad or backoffice
    #[arg(long, global = true)]
    pub role: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Minimum accepted CUPS length
    #[arg(long, global = true)]
    pub cups_min_length: Option<usize>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Exchange credentials for a bearer token
    ///
    /// EXAMPLES:
    ///   enerdesk login --email ana@example.com
    ///   ENERDESK_PASSWORD=... enerdesk login --email ana@example.com --json
    Login {
        #[arg(long)]
        email: String,

        #[arg(long, env = "ENERDESK_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long)]
        json: bool,
    },

    /// Run a draft file through the wizard's validation gate
    ///
    /// Exits with code 3 and lists the blocking fields if the draft cannot
    /// reach the final step.
    Validate {
        /// Draft file (TOML)
        draft: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Submit a draft file through the onboarding chain
    ///
    /// EXAMPLES:
    ///   enerdesk onboard draft.toml --dry-run
    ///   enerdesk onboard draft.toml --json
    Onboard {
        /// Draft file (TOML)
        draft: PathBuf,

        /// Show the planned calls without contacting the backend
        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        json: bool,
    },

    /// List clients
    Clients {
        #[arg(long)]
        json: bool,
    },

    /// List switching (ATR) requests with their classified status
    Switching {
        #[arg(long)]
        json: bool,
    },

    /// List contracts approaching their end date
    Renewals {
        /// Only show contracts ending within this many days
        #[arg(long)]
        window_days: Option<i64>,

        #[arg(long)]
        json: bool,
    },

    /// List invoices or build a SEPA direct-debit remittance file
    ///
    /// EXAMPLES:
    ///   enerdesk invoices --json
    ///   enerdesk invoices --remit 12,14,15
    ///   enerdesk invoices --remit-pending --output Remesa.xml
    Invoices {
        /// Build a remittance for these invoice ids
        #[arg(long, value_name = "ID", num_args = 1.., value_delimiter = ',', conflicts_with = "remit_pending")]
        remit: Vec<i64>,

        /// Build a remittance for every pending invoice
        #[arg(long)]
        remit_pending: bool,

        /// Remittance file to write (default: Remesa_SEPA_<date>.xml)
        #[arg(long, short)]
        output: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Show headline figures: clients, activity and invoicing
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Ask the assistant a free-text question
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration and where each value came from
    Config {
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    /// Name used in error reports.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Login { .. } => "login",
            Commands::Validate { .. } => "validate",
            Commands::Onboard { .. } => "onboard",
            Commands::Clients { .. } => "clients",
            Commands::Switching { .. } => "switching",
            Commands::Renewals { .. } => "renewals",
            Commands::Invoices { .. } => "invoices",
            Commands::Stats { .. } => "stats",
            Commands::Ask { .. } => "ask",
            Commands::Config { .. } => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "enerdesk",
            "onboard",
            "draft.toml",
            "--dry-run",
            "--base-url",
            "http://crm:8000",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.base_url.as_deref(), Some("http://crm:8000"));
        assert!(cli.verbose);
        match cli.command {
            Commands::Onboard { draft, dry_run, json } => {
                assert_eq!(draft, PathBuf::from("draft.toml"));
                assert!(dry_run);
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_ask_joins_words() {
        let cli = Cli::try_parse_from(["enerdesk", "ask", "which", "contracts", "expire?"]).unwrap();
        match cli.command {
            Commands::Ask { prompt, .. } => assert_eq!(prompt.join(" "), "which contracts expire?"),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_invoices_remit_accepts_comma_list() {
        let cli = Cli::try_parse_from(["enerdesk", "invoices", "--remit", "3,5", "-o", "out.xml"]).unwrap();
        assert_eq!(cli.command.name(), "invoices");
        match cli.command {
            Commands::Invoices {
                remit,
                remit_pending,
                output,
                ..
            } => {
                assert_eq!(remit, vec![3, 5]);
                assert!(!remit_pending);
                assert_eq!(output, Some(PathBuf::from("out.xml")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_invoices_remit_and_remit_pending_conflict() {
        assert!(
            Cli::try_parse_from(["enerdesk", "invoices", "--remit", "3", "--remit-pending"]).is_err()
        );
    }

    #[test]
    fn test_validate_requires_draft_path() {
        assert!(Cli::try_parse_from(["enerdesk", "validate"]).is_err());
    }
}
