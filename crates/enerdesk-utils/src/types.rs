use serde::{Deserialize, Serialize};
use std::fmt;

/// Stages of the client onboarding chain.
///
/// Stages execute strictly in this order; each one consumes the identifiers
/// produced by the stages before it:
///
/// ```text
/// Client → Documents → SupplyPoint → Contract → SwitchingRequest
/// ```
///
/// # Example
///
/// ```rust
/// use enerdesk_utils::types::StageId;
///
/// let stage = StageId::SupplyPoint;
/// assert_eq!(stage.as_str(), "supply_point");
/// assert_eq!(stage.label(), "Registering supply point…");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Create the client record from the holder's identity fields.
    Client,
    /// Upload and register the attached identity proof and prior invoice.
    Documents,
    /// Create the supply point owned by the new client.
    SupplyPoint,
    /// Create the draft contract attached to the supply point.
    Contract,
    /// Open the supplier switching request for the contract.
    SwitchingRequest,
}

impl StageId {
    /// All stages in execution order.
    pub const ALL: [StageId; 5] = [
        StageId::Client,
        StageId::Documents,
        StageId::SupplyPoint,
        StageId::Contract,
        StageId::SwitchingRequest,
    ];

    /// Stable machine-readable name, used in logs and JSON output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            StageId::Client => "client",
            StageId::Documents => "documents",
            StageId::SupplyPoint => "supply_point",
            StageId::Contract => "contract",
            StageId::SwitchingRequest => "switching_request",
        }
    }

    /// Human-readable progress label shown while the stage is in flight.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            StageId::Client => "Registering client…",
            StageId::Documents => "Uploading documents…",
            StageId::SupplyPoint => "Registering supply point…",
            StageId::Contract => "Generating contract…",
            StageId::SwitchingRequest => "Requesting switch…",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of a configuration value, used for attribution in `enerdesk config`.
///
/// Serializes to lowercase strings: `"cli"`, `"env"`, `"config"`,
/// `"programmatic"`, `"default"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    /// Value provided via CLI argument (highest precedence).
    Cli,
    /// Value taken from an `ENERDESK_*` environment variable.
    Env,
    /// Value loaded from configuration file.
    Config,
    /// Value provided programmatically (e.g., `Config::builder()`).
    Programmatic,
    /// Built-in default value (lowest precedence).
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigSource::Cli => "cli",
            ConfigSource::Env => "env",
            ConfigSource::Config => "config",
            ConfigSource::Programmatic => "programmatic",
            ConfigSource::Default => "default",
        };
        f.write_str(name)
    }
}
