//! Configuration for enerdesk.
//!
//! Values are resolved with precedence CLI > environment > config file >
//! defaults, and every resolved value remembers where it came from.

mod config;

pub use config::{
    BackendConfig, CliArgs, Config, ConfigBuilder, Defaults, EnvOverrides, OnboardingConfig,
    RenewalsConfig,
};
pub use enerdesk_utils::types::ConfigSource;
