//! wakegate-config — configuration for the wakegate daemon.
//!
//! Reads `wakegate.toml`, layers `WAKEGATE_<SECTION>_<KEY>` environment
//! overrides on top, and validates the result. Missing required settings
//! are reported as [`ConfigError`] so the daemon refuses to start rather
//! than run partially configured.
//!
//! ```toml
//! [controller]
//! server_address = "survival"
//! backend_addr = "10.0.0.5:25565"
//! idle_timeout = "30m"
//! startup_threshold = "5m"
//! no_join_timeout = "10m"
//!
//! [compute]
//! project = "games"
//! zone = "europe-west1-b"
//! instance = "survival-vm"
//!
//! [access]
//! file = "whitelist.json"
//! operators = ["069a79f4-44e9-4726-a5be-fca90e38aaf5"]
//! ```

pub mod config;
pub mod duration;
pub mod error;

pub use config::{
    AccessConfig, ApiConfig, ComputeConfig, ControllerConfig, MAX_DURATION, WakegateConfig,
};
pub use duration::parse_duration;
pub use error::{ConfigError, ConfigResult};
