//! wakegate.toml configuration parser.
//!
//! The file is deserialized into a loose `RawConfig` (every field optional),
//! environment overrides are layered on top, and the result is validated
//! into the typed [`WakegateConfig`] consumed by the rest of the workspace.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::duration::parse_duration;
use crate::error::{ConfigError, ConfigResult};

/// Prefix for environment overrides: `WAKEGATE_<SECTION>_<KEY>`.
pub const ENV_PREFIX: &str = "WAKEGATE_";

const SECTIONS: [&str; 4] = ["controller", "compute", "access", "api"];

pub const DEFAULT_STARTING_MESSAGE: &str =
    "Server is starting up! Please wait 30-60 seconds and try again.";
pub const DEFAULT_KICK_MESSAGE: &str = "You are not whitelisted on this server!";
pub const DEFAULT_COMPUTE_ENDPOINT: &str = "https://compute.googleapis.com";
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8480";
/// Longest accepted value for any configured duration.
pub const MAX_DURATION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

// ── Raw (file) representation ──────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfig {
    pub controller: Option<RawControllerConfig>,
    pub compute: Option<RawComputeConfig>,
    pub access: Option<RawAccessConfig>,
    pub api: Option<RawApiConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawControllerConfig {
    pub server_address: Option<String>,
    pub backend_addr: Option<String>,
    pub idle_timeout: Option<String>,
    pub startup_threshold: Option<String>,
    pub no_join_timeout: Option<String>,
    pub probe_timeout: Option<String>,
    pub operation_timeout: Option<String>,
    pub starting_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawComputeConfig {
    pub project: Option<String>,
    pub zone: Option<String>,
    pub instance: Option<String>,
    pub endpoint: Option<String>,
    pub access_token: Option<String>,
    pub metadata_host: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAccessConfig {
    pub enabled: Option<bool>,
    pub kick_message: Option<String>,
    pub file: Option<String>,
    pub operators: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawApiConfig {
    pub listen: Option<String>,
}

// ── Validated configuration ────────────────────────────────────────

/// Fully validated daemon configuration. Immutable after load.
#[derive(Debug, Clone)]
pub struct WakegateConfig {
    pub controller: ControllerConfig,
    pub compute: ComputeConfig,
    pub access: AccessConfig,
    pub api: ApiConfig,
}

/// Settings for the lifecycle controller of one managed backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Identity of the managed backend server as the proxy names it.
    pub server_address: String,
    /// `host:port` probed to decide whether the backend is reachable.
    pub backend_addr: String,
    /// Grace period after the last player leaves before stopping.
    pub idle_timeout: Duration,
    /// Minimum spacing between successive start calls.
    pub startup_threshold: Duration,
    /// Grace period after a start before stopping an instance nobody joined.
    pub no_join_timeout: Duration,
    /// Reachability probe timeout.
    pub probe_timeout: Duration,
    /// Upper bound on a start/stop call including operation polling.
    pub operation_timeout: Duration,
    /// Message delivered to players denied while the instance starts.
    pub starting_message: String,
}

impl ControllerConfig {
    /// Controller settings with default timings.
    pub fn new(server_address: &str, backend_addr: &str) -> Self {
        Self {
            server_address: server_address.to_string(),
            backend_addr: backend_addr.to_string(),
            idle_timeout: Duration::from_secs(30 * 60),
            startup_threshold: Duration::from_secs(5 * 60),
            no_join_timeout: Duration::from_secs(10 * 60),
            probe_timeout: Duration::from_secs(3),
            operation_timeout: Duration::from_secs(2 * 60),
            starting_message: DEFAULT_STARTING_MESSAGE.to_string(),
        }
    }
}

/// Compute Engine instance reference and API access settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ComputeConfig {
    pub project: String,
    pub zone: String,
    pub instance: String,
    /// Base URL of the Compute Engine API.
    pub endpoint: String,
    /// Static bearer token. When absent, tokens come from the metadata server.
    pub access_token: Option<String>,
    /// Host (optionally `host:port`) of the GCE metadata server.
    pub metadata_host: String,
}

impl fmt::Debug for ComputeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeConfig")
            .field("project", &self.project)
            .field("zone", &self.zone)
            .field("instance", &self.instance)
            .field("endpoint", &self.endpoint)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("metadata_host", &self.metadata_host)
            .finish()
    }
}

/// Allow-list settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessConfig {
    pub enabled: bool,
    pub kick_message: String,
    pub file: PathBuf,
    /// Player UUIDs permitted to administer the allow-list.
    pub operators: Vec<String>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kick_message: DEFAULT_KICK_MESSAGE.to_string(),
            file: PathBuf::from("whitelist.json"),
            operators: Vec::new(),
        }
    }
}

/// Event intake HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub listen: SocketAddr,
}

impl WakegateConfig {
    /// Load from a file, applying `WAKEGATE_*` environment overrides.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content, std::env::vars())
    }

    /// Parse TOML content without environment overrides.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Self::parse(content, std::iter::empty())
    }

    /// Parse TOML content with the given `(name, value)` environment pairs
    /// layered on top.
    pub fn parse<I>(content: &str, env: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut table: toml::Table = toml::from_str(content)?;
        apply_env_overrides(&mut table, env)?;
        let raw: RawConfig = toml::Value::Table(table).try_into()?;
        Self::validate(raw)
    }

    /// Validate a raw config into its typed form.
    pub fn validate(raw: RawConfig) -> ConfigResult<Self> {
        let controller = raw.controller.unwrap_or_default();
        let compute = raw.compute.unwrap_or_default();
        let access = raw.access.unwrap_or_default();
        let api = raw.api.unwrap_or_default();

        let server_address = required(controller.server_address, "controller.server_address")?;
        let backend_addr = required(controller.backend_addr, "controller.backend_addr")?;
        let defaults = ControllerConfig::new(&server_address, &backend_addr);

        let controller = ControllerConfig {
            idle_timeout: duration_or(
                controller.idle_timeout,
                "controller.idle_timeout",
                defaults.idle_timeout,
            )?,
            startup_threshold: duration_or(
                controller.startup_threshold,
                "controller.startup_threshold",
                defaults.startup_threshold,
            )?,
            no_join_timeout: duration_or(
                controller.no_join_timeout,
                "controller.no_join_timeout",
                defaults.no_join_timeout,
            )?,
            probe_timeout: nonzero(duration_or(
                controller.probe_timeout,
                "controller.probe_timeout",
                defaults.probe_timeout,
            )?, "controller.probe_timeout")?,
            operation_timeout: nonzero(duration_or(
                controller.operation_timeout,
                "controller.operation_timeout",
                defaults.operation_timeout,
            )?, "controller.operation_timeout")?,
            starting_message: controller
                .starting_message
                .unwrap_or(defaults.starting_message),
            server_address,
            backend_addr,
        };

        let compute = ComputeConfig {
            project: required(compute.project, "compute.project")?,
            zone: required(compute.zone, "compute.zone")?,
            instance: required(compute.instance, "compute.instance")?,
            endpoint: compute
                .endpoint
                .unwrap_or_else(|| DEFAULT_COMPUTE_ENDPOINT.to_string()),
            access_token: compute.access_token.filter(|t| !t.trim().is_empty()),
            metadata_host: compute
                .metadata_host
                .unwrap_or_else(|| DEFAULT_METADATA_HOST.to_string()),
        };

        let access_defaults = AccessConfig::default();
        let access = AccessConfig {
            enabled: access.enabled.unwrap_or(access_defaults.enabled),
            kick_message: access.kick_message.unwrap_or(access_defaults.kick_message),
            file: access.file.map(PathBuf::from).unwrap_or(access_defaults.file),
            operators: access.operators.unwrap_or_default(),
        };

        let listen = api.listen.unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let api = ApiConfig {
            listen: listen.parse().map_err(|e| ConfigError::Invalid {
                key: "api.listen".to_string(),
                reason: format!("{listen:?}: {e}"),
            })?,
        };

        Ok(Self {
            controller,
            compute,
            access,
            api,
        })
    }
}

fn required(value: Option<String>, key: &'static str) -> ConfigResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn duration_or(
    value: Option<String>,
    key: &'static str,
    default: Duration,
) -> ConfigResult<Duration> {
    let d = match value {
        None => return Ok(default),
        Some(s) => parse_duration(&s).ok_or(ConfigError::InvalidDuration { key, value: s })?,
    };
    if d > MAX_DURATION {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            reason: format!("must be at most {}s", MAX_DURATION.as_secs()),
        });
    }
    Ok(d)
}

fn nonzero(d: Duration, key: &'static str) -> ConfigResult<Duration> {
    if d.is_zero() {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(d)
}

/// Layer `WAKEGATE_<SECTION>_<KEY>` variables onto the parsed table.
fn apply_env_overrides<I>(table: &mut toml::Table, env: I) -> ConfigResult<()>
where
    I: IntoIterator<Item = (String, String)>,
{
    let overrides: HashMap<String, String> = env
        .into_iter()
        .filter(|(k, _)| k.starts_with(ENV_PREFIX))
        .collect();

    for (name, value) in overrides {
        let Some((section, key)) = name[ENV_PREFIX.len()..].split_once('_') else {
            continue;
        };
        let section = section.to_ascii_lowercase();
        let key = key.to_ascii_lowercase();
        if !SECTIONS.contains(&section.as_str()) || key.is_empty() {
            continue;
        }

        let value = match key.as_str() {
            "enabled" => toml::Value::Boolean(value.trim().parse().map_err(|_| {
                ConfigError::Invalid {
                    key: name.clone(),
                    reason: format!("expected true or false, got {value:?}"),
                }
            })?),
            "operators" => toml::Value::Array(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| toml::Value::String(s.to_string()))
                    .collect(),
            ),
            _ => toml::Value::String(value),
        };

        let entry = table
            .entry(section.clone())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        let Some(section_table) = entry.as_table_mut() else {
            return Err(ConfigError::Invalid {
                key: section,
                reason: "expected a table".to_string(),
            });
        };
        debug!(%name, "applying environment override");
        section_table.insert(key, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[controller]
server_address = "survival"
backend_addr = "10.0.0.5:25565"

[compute]
project = "games"
zone = "europe-west1-b"
instance = "survival-vm"
"#;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = WakegateConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(cfg.controller.server_address, "survival");
        assert_eq!(cfg.controller.idle_timeout, Duration::from_secs(1800));
        assert_eq!(cfg.controller.startup_threshold, Duration::from_secs(300));
        assert_eq!(cfg.controller.no_join_timeout, Duration::from_secs(600));
        assert_eq!(cfg.controller.probe_timeout, Duration::from_secs(3));
        assert_eq!(cfg.controller.operation_timeout, Duration::from_secs(120));
        assert_eq!(cfg.controller.starting_message, DEFAULT_STARTING_MESSAGE);
        assert_eq!(cfg.compute.endpoint, DEFAULT_COMPUTE_ENDPOINT);
        assert_eq!(cfg.compute.access_token, None);
        assert!(cfg.access.enabled);
        assert_eq!(cfg.access.file, PathBuf::from("whitelist.json"));
        assert_eq!(cfg.api.listen.port(), 8480);
    }

    #[test]
    fn durations_are_parsed() {
        let content = format!(
            "{MINIMAL}\n[api]\nlisten = \"127.0.0.1:9000\"\n"
        )
        .replace(
            "backend_addr = \"10.0.0.5:25565\"",
            "backend_addr = \"10.0.0.5:25565\"\nidle_timeout = \"15m\"\nno_join_timeout = \"90s\"",
        );
        let cfg = WakegateConfig::from_toml_str(&content).unwrap();
        assert_eq!(cfg.controller.idle_timeout, Duration::from_secs(900));
        assert_eq!(cfg.controller.no_join_timeout, Duration::from_secs(90));
        assert_eq!(cfg.api.listen.port(), 9000);
    }

    #[test]
    fn missing_required_field_is_fatal() {
        let content = MINIMAL.replace("zone = \"europe-west1-b\"\n", "");
        let err = WakegateConfig::from_toml_str(&content).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("compute.zone")));
    }

    #[test]
    fn missing_controller_section_is_fatal() {
        let err = WakegateConfig::from_toml_str("[compute]\nproject = \"p\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Missing("controller.server_address")));
    }

    #[test]
    fn invalid_duration_is_rejected() {
        let content = MINIMAL.replace(
            "backend_addr = \"10.0.0.5:25565\"",
            "backend_addr = \"10.0.0.5:25565\"\nidle_timeout = \"forever\"",
        );
        let err = WakegateConfig::from_toml_str(&content).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidDuration { key: "controller.idle_timeout", .. }
        ));
    }

    #[test]
    fn oversized_duration_is_rejected() {
        let content = MINIMAL.replace(
            "backend_addr = \"10.0.0.5:25565\"",
            "backend_addr = \"10.0.0.5:25565\"\nidle_timeout = \"18446744073709551615\"",
        );
        let err = WakegateConfig::from_toml_str(&content).unwrap_err();
        assert!(
            matches!(&err, ConfigError::Invalid { key, .. } if key == "controller.idle_timeout"),
            "got {err}"
        );

        let content = MINIMAL.replace(
            "backend_addr = \"10.0.0.5:25565\"",
            "backend_addr = \"10.0.0.5:25565\"\nidle_timeout = \"400000000000000000m\"",
        );
        let err = WakegateConfig::from_toml_str(&content).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidDuration { key: "controller.idle_timeout", .. }
        ));
    }

    #[test]
    fn duration_at_ceiling_is_accepted() {
        let content = MINIMAL.replace(
            "backend_addr = \"10.0.0.5:25565\"",
            "backend_addr = \"10.0.0.5:25565\"\nidle_timeout = \"720h\"",
        );
        let cfg = WakegateConfig::from_toml_str(&content).unwrap();
        assert_eq!(cfg.controller.idle_timeout, MAX_DURATION);
    }

    #[test]
    fn zero_probe_timeout_is_rejected() {
        let content = MINIMAL.replace(
            "backend_addr = \"10.0.0.5:25565\"",
            "backend_addr = \"10.0.0.5:25565\"\nprobe_timeout = \"0s\"",
        );
        assert!(matches!(
            WakegateConfig::from_toml_str(&content).unwrap_err(),
            ConfigError::Invalid { .. }
        ));
    }

    #[test]
    fn env_overrides_file_values() {
        let cfg = WakegateConfig::parse(
            MINIMAL,
            env(&[
                ("WAKEGATE_COMPUTE_ACCESS_TOKEN", "ya29.token"),
                ("WAKEGATE_CONTROLLER_IDLE_TIMEOUT", "45m"),
                ("WAKEGATE_ACCESS_ENABLED", "false"),
                ("WAKEGATE_ACCESS_OPERATORS", "a-uuid, b-uuid"),
                ("UNRELATED_VAR", "ignored"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.compute.access_token.as_deref(), Some("ya29.token"));
        assert_eq!(cfg.controller.idle_timeout, Duration::from_secs(2700));
        assert!(!cfg.access.enabled);
        assert_eq!(cfg.access.operators, vec!["a-uuid", "b-uuid"]);
    }

    #[test]
    fn env_can_supply_required_fields() {
        let content = MINIMAL.replace("instance = \"survival-vm\"\n", "");
        let cfg = WakegateConfig::parse(
            &content,
            env(&[("WAKEGATE_COMPUTE_INSTANCE", "from-env")]),
        )
        .unwrap();
        assert_eq!(cfg.compute.instance, "from-env");
    }

    #[test]
    fn env_bool_must_parse() {
        let err = WakegateConfig::parse(MINIMAL, env(&[("WAKEGATE_ACCESS_ENABLED", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn debug_redacts_access_token() {
        let cfg = WakegateConfig::parse(
            MINIMAL,
            env(&[("WAKEGATE_COMPUTE_ACCESS_TOKEN", "secret-token")]),
        )
        .unwrap();
        let printed = format!("{:?}", cfg.compute);
        assert!(!printed.contains("secret-token"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn from_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wakegate.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let cfg = WakegateConfig::from_file(&path).unwrap();
        assert_eq!(cfg.compute.project, "games");
    }

    #[test]
    fn from_file_missing_is_read_error() {
        let err = WakegateConfig::from_file(Path::new("/nonexistent/wakegate.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
