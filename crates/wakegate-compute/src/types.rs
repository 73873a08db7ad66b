//! Instance identity and power status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fully qualified reference to one Compute Engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceRef {
    pub project: String,
    pub zone: String,
    pub instance: String,
}

impl InstanceRef {
    pub fn new(project: &str, zone: &str, instance: &str) -> Self {
        Self {
            project: project.to_string(),
            zone: zone.to_string(),
            instance: instance.to_string(),
        }
    }
}

impl fmt::Display for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.project, self.zone, self.instance)
    }
}

/// Power status of an instance as last observed from the API.
///
/// Never cached beyond a single decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Running,
    Stopped,
    Starting,
    Stopping,
    Unknown,
}

impl InstanceStatus {
    /// Map a Compute Engine `status` string.
    pub fn from_gce(status: &str) -> Self {
        match status {
            "RUNNING" => InstanceStatus::Running,
            "TERMINATED" | "STOPPED" | "SUSPENDED" => InstanceStatus::Stopped,
            "PROVISIONING" | "STAGING" | "REPAIRING" => InstanceStatus::Starting,
            "STOPPING" | "SUSPENDING" => InstanceStatus::Stopping,
            _ => InstanceStatus::Unknown,
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstanceStatus::Running => "running",
            InstanceStatus::Stopped => "stopped",
            InstanceStatus::Starting => "starting",
            InstanceStatus::Stopping => "stopping",
            InstanceStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gce_status_mapping() {
        assert_eq!(InstanceStatus::from_gce("RUNNING"), InstanceStatus::Running);
        assert_eq!(InstanceStatus::from_gce("TERMINATED"), InstanceStatus::Stopped);
        assert_eq!(InstanceStatus::from_gce("STOPPED"), InstanceStatus::Stopped);
        assert_eq!(InstanceStatus::from_gce("SUSPENDED"), InstanceStatus::Stopped);
        assert_eq!(InstanceStatus::from_gce("STAGING"), InstanceStatus::Starting);
        assert_eq!(InstanceStatus::from_gce("PROVISIONING"), InstanceStatus::Starting);
        assert_eq!(InstanceStatus::from_gce("STOPPING"), InstanceStatus::Stopping);
        assert_eq!(InstanceStatus::from_gce("SUSPENDING"), InstanceStatus::Stopping);
        assert_eq!(InstanceStatus::from_gce("SOMETHING_NEW"), InstanceStatus::Unknown);
    }

    #[test]
    fn instance_ref_display() {
        let r = InstanceRef::new("games", "europe-west1-b", "survival-vm");
        assert_eq!(r.to_string(), "games/europe-west1-b/survival-vm");
    }
}
