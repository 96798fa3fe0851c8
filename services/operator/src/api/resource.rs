//! Resource: one provider resource group, addressed by its membership tag.

use serde::{Deserialize, Serialize};

use super::meta::{Kind, Object};

pub type Resource = Object<ResourceSpec>;

/// Label naming the Booking (`namespace/name`) that set the booking fields.
pub const BOOKING_LABEL: &str = "resource-booking/booking";

/// Provider discriminator used when a Resource does not name one.
pub const DEFAULT_RESOURCE_TYPE: &str = "ec2";

fn default_resource_type() -> String {
    DEFAULT_RESOURCE_TYPE.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Membership tag value shared by every instance of the group.
    pub tag: String,

    /// Provider discriminator, resolved through the provider registry.
    #[serde(rename = "type", default = "default_resource_type")]
    pub provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booked_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booked_until: Option<String>,
}

impl ResourceSpec {
    pub fn new(tag: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            provider: provider.into(),
            booked_by: None,
            booked_until: None,
        }
    }

    pub fn is_unbooked(&self) -> bool {
        self.booked_by.is_none() && self.booked_until.is_none()
    }
}

impl Kind for ResourceSpec {
    const KIND: &'static str = "Resource";
    type Status = ResourceStatus;
}

/// Observed run state of the whole group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourcePhase {
    #[default]
    Stopped,
    Running,
    Pending,
}

impl ResourcePhase {
    /// Derive the group phase from a provider summary.
    ///
    /// An empty group has nothing running and reads as stopped.
    pub fn derive(available: u32, running: u32) -> Self {
        if running == 0 {
            Self::Stopped
        } else if running == available {
            Self::Running
        } else {
            Self::Pending
        }
    }
}

impl std::fmt::Display for ResourcePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Stopped => "STOPPED",
            Self::Running => "RUNNING",
            Self::Pending => "PENDING",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStatus {
    #[serde(default)]
    pub instances: u32,
    #[serde(default)]
    pub running: u32,
    #[serde(default)]
    pub status: ResourcePhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0, ResourcePhase::Stopped)]
    #[case(3, 0, ResourcePhase::Stopped)]
    #[case(3, 3, ResourcePhase::Running)]
    #[case(3, 1, ResourcePhase::Pending)]
    #[case(1, 1, ResourcePhase::Running)]
    fn test_phase_derive(
        #[case] available: u32,
        #[case] running: u32,
        #[case] expected: ResourcePhase,
    ) {
        assert_eq!(ResourcePhase::derive(available, running), expected);
    }

    #[test]
    fn test_spec_defaults_type() {
        let spec: ResourceSpec =
            serde_json::from_value(serde_json::json!({"tag": "analytics"})).unwrap();
        assert_eq!(spec.provider, DEFAULT_RESOURCE_TYPE);
        assert!(spec.is_unbooked());
    }

    #[test]
    fn test_spec_serializes_type_key() {
        let spec = ResourceSpec::new("analytics", "rds");
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json, serde_json::json!({"tag": "analytics", "type": "rds"}));
    }
}
