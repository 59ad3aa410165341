use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

pub const PATH_SYSTEM_INTERFACES: &str = "system/interfaces";
pub const PATH_SYSTEM_CONFIG: &str = "system/config";
pub const PATH_SYSTEM_STATUS: &str = "system/status";
pub const PATH_SYSTEM_VERSION: &str = "system/version";
pub const PATH_SYSTEM_START: &str = "system/start";
pub const PATH_SYSTEM_STOP: &str = "system/stop";
pub const PATH_DEVICES: &str = "devices";
pub const PATH_DEVICE: &str = "device";
pub const PATH_DEVICE_EDIT: &str = "device/edit";
pub const PATH_DEVICE_DELETE: &str = "device/";
pub const PATH_PROFILES: &str = "profiles";

/// Interfaces present on the host as reported by `GET /system/interfaces`,
/// keyed by interface name. Values are hardware addresses or labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct HostInterfaces(pub BTreeMap<String, String>);

impl HostInterfaces {
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HostInterfaces {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Host network interfaces by logical role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SystemInterfaces {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl SystemInterfaces {
    pub fn new(internet: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            internet: Some(internet.into()),
            device: Some(device.into()),
        }
    }

    /// Role assignment recorded in the backend configuration. Blank names are
    /// left unassigned.
    pub fn from_network(network: &NetworkConfig) -> Self {
        let assigned = |name: &str| {
            let name = name.trim();
            (!name.is_empty()).then(|| name.to_owned())
        };
        Self {
            internet: assigned(&network.internet_intf),
            device: assigned(&network.device_intf),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SystemConfig {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(flatten, default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NetworkConfig {
    #[serde(default)]
    pub device_intf: String,

    #[serde(default)]
    pub internet_intf: String,

    #[serde(flatten, default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl SystemConfig {
    /// A testrun needs at least a device-facing interface; the internet side is optional.
    pub fn has_connection_settings(&self) -> bool {
        !self.network.device_intf.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TestModule {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Device {
    pub mac_addr: String,

    #[serde(default)]
    pub manufacturer: String,

    #[serde(default)]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub test_modules: BTreeMap<String, TestModule>,
}

impl Device {
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.manufacturer.trim(), self.model.trim());
        let name = name.trim();
        if name.is_empty() {
            self.mac_addr.clone()
        } else {
            name.to_owned()
        }
    }

    pub fn enabled_modules(&self) -> impl Iterator<Item = &str> {
        self.test_modules
            .iter()
            .filter(|(_, m)| m.enabled)
            .map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProfileStatus {
    #[serde(rename = "Valid")]
    Valid,
    #[serde(rename = "Draft")]
    #[default]
    Draft,
    #[serde(rename = "Expired")]
    Expired,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileQuestion {
    pub question: String,
    #[serde(default)]
    pub answer: Value,
}

/// A risk profile as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    #[serde(default)]
    pub status: ProfileStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<ProfileQuestion>,
}

/// Lifecycle value reported by `GET /system/status`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StatusValue {
    #[serde(rename = "Idle")]
    #[default]
    Idle,
    #[serde(rename = "Starting")]
    Starting,
    #[serde(rename = "Waiting for Device")]
    WaitingForDevice,
    #[serde(rename = "Monitoring")]
    Monitoring,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Cancelling")]
    Cancelling,
    #[serde(rename = "Stopping")]
    Stopping,
    #[serde(rename = "Cancelled")]
    Cancelled,
    #[serde(rename = "Complete", alias = "Completed")]
    Complete,
    #[serde(rename = "Compliant")]
    Compliant,
    #[serde(rename = "Non-Compliant")]
    NonCompliant,
    #[serde(rename = "Failed")]
    Failed,
    #[serde(rename = "Error")]
    Error,
    #[serde(other)]
    Unknown,
}

impl StatusValue {
    /// No further progress is expected once a run reports one of these.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StatusValue::Idle
                | StatusValue::Cancelled
                | StatusValue::Complete
                | StatusValue::Compliant
                | StatusValue::NonCompliant
                | StatusValue::Failed
                | StatusValue::Error
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusValue::Idle => "Idle",
            StatusValue::Starting => "Starting",
            StatusValue::WaitingForDevice => "Waiting for Device",
            StatusValue::Monitoring => "Monitoring",
            StatusValue::InProgress => "In Progress",
            StatusValue::Cancelling => "Cancelling",
            StatusValue::Stopping => "Stopping",
            StatusValue::Cancelled => "Cancelled",
            StatusValue::Complete => "Complete",
            StatusValue::Compliant => "Compliant",
            StatusValue::NonCompliant => "Non-Compliant",
            StatusValue::Failed => "Failed",
            StatusValue::Error => "Error",
            StatusValue::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TestsSummary {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub results: Vec<TestResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TestrunStatus {
    #[serde(default)]
    pub status: StatusValue,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<String>,

    #[serde(default)]
    pub tests: TestsSummary,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
}

impl TestrunStatus {
    pub fn with_status(status: StatusValue) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SystemVersion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version_url: Option<String>,
    #[serde(default)]
    pub update_available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartDevice {
    pub mac_addr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub device: StartDevice,
}

impl StartRequest {
    pub fn for_device(device: &Device) -> Self {
        Self {
            device: StartDevice {
                mac_addr: device.mac_addr.clone(),
                firmware: device.firmware.clone(),
            },
        }
    }
}

/// Body of `POST /device/edit`: the stored device is looked up by `mac_addr`
/// and replaced with `device`, which may carry a new address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditDeviceRequest {
    pub mac_addr: String,
    pub device: Device,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: String,
}
