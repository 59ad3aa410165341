use std::fmt;

use testrun_protocol::{
    Device, HostInterfaces, Profile, SystemConfig, SystemInterfaces, SystemVersion, TestrunStatus,
};

use crate::client::ClientError;

use super::poll::PollCycle;
use super::state::SettingMissedError;

/// Backend resource a fetch or command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Resource {
    Interfaces,
    SystemConfig,
    Devices,
    RiskProfiles,
    SystemVersion,
    SystemStatus,
    StartTestrun,
    StopTestrun,
    CreateDevice,
    EditDevice,
    DeleteDevice,
}

impl Resource {
    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Interfaces => "interfaces",
            Resource::SystemConfig => "system config",
            Resource::Devices => "devices",
            Resource::RiskProfiles => "risk profiles",
            Resource::SystemVersion => "system version",
            Resource::SystemStatus => "system status",
            Resource::StartTestrun => "start testrun",
            Resource::StopTestrun => "stop testrun",
            Resource::CreateDevice => "create device",
            Resource::EditDevice => "edit device",
            Resource::DeleteDevice => "delete device",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ConfigurationMissing,
    Rejected,
    Transient,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_configuration_missing(&self) -> bool {
        self.kind == FailureKind::ConfigurationMissing
    }
}

impl From<&ClientError> for FetchFailure {
    fn from(err: &ClientError) -> Self {
        let kind = match err {
            ClientError::ConfigurationMissing(_) => FailureKind::ConfigurationMissing,
            ClientError::Rejected { .. } => FailureKind::Rejected,
            ClientError::Backend { .. } | ClientError::Transport(_) | ClientError::Decode { .. } => {
                FailureKind::Transient
            }
        };
        Self::new(kind, err.to_string())
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Everything that can happen to the store. Pure data; the reducer decides what
/// each one means.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    ToggleMenu,
    UpdateFocusNavigation { focus: bool },
    SetHasConnectionSettings(bool),
    SetIsOpenAddDevice(bool),
    SetIsStopTestrun(bool),
    SetIsOpenWaitSnackBar(bool),
    SetIsOpenStartTestrun(bool),
    SetStatus(Option<String>),

    FetchInterfaces,
    FetchInterfacesSuccess { interfaces: SystemInterfaces },
    FetchHostInterfacesSuccess { host: HostInterfaces },
    UpdateError { error: Option<SettingMissedError> },

    FetchSystemConfig,
    FetchSystemConfigSuccess { config: SystemConfig },

    FetchDevices,
    SetDevices { devices: Vec<Device> },
    SetDeviceInProgress { device: Option<Device> },

    FetchRiskProfiles,
    FetchRiskProfilesSuccess { profiles: Vec<Profile> },

    FetchSystemStatus,
    FetchSystemStatusSuccess {
        cycle: PollCycle,
        status: TestrunStatus,
    },
    FetchSystemStatusFailed {
        cycle: PollCycle,
        failure: FetchFailure,
    },
    SetTestrunStatus { status: TestrunStatus },
    PollTick { cycle: PollCycle },
    StopInterval,

    FetchFailed {
        resource: Resource,
        failure: FetchFailure,
    },

    FetchSystemVersion,
    FetchSystemVersionSuccess { version: SystemVersion },

    StartTestrun { device: Device },
    StartTestrunSuccess {
        device: Device,
        status: TestrunStatus,
    },
    StopTestrun,
    StopTestrunSuccess,

    CreateDevice { device: Device },
    CreateDeviceSuccess { device: Device },
    EditDevice { mac_addr: String, device: Device },
    EditDeviceSuccess { mac_addr: String, device: Device },
    DeleteDevice { device: Device },
    DeleteDeviceSuccess { mac_addr: String },
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::ToggleMenu => "toggle_menu",
            Intent::UpdateFocusNavigation { .. } => "update_focus_navigation",
            Intent::SetHasConnectionSettings(_) => "set_has_connection_settings",
            Intent::SetIsOpenAddDevice(_) => "set_is_open_add_device",
            Intent::SetIsStopTestrun(_) => "set_is_stop_testrun",
            Intent::SetIsOpenWaitSnackBar(_) => "set_is_open_wait_snack_bar",
            Intent::SetIsOpenStartTestrun(_) => "set_is_open_start_testrun",
            Intent::SetStatus(_) => "set_status",
            Intent::FetchInterfaces => "fetch_interfaces",
            Intent::FetchInterfacesSuccess { .. } => "fetch_interfaces_success",
            Intent::FetchHostInterfacesSuccess { .. } => "fetch_host_interfaces_success",
            Intent::UpdateError { .. } => "update_error",
            Intent::FetchSystemConfig => "fetch_system_config",
            Intent::FetchSystemConfigSuccess { .. } => "fetch_system_config_success",
            Intent::FetchDevices => "fetch_devices",
            Intent::SetDevices { .. } => "set_devices",
            Intent::SetDeviceInProgress { .. } => "set_device_in_progress",
            Intent::FetchRiskProfiles => "fetch_risk_profiles",
            Intent::FetchRiskProfilesSuccess { .. } => "fetch_risk_profiles_success",
            Intent::FetchSystemStatus => "fetch_system_status",
            Intent::FetchSystemStatusSuccess { .. } => "fetch_system_status_success",
            Intent::FetchSystemStatusFailed { .. } => "fetch_system_status_failed",
            Intent::SetTestrunStatus { .. } => "set_testrun_status",
            Intent::PollTick { .. } => "poll_tick",
            Intent::StopInterval => "stop_interval",
            Intent::FetchFailed { .. } => "fetch_failed",
            Intent::FetchSystemVersion => "fetch_system_version",
            Intent::FetchSystemVersionSuccess { .. } => "fetch_system_version_success",
            Intent::StartTestrun { .. } => "start_testrun",
            Intent::StartTestrunSuccess { .. } => "start_testrun_success",
            Intent::StopTestrun => "stop_testrun",
            Intent::StopTestrunSuccess => "stop_testrun_success",
            Intent::CreateDevice { .. } => "create_device",
            Intent::CreateDeviceSuccess { .. } => "create_device_success",
            Intent::EditDevice { .. } => "edit_device",
            Intent::EditDeviceSuccess { .. } => "edit_device_success",
            Intent::DeleteDevice { .. } => "delete_device",
            Intent::DeleteDeviceSuccess { .. } => "delete_device_success",
        }
    }
}
