use std::collections::{BTreeMap, BTreeSet};

use testrun_protocol::{
    Device, HostInterfaces, Profile, SystemConfig, SystemInterfaces, SystemVersion, TestrunStatus,
};

use super::intent::{FetchFailure, Resource};
use super::poll::PollController;

/// Per-role validity of the host interfaces, derived from [`SystemInterfaces`]
/// and, once known, the interfaces present on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterfacesValidation {
    pub internet: bool,
    pub device: bool,
}

impl InterfacesValidation {
    /// A role is valid when it names an interface that the other role does not
    /// also use and, when `host` is known, that the host actually has.
    pub fn derive(interfaces: &SystemInterfaces, host: Option<&HostInterfaces>) -> Self {
        let present = |name: &str| host.map_or(true, |host| host.contains(name));
        let internet = non_blank(interfaces.internet.as_deref()).filter(|n| present(*n));
        let device = non_blank(interfaces.device.as_deref()).filter(|n| present(*n));
        let shared = matches!((internet, device), (Some(a), Some(b)) if a == b);

        Self {
            internet: internet.is_some() && !shared,
            device: device.is_some() && !shared,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.internet && self.device
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A precondition setting is absent; blocks starting a testrun.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SettingMissedError {
    pub is_setting_missed: bool,
    pub devices_available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UiFlags {
    pub has_connection_settings: bool,
    pub is_open_add_device: bool,
    pub is_stop_testrun: bool,
    pub is_open_wait_snack_bar: bool,
    pub is_open_start_testrun: bool,
    pub is_menu_open: bool,
    pub focus_navigation: bool,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    /// Role assignment: from `FetchInterfacesSuccess`, or from the system
    /// config once that is loaded.
    pub interfaces: SystemInterfaces,
    pub host_interfaces: Option<HostInterfaces>,
    pub interfaces_validation: InterfacesValidation,
    pub setting_missed_error: Option<SettingMissedError>,
    pub system_config: Option<SystemConfig>,

    pub devices: Vec<Device>,
    pub has_devices: bool,
    pub device_in_progress: Option<Device>,

    pub risk_profiles: Vec<Profile>,
    pub has_risk_profiles: bool,

    pub testrun_status: TestrunStatus,
    pub system_version: Option<SystemVersion>,
    pub poll: PollController,

    /// Resources with a request outstanding.
    pub loading: BTreeSet<Resource>,
    /// Most recent failure per resource, cleared by the next success.
    pub errors: BTreeMap<Resource, FetchFailure>,

    pub ui: UiFlags,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.has_devices == self.devices.is_empty() {
            return Err(format!(
                "has_devices={} but {} devices",
                self.has_devices,
                self.devices.len()
            ));
        }
        if self.has_risk_profiles == self.risk_profiles.is_empty() {
            return Err(format!(
                "has_risk_profiles={} but {} profiles",
                self.has_risk_profiles,
                self.risk_profiles.len()
            ));
        }
        let derived =
            InterfacesValidation::derive(&self.interfaces, self.host_interfaces.as_ref());
        if self.interfaces_validation != derived {
            return Err("interfaces_validation out of sync with interfaces".to_owned());
        }
        if let Some(err) = self.setting_missed_error {
            if err.devices_available != self.has_devices {
                return Err("setting_missed_error.devices_available is stale".to_owned());
            }
        }
        Ok(())
    }
}
