use testrun_protocol::{SystemInterfaces, TestrunStatus};

use super::intent::{FailureKind, FetchFailure, Intent, Resource};
use super::selectors;
use super::state::{AppState, InterfacesValidation, SettingMissedError};

/// The only writer of [`AppState`]. Pure and total: the same state and intent
/// always reduce to the same result.
pub fn reduce(mut state: AppState, intent: &Intent) -> AppState {
    match intent {
        Intent::ToggleMenu => state.ui.is_menu_open = !state.ui.is_menu_open,
        Intent::UpdateFocusNavigation { focus } => state.ui.focus_navigation = *focus,
        Intent::SetHasConnectionSettings(value) => state.ui.has_connection_settings = *value,
        Intent::SetIsOpenAddDevice(value) => state.ui.is_open_add_device = *value,
        Intent::SetIsStopTestrun(value) => state.ui.is_stop_testrun = *value,
        Intent::SetIsOpenWaitSnackBar(value) => state.ui.is_open_wait_snack_bar = *value,
        Intent::SetIsOpenStartTestrun(value) => state.ui.is_open_start_testrun = *value,
        Intent::SetStatus(status) => state.ui.status = status.clone(),

        Intent::FetchInterfaces => begin(&mut state, Resource::Interfaces),
        Intent::FetchInterfacesSuccess { interfaces } => {
            state.interfaces = interfaces.clone();
            revalidate_interfaces(&mut state);
            finish(&mut state, Resource::Interfaces);
        }
        Intent::FetchHostInterfacesSuccess { host } => {
            state.host_interfaces = Some(host.clone());
            if let Some(config) = &state.system_config {
                state.interfaces = SystemInterfaces::from_network(&config.network);
            }
            revalidate_interfaces(&mut state);
            finish(&mut state, Resource::Interfaces);
        }
        Intent::UpdateError { error } => {
            state.setting_missed_error = error.map(|err| SettingMissedError {
                devices_available: state.has_devices,
                ..err
            });
        }

        Intent::FetchSystemConfig => begin(&mut state, Resource::SystemConfig),
        Intent::FetchSystemConfigSuccess { config } => {
            let has_settings = config.has_connection_settings();
            state.ui.has_connection_settings = has_settings;
            state.setting_missed_error = (!has_settings).then_some(SettingMissedError {
                is_setting_missed: true,
                devices_available: state.has_devices,
            });
            state.interfaces = SystemInterfaces::from_network(&config.network);
            revalidate_interfaces(&mut state);
            state.system_config = Some(config.clone());
            finish(&mut state, Resource::SystemConfig);
        }

        Intent::FetchDevices => begin(&mut state, Resource::Devices),
        Intent::SetDevices { devices } => {
            state.devices = devices.clone();
            sync_has_devices(&mut state);
            finish(&mut state, Resource::Devices);
        }
        Intent::SetDeviceInProgress { device } => state.device_in_progress = device.clone(),

        Intent::FetchRiskProfiles => begin(&mut state, Resource::RiskProfiles),
        Intent::FetchRiskProfilesSuccess { profiles } => {
            state.risk_profiles = profiles.clone();
            state.has_risk_profiles = !state.risk_profiles.is_empty();
            finish(&mut state, Resource::RiskProfiles);
        }

        Intent::FetchSystemStatus => state.poll = state.poll.request_fetch(),
        Intent::FetchSystemStatusSuccess { cycle, status } => {
            if !state.poll.accepts(*cycle) {
                state.poll = state.poll.complete(*cycle, true);
                return state;
            }
            let terminal = status.status.is_terminal();
            replace_status(&mut state, status.clone());
            state.errors.remove(&Resource::SystemStatus);
            state.poll = state.poll.complete(*cycle, terminal);
        }
        Intent::FetchSystemStatusFailed { cycle, failure } => {
            if !state.poll.accepts(*cycle) {
                state.poll = state.poll.complete(*cycle, true);
                return state;
            }
            if failure.is_configuration_missing() {
                state.setting_missed_error = Some(SettingMissedError {
                    is_setting_missed: true,
                    devices_available: state.has_devices,
                });
            }
            state.errors.insert(Resource::SystemStatus, failure.clone());
            state.poll = state
                .poll
                .complete(*cycle, failure.is_configuration_missing());
        }
        Intent::SetTestrunStatus { status } => {
            let terminal = status.status.is_terminal();
            replace_status(&mut state, status.clone());
            if !terminal && !state.poll.is_polling() {
                state.poll = state.poll.request_fetch();
            }
        }
        Intent::PollTick { cycle } => state.poll = state.poll.tick(*cycle),
        Intent::StopInterval => state.poll = state.poll.stop(),

        Intent::FetchFailed { resource, failure } => {
            state.loading.remove(resource);
            state.errors.insert(*resource, failure.clone());
            if *resource == Resource::StopTestrun {
                state.ui.is_stop_testrun = false;
            }
        }

        Intent::FetchSystemVersion => begin(&mut state, Resource::SystemVersion),
        Intent::FetchSystemVersionSuccess { version } => {
            state.system_version = Some(version.clone());
            finish(&mut state, Resource::SystemVersion);
        }

        Intent::StartTestrun { .. } => match selectors::start_blocker(&state) {
            Some(blocker) => {
                state.errors.insert(
                    Resource::StartTestrun,
                    FetchFailure::new(FailureKind::Rejected, blocker.to_string()),
                );
            }
            None => {
                state.errors.remove(&Resource::StartTestrun);
                begin(&mut state, Resource::StartTestrun);
            }
        },
        Intent::StartTestrunSuccess { device, status } => {
            let terminal = status.status.is_terminal();
            replace_status(&mut state, status.clone());
            if !terminal {
                state.device_in_progress = Some(device.clone());
            }
            state.ui.is_open_start_testrun = false;
            finish(&mut state, Resource::StartTestrun);
            state.poll = state.poll.request_fetch();
        }
        Intent::StopTestrun => {
            state.ui.is_stop_testrun = true;
            begin(&mut state, Resource::StopTestrun);
        }
        Intent::StopTestrunSuccess => {
            state.poll = state.poll.stop();
            state.ui.is_stop_testrun = false;
            state.device_in_progress = None;
            finish(&mut state, Resource::StopTestrun);
        }

        Intent::CreateDevice { .. } => begin(&mut state, Resource::CreateDevice),
        Intent::CreateDeviceSuccess { device } => {
            state.devices.retain(|d| !same_mac(&d.mac_addr, &device.mac_addr));
            state.devices.push(device.clone());
            sync_has_devices(&mut state);
            state.ui.is_open_add_device = false;
            finish(&mut state, Resource::CreateDevice);
        }
        Intent::EditDevice { .. } => begin(&mut state, Resource::EditDevice),
        Intent::EditDeviceSuccess { mac_addr, device } => {
            match state
                .devices
                .iter_mut()
                .find(|d| same_mac(&d.mac_addr, mac_addr))
            {
                Some(stored) => *stored = device.clone(),
                None => state.devices.push(device.clone()),
            }
            sync_has_devices(&mut state);
            state.ui.is_open_add_device = false;
            finish(&mut state, Resource::EditDevice);
        }
        Intent::DeleteDevice { device } => {
            let under_test = state
                .device_in_progress
                .as_ref()
                .is_some_and(|d| same_mac(&d.mac_addr, &device.mac_addr));
            if under_test && selectors::is_testrun_active(&state) {
                state.errors.insert(
                    Resource::DeleteDevice,
                    FetchFailure::new(
                        FailureKind::Rejected,
                        "device is under test; stop the testrun first",
                    ),
                );
            } else {
                state.errors.remove(&Resource::DeleteDevice);
                begin(&mut state, Resource::DeleteDevice);
            }
        }
        Intent::DeleteDeviceSuccess { mac_addr } => {
            state.devices.retain(|d| !same_mac(&d.mac_addr, mac_addr));
            sync_has_devices(&mut state);
            finish(&mut state, Resource::DeleteDevice);
        }
    }
    state
}

fn revalidate_interfaces(state: &mut AppState) {
    state.interfaces_validation =
        InterfacesValidation::derive(&state.interfaces, state.host_interfaces.as_ref());
}

/// Keeps the roster flag and the setting-missed snapshot in step with `devices`.
fn sync_has_devices(state: &mut AppState) {
    state.has_devices = !state.devices.is_empty();
    if let Some(err) = state.setting_missed_error.as_mut() {
        err.devices_available = state.has_devices;
    }
}

fn same_mac(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn begin(state: &mut AppState, resource: Resource) {
    state.loading.insert(resource);
}

fn finish(state: &mut AppState, resource: Resource) {
    state.loading.remove(&resource);
    state.errors.remove(&resource);
}

/// Status updates replace the whole record; a terminal status also releases the
/// device under test.
fn replace_status(state: &mut AppState, status: TestrunStatus) {
    if status.status.is_terminal() {
        state.device_in_progress = None;
    }
    state.testrun_status = status;
}
