//! Read-side projections of [`AppState`]. Every selector is a pure function and
//! returns a value comparable with `==`, so callers can skip unchanged output.

use std::fmt;
use std::time::Duration;

use testrun_protocol::{
    Device, HostInterfaces, Profile, StatusValue, SystemInterfaces, SystemVersion, TestrunStatus,
};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use super::intent::{FetchFailure, Resource};
use super::state::{AppState, InterfacesValidation, SettingMissedError, UiFlags};

pub fn interfaces(state: &AppState) -> &SystemInterfaces {
    &state.interfaces
}

/// Interfaces the backend host reported, if fetched.
pub fn host_interfaces(state: &AppState) -> Option<&HostInterfaces> {
    state.host_interfaces.as_ref()
}

pub fn interfaces_validation(state: &AppState) -> InterfacesValidation {
    state.interfaces_validation
}

pub fn is_interfaces_valid(state: &AppState) -> bool {
    state.interfaces_validation.is_valid()
}

pub fn setting_missed_error(state: &AppState) -> Option<SettingMissedError> {
    state.setting_missed_error
}

pub fn has_connection_settings(state: &AppState) -> bool {
    state.ui.has_connection_settings
}

pub fn devices(state: &AppState) -> &[Device] {
    &state.devices
}

pub fn has_devices(state: &AppState) -> bool {
    state.has_devices
}

pub fn device_in_progress(state: &AppState) -> Option<&Device> {
    state.device_in_progress.as_ref()
}

pub fn risk_profiles(state: &AppState) -> &[Profile] {
    &state.risk_profiles
}

pub fn has_risk_profiles(state: &AppState) -> bool {
    state.has_risk_profiles
}

pub fn testrun_status(state: &AppState) -> &TestrunStatus {
    &state.testrun_status
}

pub fn status_value(state: &AppState) -> StatusValue {
    state.testrun_status.status
}

pub fn system_version(state: &AppState) -> Option<&SystemVersion> {
    state.system_version.as_ref()
}

pub fn ui_flags(state: &AppState) -> &UiFlags {
    &state.ui
}

/// A run is active while the backend reports a non-terminal status or a start
/// request is outstanding.
pub fn is_testrun_active(state: &AppState) -> bool {
    !state.testrun_status.status.is_terminal() || state.loading.contains(&Resource::StartTestrun)
}

pub fn is_polling(state: &AppState) -> bool {
    state.poll.is_polling()
}

pub fn is_status_fetch_in_flight(state: &AppState) -> bool {
    state.poll.is_fetching()
}

pub fn is_loading(state: &AppState, resource: Resource) -> bool {
    match resource {
        Resource::SystemStatus => state.poll.is_fetching(),
        other => state.loading.contains(&other),
    }
}

/// True when no one-shot request or status fetch is outstanding.
pub fn is_settled(state: &AppState) -> bool {
    state.loading.is_empty() && !state.poll.is_fetching()
}

pub fn error_for(state: &AppState, resource: Resource) -> Option<&FetchFailure> {
    state.errors.get(&resource)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartBlocker {
    SettingMissed,
    InvalidInterfaces,
    NoDevices,
    TestrunActive,
}

impl fmt::Display for StartBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StartBlocker::SettingMissed => "connection settings are missing",
            StartBlocker::InvalidInterfaces => "network interfaces are not valid",
            StartBlocker::NoDevices => "no devices configured",
            StartBlocker::TestrunActive => "a testrun is already in progress",
        })
    }
}

pub fn start_blocker(state: &AppState) -> Option<StartBlocker> {
    if state
        .setting_missed_error
        .is_some_and(|err| err.is_setting_missed)
    {
        return Some(StartBlocker::SettingMissed);
    }
    if !state.interfaces_validation.is_valid() {
        return Some(StartBlocker::InvalidInterfaces);
    }
    if !state.has_devices {
        return Some(StartBlocker::NoDevices);
    }
    if is_testrun_active(state) {
        return Some(StartBlocker::TestrunActive);
    }
    None
}

pub fn can_start_testrun(state: &AppState) -> bool {
    start_blocker(state).is_none()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResultsSummary {
    pub total: u32,
    pub completed: usize,
    pub compliant: usize,
    pub non_compliant: usize,
    pub other: usize,
}

pub fn results_summary(state: &AppState) -> ResultsSummary {
    let tests = &state.testrun_status.tests;
    let mut summary = ResultsSummary {
        total: tests.total,
        completed: tests.results.len(),
        ..Default::default()
    };
    for result in &tests.results {
        match result.result.trim() {
            "Compliant" => summary.compliant += 1,
            "Non-Compliant" => summary.non_compliant += 1,
            _ => summary.other += 1,
        }
    }
    summary
}

/// Elapsed time between `started` and `finished`. `None` until both are known
/// and parse.
pub fn testrun_duration(state: &AppState) -> Option<Duration> {
    let status = &state.testrun_status;
    let started = parse_timestamp(status.started.as_deref()?)?;
    let finished = parse_timestamp(status.finished.as_deref()?)?;
    let elapsed = finished - started;
    if elapsed.is_negative() {
        return None;
    }
    Duration::try_from(elapsed).ok()
}

fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts);
    }
    let local = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    PrimitiveDateTime::parse(raw, &local)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}
